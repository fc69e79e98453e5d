//! Panel working-set lifetimes.
//!
//! A panel carries a `WORK` buffer of doubles and an `IWORK` buffer of pivot
//! indices. Its descriptor is itself device resident: [`DevicePanel`] pairs
//! the host-side [`Panel`] with the allocation holding the descriptor image,
//! and disposal frees the inner buffers before the descriptor.

use bytemuck::{Pod, Zeroable};
use hplgpu_core::{Accelerator, DeviceBuffer, DevicePtr, Result};
use serde::{Deserialize, Serialize};

use crate::context::DeviceContext;
use crate::memory::MemoryManager;

/// Dimension metadata the factorization attaches to a panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelDims {
    /// Local rows of the panel.
    pub m: usize,
    /// Local columns of the trailing matrix.
    pub n: usize,
    /// Panel width.
    pub jb: usize,
    /// Local row offset.
    pub ii: usize,
    /// Local column offset.
    pub jj: usize,
}

/// Host-side view of a panel's device buffers.
#[derive(Debug, Default)]
pub struct Panel {
    pub work: Option<DeviceBuffer>,
    pub iwork: Option<DeviceBuffer>,
    pub dims: PanelDims,
}

impl Panel {
    pub fn work_ptr(&self) -> DevicePtr {
        self.work.as_ref().map_or(DevicePtr::NULL, DeviceBuffer::ptr)
    }

    pub fn iwork_ptr(&self) -> DevicePtr {
        self.iwork.as_ref().map_or(DevicePtr::NULL, DeviceBuffer::ptr)
    }
}

/// The descriptor image as stored on the device.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct PanelDescriptor {
    pub work: u64,
    pub iwork: u64,
    pub m: u64,
    pub n: u64,
    pub jb: u64,
    pub ii: u64,
    pub jj: u64,
}

impl PanelDescriptor {
    pub fn of(panel: &Panel) -> Self {
        Self {
            work: panel.work_ptr().addr(),
            iwork: panel.iwork_ptr().addr(),
            m: panel.dims.m as u64,
            n: panel.dims.n as u64,
            jb: panel.dims.jb as u64,
            ii: panel.dims.ii as u64,
            jj: panel.dims.jj as u64,
        }
    }
}

/// A panel whose descriptor lives in device memory.
#[derive(Debug)]
pub struct DevicePanel {
    panel: Panel,
    descriptor: DeviceBuffer,
}

impl DevicePanel {
    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut Panel {
        &mut self.panel
    }

    /// Device address of the descriptor image.
    pub fn descriptor_ptr(&self) -> DevicePtr {
        self.descriptor.ptr()
    }
}

/// Outcome of a panel release, in the distributed layer's convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistStatus {
    Success,
}

impl DistStatus {
    /// The distributed layer's status code (`0` is success).
    pub fn code(self) -> i32 {
        match self {
            DistStatus::Success => 0,
        }
    }
}

/// Creates and disposes panels on one context.
pub struct PanelManager<'ctx, A: Accelerator> {
    memory: MemoryManager<'ctx, A>,
}

impl<'ctx, A: Accelerator> PanelManager<'ctx, A> {
    pub fn new(ctx: &'ctx DeviceContext<A>) -> Self {
        Self {
            memory: MemoryManager::new(ctx),
        }
    }

    /// Allocate a panel and its device-resident descriptor.
    ///
    /// A zero size leaves the corresponding buffer null.
    pub fn create_panel(
        &self,
        dims: PanelDims,
        work_bytes: usize,
        iwork_bytes: usize,
    ) -> Result<DevicePanel> {
        let descriptor = self
            .memory
            .allocate(std::mem::size_of::<PanelDescriptor>())?;
        let mut device_panel = DevicePanel {
            panel: Panel {
                work: None,
                iwork: None,
                dims,
            },
            descriptor,
        };

        if let Err(e) = self.fill(&mut device_panel, work_bytes, iwork_bytes) {
            let mut slot = Some(device_panel);
            if let Err(cleanup) = self.dispose_panel(&mut slot) {
                log::warn!("Panel cleanup after failed creation also failed: {}", cleanup);
            }
            return Err(e);
        }
        Ok(device_panel)
    }

    /// Rewrite the device descriptor from the host-side panel.
    pub fn write_descriptor(&self, device_panel: &DevicePanel) -> Result<()> {
        let image = PanelDescriptor::of(&device_panel.panel);
        self.memory
            .upload(device_panel.descriptor_ptr(), std::slice::from_ref(&image))
    }

    /// Free `WORK` and `IWORK`, leaving both null. Null buffers are skipped.
    ///
    /// Both frees are attempted; the first failure is returned.
    pub fn release_panel_buffers(&self, panel: &mut Panel) -> Result<DistStatus> {
        let work = panel
            .work
            .take()
            .map_or(Ok(()), |buf| self.memory.deallocate(buf));
        let iwork = panel
            .iwork
            .take()
            .map_or(Ok(()), |buf| self.memory.deallocate(buf));
        work.and(iwork)?;
        Ok(DistStatus::Success)
    }

    /// Release the panel in `slot` and its descriptor, leaving the slot empty.
    ///
    /// An empty slot succeeds without freeing anything.
    pub fn dispose_panel(&self, slot: &mut Option<DevicePanel>) -> Result<DistStatus> {
        let Some(mut device_panel) = slot.take() else {
            return Ok(DistStatus::Success);
        };
        let status = self.release_panel_buffers(&mut device_panel.panel);
        let freed = self.memory.deallocate(device_panel.descriptor);
        let status = status?;
        freed?;
        Ok(status)
    }

    fn fill(
        &self,
        device_panel: &mut DevicePanel,
        work_bytes: usize,
        iwork_bytes: usize,
    ) -> Result<()> {
        device_panel.panel.work = self.optional_buffer(work_bytes)?;
        device_panel.panel.iwork = self.optional_buffer(iwork_bytes)?;
        self.write_descriptor(device_panel)
    }

    fn optional_buffer(&self, bytes: usize) -> Result<Option<DeviceBuffer>> {
        if bytes == 0 {
            return Ok(None);
        }
        self.memory.allocate(bytes).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::host_context as context;
    use hplgpu_core::Error;

    #[test]
    fn descriptor_image_is_uploaded() {
        let ctx = context();
        let panels = ctx.panels();
        let dims = PanelDims {
            m: 128,
            n: 256,
            jb: 32,
            ii: 4,
            jj: 8,
        };
        let device_panel = panels.create_panel(dims, 128 * 32 * 8, 32 * 4).unwrap();

        let mut image = [PanelDescriptor::zeroed()];
        ctx.memory()
            .download(&mut image, device_panel.descriptor_ptr())
            .unwrap();
        assert_eq!(image[0], PanelDescriptor::of(device_panel.panel()));
        assert_eq!(image[0].jb, 32);
        assert!(image[0].work != 0 && image[0].iwork != 0);

        let mut slot = Some(device_panel);
        panels.dispose_panel(&mut slot).unwrap();
    }

    #[test]
    fn dispose_frees_everything_and_empties_slot() {
        let ctx = context();
        let panels = ctx.panels();
        let mut slot = Some(panels.create_panel(PanelDims::default(), 1024, 64).unwrap());
        assert_eq!(ctx.accelerator().live_allocations(), 3);

        let status = panels.dispose_panel(&mut slot).unwrap();
        assert_eq!(status, DistStatus::Success);
        assert_eq!(status.code(), 0);
        assert!(slot.is_none());
        assert_eq!(ctx.accelerator().live_allocations(), 0);
    }

    #[test]
    fn failed_work_free_still_frees_iwork() {
        let ctx = context();
        let panels = ctx.panels();
        let mut slot = Some(panels.create_panel(PanelDims::default(), 64, 32).unwrap());
        assert_eq!(ctx.accelerator().live_allocations(), 3);

        // Replace WORK with a handle the device never issued.
        let panel = slot.as_mut().unwrap().panel_mut();
        let issued = panel.work.take().unwrap();
        panel.work = Some(DeviceBuffer::from_raw_parts(DevicePtr::from_raw(0x10), 8));

        assert!(matches!(
            panels.dispose_panel(&mut slot),
            Err(Error::InvalidPointer(0x10))
        ));
        assert!(slot.is_none());
        assert_eq!(ctx.accelerator().live_allocations(), 1);
        ctx.memory().deallocate(issued).unwrap();
        assert_eq!(ctx.accelerator().live_allocations(), 0);
    }

    #[test]
    fn release_buffers_is_repeatable() {
        let ctx = context();
        let panels = ctx.panels();
        let mut device_panel = panels.create_panel(PanelDims::default(), 64, 0).unwrap();
        assert!(device_panel.panel().iwork.is_none());

        let panel = device_panel.panel_mut();
        assert_eq!(panels.release_panel_buffers(panel).unwrap(), DistStatus::Success);
        assert!(panel.work.is_none());
        assert_eq!(panels.release_panel_buffers(panel).unwrap(), DistStatus::Success);

        let mut slot = Some(device_panel);
        panels.dispose_panel(&mut slot).unwrap();
        assert_eq!(ctx.accelerator().live_allocations(), 0);
    }
}
