//! Device memory allocation and synchronous transfers.

use hplgpu_core::{Accelerator, DeviceBuffer, DevicePtr, Error, Result, TransferKind};

use crate::context::DeviceContext;

/// Where a transfer reads from.
#[derive(Debug, Clone, Copy)]
pub enum TransferSrc<'a> {
    Host(&'a [u8]),
    Device(DevicePtr),
}

/// Where a transfer writes to.
#[derive(Debug)]
pub enum TransferDst<'a> {
    Host(&'a mut [u8]),
    Device(DevicePtr),
}

impl TransferSrc<'_> {
    fn on_device(&self) -> bool {
        matches!(self, TransferSrc::Device(_))
    }
}

impl TransferDst<'_> {
    fn on_device(&self) -> bool {
        matches!(self, TransferDst::Device(_))
    }
}

/// Allocation, release and transfer primitives over one context.
pub struct MemoryManager<'ctx, A: Accelerator> {
    ctx: &'ctx DeviceContext<A>,
}

impl<'ctx, A: Accelerator> MemoryManager<'ctx, A> {
    pub fn new(ctx: &'ctx DeviceContext<A>) -> Self {
        Self { ctx }
    }

    /// Allocate `bytes` of device memory.
    pub fn allocate(&self, bytes: usize) -> Result<DeviceBuffer> {
        self.ctx
            .trace()
            .op("[Allocate]", "Memory allocation", &format!("{} bytes", bytes));
        self.ctx.accelerator().malloc(bytes)
    }

    /// Release a buffer. The handle is consumed, so it cannot be freed twice.
    pub fn deallocate(&self, buffer: DeviceBuffer) -> Result<()> {
        self.ctx.trace().op(
            "[Deallocate]",
            "Memory release",
            &format!("{} bytes at {}", buffer.size(), buffer.ptr()),
        );
        self.ctx.accelerator().free(buffer)
    }

    /// Copy `bytes` from `src` to `dst`.
    ///
    /// `kind` must name the direction the endpoints imply; `Default` accepts
    /// whatever they imply. Returns once the bytes have landed.
    pub fn transfer(
        &self,
        dst: TransferDst<'_>,
        src: TransferSrc<'_>,
        bytes: usize,
        kind: TransferKind,
    ) -> Result<()> {
        let endpoints = TransferKind::from_endpoints(src.on_device(), dst.on_device());
        if kind != TransferKind::Default && kind != endpoints {
            return Err(Error::TransferMismatch { kind, endpoints });
        }
        self.ctx
            .trace()
            .transfer(self.ctx.transfer_label(kind), bytes);

        let acc = self.ctx.accelerator();
        match (dst, src) {
            (TransferDst::Host(d), TransferSrc::Host(s)) => {
                check_len("dst", d.len(), bytes)?;
                check_len("src", s.len(), bytes)?;
                d[..bytes].copy_from_slice(&s[..bytes]);
                Ok(())
            }
            (TransferDst::Device(d), TransferSrc::Host(s)) => {
                check_len("src", s.len(), bytes)?;
                acc.copy_host_to_device(d, &s[..bytes])
            }
            (TransferDst::Host(d), TransferSrc::Device(s)) => {
                check_len("dst", d.len(), bytes)?;
                acc.copy_device_to_host(&mut d[..bytes], s)
            }
            (TransferDst::Device(d), TransferSrc::Device(s)) => {
                acc.copy_device_to_device(d, s, bytes)
            }
        }
    }

    /// Copy a host slice to device memory at `dst`.
    pub fn upload<T: bytemuck::Pod>(&self, dst: DevicePtr, src: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(src);
        self.transfer(
            TransferDst::Device(dst),
            TransferSrc::Host(bytes),
            bytes.len(),
            TransferKind::HostToDevice,
        )
    }

    /// Fill a host slice from device memory at `src`.
    pub fn download<T: bytemuck::Pod>(&self, dst: &mut [T], src: DevicePtr) -> Result<()> {
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(dst);
        let len = bytes.len();
        self.transfer(
            TransferDst::Host(bytes),
            TransferSrc::Device(src),
            len,
            TransferKind::DeviceToHost,
        )
    }
}

fn check_len(operand: &'static str, actual: usize, expected: usize) -> Result<()> {
    if actual < expected {
        return Err(Error::DimensionMismatch {
            op: "transfer",
            operand,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::host_context as context;

    #[test]
    fn round_trip_through_device() {
        let ctx = context();
        let mem = ctx.memory();
        let buf = mem.allocate(4 * 8).unwrap();
        mem.upload(buf.ptr(), &[1.0f64, 2.0, 3.0, 4.0]).unwrap();

        let other = mem.allocate(4 * 8).unwrap();
        mem.transfer(
            TransferDst::Device(other.ptr()),
            TransferSrc::Device(buf.ptr()),
            32,
            TransferKind::Default,
        )
        .unwrap();

        let mut out = [0.0f64; 4];
        mem.download(&mut out, other.ptr()).unwrap();
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);

        mem.deallocate(buf).unwrap();
        mem.deallocate(other).unwrap();
        assert_eq!(ctx.accelerator().live_allocations(), 0);
    }

    #[test]
    fn host_to_host_copies() {
        let ctx = context();
        let src = [1u8, 2, 3, 4];
        let mut dst = [0u8; 4];
        ctx.memory()
            .transfer(
                TransferDst::Host(&mut dst),
                TransferSrc::Host(&src),
                3,
                TransferKind::HostToHost,
            )
            .unwrap();
        assert_eq!(dst, [1, 2, 3, 0]);
    }

    #[test]
    fn kind_must_match_endpoints() {
        let ctx = context();
        let buf = ctx.memory().allocate(8).unwrap();
        let src = [0u8; 8];
        let err = ctx
            .memory()
            .transfer(
                TransferDst::Device(buf.ptr()),
                TransferSrc::Host(&src),
                8,
                TransferKind::DeviceToHost,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::TransferMismatch {
                kind: TransferKind::DeviceToHost,
                endpoints: TransferKind::HostToDevice
            }
        ));
        ctx.memory().deallocate(buf).unwrap();
    }

    #[test]
    fn short_host_slice_is_rejected() {
        let ctx = context();
        let buf = ctx.memory().allocate(16).unwrap();
        let src = [0u8; 4];
        assert!(matches!(
            ctx.memory().transfer(
                TransferDst::Device(buf.ptr()),
                TransferSrc::Host(&src),
                16,
                TransferKind::Default,
            ),
            Err(Error::DimensionMismatch { .. })
        ));
        ctx.memory().deallocate(buf).unwrap();
    }
}
