//! The host-emulated accelerator.

use hplgpu_core::{
    Accelerator, DeviceBuffer, DevicePtr, DeviceProperties, Error, LaunchConfig, Result,
    matrix_span,
};
use std::sync::Arc;

use crate::blas::HostBlas;
use crate::memory::DeviceMemory;
use crate::rng::HostGenerator;
use crate::tiles;

/// Devices the emulator pretends to have.
pub const HOST_DEVICE_COUNT: usize = 1;

/// Default emulated global memory: 4 GiB.
pub const DEFAULT_CAPACITY: usize = 4 << 30;

/// An accelerator whose device memory is a private address space in host RAM.
///
/// Kernels run on the rayon pool. Everything completes before the call
/// returns, so `synchronize` has nothing to wait for.
pub struct HostAccelerator {
    ordinal: usize,
    memory: Arc<DeviceMemory>,
}

impl HostAccelerator {
    /// Open device `ordinal` with a custom memory capacity.
    pub fn with_capacity(ordinal: usize, capacity: usize) -> Result<Self> {
        if ordinal >= HOST_DEVICE_COUNT {
            return Err(Error::InvalidDevice {
                ordinal,
                count: HOST_DEVICE_COUNT,
            });
        }
        log::debug!(
            "Opening host-emulated accelerator {} ({} bytes)",
            ordinal,
            capacity
        );
        Ok(Self {
            ordinal,
            memory: Arc::new(DeviceMemory::new(capacity)),
        })
    }

    /// The emulated address space, for inspecting allocations.
    pub fn memory(&self) -> &DeviceMemory {
        &self.memory
    }

    /// Allocations currently live on the device.
    pub fn live_allocations(&self) -> usize {
        self.memory.live_allocations()
    }

    fn read_matrix(&self, ptr: DevicePtr, rows: usize, cols: usize, ld: usize) -> Result<Vec<f64>> {
        self.memory.read_f64(ptr, matrix_span(rows, cols, ld))
    }
}

impl Accelerator for HostAccelerator {
    type Blas = HostBlas;
    type Generator = HostGenerator;

    const PLATFORM: &'static str = "HOST";

    fn device_count() -> Result<usize> {
        Ok(HOST_DEVICE_COUNT)
    }

    fn open(ordinal: usize) -> Result<Self> {
        Self::with_capacity(ordinal, DEFAULT_CAPACITY)
    }

    fn ordinal(&self) -> usize {
        self.ordinal
    }

    fn properties(&self) -> Result<DeviceProperties> {
        let threads = rayon::current_num_threads() as u32;
        Ok(DeviceProperties {
            name: "Host emulated accelerator".to_string(),
            total_global_mem: self.memory.capacity() as u64,
            shared_mem_per_block: 64 * 1024,
            regs_per_block: 65536,
            warp_size: 64,
            max_threads_per_block: 1024,
            max_threads_dim: [1024, 1024, 1024],
            max_grid_size: [i32::MAX as u32, 65535, 65535],
            total_const_mem: 64 * 1024,
            major: 1,
            minor: 0,
            memory_clock_rate: 0,
            multiprocessor_count: threads,
            pci_bus_id: 0,
        })
    }

    fn create_blas(&self) -> Result<HostBlas> {
        Ok(HostBlas::new(self.memory.clone()))
    }

    fn destroy_blas(&self, blas: HostBlas) -> Result<()> {
        drop(blas);
        Ok(())
    }

    fn malloc(&self, bytes: usize) -> Result<DeviceBuffer> {
        self.memory.allocate(bytes)
    }

    fn free(&self, buffer: DeviceBuffer) -> Result<()> {
        self.memory.release(buffer)
    }

    fn copy_host_to_device(&self, dst: DevicePtr, src: &[u8]) -> Result<()> {
        self.memory.write(dst, src)
    }

    fn copy_device_to_host(&self, dst: &mut [u8], src: DevicePtr) -> Result<()> {
        self.memory.read(src, dst)
    }

    fn copy_device_to_device(&self, dst: DevicePtr, src: DevicePtr, bytes: usize) -> Result<()> {
        self.memory.copy_within(dst, src, bytes)
    }

    fn synchronize(&self) -> Result<()> {
        Ok(())
    }

    fn create_generator(&self, seed: u64) -> Result<HostGenerator> {
        Ok(HostGenerator::new(self.memory.clone(), seed))
    }

    fn lacpy(
        &self,
        launch: &LaunchConfig,
        m: usize,
        n: usize,
        a: DevicePtr,
        lda: usize,
        b: DevicePtr,
        ldb: usize,
    ) -> Result<()> {
        if !launch.covers(m, n) {
            return Err(Error::Launch(format!(
                "grid {:?} of {}-wide tiles does not cover {}x{}",
                launch.grid, launch.tile, m, n
            )));
        }
        let src = self.read_matrix(a, m, n, lda)?;
        let mut dst = self.read_matrix(b, m, n, ldb)?;
        if dst.is_empty() {
            return Ok(());
        }
        tiles::copy(launch, m, n, &src, lda, &mut dst, ldb);
        self.memory.write_f64(b, &dst)
    }

    fn latcpy(
        &self,
        launch: &LaunchConfig,
        m: usize,
        n: usize,
        a: DevicePtr,
        lda: usize,
        b: DevicePtr,
        ldb: usize,
    ) -> Result<()> {
        if !launch.covers(m, n) {
            return Err(Error::Launch(format!(
                "grid {:?} of {}-wide tiles does not cover {}x{}",
                launch.grid, launch.tile, m, n
            )));
        }
        let src = self.read_matrix(a, m, n, lda)?;
        let mut dst = self.read_matrix(b, n, m, ldb)?;
        if dst.is_empty() {
            return Ok(());
        }
        tiles::transpose(launch, m, n, &src, lda, &mut dst, ldb);
        self.memory.write_f64(b, &dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hplgpu_core::{DeviceBlas, NormalGenerator};

    #[test]
    fn only_device_zero_exists() {
        assert_eq!(HostAccelerator::device_count().unwrap(), 1);
        assert!(HostAccelerator::open(0).is_ok());
        assert!(matches!(
            HostAccelerator::open(1),
            Err(Error::InvalidDevice {
                ordinal: 1,
                count: 1
            })
        ));
    }

    #[test]
    fn blas_runs_against_device_memory() {
        let acc = HostAccelerator::open(0).unwrap();
        let blas = acc.create_blas().unwrap();
        let x = acc.malloc(4 * 8).unwrap();
        acc.copy_host_to_device(x.ptr(), bytemuck::cast_slice(&[1.0f64, -5.0, 3.0, 2.0]))
            .unwrap();
        assert_eq!(blas.idamax(4, x.ptr(), 1).unwrap(), 1);

        blas.dscal(2, 2.0, x.ptr().add::<f64>(2), 1).unwrap();
        let mut out = [0.0f64; 4];
        acc.copy_device_to_host(bytemuck::cast_slice_mut(&mut out), x.ptr())
            .unwrap();
        assert_eq!(out, [1.0, -5.0, 6.0, 4.0]);

        acc.free(x).unwrap();
        acc.destroy_blas(blas).unwrap();
        assert_eq!(acc.live_allocations(), 0);
    }

    #[test]
    fn generator_writes_into_allocation() {
        let acc = HostAccelerator::open(0).unwrap();
        let buf = acc.malloc(16 * 8).unwrap();
        let mut g = acc.create_generator(42).unwrap();
        g.generate_normal(buf.ptr(), 16, 0.0, 0.1).unwrap();
        let values = acc.memory().read_f64(buf.ptr(), 16).unwrap();
        assert!(values.iter().any(|v| *v != 0.0));
        acc.free(buf).unwrap();
    }

    #[test]
    fn uncovering_launch_is_rejected() {
        let acc = HostAccelerator::open(0).unwrap();
        let a = acc.malloc(200 * 8).unwrap();
        let b = acc.malloc(200 * 8).unwrap();
        let short = LaunchConfig::copy(10, 10);
        assert!(matches!(
            acc.lacpy(&short, 100, 2, a.ptr(), 100, b.ptr(), 100),
            Err(Error::Launch(_))
        ));
        acc.free(a).unwrap();
        acc.free(b).unwrap();
    }
}
