//! The accelerator contract: device selection, memory, transfers, RNG and
//! the tiled layout kernels.

use crate::blas::DeviceBlas;
use crate::error::Result;
use crate::launch::LaunchConfig;
use crate::memory::{DeviceBuffer, DevicePtr};

/// Capabilities reported by a device, logged once at initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceProperties {
    pub name: String,
    pub total_global_mem: u64,
    pub shared_mem_per_block: u64,
    pub regs_per_block: u32,
    pub warp_size: u32,
    pub max_threads_per_block: u32,
    pub max_threads_dim: [u32; 3],
    pub max_grid_size: [u32; 3],
    pub total_const_mem: u64,
    pub major: u32,
    pub minor: u32,
    /// Memory clock rate in kHz.
    pub memory_clock_rate: u32,
    pub multiprocessor_count: u32,
    pub pci_bus_id: u32,
}

/// A seeded stream of normally distributed doubles written to device memory.
///
/// Dropping the generator destroys it.
pub trait NormalGenerator {
    /// Fill `count` doubles starting at `out`.
    fn generate_normal(&mut self, out: DevicePtr, count: usize, mean: f64, stddev: f64)
    -> Result<()>;
}

/// One accelerator device together with its runtime.
///
/// Implementations own the vendor runtime state for a single device ordinal.
/// Transfers are synchronous: when a copy returns, the bytes have landed and
/// all previously queued work on the device has completed.
#[allow(clippy::too_many_arguments)]
pub trait Accelerator: Send + Sync + Sized {
    /// Numerical-library handle type.
    type Blas: DeviceBlas;
    /// Random number generator type.
    type Generator: NormalGenerator;

    /// Short backend name used in diagnostics.
    const PLATFORM: &'static str;

    /// Number of devices this runtime can see.
    fn device_count() -> Result<usize>;

    /// Select device `ordinal` and bring up its runtime.
    fn open(ordinal: usize) -> Result<Self>;

    /// Ordinal of the selected device.
    fn ordinal(&self) -> usize;

    /// Query device capabilities.
    fn properties(&self) -> Result<DeviceProperties>;

    /// Create the numerical-library handle.
    fn create_blas(&self) -> Result<Self::Blas>;

    /// Destroy a numerical-library handle.
    fn destroy_blas(&self, blas: Self::Blas) -> Result<()>;

    /// Allocate `bytes` of device memory. A zero-byte request yields a null buffer.
    fn malloc(&self, bytes: usize) -> Result<DeviceBuffer>;

    /// Release an allocation. Releasing a null buffer does nothing.
    fn free(&self, buffer: DeviceBuffer) -> Result<()>;

    fn copy_host_to_device(&self, dst: DevicePtr, src: &[u8]) -> Result<()>;

    fn copy_device_to_host(&self, dst: &mut [u8], src: DevicePtr) -> Result<()>;

    fn copy_device_to_device(&self, dst: DevicePtr, src: DevicePtr, bytes: usize) -> Result<()>;

    /// Block until all queued device work has finished.
    fn synchronize(&self) -> Result<()>;

    /// Create a pseudo-random generator seeded with `seed`.
    fn create_generator(&self, seed: u64) -> Result<Self::Generator>;

    /// `B[i,j] = A[i,j]` over an `m x n` region.
    fn lacpy(
        &self,
        launch: &LaunchConfig,
        m: usize,
        n: usize,
        a: DevicePtr,
        lda: usize,
        b: DevicePtr,
        ldb: usize,
    ) -> Result<()>;

    /// `B[j,i] = A[i,j]` over an `m x n` source region.
    fn latcpy(
        &self,
        launch: &LaunchConfig,
        m: usize,
        n: usize,
        a: DevicePtr,
        lda: usize,
        b: DevicePtr,
        ldb: usize,
    ) -> Result<()>;
}
