//! Host-emulated accelerator for hplgpu.
//!
//! Provides a device with its own address space, a reference BLAS, a
//! Philox4x32-10 normal generator and tiled copy kernels, so the whole
//! compute-backend contract can run and be tested without a GPU.

pub mod accelerator;
pub mod blas;
pub mod memory;
pub mod reference;
pub mod rng;
pub mod tiles;

pub use accelerator::{DEFAULT_CAPACITY, HOST_DEVICE_COUNT, HostAccelerator};
pub use blas::HostBlas;
pub use memory::DeviceMemory;
pub use rng::HostGenerator;
