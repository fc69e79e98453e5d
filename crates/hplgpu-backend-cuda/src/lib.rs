//! CUDA accelerator for hplgpu.
//!
//! Device memory is allocated stream-ordered, the numerical routines go to
//! cuBLAS, normal deviates come from cuRAND's Philox4x32-10 generator and the
//! layout copies use `cublasDgeam`.

pub mod accelerator;
pub mod blas;
mod error;
pub mod rng;

pub use accelerator::CudaAccelerator;
pub use blas::CudaBlasHandle;
pub use rng::CudaGenerator;
