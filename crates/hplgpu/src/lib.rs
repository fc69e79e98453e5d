//! Accelerator compute backend for HPL-style distributed LU factorization.
//!
//! The factorization's outer loop calls into this crate for:
//! - device lifecycle ([`DeviceContext`])
//! - device memory and transfers ([`MemoryManager`])
//! - panel working sets ([`PanelManager`])
//! - seeded matrix generation ([`MatrixGenerator`])
//! - BLAS routines under a direct or staged strategy ([`KernelLibrary`],
//!   or [`Kernels`] to take it from the configuration)
//! - sub-matrix copy and transpose ([`LayoutKernels`])
//!
//! Everything is generic over an [`Accelerator`]. The host-emulated
//! accelerator is always available; the CUDA one is behind the `cuda`
//! feature.
//!
//! ```
//! use hplgpu::{BackendConfig, GridInfo, HostContext, Staged};
//!
//! let ctx = HostContext::init(&BackendConfig::default()).unwrap();
//! let a = ctx.memory().allocate(16 * 8).unwrap();
//! ctx.generator()
//!     .generate(&GridInfo::single(), 4, 4, 4, a.ptr(), 4, 42)
//!     .unwrap();
//!
//! let lib = ctx.kernels::<Staged>();
//! let pivot = lib.idamax(4, a.ptr(), 1).unwrap();
//! assert!(pivot < 4);
//! ctx.memory().deallocate(a).unwrap();
//! ```

pub mod config;
pub mod context;
pub mod diag;
pub mod fatal;
pub mod kernels;
pub mod layout;
pub mod matgen;
pub mod memory;
pub mod panel;

pub use config::{BackendConfig, StrategyKind};
pub use context::DeviceContext;
pub use diag::Trace;
pub use fatal::OrAbort;
pub use kernels::{
    Direct, ExecutionStrategy, KernelLibrary, Kernels, Operand, OperandMut, Stage, Staged,
};
pub use layout::LayoutKernels;
pub use matgen::MatrixGenerator;
pub use memory::{MemoryManager, TransferDst, TransferSrc};
pub use panel::{DevicePanel, DistStatus, Panel, PanelDescriptor, PanelDims, PanelManager};

pub use hplgpu_core::{
    Accelerator, DeviceBlas, DeviceBuffer, DevicePtr, DeviceProperties, Diag, Error, GridInfo,
    Result, Side, Trans, TransferKind, Uplo, numroc,
};

pub use hplgpu_backend_host::HostAccelerator;

#[cfg(feature = "cuda")]
pub use hplgpu_backend_cuda::CudaAccelerator;

/// A context on the host-emulated accelerator.
pub type HostContext = DeviceContext<HostAccelerator>;

/// A context on a CUDA device.
#[cfg(feature = "cuda")]
pub type CudaContext = DeviceContext<CudaAccelerator>;
