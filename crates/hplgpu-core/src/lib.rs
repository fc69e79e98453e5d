//! Shared vocabulary for the hplgpu compute backend.
//!
//! Accelerators implement [`Accelerator`] and [`DeviceBlas`]; the `hplgpu`
//! crate builds the factorization-facing contract on top of them.

pub mod blas;
pub mod device;
pub mod error;
pub mod grid;
pub mod launch;
pub mod memory;

pub use blas::{DeviceBlas, Diag, Side, Trans, Uplo};
pub use device::{Accelerator, DeviceProperties, NormalGenerator};
pub use error::{Error, Result};
pub use grid::{GridInfo, numroc};
pub use launch::{BLOCK_ROWS, COPY_BLOCK_X, Dim3, LaunchConfig, TILE_DIM};
pub use memory::{DeviceBuffer, DevicePtr, TransferKind, matrix_span, vector_span};
