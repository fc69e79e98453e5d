//! Error types shared by every accelerator and by the compute backend.

use thiserror::Error;

use crate::memory::TransferKind;

/// Errors raised by accelerators and backend operations.
///
/// None of these are recoverable inside the backend: a failed device call
/// leaves the factorization without a defined state.
#[derive(Debug, Error)]
pub enum Error {
    /// Device enumeration found nothing to run on.
    #[error("No accelerator device available")]
    NoDevice,

    /// The requested ordinal is outside the enumerated range.
    #[error("Device {ordinal} requested but only {count} device(s) present")]
    InvalidDevice { ordinal: usize, count: usize },

    /// A live handle already exists for this device in this process.
    #[error("{platform} device {ordinal} already has a live handle in this process")]
    AlreadyInitialized {
        platform: &'static str,
        ordinal: usize,
    },

    /// Context, stream or library handle creation failed.
    #[error("Device initialization failed: {0}")]
    DeviceInit(String),

    /// Device memory allocation failed.
    #[error("Allocation of {bytes} bytes failed: {reason}")]
    Allocation { bytes: usize, reason: String },

    /// A pointer does not belong to any live allocation.
    #[error("Invalid device pointer 0x{0:x}")]
    InvalidPointer(u64),

    /// An access ran past the end of its allocation.
    #[error("Access of {len} bytes at 0x{addr:x} exceeds allocation")]
    OutOfBounds { addr: u64, len: usize },

    /// A host/device copy failed.
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// The declared transfer direction disagrees with the endpoints.
    #[error("Transfer kind {kind} does not match endpoints {endpoints}")]
    TransferMismatch {
        kind: TransferKind,
        endpoints: TransferKind,
    },

    /// The numerical library reported a failure.
    #[error("BLAS {routine} failed: {status}")]
    Blas {
        routine: &'static str,
        status: String,
    },

    /// The random number library reported a failure.
    #[error("RNG failed: {0}")]
    Rng(String),

    /// A device kernel could not be launched.
    #[error("Kernel launch failed: {0}")]
    Launch(String),

    /// The numerical-library handle has already been destroyed.
    #[error("Device context has been released")]
    Released,

    /// A host operand was handed to an operation that requires device residency.
    #[error("{op}: operand '{operand}' is host resident but the direct strategy requires device memory")]
    HostOperand {
        op: &'static str,
        operand: &'static str,
    },

    /// A host operand is shorter than the region the dimensions describe.
    #[error("{op}: operand '{operand}' needs {expected} elements, got {actual}")]
    DimensionMismatch {
        op: &'static str,
        operand: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A dimension, stride or leading dimension is not admissible.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, Error>;
