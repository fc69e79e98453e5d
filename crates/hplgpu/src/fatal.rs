//! Abort-on-error semantics for benchmark drivers.
//!
//! The backend returns every device failure as an [`Error`]. A driver that
//! wants the classic behaviour, where any device failure ends the process,
//! calls [`OrAbort::or_abort`] on the result.

use hplgpu_core::{Error, Result};

pub trait OrAbort<T> {
    /// Unwrap the value, or log the error and abort the process.
    fn or_abort(self, what: &str) -> T;
}

impl<T> OrAbort<T> for Result<T> {
    fn or_abort(self, what: &str) -> T {
        match self {
            Ok(value) => value,
            Err(e) => abort(what, &e),
        }
    }
}

#[cold]
fn abort(what: &str, error: &Error) -> ! {
    log::error!(target: crate::diag::TARGET, "{}: {}", what, error);
    eprintln!("{}: {}", what, error);
    std::process::abort()
}
