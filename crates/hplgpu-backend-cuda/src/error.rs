//! Status-code translation for the CUDA driver, cuBLAS and cuRAND.

use cudarc::cublas::sys::cublasStatus_t;
use cudarc::curand::sys::curandStatus_t;
use cudarc::driver::sys::CUresult;
use hplgpu_core::{Error, Result};

/// Log a failed driver call that has no caller to report to.
#[cold]
#[inline(never)]
pub(crate) fn log_driver_error(operation: &str, ptr: u64, result: CUresult) {
    log::error!("{} failed for ptr 0x{:x}: {:?}", operation, ptr, result);
}

pub(crate) fn check_transfer(result: CUresult, operation: &str, bytes: usize) -> Result<()> {
    if result != CUresult::CUDA_SUCCESS {
        return Err(Error::Transfer(format!(
            "{} of {} bytes failed ({:?})",
            operation, bytes, result
        )));
    }
    Ok(())
}

pub(crate) fn check_blas(status: cublasStatus_t, routine: &'static str) -> Result<()> {
    if status != cublasStatus_t::CUBLAS_STATUS_SUCCESS {
        return Err(Error::Blas {
            routine,
            status: format!("{:?}", status),
        });
    }
    Ok(())
}

pub(crate) fn check_rand(status: curandStatus_t, operation: &str) -> Result<()> {
    if status != curandStatus_t::CURAND_STATUS_SUCCESS {
        return Err(Error::Rng(format!("{} failed ({:?})", operation, status)));
    }
    Ok(())
}

/// Convert a dimension to the `int` the vendor libraries take.
pub(crate) fn to_int(value: usize, what: &str) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| Error::InvalidArgument(format!("{} = {} exceeds the 32-bit range", what, value)))
}
