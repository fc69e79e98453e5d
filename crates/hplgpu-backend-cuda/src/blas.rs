//! cuBLAS-backed numerical routines.
//!
//! All calls are queued on the accelerator's stream. Scalars are passed by
//! host pointer, the cuBLAS default pointer mode.

use cudarc::cublas::CudaBlas;
use cudarc::cublas::sys::{
    self, cublasDiagType_t, cublasFillMode_t, cublasOperation_t, cublasSideMode_t,
};
use hplgpu_core::{DeviceBlas, DevicePtr, Diag, Error, Result, Side, Trans, Uplo};

use crate::error::{check_blas, to_int};

fn op(trans: Trans) -> cublasOperation_t {
    match trans {
        Trans::NoTrans => cublasOperation_t::CUBLAS_OP_N,
        Trans::Trans => cublasOperation_t::CUBLAS_OP_T,
    }
}

fn fill(uplo: Uplo) -> cublasFillMode_t {
    match uplo {
        Uplo::Upper => cublasFillMode_t::CUBLAS_FILL_MODE_UPPER,
        Uplo::Lower => cublasFillMode_t::CUBLAS_FILL_MODE_LOWER,
    }
}

fn diag_type(diag: Diag) -> cublasDiagType_t {
    match diag {
        Diag::NonUnit => cublasDiagType_t::CUBLAS_DIAG_NON_UNIT,
        Diag::Unit => cublasDiagType_t::CUBLAS_DIAG_UNIT,
    }
}

/// Convert cuBLAS's 1-based idamax position. Zero only comes back for
/// arguments cuBLAS rejected.
fn zero_based(index: i32) -> Result<usize> {
    if index < 1 {
        return Err(Error::Blas {
            routine: "idamax",
            status: format!("invalid position {}", index),
        });
    }
    Ok((index - 1) as usize)
}

fn side_mode(side: Side) -> cublasSideMode_t {
    match side {
        Side::Left => cublasSideMode_t::CUBLAS_SIDE_LEFT,
        Side::Right => cublasSideMode_t::CUBLAS_SIDE_RIGHT,
    }
}

#[inline]
fn cptr(p: DevicePtr) -> *const f64 {
    p.addr() as *const f64
}

#[inline]
fn mptr(p: DevicePtr) -> *mut f64 {
    p.addr() as *mut f64
}

/// A cuBLAS handle bound to the accelerator's stream.
pub struct CudaBlasHandle {
    blas: CudaBlas,
}

impl CudaBlasHandle {
    pub(crate) fn new(blas: CudaBlas) -> Self {
        Self { blas }
    }

    fn handle(&self) -> sys::cublasHandle_t {
        *self.blas.handle()
    }

    /// `C = alpha * op(A) + beta * op(B)`, used for the layout copies.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn dgeam(
        &self,
        transa: Trans,
        transb: Trans,
        m: usize,
        n: usize,
        alpha: f64,
        a: DevicePtr,
        lda: usize,
        beta: f64,
        b: DevicePtr,
        ldb: usize,
        c: DevicePtr,
        ldc: usize,
    ) -> Result<()> {
        if m == 0 || n == 0 {
            return Ok(());
        }
        let status = unsafe {
            sys::cublasDgeam(
                self.handle(),
                op(transa),
                op(transb),
                to_int(m, "m")?,
                to_int(n, "n")?,
                &alpha,
                cptr(a),
                to_int(lda, "lda")?,
                &beta,
                cptr(b),
                to_int(ldb, "ldb")?,
                mptr(c),
                to_int(ldc, "ldc")?,
            )
        };
        check_blas(status, "dgeam")
    }
}

impl DeviceBlas for CudaBlasHandle {
    fn idamax(&self, n: usize, x: DevicePtr, incx: usize) -> Result<usize> {
        if n == 0 {
            return Ok(0);
        }
        let mut index: i32 = 0;
        let status = unsafe {
            sys::cublasIdamax_v2(
                self.handle(),
                to_int(n, "n")?,
                cptr(x),
                to_int(incx, "incx")?,
                &mut index,
            )
        };
        check_blas(status, "idamax")?;
        zero_based(index)
    }

    fn daxpy(
        &self,
        n: usize,
        alpha: f64,
        x: DevicePtr,
        incx: usize,
        y: DevicePtr,
        incy: usize,
    ) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        let status = unsafe {
            sys::cublasDaxpy_v2(
                self.handle(),
                to_int(n, "n")?,
                &alpha,
                cptr(x),
                to_int(incx, "incx")?,
                mptr(y),
                to_int(incy, "incy")?,
            )
        };
        check_blas(status, "daxpy")
    }

    fn dscal(&self, n: usize, alpha: f64, x: DevicePtr, incx: usize) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        let status = unsafe {
            sys::cublasDscal_v2(
                self.handle(),
                to_int(n, "n")?,
                &alpha,
                mptr(x),
                to_int(incx, "incx")?,
            )
        };
        check_blas(status, "dscal")
    }

    fn dswap(
        &self,
        n: usize,
        x: DevicePtr,
        incx: usize,
        y: DevicePtr,
        incy: usize,
    ) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        let status = unsafe {
            sys::cublasDswap_v2(
                self.handle(),
                to_int(n, "n")?,
                mptr(x),
                to_int(incx, "incx")?,
                mptr(y),
                to_int(incy, "incy")?,
            )
        };
        check_blas(status, "dswap")
    }

    fn dcopy(
        &self,
        n: usize,
        x: DevicePtr,
        incx: usize,
        y: DevicePtr,
        incy: usize,
    ) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        let status = unsafe {
            sys::cublasDcopy_v2(
                self.handle(),
                to_int(n, "n")?,
                cptr(x),
                to_int(incx, "incx")?,
                mptr(y),
                to_int(incy, "incy")?,
            )
        };
        check_blas(status, "dcopy")
    }

    fn dger(
        &self,
        m: usize,
        n: usize,
        alpha: f64,
        x: DevicePtr,
        incx: usize,
        y: DevicePtr,
        incy: usize,
        a: DevicePtr,
        lda: usize,
    ) -> Result<()> {
        if m == 0 || n == 0 {
            return Ok(());
        }
        let status = unsafe {
            sys::cublasDger_v2(
                self.handle(),
                to_int(m, "m")?,
                to_int(n, "n")?,
                &alpha,
                cptr(x),
                to_int(incx, "incx")?,
                cptr(y),
                to_int(incy, "incy")?,
                mptr(a),
                to_int(lda, "lda")?,
            )
        };
        check_blas(status, "dger")
    }

    fn dgemv(
        &self,
        trans: Trans,
        m: usize,
        n: usize,
        alpha: f64,
        a: DevicePtr,
        lda: usize,
        x: DevicePtr,
        incx: usize,
        beta: f64,
        y: DevicePtr,
        incy: usize,
    ) -> Result<()> {
        let status = unsafe {
            sys::cublasDgemv_v2(
                self.handle(),
                op(trans),
                to_int(m, "m")?,
                to_int(n, "n")?,
                &alpha,
                cptr(a),
                to_int(lda, "lda")?,
                cptr(x),
                to_int(incx, "incx")?,
                &beta,
                mptr(y),
                to_int(incy, "incy")?,
            )
        };
        check_blas(status, "dgemv")
    }

    fn dtrsv(
        &self,
        uplo: Uplo,
        trans: Trans,
        diag: Diag,
        n: usize,
        a: DevicePtr,
        lda: usize,
        x: DevicePtr,
        incx: usize,
    ) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        let status = unsafe {
            sys::cublasDtrsv_v2(
                self.handle(),
                fill(uplo),
                op(trans),
                diag_type(diag),
                to_int(n, "n")?,
                cptr(a),
                to_int(lda, "lda")?,
                mptr(x),
                to_int(incx, "incx")?,
            )
        };
        check_blas(status, "dtrsv")
    }

    fn dgemm(
        &self,
        transa: Trans,
        transb: Trans,
        m: usize,
        n: usize,
        k: usize,
        alpha: f64,
        a: DevicePtr,
        lda: usize,
        b: DevicePtr,
        ldb: usize,
        beta: f64,
        c: DevicePtr,
        ldc: usize,
    ) -> Result<()> {
        let status = unsafe {
            sys::cublasDgemm_v2(
                self.handle(),
                op(transa),
                op(transb),
                to_int(m, "m")?,
                to_int(n, "n")?,
                to_int(k, "k")?,
                &alpha,
                cptr(a),
                to_int(lda, "lda")?,
                cptr(b),
                to_int(ldb, "ldb")?,
                &beta,
                mptr(c),
                to_int(ldc, "ldc")?,
            )
        };
        check_blas(status, "dgemm")
    }

    fn dtrsm(
        &self,
        side: Side,
        uplo: Uplo,
        trans: Trans,
        diag: Diag,
        m: usize,
        n: usize,
        alpha: f64,
        a: DevicePtr,
        lda: usize,
        b: DevicePtr,
        ldb: usize,
    ) -> Result<()> {
        if m == 0 || n == 0 {
            return Ok(());
        }
        let status = unsafe {
            sys::cublasDtrsm_v2(
                self.handle(),
                side_mode(side),
                fill(uplo),
                op(trans),
                diag_type(diag),
                to_int(m, "m")?,
                to_int(n, "n")?,
                &alpha,
                cptr(a),
                to_int(lda, "lda")?,
                mptr(b),
                to_int(ldb, "ldb")?,
            )
        };
        check_blas(status, "dtrsm")
    }
}
