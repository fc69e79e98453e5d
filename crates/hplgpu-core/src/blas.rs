//! BLAS parameter enums and the device-side numerical library contract.
//!
//! All matrices are column-major. Every routine here takes device pointers
//! only; deciding where operands live is the caller's business.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::memory::DevicePtr;

/// Which side the triangular operand multiplies from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// `op(A) * X = alpha * B`
    Left,
    /// `X * op(A) = alpha * B`
    Right,
}

/// Which triangle of a matrix is referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Uplo {
    Upper,
    Lower,
}

/// Operation applied to a matrix operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trans {
    NoTrans,
    /// Transpose. For real data this is also the conjugate transpose.
    Trans,
}

impl Trans {
    /// Shape of `op(A)` given the stored shape of `A`.
    pub fn apply(self, rows: usize, cols: usize) -> (usize, usize) {
        match self {
            Trans::NoTrans => (rows, cols),
            Trans::Trans => (cols, rows),
        }
    }
}

/// Whether the diagonal of a triangular matrix is implicitly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Diag {
    NonUnit,
    Unit,
}

/// Double-precision BLAS routines executed against device memory.
///
/// One value of this type is the per-process numerical-library handle.
/// Routines may be asynchronous with respect to the host; the owning
/// accelerator's `synchronize` or any transfer orders them.
#[allow(clippy::too_many_arguments)]
pub trait DeviceBlas: Send + Sync {
    /// Index (0-based) of the first element of largest magnitude. Returns 0 for `n == 0`.
    fn idamax(&self, n: usize, x: DevicePtr, incx: usize) -> Result<usize>;

    /// `y <- alpha * x + y`
    fn daxpy(
        &self,
        n: usize,
        alpha: f64,
        x: DevicePtr,
        incx: usize,
        y: DevicePtr,
        incy: usize,
    ) -> Result<()>;

    /// `x <- alpha * x`
    fn dscal(&self, n: usize, alpha: f64, x: DevicePtr, incx: usize) -> Result<()>;

    /// `x <-> y`
    fn dswap(&self, n: usize, x: DevicePtr, incx: usize, y: DevicePtr, incy: usize)
    -> Result<()>;

    /// `y <- x`
    fn dcopy(&self, n: usize, x: DevicePtr, incx: usize, y: DevicePtr, incy: usize)
    -> Result<()>;

    /// `A <- alpha * x * y^T + A` over an `m x n` matrix.
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
    ) -> Result<()>;

    /// `y <- alpha * op(A) * x + beta * y` with `A` stored `m x n`.
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
    ) -> Result<()>;

    /// Solve `op(A) * x = b` in place on `x`, `A` triangular `n x n`.
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
    ) -> Result<()>;

    /// `C <- alpha * op(A) * op(B) + beta * C`, `C` is `m x n`, inner dimension `k`.
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
    ) -> Result<()>;

    /// Solve `op(A) * X = alpha * B` (left) or `X * op(A) = alpha * B` (right) in place on `B`.
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
    ) -> Result<()>;
}
