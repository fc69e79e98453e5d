//! Reference double-precision BLAS over column-major host slices.
//!
//! Slices start at the first referenced element and are at least as long as
//! the span the dimensions describe. Strides are positive.

use hplgpu_core::{Diag, Side, Trans, Uplo};
use rayon::prelude::*;

/// Columns of C per rayon task in `dgemm`.
const GEMM_COLUMN_CHUNK: usize = 8;

pub fn idamax(n: usize, x: &[f64], incx: usize) -> usize {
    let mut best = 0;
    let mut best_abs = f64::NEG_INFINITY;
    for i in 0..n {
        let v = x[i * incx].abs();
        if v > best_abs {
            best = i;
            best_abs = v;
        }
    }
    best
}

pub fn daxpy(n: usize, alpha: f64, x: &[f64], incx: usize, y: &mut [f64], incy: usize) {
    if alpha == 0.0 {
        return;
    }
    for i in 0..n {
        y[i * incy] += alpha * x[i * incx];
    }
}

pub fn dscal(n: usize, alpha: f64, x: &mut [f64], incx: usize) {
    for i in 0..n {
        x[i * incx] *= alpha;
    }
}

pub fn dswap(n: usize, x: &mut [f64], incx: usize, y: &mut [f64], incy: usize) {
    for i in 0..n {
        std::mem::swap(&mut x[i * incx], &mut y[i * incy]);
    }
}

pub fn dcopy(n: usize, x: &[f64], incx: usize, y: &mut [f64], incy: usize) {
    for i in 0..n {
        y[i * incy] = x[i * incx];
    }
}

#[allow(clippy::too_many_arguments)]
pub fn dger(
    m: usize,
    n: usize,
    alpha: f64,
    x: &[f64],
    incx: usize,
    y: &[f64],
    incy: usize,
    a: &mut [f64],
    lda: usize,
) {
    if alpha == 0.0 {
        return;
    }
    for j in 0..n {
        let t = alpha * y[j * incy];
        if t == 0.0 {
            continue;
        }
        let col = &mut a[j * lda..j * lda + m];
        for (i, aij) in col.iter_mut().enumerate() {
            *aij += x[i * incx] * t;
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn dgemv(
    trans: Trans,
    m: usize,
    n: usize,
    alpha: f64,
    a: &[f64],
    lda: usize,
    x: &[f64],
    incx: usize,
    beta: f64,
    y: &mut [f64],
    incy: usize,
) {
    let (leny, lenx) = trans.apply(m, n);

    for i in 0..leny {
        y[i * incy] = if beta == 0.0 { 0.0 } else { beta * y[i * incy] };
    }
    if alpha == 0.0 {
        return;
    }

    match trans {
        Trans::NoTrans => {
            for j in 0..lenx {
                let t = alpha * x[j * incx];
                for i in 0..m {
                    y[i * incy] += t * a[i + j * lda];
                }
            }
        }
        Trans::Trans => {
            for j in 0..leny {
                let col = &a[j * lda..j * lda + m];
                let dot: f64 = col.iter().enumerate().map(|(i, aij)| aij * x[i * incx]).sum();
                y[j * incy] += alpha * dot;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn dtrsv(
    uplo: Uplo,
    trans: Trans,
    diag: Diag,
    n: usize,
    a: &[f64],
    lda: usize,
    x: &mut [f64],
    incx: usize,
) {
    let nonunit = diag == Diag::NonUnit;
    match (trans, uplo) {
        (Trans::NoTrans, Uplo::Upper) => {
            for j in (0..n).rev() {
                if x[j * incx] != 0.0 {
                    if nonunit {
                        x[j * incx] /= a[j + j * lda];
                    }
                    let t = x[j * incx];
                    for i in 0..j {
                        x[i * incx] -= t * a[i + j * lda];
                    }
                }
            }
        }
        (Trans::NoTrans, Uplo::Lower) => {
            for j in 0..n {
                if x[j * incx] != 0.0 {
                    if nonunit {
                        x[j * incx] /= a[j + j * lda];
                    }
                    let t = x[j * incx];
                    for i in j + 1..n {
                        x[i * incx] -= t * a[i + j * lda];
                    }
                }
            }
        }
        (Trans::Trans, Uplo::Upper) => {
            for j in 0..n {
                let mut t = x[j * incx];
                for i in 0..j {
                    t -= a[i + j * lda] * x[i * incx];
                }
                if nonunit {
                    t /= a[j + j * lda];
                }
                x[j * incx] = t;
            }
        }
        (Trans::Trans, Uplo::Lower) => {
            for j in (0..n).rev() {
                let mut t = x[j * incx];
                for i in j + 1..n {
                    t -= a[i + j * lda] * x[i * incx];
                }
                if nonunit {
                    t /= a[j + j * lda];
                }
                x[j * incx] = t;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn dgemm(
    transa: Trans,
    transb: Trans,
    m: usize,
    n: usize,
    k: usize,
    alpha: f64,
    a: &[f64],
    lda: usize,
    b: &[f64],
    ldb: usize,
    beta: f64,
    c: &mut [f64],
    ldc: usize,
) {
    if m == 0 || n == 0 {
        return;
    }

    let a_at = |i: usize, l: usize| match transa {
        Trans::NoTrans => a[i + l * lda],
        Trans::Trans => a[l + i * lda],
    };
    let b_at = |l: usize, j: usize| match transb {
        Trans::NoTrans => b[l + j * ldb],
        Trans::Trans => b[j + l * ldb],
    };

    c.par_chunks_mut(ldc * GEMM_COLUMN_CHUNK)
        .enumerate()
        .for_each(|(chunk, cols)| {
            let first = chunk * GEMM_COLUMN_CHUNK;
            for local in 0..GEMM_COLUMN_CHUNK {
                let j = first + local;
                if j >= n {
                    break;
                }
                let col = &mut cols[local * ldc..local * ldc + m];

                if beta == 0.0 {
                    col.fill(0.0);
                } else if beta != 1.0 {
                    col.iter_mut().for_each(|v| *v *= beta);
                }
                if alpha == 0.0 {
                    continue;
                }

                for l in 0..k {
                    let t = alpha * b_at(l, j);
                    if t == 0.0 {
                        continue;
                    }
                    for (i, cij) in col.iter_mut().enumerate() {
                        *cij += t * a_at(i, l);
                    }
                }
            }
        });
}

#[allow(clippy::too_many_arguments)]
pub fn dtrsm(
    side: Side,
    uplo: Uplo,
    trans: Trans,
    diag: Diag,
    m: usize,
    n: usize,
    alpha: f64,
    a: &[f64],
    lda: usize,
    b: &mut [f64],
    ldb: usize,
) {
    if m == 0 || n == 0 {
        return;
    }

    match side {
        // Columns of B are independent right-hand sides of op(A) x = alpha b.
        Side::Left => {
            b.par_chunks_mut(ldb).take(n).for_each(|col| {
                let col = &mut col[..m];
                if alpha != 1.0 {
                    col.iter_mut().for_each(|v| *v *= alpha);
                }
                dtrsv(uplo, trans, diag, m, a, lda, col, 1);
            });
        }
        // Row i of X satisfies op(A)^T x_i^T = alpha b_i^T.
        Side::Right => {
            let flipped = match trans {
                Trans::NoTrans => Trans::Trans,
                Trans::Trans => Trans::NoTrans,
            };
            let mut row = vec![0.0; n];
            for i in 0..m {
                for (j, r) in row.iter_mut().enumerate() {
                    *r = alpha * b[i + j * ldb];
                }
                dtrsv(uplo, flipped, diag, n, a, lda, &mut row, 1);
                for (j, r) in row.iter().enumerate() {
                    b[i + j * ldb] = *r;
                }
            }
        }
    }
}
