//! The emulated numerical-library handle.
//!
//! Each routine pulls the spans it references out of device memory, runs the
//! reference kernel and writes back only the elements the routine owns.

use hplgpu_core::{
    DeviceBlas, DevicePtr, Diag, Result, Side, Trans, Uplo, matrix_span, vector_span,
};
use std::sync::Arc;

use crate::memory::DeviceMemory;
use crate::reference;

/// BLAS handle bound to one emulated device.
pub struct HostBlas {
    memory: Arc<DeviceMemory>,
}

impl HostBlas {
    pub(crate) fn new(memory: Arc<DeviceMemory>) -> Self {
        Self { memory }
    }

    fn vector(&self, ptr: DevicePtr, n: usize, inc: usize) -> Result<Vec<f64>> {
        self.memory.read_f64(ptr, vector_span(n, inc))
    }

    fn matrix(&self, ptr: DevicePtr, rows: usize, cols: usize, ld: usize) -> Result<Vec<f64>> {
        self.memory.read_f64(ptr, matrix_span(rows, cols, ld))
    }

    /// Write back the `n` strided elements of `values`, leaving the gaps.
    fn store_vector(&self, ptr: DevicePtr, values: &[f64], n: usize, inc: usize) -> Result<()> {
        self.memory.scatter_f64(ptr, values, (0..n).map(|i| i * inc))
    }

    /// Write back the `rows x cols` block of `values`, leaving padding rows.
    fn store_matrix(
        &self,
        ptr: DevicePtr,
        values: &[f64],
        rows: usize,
        cols: usize,
        ld: usize,
    ) -> Result<()> {
        let cells = (0..cols).flat_map(move |j| (j * ld)..(j * ld + rows));
        self.memory.scatter_f64(ptr, values, cells)
    }
}

impl DeviceBlas for HostBlas {
    fn idamax(&self, n: usize, x: DevicePtr, incx: usize) -> Result<usize> {
        let xs = self.vector(x, n, incx)?;
        Ok(reference::idamax(n, &xs, incx))
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
        let xs = self.vector(x, n, incx)?;
        let mut ys = self.vector(y, n, incy)?;
        reference::daxpy(n, alpha, &xs, incx, &mut ys, incy);
        self.store_vector(y, &ys, n, incy)
    }

    fn dscal(&self, n: usize, alpha: f64, x: DevicePtr, incx: usize) -> Result<()> {
        let mut xs = self.vector(x, n, incx)?;
        reference::dscal(n, alpha, &mut xs, incx);
        self.store_vector(x, &xs, n, incx)
    }

    fn dswap(
        &self,
        n: usize,
        x: DevicePtr,
        incx: usize,
        y: DevicePtr,
        incy: usize,
    ) -> Result<()> {
        let mut xs = self.vector(x, n, incx)?;
        let mut ys = self.vector(y, n, incy)?;
        reference::dswap(n, &mut xs, incx, &mut ys, incy);
        self.store_vector(x, &xs, n, incx)?;
        self.store_vector(y, &ys, n, incy)
    }

    fn dcopy(
        &self,
        n: usize,
        x: DevicePtr,
        incx: usize,
        y: DevicePtr,
        incy: usize,
    ) -> Result<()> {
        let xs = self.vector(x, n, incx)?;
        let mut ys = self.vector(y, n, incy)?;
        reference::dcopy(n, &xs, incx, &mut ys, incy);
        self.store_vector(y, &ys, n, incy)
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
        let xs = self.vector(x, m, incx)?;
        let ys = self.vector(y, n, incy)?;
        let mut am = self.matrix(a, m, n, lda)?;
        reference::dger(m, n, alpha, &xs, incx, &ys, incy, &mut am, lda);
        self.store_matrix(a, &am, m, n, lda)
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
        let (leny, lenx) = trans.apply(m, n);
        let am = self.matrix(a, m, n, lda)?;
        let xs = self.vector(x, lenx, incx)?;
        let mut ys = self.vector(y, leny, incy)?;
        reference::dgemv(trans, m, n, alpha, &am, lda, &xs, incx, beta, &mut ys, incy);
        self.store_vector(y, &ys, leny, incy)
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
        let am = self.matrix(a, n, n, lda)?;
        let mut xs = self.vector(x, n, incx)?;
        reference::dtrsv(uplo, trans, diag, n, &am, lda, &mut xs, incx);
        self.store_vector(x, &xs, n, incx)
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
        let (ar, ac) = transa.apply(m, k);
        let (br, bc) = transb.apply(k, n);
        let am = self.matrix(a, ar, ac, lda)?;
        let bm = self.matrix(b, br, bc, ldb)?;
        let mut cm = self.matrix(c, m, n, ldc)?;
        reference::dgemm(
            transa, transb, m, n, k, alpha, &am, lda, &bm, ldb, beta, &mut cm, ldc,
        );
        self.store_matrix(c, &cm, m, n, ldc)
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
        let ka = match side {
            Side::Left => m,
            Side::Right => n,
        };
        let am = self.matrix(a, ka, ka, lda)?;
        let mut bm = self.matrix(b, m, n, ldb)?;
        reference::dtrsm(side, uplo, trans, diag, m, n, alpha, &am, lda, &mut bm, ldb);
        self.store_matrix(b, &bm, m, n, ldb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 4x3 column-major matrix with `A[i, j] = 10 i + j`.
    fn rows_matrix(memory: &DeviceMemory) -> DevicePtr {
        let mut values = vec![0.0; 12];
        for j in 0..3 {
            for i in 0..4 {
                values[i + j * 4] = (10 * i + j) as f64;
            }
        }
        let buf = memory.allocate(12 * 8).unwrap();
        memory.write_f64(buf.ptr(), &values).unwrap();
        buf.ptr()
    }

    fn row(memory: &DeviceMemory, a: DevicePtr, i: usize) -> Vec<f64> {
        let all = memory.read_f64(a, 12).unwrap();
        (0..3).map(|j| all[i + j * 4]).collect()
    }

    #[test]
    fn swapping_rows_of_one_matrix() {
        let memory = Arc::new(DeviceMemory::new(1 << 20));
        let blas = HostBlas::new(Arc::clone(&memory));
        let a = rows_matrix(&memory);

        blas.dswap(3, a, 4, a.add::<f64>(1), 4).unwrap();
        assert_eq!(row(&memory, a, 0), vec![10.0, 11.0, 12.0]);
        assert_eq!(row(&memory, a, 1), vec![0.0, 1.0, 2.0]);
        assert_eq!(row(&memory, a, 2), vec![20.0, 21.0, 22.0]);

        blas.dswap(3, a.add::<f64>(3), 4, a, 4).unwrap();
        assert_eq!(row(&memory, a, 0), vec![30.0, 31.0, 32.0]);
        assert_eq!(row(&memory, a, 3), vec![10.0, 11.0, 12.0]);
    }

    #[test]
    fn row_updates_keep_neighbouring_rows() {
        let memory = Arc::new(DeviceMemory::new(1 << 20));
        let blas = HostBlas::new(Arc::clone(&memory));
        let a = rows_matrix(&memory);

        blas.dscal(3, 2.0, a.add::<f64>(2), 4).unwrap();
        blas.daxpy(3, 1.0, a.add::<f64>(2), 4, a.add::<f64>(1), 4).unwrap();
        blas.dcopy(3, a, 4, a.add::<f64>(3), 4).unwrap();
        assert_eq!(row(&memory, a, 0), vec![0.0, 1.0, 2.0]);
        assert_eq!(row(&memory, a, 1), vec![50.0, 53.0, 56.0]);
        assert_eq!(row(&memory, a, 2), vec![40.0, 42.0, 44.0]);
        assert_eq!(row(&memory, a, 3), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn submatrix_update_leaves_padding_rows() {
        let memory = Arc::new(DeviceMemory::new(1 << 20));
        let blas = HostBlas::new(Arc::clone(&memory));
        let a = rows_matrix(&memory);
        let ones = memory.allocate(3 * 8).unwrap();
        memory.write_f64(ones.ptr(), &[1.0; 3]).unwrap();

        // Rank-one update of the leading 2x3 block; rows 2 and 3 are padding.
        blas.dger(2, 3, 1.0, ones.ptr(), 1, ones.ptr(), 1, a, 4).unwrap();
        assert_eq!(row(&memory, a, 0), vec![1.0, 2.0, 3.0]);
        assert_eq!(row(&memory, a, 1), vec![11.0, 12.0, 13.0]);
        assert_eq!(row(&memory, a, 2), vec![20.0, 21.0, 22.0]);
    }
}
