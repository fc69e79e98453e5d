//! Level-1/2/3 kernel library.
//!
//! Each routine has a fixed column-major signature; how operands reach the
//! device is decided by the [`ExecutionStrategy`] the library is built with.
//! [`Direct`] runs the vendor routine on device pointers as given. [`Staged`]
//! accepts host slices, copies them into temporary device buffers, runs the
//! routine and copies written operands back. [`Kernels`] picks one of the two
//! from the context's configuration.

use hplgpu_core::{
    Accelerator, DeviceBlas, DeviceBuffer, DevicePtr, Diag, Error, Result, Side, Trans,
    TransferKind, Uplo, matrix_span, vector_span,
};
use std::marker::PhantomData;

use crate::config::StrategyKind;
use crate::context::DeviceContext;
use crate::diag::Trace;

/// A read-only operand.
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    Host(&'a [f64]),
    Device(DevicePtr),
}

/// An operand the routine writes.
#[derive(Debug)]
pub enum OperandMut<'a> {
    Host(&'a mut [f64]),
    Device(DevicePtr),
}

impl<'a> From<&'a [f64]> for Operand<'a> {
    fn from(values: &'a [f64]) -> Self {
        Operand::Host(values)
    }
}

impl<'a> From<&'a Vec<f64>> for Operand<'a> {
    fn from(values: &'a Vec<f64>) -> Self {
        Operand::Host(values)
    }
}

impl From<DevicePtr> for Operand<'_> {
    fn from(ptr: DevicePtr) -> Self {
        Operand::Device(ptr)
    }
}

impl<'a> From<&'a mut [f64]> for OperandMut<'a> {
    fn from(values: &'a mut [f64]) -> Self {
        OperandMut::Host(values)
    }
}

impl<'a> From<&'a mut Vec<f64>> for OperandMut<'a> {
    fn from(values: &'a mut Vec<f64>) -> Self {
        OperandMut::Host(values)
    }
}

impl From<DevicePtr> for OperandMut<'_> {
    fn from(ptr: DevicePtr) -> Self {
        OperandMut::Device(ptr)
    }
}

/// Temporary device buffers for one staged call.
///
/// Written operands are copied back by [`Stage::finish`]; temporaries are
/// freed on drop, including when the call fails part way.
pub struct Stage<'a, A: Accelerator> {
    accelerator: &'a A,
    trace: Trace,
    temps: Vec<DeviceBuffer>,
    writebacks: Vec<(DevicePtr, &'a mut [f64])>,
}

impl<'a, A: Accelerator> Stage<'a, A> {
    fn new(accelerator: &'a A, trace: Trace) -> Self {
        Self {
            accelerator,
            trace,
            temps: Vec::new(),
            writebacks: Vec::new(),
        }
    }

    /// Copy `values` into a fresh device buffer.
    pub fn stage_in(&mut self, values: &[f64]) -> Result<DevicePtr> {
        let bytes: &[u8] = bytemuck::cast_slice(values);
        let buffer = self.accelerator.malloc(bytes.len())?;
        let ptr = buffer.ptr();
        self.temps.push(buffer);
        self.trace.transfer(TransferKind::HostToDevice.label(), bytes.len());
        self.accelerator.copy_host_to_device(ptr, bytes)?;
        Ok(ptr)
    }

    /// Stage `values` in and copy the device result back on [`Stage::finish`].
    pub fn stage_out(&mut self, values: &'a mut [f64]) -> Result<DevicePtr> {
        let ptr = self.stage_in(values)?;
        self.writebacks.push((ptr, values));
        Ok(ptr)
    }

    /// Copy written operands back to the host.
    pub fn finish(mut self) -> Result<()> {
        for (ptr, values) in self.writebacks.drain(..) {
            let bytes: &mut [u8] = bytemuck::cast_slice_mut(values);
            self.trace.transfer(TransferKind::DeviceToHost.label(), bytes.len());
            self.accelerator.copy_device_to_host(bytes, ptr)?;
        }
        Ok(())
    }
}

impl<A: Accelerator> Drop for Stage<'_, A> {
    fn drop(&mut self) {
        for buffer in self.temps.drain(..) {
            if let Err(e) = self.accelerator.free(buffer) {
                log::warn!("Failed to free staging buffer: {}", e);
            }
        }
    }
}

/// How a kernel call turns operands into device pointers.
pub trait ExecutionStrategy {
    const KIND: StrategyKind;

    /// Resolve a read-only operand spanning `span` elements.
    fn input<'a, A: Accelerator>(
        stage: &mut Stage<'a, A>,
        op: &'static str,
        name: &'static str,
        operand: Operand<'a>,
        span: usize,
    ) -> Result<DevicePtr>;

    /// Resolve a written operand spanning `span` elements.
    fn output<'a, A: Accelerator>(
        stage: &mut Stage<'a, A>,
        op: &'static str,
        name: &'static str,
        operand: OperandMut<'a>,
        span: usize,
    ) -> Result<DevicePtr>;
}

/// Operands must already be device resident.
#[derive(Debug, Clone, Copy, Default)]
pub struct Direct;

/// Host operands round-trip through temporary device buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Staged;

impl ExecutionStrategy for Direct {
    const KIND: StrategyKind = StrategyKind::Direct;

    fn input<'a, A: Accelerator>(
        _stage: &mut Stage<'a, A>,
        op: &'static str,
        name: &'static str,
        operand: Operand<'a>,
        _span: usize,
    ) -> Result<DevicePtr> {
        match operand {
            Operand::Device(ptr) => Ok(ptr),
            Operand::Host(_) => Err(Error::HostOperand { op, operand: name }),
        }
    }

    fn output<'a, A: Accelerator>(
        _stage: &mut Stage<'a, A>,
        op: &'static str,
        name: &'static str,
        operand: OperandMut<'a>,
        _span: usize,
    ) -> Result<DevicePtr> {
        match operand {
            OperandMut::Device(ptr) => Ok(ptr),
            OperandMut::Host(_) => Err(Error::HostOperand { op, operand: name }),
        }
    }
}

impl ExecutionStrategy for Staged {
    const KIND: StrategyKind = StrategyKind::Staged;

    fn input<'a, A: Accelerator>(
        stage: &mut Stage<'a, A>,
        op: &'static str,
        name: &'static str,
        operand: Operand<'a>,
        span: usize,
    ) -> Result<DevicePtr> {
        match operand {
            Operand::Device(ptr) => Ok(ptr),
            Operand::Host(values) => {
                check_span(op, name, span, values.len())?;
                stage.stage_in(&values[..span])
            }
        }
    }

    fn output<'a, A: Accelerator>(
        stage: &mut Stage<'a, A>,
        op: &'static str,
        name: &'static str,
        operand: OperandMut<'a>,
        span: usize,
    ) -> Result<DevicePtr> {
        match operand {
            OperandMut::Device(ptr) => Ok(ptr),
            OperandMut::Host(values) => {
                check_span(op, name, span, values.len())?;
                stage.stage_out(&mut values[..span])
            }
        }
    }
}

fn check_span(
    op: &'static str,
    operand: &'static str,
    expected: usize,
    actual: usize,
) -> Result<()> {
    if actual < expected {
        return Err(Error::DimensionMismatch {
            op,
            operand,
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_inc(op: &str, name: &str, inc: usize) -> Result<()> {
    if inc == 0 {
        return Err(Error::InvalidArgument(format!("{}: {} must be positive", op, name)));
    }
    Ok(())
}

pub(crate) fn check_ld(op: &str, name: &str, ld: usize, rows: usize) -> Result<()> {
    if ld < rows.max(1) {
        return Err(Error::InvalidArgument(format!(
            "{}: {} = {} is smaller than max(1, {})",
            op, name, ld, rows
        )));
    }
    Ok(())
}

/// The BLAS routines the factorization calls, bound to one context.
pub struct KernelLibrary<'ctx, A: Accelerator, S: ExecutionStrategy> {
    ctx: &'ctx DeviceContext<A>,
    _strategy: PhantomData<S>,
}

impl<'ctx, A: Accelerator, S: ExecutionStrategy> KernelLibrary<'ctx, A, S> {
    pub fn new(ctx: &'ctx DeviceContext<A>) -> Self {
        Self {
            ctx,
            _strategy: PhantomData,
        }
    }

    pub fn strategy(&self) -> StrategyKind {
        S::KIND
    }

    fn begin<'a>(
        &'a self,
        tag: &str,
        what: &str,
        dims: String,
    ) -> Result<(&'a A::Blas, Stage<'a, A>)> {
        let trace = self.ctx.trace();
        trace.op(tag, what, &dims);
        let blas = self.ctx.blas()?;
        Ok((blas, Stage::new(self.ctx.accelerator(), trace)))
    }

    /// Index of the first element of largest magnitude (0-based).
    pub fn idamax<'a>(
        &'a self,
        n: usize,
        x: impl Into<Operand<'a>>,
        incx: usize,
    ) -> Result<usize> {
        check_inc("idamax", "incx", incx)?;
        let (blas, mut stage) =
            self.begin("[IDAMAX]", "Index of max magnitude", format!("({})", n))?;
        if n == 0 {
            return Ok(0);
        }
        let x = S::input(&mut stage, "idamax", "x", x.into(), vector_span(n, incx))?;
        blas.idamax(n, x, incx)
    }

    /// `y = alpha * x + y`.
    pub fn daxpy<'a>(
        &'a self,
        n: usize,
        alpha: f64,
        x: impl Into<Operand<'a>>,
        incx: usize,
        y: impl Into<OperandMut<'a>>,
        incy: usize,
    ) -> Result<()> {
        check_inc("daxpy", "incx", incx)?;
        check_inc("daxpy", "incy", incy)?;
        let (blas, mut stage) =
            self.begin("[DAXPY]", "Vector scale and add", format!("({})", n))?;
        let x = S::input(&mut stage, "daxpy", "x", x.into(), vector_span(n, incx))?;
        let y = S::output(&mut stage, "daxpy", "y", y.into(), vector_span(n, incy))?;
        blas.daxpy(n, alpha, x, incx, y, incy)?;
        stage.finish()
    }

    /// `x = alpha * x`.
    pub fn dscal<'a>(
        &'a self,
        n: usize,
        alpha: f64,
        x: impl Into<OperandMut<'a>>,
        incx: usize,
    ) -> Result<()> {
        check_inc("dscal", "incx", incx)?;
        let (blas, mut stage) = self.begin("[DSCAL]", "Vector scale", format!("({})", n))?;
        let x = S::output(&mut stage, "dscal", "x", x.into(), vector_span(n, incx))?;
        blas.dscal(n, alpha, x, incx)?;
        stage.finish()
    }

    /// Exchange `x` and `y`.
    pub fn dswap<'a>(
        &'a self,
        n: usize,
        x: impl Into<OperandMut<'a>>,
        incx: usize,
        y: impl Into<OperandMut<'a>>,
        incy: usize,
    ) -> Result<()> {
        check_inc("dswap", "incx", incx)?;
        check_inc("dswap", "incy", incy)?;
        let (blas, mut stage) = self.begin("[DSWAP]", "Vector swap", format!("({})", n))?;
        let x = S::output(&mut stage, "dswap", "x", x.into(), vector_span(n, incx))?;
        let y = S::output(&mut stage, "dswap", "y", y.into(), vector_span(n, incy))?;
        blas.dswap(n, x, incx, y, incy)?;
        stage.finish()
    }

    /// `A = alpha * x * y^T + A` over an `m x n` view.
    #[allow(clippy::too_many_arguments)]
    pub fn dger<'a>(
        &'a self,
        m: usize,
        n: usize,
        alpha: f64,
        x: impl Into<Operand<'a>>,
        incx: usize,
        y: impl Into<Operand<'a>>,
        incy: usize,
        a: impl Into<OperandMut<'a>>,
        lda: usize,
    ) -> Result<()> {
        check_inc("dger", "incx", incx)?;
        check_inc("dger", "incy", incy)?;
        check_ld("dger", "lda", lda, m)?;
        let (blas, mut stage) =
            self.begin("[DGER]", "Rank-one update", format!("({}, {})", m, n))?;
        let x = S::input(&mut stage, "dger", "x", x.into(), vector_span(m, incx))?;
        let y = S::input(&mut stage, "dger", "y", y.into(), vector_span(n, incy))?;
        let a = S::output(&mut stage, "dger", "a", a.into(), matrix_span(m, n, lda))?;
        blas.dger(m, n, alpha, x, incx, y, incy, a, lda)?;
        stage.finish()
    }

    /// Solve `op(A) X = alpha B` (left) or `X op(A) = alpha B` (right) in place on `B`.
    #[allow(clippy::too_many_arguments)]
    pub fn dtrsm<'a>(
        &'a self,
        side: Side,
        uplo: Uplo,
        trans: Trans,
        diag: Diag,
        m: usize,
        n: usize,
        alpha: f64,
        a: impl Into<Operand<'a>>,
        lda: usize,
        b: impl Into<OperandMut<'a>>,
        ldb: usize,
    ) -> Result<()> {
        let ka = match side {
            Side::Left => m,
            Side::Right => n,
        };
        check_ld("dtrsm", "lda", lda, ka)?;
        check_ld("dtrsm", "ldb", ldb, m)?;
        let (blas, mut stage) =
            self.begin("[DTRSM]", "Triangular solve (matrix)", format!("({}, {})", m, n))?;
        let a = S::input(&mut stage, "dtrsm", "a", a.into(), matrix_span(ka, ka, lda))?;
        let b = S::output(&mut stage, "dtrsm", "b", b.into(), matrix_span(m, n, ldb))?;
        blas.dtrsm(side, uplo, trans, diag, m, n, alpha, a, lda, b, ldb)?;
        stage.finish()
    }

    /// Solve `op(A) x = b` in place on `x`.
    #[allow(clippy::too_many_arguments)]
    pub fn dtrsv<'a>(
        &'a self,
        uplo: Uplo,
        trans: Trans,
        diag: Diag,
        n: usize,
        a: impl Into<Operand<'a>>,
        lda: usize,
        x: impl Into<OperandMut<'a>>,
        incx: usize,
    ) -> Result<()> {
        check_ld("dtrsv", "lda", lda, n)?;
        check_inc("dtrsv", "incx", incx)?;
        let (blas, mut stage) =
            self.begin("[DTRSV]", "Triangular solve (vector)", format!("({})", n))?;
        let a = S::input(&mut stage, "dtrsv", "a", a.into(), matrix_span(n, n, lda))?;
        let x = S::output(&mut stage, "dtrsv", "x", x.into(), vector_span(n, incx))?;
        blas.dtrsv(uplo, trans, diag, n, a, lda, x, incx)?;
        stage.finish()
    }

    /// `C = alpha op(A) op(B) + beta C`. The device is synchronized before returning.
    #[allow(clippy::too_many_arguments)]
    pub fn dgemm<'a>(
        &'a self,
        transa: Trans,
        transb: Trans,
        m: usize,
        n: usize,
        k: usize,
        alpha: f64,
        a: impl Into<Operand<'a>>,
        lda: usize,
        b: impl Into<Operand<'a>>,
        ldb: usize,
        beta: f64,
        c: impl Into<OperandMut<'a>>,
        ldc: usize,
    ) -> Result<()> {
        let (ar, ac) = transa.apply(m, k);
        let (br, bc) = transb.apply(k, n);
        check_ld("dgemm", "lda", lda, ar)?;
        check_ld("dgemm", "ldb", ldb, br)?;
        check_ld("dgemm", "ldc", ldc, m)?;
        let (blas, mut stage) = self.begin(
            "[DGEMM]",
            "General matrix multiply",
            format!("({}, {}, {})", m, n, k),
        )?;
        let a = S::input(&mut stage, "dgemm", "a", a.into(), matrix_span(ar, ac, lda))?;
        let b = S::input(&mut stage, "dgemm", "b", b.into(), matrix_span(br, bc, ldb))?;
        let c = S::output(&mut stage, "dgemm", "c", c.into(), matrix_span(m, n, ldc))?;
        blas.dgemm(transa, transb, m, n, k, alpha, a, lda, b, ldb, beta, c, ldc)?;
        self.ctx.synchronize()?;
        stage.finish()
    }

    /// `y = alpha op(A) x + beta y`.
    #[allow(clippy::too_many_arguments)]
    pub fn dgemv<'a>(
        &'a self,
        trans: Trans,
        m: usize,
        n: usize,
        alpha: f64,
        a: impl Into<Operand<'a>>,
        lda: usize,
        x: impl Into<Operand<'a>>,
        incx: usize,
        beta: f64,
        y: impl Into<OperandMut<'a>>,
        incy: usize,
    ) -> Result<()> {
        check_ld("dgemv", "lda", lda, m)?;
        check_inc("dgemv", "incx", incx)?;
        check_inc("dgemv", "incy", incy)?;
        let (leny, lenx) = trans.apply(m, n);
        let (blas, mut stage) = self.begin(
            "[DGEMV]",
            "General matrix-vector multiply",
            format!("({}, {})", m, n),
        )?;
        let a = S::input(&mut stage, "dgemv", "a", a.into(), matrix_span(m, n, lda))?;
        let x = S::input(&mut stage, "dgemv", "x", x.into(), vector_span(lenx, incx))?;
        let y = S::output(&mut stage, "dgemv", "y", y.into(), vector_span(leny, incy))?;
        blas.dgemv(trans, m, n, alpha, a, lda, x, incx, beta, y, incy)?;
        stage.finish()
    }

    /// `y = x`.
    pub fn dcopy<'a>(
        &'a self,
        n: usize,
        x: impl Into<Operand<'a>>,
        incx: usize,
        y: impl Into<OperandMut<'a>>,
        incy: usize,
    ) -> Result<()> {
        check_inc("dcopy", "incx", incx)?;
        check_inc("dcopy", "incy", incy)?;
        let (blas, mut stage) = self.begin("[DCOPY]", "Vector copy", format!("({})", n))?;
        let x = S::input(&mut stage, "dcopy", "x", x.into(), vector_span(n, incx))?;
        let y = S::output(&mut stage, "dcopy", "y", y.into(), vector_span(n, incy))?;
        blas.dcopy(n, x, incx, y, incy)?;
        stage.finish()
    }
}

/// Forward one call to whichever library the variant holds.
macro_rules! dispatch {
    ($kernels:expr, $op:ident($($arg:expr),* $(,)?)) => {
        match $kernels {
            Kernels::Direct(lib) => lib.$op($($arg),*),
            Kernels::Staged(lib) => lib.$op($($arg),*),
        }
    };
}

/// A kernel library whose strategy comes from the context's
/// [`BackendConfig::strategy`](crate::BackendConfig::strategy) at run time.
pub enum Kernels<'ctx, A: Accelerator> {
    Direct(KernelLibrary<'ctx, A, Direct>),
    Staged(KernelLibrary<'ctx, A, Staged>),
}

impl<'ctx, A: Accelerator> Kernels<'ctx, A> {
    pub fn new(ctx: &'ctx DeviceContext<A>) -> Self {
        match ctx.config().strategy {
            StrategyKind::Direct => Self::Direct(KernelLibrary::new(ctx)),
            StrategyKind::Staged => Self::Staged(KernelLibrary::new(ctx)),
        }
    }

    pub fn strategy(&self) -> StrategyKind {
        dispatch!(self, strategy())
    }

    pub fn idamax<'a>(
        &'a self,
        n: usize,
        x: impl Into<Operand<'a>>,
        incx: usize,
    ) -> Result<usize> {
        dispatch!(self, idamax(n, x, incx))
    }

    pub fn daxpy<'a>(
        &'a self,
        n: usize,
        alpha: f64,
        x: impl Into<Operand<'a>>,
        incx: usize,
        y: impl Into<OperandMut<'a>>,
        incy: usize,
    ) -> Result<()> {
        dispatch!(self, daxpy(n, alpha, x, incx, y, incy))
    }

    pub fn dscal<'a>(
        &'a self,
        n: usize,
        alpha: f64,
        x: impl Into<OperandMut<'a>>,
        incx: usize,
    ) -> Result<()> {
        dispatch!(self, dscal(n, alpha, x, incx))
    }

    pub fn dswap<'a>(
        &'a self,
        n: usize,
        x: impl Into<OperandMut<'a>>,
        incx: usize,
        y: impl Into<OperandMut<'a>>,
        incy: usize,
    ) -> Result<()> {
        dispatch!(self, dswap(n, x, incx, y, incy))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn dger<'a>(
        &'a self,
        m: usize,
        n: usize,
        alpha: f64,
        x: impl Into<Operand<'a>>,
        incx: usize,
        y: impl Into<Operand<'a>>,
        incy: usize,
        a: impl Into<OperandMut<'a>>,
        lda: usize,
    ) -> Result<()> {
        dispatch!(self, dger(m, n, alpha, x, incx, y, incy, a, lda))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn dtrsm<'a>(
        &'a self,
        side: Side,
        uplo: Uplo,
        trans: Trans,
        diag: Diag,
        m: usize,
        n: usize,
        alpha: f64,
        a: impl Into<Operand<'a>>,
        lda: usize,
        b: impl Into<OperandMut<'a>>,
        ldb: usize,
    ) -> Result<()> {
        dispatch!(self, dtrsm(side, uplo, trans, diag, m, n, alpha, a, lda, b, ldb))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn dtrsv<'a>(
        &'a self,
        uplo: Uplo,
        trans: Trans,
        diag: Diag,
        n: usize,
        a: impl Into<Operand<'a>>,
        lda: usize,
        x: impl Into<OperandMut<'a>>,
        incx: usize,
    ) -> Result<()> {
        dispatch!(self, dtrsv(uplo, trans, diag, n, a, lda, x, incx))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn dgemm<'a>(
        &'a self,
        transa: Trans,
        transb: Trans,
        m: usize,
        n: usize,
        k: usize,
        alpha: f64,
        a: impl Into<Operand<'a>>,
        lda: usize,
        b: impl Into<Operand<'a>>,
        ldb: usize,
        beta: f64,
        c: impl Into<OperandMut<'a>>,
        ldc: usize,
    ) -> Result<()> {
        dispatch!(
            self,
            dgemm(transa, transb, m, n, k, alpha, a, lda, b, ldb, beta, c, ldc)
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn dgemv<'a>(
        &'a self,
        trans: Trans,
        m: usize,
        n: usize,
        alpha: f64,
        a: impl Into<Operand<'a>>,
        lda: usize,
        x: impl Into<Operand<'a>>,
        incx: usize,
        beta: f64,
        y: impl Into<OperandMut<'a>>,
        incy: usize,
    ) -> Result<()> {
        dispatch!(self, dgemv(trans, m, n, alpha, a, lda, x, incx, beta, y, incy))
    }

    pub fn dcopy<'a>(
        &'a self,
        n: usize,
        x: impl Into<Operand<'a>>,
        incx: usize,
        y: impl Into<OperandMut<'a>>,
        incy: usize,
    ) -> Result<()> {
        dispatch!(self, dcopy(n, x, incx, y, incy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{host_context as context, host_context_with};

    #[test]
    fn configured_strategy_selects_library() {
        let ctx = context();
        let kernels = ctx.configured_kernels();
        assert_eq!(kernels.strategy(), StrategyKind::Staged);
        let mut x = vec![1.0, -2.0];
        kernels.dscal(2, 3.0, &mut x, 1).unwrap();
        assert_eq!(x, vec![3.0, -6.0]);
        drop(ctx);

        let ctx = host_context_with(
            &crate::config::BackendConfig::default().with_strategy(StrategyKind::Direct),
        );
        let kernels = ctx.configured_kernels();
        assert_eq!(kernels.strategy(), StrategyKind::Direct);
        assert!(matches!(
            kernels.dscal(2, 3.0, &mut x, 1),
            Err(Error::HostOperand { op: "dscal", .. })
        ));
    }

    #[test]
    fn idamax_finds_largest_magnitude() {
        let ctx = context();
        let lib = ctx.kernels::<Staged>();
        let x = [1.0, -5.0, 3.0, 2.0];
        assert_eq!(lib.idamax(4, &x[..], 1).unwrap(), 1);
        assert_eq!(lib.idamax(0, &x[..], 1).unwrap(), 0);
        assert_eq!(ctx.accelerator().live_allocations(), 0);
    }

    #[test]
    fn direct_rejects_host_operands() {
        let ctx = context();
        let lib = ctx.kernels::<Direct>();
        let mut x = vec![1.0, 2.0];
        let err = lib.dscal(2, 2.0, &mut x, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::HostOperand {
                op: "dscal",
                operand: "x"
            }
        ));
    }

    #[test]
    fn staged_passes_device_operands_through() {
        let ctx = context();
        let mem = ctx.memory();
        let buf = mem.allocate(3 * 8).unwrap();
        mem.upload(buf.ptr(), &[1.0f64, 2.0, 3.0]).unwrap();

        let y_host = [10.0, 20.0, 30.0];
        let lib = ctx.kernels::<Staged>();
        lib.daxpy(3, 1.0, &y_host[..], 1, buf.ptr(), 1).unwrap();

        let mut out = [0.0f64; 3];
        mem.download(&mut out, buf.ptr()).unwrap();
        assert_eq!(out, [11.0, 22.0, 33.0]);
        mem.deallocate(buf).unwrap();
        assert_eq!(ctx.accelerator().live_allocations(), 0);
    }

    #[test]
    fn short_host_operand_is_rejected() {
        let ctx = context();
        let lib = ctx.kernels::<Staged>();
        let x = [1.0, 2.0];
        let mut y = [0.0; 5];
        let err = lib.dcopy(3, &x[..], 1, &mut y[..], 1).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                op: "dcopy",
                operand: "x",
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(ctx.accelerator().live_allocations(), 0);
    }

    #[test]
    fn bad_strides_and_leading_dimensions() {
        let ctx = context();
        let lib = ctx.kernels::<Staged>();
        let mut x = [1.0; 4];
        assert!(matches!(
            lib.dscal(4, 2.0, &mut x[..], 0),
            Err(Error::InvalidArgument(_))
        ));
        let a = [0.0; 4];
        let b = [0.0; 4];
        let mut c = [0.0; 4];
        assert!(matches!(
            lib.dgemm(
                Trans::NoTrans,
                Trans::NoTrans,
                2,
                2,
                2,
                1.0,
                &a[..],
                1,
                &b[..],
                2,
                0.0,
                &mut c[..],
                2
            ),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn released_context_refuses_kernels() {
        let mut ctx = context();
        ctx.release().unwrap();
        let lib = ctx.kernels::<Staged>();
        let mut x = [1.0; 2];
        assert!(matches!(
            lib.dscal(2, 2.0, &mut x[..], 1),
            Err(Error::Released)
        ));
    }

    #[test]
    fn strided_dcopy_leaves_gaps() {
        let ctx = context();
        let lib = ctx.kernels::<Staged>();
        let x = [1.0, 2.0, 3.0];
        let mut y = [0.0; 5];
        lib.dcopy(3, &x[..], 1, &mut y[..], 2).unwrap();
        assert_eq!(y, [1.0, 0.0, 2.0, 0.0, 3.0]);
    }

    #[test]
    fn strategy_kind_reported() {
        let ctx = context();
        assert_eq!(ctx.kernels::<Direct>().strategy(), StrategyKind::Direct);
        assert_eq!(ctx.kernels::<Staged>().strategy(), StrategyKind::Staged);
    }
}
