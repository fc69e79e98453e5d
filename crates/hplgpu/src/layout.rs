//! Copy and transpose-copy of device sub-matrices.

use hplgpu_core::{Accelerator, DevicePtr, LaunchConfig, Result};

use crate::context::DeviceContext;
use crate::kernels::check_ld;

/// Tiled layout kernels bound to one context.
pub struct LayoutKernels<'ctx, A: Accelerator> {
    ctx: &'ctx DeviceContext<A>,
}

impl<'ctx, A: Accelerator> LayoutKernels<'ctx, A> {
    pub fn new(ctx: &'ctx DeviceContext<A>) -> Self {
        Self { ctx }
    }

    /// `B[i, j] = A[i, j]` for `i < m`, `j < n`.
    pub fn lacpy(
        &self,
        m: usize,
        n: usize,
        a: DevicePtr,
        lda: usize,
        b: DevicePtr,
        ldb: usize,
    ) -> Result<()> {
        check_ld("lacpy", "lda", lda, m)?;
        check_ld("lacpy", "ldb", ldb, m)?;
        let launch = LaunchConfig::copy(m, n);
        self.ctx.trace().op(
            "[LACPY]",
            "Submatrix copy",
            &format!("({}, {}) grid {}x{}", m, n, launch.grid.x, launch.grid.y),
        );
        if m == 0 || n == 0 {
            return Ok(());
        }
        self.ctx.accelerator().lacpy(&launch, m, n, a, lda, b, ldb)
    }

    /// `B[j, i] = A[i, j]` for `i < m`, `j < n`.
    pub fn latcpy(
        &self,
        m: usize,
        n: usize,
        a: DevicePtr,
        lda: usize,
        b: DevicePtr,
        ldb: usize,
    ) -> Result<()> {
        check_ld("latcpy", "lda", lda, m)?;
        check_ld("latcpy", "ldb", ldb, n)?;
        let launch = LaunchConfig::transpose(m, n);
        self.ctx.trace().op(
            "[LATCPY]",
            "Submatrix transpose copy",
            &format!("({}, {}) grid {}x{}", m, n, launch.grid.x, launch.grid.y),
        );
        if m == 0 || n == 0 {
            return Ok(());
        }
        self.ctx.accelerator().latcpy(&launch, m, n, a, lda, b, ldb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::host_context;
    use hplgpu_core::Error;

    #[test]
    fn transpose_small() {
        let ctx = host_context();
        let mem = ctx.memory();
        let a = mem.allocate(6 * 8).unwrap();
        let b = mem.allocate(6 * 8).unwrap();
        // A is 3x2: [1 4; 2 5; 3 6]
        mem.upload(a.ptr(), &[1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        ctx.layout().latcpy(3, 2, a.ptr(), 3, b.ptr(), 2).unwrap();

        let mut out = [0.0f64; 6];
        mem.download(&mut out, b.ptr()).unwrap();
        assert_eq!(out, [1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        mem.deallocate(a).unwrap();
        mem.deallocate(b).unwrap();
    }

    #[test]
    fn short_leading_dimension_is_rejected() {
        let ctx = host_context();
        let p = DevicePtr::from_raw(0x1000);
        assert!(matches!(
            ctx.layout().latcpy(3, 2, p, 3, p, 1),
            Err(Error::InvalidArgument(_))
        ));
    }
}
