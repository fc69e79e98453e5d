//! Seeded random matrix generation in device memory.
//!
//! Each process fills only its block-cyclic share of the global matrix. The
//! generator is created fresh per call, so the seed is the only input that
//! decides the values.

use hplgpu_core::{Accelerator, DevicePtr, GridInfo, NormalGenerator, Result};

use crate::context::DeviceContext;

/// Fills local matrix regions with normally distributed values.
pub struct MatrixGenerator<'ctx, A: Accelerator> {
    ctx: &'ctx DeviceContext<A>,
    mean: f64,
    stddev: f64,
}

impl<'ctx, A: Accelerator> MatrixGenerator<'ctx, A> {
    /// Generator using the context's configured distribution.
    pub fn new(ctx: &'ctx DeviceContext<A>) -> Self {
        let config = ctx.config();
        Self {
            ctx,
            mean: config.rng_mean,
            stddev: config.rng_stddev,
        }
    }

    /// Fill this process's share of a `rows x cols` matrix distributed in
    /// `nb x nb` blocks over `grid`, starting at `a`.
    ///
    /// Writes `max(mp, lda) * nq` doubles, where `mp x nq` is the local
    /// extent; a process that owns nothing writes nothing. Values are not
    /// clamped.
    #[allow(clippy::too_many_arguments)]
    pub fn generate(
        &self,
        grid: &GridInfo,
        rows: usize,
        cols: usize,
        nb: usize,
        a: DevicePtr,
        lda: usize,
        seed: u64,
    ) -> Result<()> {
        let (mp, nq) = grid.local_extent(rows, cols, nb);
        self.ctx.trace().op(
            "[MATGEN]",
            "Random matrix generation",
            &format!("({}, {}) local ({}, {}) seed {}", rows, cols, mp, nq, seed),
        );
        if mp == 0 || nq == 0 {
            return Ok(());
        }

        let count = mp.max(lda) * nq;
        let mut generator = self.ctx.accelerator().create_generator(seed)?;
        generator.generate_normal(a, count, self.mean, self.stddev)?;
        drop(generator);
        self.ctx.synchronize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::host_context;

    #[test]
    fn idle_process_writes_nothing() {
        let ctx = host_context();
        let buf = ctx.memory().allocate(16 * 8).unwrap();
        // 4 rows in blocks of 4 over 2 process rows: row 1 owns nothing.
        let grid = GridInfo::new(2, 1, 1, 0);
        ctx.generator()
            .generate(&grid, 4, 4, 4, buf.ptr(), 4, 42)
            .unwrap();

        let mut out = [0.0f64; 16];
        ctx.memory().download(&mut out, buf.ptr()).unwrap();
        assert!(out.iter().all(|v| *v == 0.0));
        ctx.memory().deallocate(buf).unwrap();
    }

    #[test]
    fn padded_leading_dimension_is_filled() {
        let ctx = host_context();
        let (rows, cols, lda) = (3, 2, 5);
        let buf = ctx.memory().allocate(lda * cols * 8 + 8).unwrap();
        ctx.generator()
            .generate(&GridInfo::single(), rows, cols, 4, buf.ptr(), lda, 7)
            .unwrap();

        let mut out = [0.0f64; 11];
        ctx.memory().download(&mut out, buf.ptr()).unwrap();
        assert!(out[..10].iter().all(|v| *v != 0.0));
        assert_eq!(out[10], 0.0);
        ctx.memory().deallocate(buf).unwrap();
    }
}
