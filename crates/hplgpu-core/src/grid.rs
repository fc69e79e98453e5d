//! Process-grid coordinates and block-cyclic ownership.

use serde::{Deserialize, Serialize};

/// Position of the calling process in a 2D process grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridInfo {
    /// Number of process rows.
    pub nprow: usize,
    /// Number of process columns.
    pub npcol: usize,
    /// This process's row.
    pub myrow: usize,
    /// This process's column.
    pub mycol: usize,
}

impl GridInfo {
    pub fn new(nprow: usize, npcol: usize, myrow: usize, mycol: usize) -> Self {
        Self {
            nprow,
            npcol,
            myrow,
            mycol,
        }
    }

    /// A grid with a single process.
    pub fn single() -> Self {
        Self::new(1, 1, 0, 0)
    }

    /// Local `(rows, cols)` of an `m x n` matrix distributed in `nb x nb` blocks.
    pub fn local_extent(&self, m: usize, n: usize, nb: usize) -> (usize, usize) {
        (
            numroc(m, nb, self.myrow, 0, self.nprow),
            numroc(n, nb, self.mycol, 0, self.npcol),
        )
    }
}

/// Number of rows or columns of a block-cyclically distributed dimension
/// owned by process `iproc`.
///
/// `n` is the global extent, `nb` the block size, `isrcproc` the process
/// holding the first block and `nprocs` the number of processes along this
/// dimension.
pub fn numroc(n: usize, nb: usize, iproc: usize, isrcproc: usize, nprocs: usize) -> usize {
    if nb == 0 || nprocs == 0 {
        return 0;
    }
    if nprocs == 1 {
        return n;
    }

    let mydist = (nprocs + iproc - isrcproc % nprocs) % nprocs;
    let nblocks = n / nb;
    let extra = nblocks % nprocs;

    let mut local = (nblocks / nprocs) * nb;
    if mydist < extra {
        local += nb;
    } else if mydist == extra {
        local += n % nb;
    }
    local
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_process_owns_everything() {
        assert_eq!(numroc(1000, 64, 0, 0, 1), 1000);
        assert_eq!(GridInfo::single().local_extent(7, 5, 4), (7, 5));
    }

    #[test]
    fn blocks_deal_round_robin() {
        // 10 rows, blocks of 3 over 2 processes: blocks [0,3) [3,6) [6,9) [9,10)
        // process 0 gets blocks 0 and 2 (6 rows), process 1 gets 1 and 3 (4 rows).
        assert_eq!(numroc(10, 3, 0, 0, 2), 6);
        assert_eq!(numroc(10, 3, 1, 0, 2), 4);
    }

    #[test]
    fn extents_sum_to_global() {
        for n in [0, 1, 17, 64, 100, 257] {
            for nb in [1, 4, 32] {
                for nprocs in [1, 2, 3, 5] {
                    let total: usize = (0..nprocs).map(|p| numroc(n, nb, p, 0, nprocs)).sum();
                    assert_eq!(total, n, "n={n} nb={nb} nprocs={nprocs}");
                }
            }
        }
    }

    #[test]
    fn idle_process_gets_nothing() {
        // 4 rows in one block of 4 spread over 3 processes.
        assert_eq!(numroc(4, 4, 0, 0, 3), 4);
        assert_eq!(numroc(4, 4, 1, 0, 3), 0);
        assert_eq!(numroc(4, 4, 2, 0, 3), 0);
    }

    #[test]
    fn source_process_shifts_ownership() {
        assert_eq!(numroc(10, 3, 1, 1, 2), 6);
        assert_eq!(numroc(10, 3, 0, 1, 2), 4);
    }
}
