//! Launch geometry for the tiled layout-transform kernels.

/// Edge of the square tile used by the transpose-copy kernel.
pub const TILE_DIM: usize = 64;

/// Rows of a tile handled per pass of one thread row.
pub const BLOCK_ROWS: usize = 16;

/// Threads per block along x for the plain copy kernel.
pub const COPY_BLOCK_X: usize = 64;

/// A three-component launch extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dim3 {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Dim3 {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y, z: 1 }
    }

    pub const fn volume(&self) -> usize {
        self.x * self.y * self.z
    }
}

/// Grid and block shape of a kernel launch.
///
/// The tile shape is a performance choice; kernels must produce the same
/// result for any geometry that covers the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    pub grid: Dim3,
    pub block: Dim3,
    /// Edge of the square region of the matrix each grid cell covers.
    pub tile: usize,
}

impl LaunchConfig {
    /// Geometry for copying an `m x n` matrix: 64x1 threads per block, one
    /// 64x64 tile per block.
    pub fn copy(m: usize, n: usize) -> Self {
        Self {
            grid: Dim3::new(m.div_ceil(TILE_DIM), n.div_ceil(TILE_DIM)),
            block: Dim3::new(COPY_BLOCK_X, 1),
            tile: TILE_DIM,
        }
    }

    /// Geometry for transposing an `m x n` matrix: `TILE_DIM x BLOCK_ROWS`
    /// threads walk a `TILE_DIM` square tile in bands of `BLOCK_ROWS`.
    pub fn transpose(m: usize, n: usize) -> Self {
        Self {
            grid: Dim3::new(m.div_ceil(TILE_DIM), n.div_ceil(TILE_DIM)),
            block: Dim3::new(TILE_DIM, BLOCK_ROWS),
            tile: TILE_DIM,
        }
    }

    /// Number of passes one thread row makes over its tile.
    pub fn bands(&self) -> usize {
        self.tile.div_ceil(self.block.y)
    }

    /// Whether the grid covers every element of an `m x n` matrix.
    pub fn covers(&self, m: usize, n: usize) -> bool {
        self.grid.x * self.tile >= m && self.grid.y * self.tile >= n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_geometry() {
        let cfg = LaunchConfig::copy(130, 64);
        assert_eq!(cfg.grid, Dim3::new(3, 1));
        assert_eq!(cfg.block, Dim3::new(64, 1));
        assert!(cfg.covers(130, 64));
    }

    #[test]
    fn transpose_geometry() {
        let cfg = LaunchConfig::transpose(100, 200);
        assert_eq!(cfg.grid, Dim3::new(2, 4));
        assert_eq!(cfg.block.volume(), TILE_DIM * BLOCK_ROWS);
        assert_eq!(cfg.bands(), 4);
        assert!(cfg.covers(100, 200));
        assert!(!cfg.covers(129, 200));
    }

    #[test]
    fn empty_matrix_launches_nothing() {
        let cfg = LaunchConfig::transpose(0, 10);
        assert_eq!(cfg.grid.volume(), 0);
    }
}
