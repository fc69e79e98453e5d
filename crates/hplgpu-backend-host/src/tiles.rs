//! Tiled copy and transpose-copy kernels.
//!
//! Every grid cell of the launch is one rayon task covering a `tile x tile`
//! region of the source. The transpose stages its tile through a scratch
//! array, filled in bands of `block.y` rows the way a thread block fills
//! shared memory, then writes the tile out transposed.

use hplgpu_core::LaunchConfig;
use rayon::prelude::*;

/// One finished tile: destination origin and the values in destination
/// column-major order.
struct TileOut {
    row: usize,
    col: usize,
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

fn tile_origins(launch: &LaunchConfig) -> Vec<(usize, usize)> {
    (0..launch.grid.y)
        .flat_map(|by| (0..launch.grid.x).map(move |bx| (bx, by)))
        .collect()
}

/// `b[i + j*ldb] = a[i + j*lda]` for `i < m`, `j < n`.
pub fn copy(
    launch: &LaunchConfig,
    m: usize,
    n: usize,
    a: &[f64],
    lda: usize,
    b: &mut [f64],
    ldb: usize,
) {
    let tile = launch.tile;
    let tiles: Vec<TileOut> = tile_origins(launch)
        .into_par_iter()
        .filter_map(|(bx, by)| {
            let row = bx * tile;
            let col = by * tile;
            if row >= m || col >= n {
                return None;
            }
            let rows = tile.min(m - row);
            let cols = tile.min(n - col);

            let mut values = Vec::with_capacity(rows * cols);
            for j in col..col + cols {
                // One thread per row, `block.x` rows at a time.
                for strip in (row..row + rows).step_by(launch.block.x.max(1)) {
                    let end = (strip + launch.block.x.max(1)).min(row + rows);
                    values.extend_from_slice(&a[strip + j * lda..end + j * lda]);
                }
            }
            Some(TileOut {
                row,
                col,
                rows,
                cols,
                values,
            })
        })
        .collect();

    scatter(tiles, b, ldb);
}

/// `b[j + i*ldb] = a[i + j*lda]` for `i < m`, `j < n`.
pub fn transpose(
    launch: &LaunchConfig,
    m: usize,
    n: usize,
    a: &[f64],
    lda: usize,
    b: &mut [f64],
    ldb: usize,
) {
    let tile = launch.tile;
    let band = launch.block.y.max(1);
    let tiles: Vec<TileOut> = tile_origins(launch)
        .into_par_iter()
        .filter_map(|(bx, by)| {
            let row = bx * tile;
            let col = by * tile;
            if row >= m || col >= n {
                return None;
            }
            let rows = tile.min(m - row);
            let cols = tile.min(n - col);

            // Scratch laid out [col][row] with one column of padding, as the
            // shared-memory tile would be.
            let pitch = tile + 1;
            let mut scratch = vec![0.0; tile * pitch];
            for band_start in (0..cols).step_by(band) {
                for ty in band_start..(band_start + band).min(cols) {
                    let src = &a[row + (col + ty) * lda..row + rows + (col + ty) * lda];
                    scratch[ty * pitch..ty * pitch + rows].copy_from_slice(src);
                }
            }

            // Destination tile is cols x rows; its column c is source row c.
            let mut values = Vec::with_capacity(rows * cols);
            for c in 0..rows {
                for r in 0..cols {
                    values.push(scratch[r * pitch + c]);
                }
            }
            Some(TileOut {
                row: col,
                col: row,
                rows: cols,
                cols: rows,
                values,
            })
        })
        .collect();

    scatter(tiles, b, ldb);
}

fn scatter(tiles: Vec<TileOut>, b: &mut [f64], ldb: usize) {
    for t in tiles {
        for (c, column) in t.values.chunks(t.rows).enumerate() {
            let start = t.row + (t.col + c) * ldb;
            b[start..start + t.rows].copy_from_slice(column);
        }
        debug_assert_eq!(t.values.len(), t.rows * t.cols);
    }
}
