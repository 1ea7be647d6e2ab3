//! Pure tile pyramid arithmetic shared by [`TileDao`](super::TileDao).

use super::metadata::{TileMatrix, TileMatrixSet};
use crate::projection::{BoundingBox, WEB_MERCATOR_MAX_LAT_RANGE, WEB_MERCATOR_MIN_LAT_RANGE};

/// Absorbs projection round-off when comparing against the Web Mercator
/// world bounds, in degrees.
pub const WEB_MERCATOR_TOLERANCE: f64 = 1e-9;

/// Inclusive rectangle of tile columns (`x`) and rows (`y`) at one zoom level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    pub min_x: i64,
    pub max_x: i64,
    pub min_y: i64,
    pub max_y: i64,
}

impl TileGrid {
    pub fn new(min_x: i64, max_x: i64, min_y: i64, max_y: i64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Number of tiles in the grid, `None` when it does not fit an `i64`.
    pub fn count(&self) -> Option<i64> {
        let width = self.max_x.checked_sub(self.min_x)?.checked_add(1)?;
        let height = self.max_y.checked_sub(self.min_y)?.checked_add(1)?;
        width.checked_mul(height)
    }
}

/// Tiles per side of the global quad-tree at `zoom`, `None` when `2^zoom`
/// does not fit an `i64`.
pub fn tiles_per_side(zoom: i64) -> Option<i64> {
    if (0..63).contains(&zoom) {
        Some(1_i64 << zoom)
    } else {
        None
    }
}

/// Resolve the zoom level whose tiles best match a ground `length` in meters.
///
/// `widths` and `heights` hold each level's tile ground size, finest level
/// first, and `matrices` is the pyramid in ascending zoom order. The most
/// detailed level whose tile width or height still spans `length` wins. A
/// length larger than every tile resolves to the coarsest level. An empty
/// pyramid resolves to `None`.
pub fn zoom_level(
    widths: &[f64],
    heights: &[f64],
    matrices: &[TileMatrix],
    length: f64,
) -> Option<i64> {
    let last = matrices.len().checked_sub(1)?;
    let width_index = widths.partition_point(|w| *w < length);
    let height_index = heights.partition_point(|h| *h < length);
    let index = width_index.min(height_index).min(last);
    Some(matrices[last - index].zoom_level)
}

/// Grow each level's matrix width and height so that `pixel size * tile size
/// * count` covers the set's bounding box. Returns the number of levels that
/// changed.
pub fn adjust_tile_matrix_lengths(set: &TileMatrixSet, matrices: &mut [TileMatrix]) -> usize {
    let width = set.max_x - set.min_x;
    let height = set.max_y - set.min_y;
    let mut adjusted = 0;
    for matrix in matrices {
        let needed_width = (width / (matrix.pixel_x_size * matrix.tile_width as f64)) as i64;
        let needed_height = (height / (matrix.pixel_y_size * matrix.tile_height as f64)) as i64;
        let mut changed = false;
        if needed_width > matrix.matrix_width {
            matrix.matrix_width = needed_width;
            changed = true;
        }
        if needed_height > matrix.matrix_height {
            matrix.matrix_height = needed_height;
            changed = true;
        }
        if changed {
            adjusted += 1;
        }
    }
    adjusted
}

/// Whether a pyramid follows the global Web Mercator quad-tree: `wgs84` (the
/// set's bounds in EPSG:4326) covers the whole world and every level is
/// `2^zoom` tiles per side.
pub fn is_web_mercator_conformant(wgs84: &BoundingBox, matrices: &[TileMatrix]) -> bool {
    let world = wgs84.min_y <= WEB_MERCATOR_MIN_LAT_RANGE + WEB_MERCATOR_TOLERANCE
        && wgs84.max_y >= WEB_MERCATOR_MAX_LAT_RANGE - WEB_MERCATOR_TOLERANCE
        && wgs84.min_x <= -180.0 + WEB_MERCATOR_TOLERANCE
        && wgs84.max_x >= 180.0 - WEB_MERCATOR_TOLERANCE;

    world
        && matrices.iter().all(|matrix| {
            tiles_per_side(matrix.zoom_level)
                .is_some_and(|n| matrix.matrix_width == n && matrix.matrix_height == n)
        })
}

/// Tiles of `matrix` covering `bbox`, both in the set's CRS. Rows count down
/// from the top of `set_bbox`. `None` when `bbox` misses the matrix.
pub fn tile_grid(
    bbox: &BoundingBox,
    matrix: &TileMatrix,
    set_bbox: &BoundingBox,
) -> Option<TileGrid> {
    let width = matrix.matrix_width;
    let height = matrix.matrix_height;

    let min_x = tile_column(set_bbox, width, bbox.min_x);
    let max_x = tile_column(set_bbox, width, bbox.max_x);
    let min_y = tile_row(set_bbox, height, bbox.max_y);
    let max_y = tile_row(set_bbox, height, bbox.min_y);

    if min_x >= width || max_x < 0 || min_y >= height || max_y < 0 {
        return None;
    }

    Some(TileGrid::new(
        min_x.max(0),
        max_x.min(width - 1),
        min_y.max(0),
        max_y.min(height - 1),
    ))
}

// -1 left of the set, `width` at or right of its right edge.
fn tile_column(set_bbox: &BoundingBox, width: i64, x: f64) -> i64 {
    if x < set_bbox.min_x {
        -1
    } else if x >= set_bbox.max_x {
        width
    } else {
        let tile_width = set_bbox.width() / width as f64;
        ((x - set_bbox.min_x) / tile_width) as i64
    }
}

// `height` at or below the bottom edge, -1 above the top.
fn tile_row(set_bbox: &BoundingBox, height: i64, y: f64) -> i64 {
    if y <= set_bbox.min_y {
        height
    } else if y > set_bbox.max_y {
        -1
    } else {
        let tile_height = set_bbox.height() / height as f64;
        ((set_bbox.max_y - y) / tile_height) as i64
    }
}
