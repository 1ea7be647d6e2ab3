use super::cursor::{RowMapper, UserQuery};
use super::dao::UserDao;
use super::gpkg::Gpkg;
use super::metadata::{TileMatrix, TileMatrixSet};
use super::row::UserRow;
use super::table::{
    TILE_COLUMN_COLUMN, TILE_DATA_COLUMN, TILE_ROW_COLUMN, TILE_ZOOM_LEVEL_COLUMN, UserTable,
};
use super::tile_utils::{self, TileGrid};
use crate::error::Result;
use crate::ogc_sql::quote_identifier;
use crate::projection::{BoundingBox, EPSG_WORLD_GEODETIC_SYSTEM, Projection};
use crate::types::Value;
use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;

/// A row of a tile table.
#[derive(Clone, Debug)]
pub struct TileRow {
    row: UserRow,
}

impl TileRow {
    pub fn id(&self) -> Option<i64> {
        self.row.id()
    }

    pub fn zoom_level(&self) -> Result<i64> {
        self.row.value(TILE_ZOOM_LEVEL_COLUMN)?.try_into()
    }

    pub fn tile_column(&self) -> Result<i64> {
        self.row.value(TILE_COLUMN_COLUMN)?.try_into()
    }

    pub fn tile_row(&self) -> Result<i64> {
        self.row.value(TILE_ROW_COLUMN)?.try_into()
    }

    pub fn tile_data(&self) -> Result<Option<Vec<u8>>> {
        self.row.value(TILE_DATA_COLUMN)?.try_into()
    }

    pub fn set_zoom_level(&mut self, zoom_level: i64) -> Result<()> {
        self.row.set_value(TILE_ZOOM_LEVEL_COLUMN, zoom_level)
    }

    pub fn set_tile_column(&mut self, column: i64) -> Result<()> {
        self.row.set_value(TILE_COLUMN_COLUMN, column)
    }

    pub fn set_tile_row(&mut self, row: i64) -> Result<()> {
        self.row.set_value(TILE_ROW_COLUMN, row)
    }

    pub fn set_tile_data(&mut self, data: Vec<u8>) -> Result<()> {
        self.row.set_value(TILE_DATA_COLUMN, data)
    }

    pub fn user_row(&self) -> &UserRow {
        &self.row
    }

    pub fn into_user_row(self) -> UserRow {
        self.row
    }
}

impl AsRef<UserRow> for TileRow {
    fn as_ref(&self) -> &UserRow {
        &self.row
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TileRowMapper;

impl RowMapper for TileRowMapper {
    type Row = TileRow;

    fn map_row(&self, row: UserRow) -> TileRow {
        TileRow { row }
    }
}

/// Accessor for a tile table and its pyramid.
///
/// The tile matrix set and the tile matrices are loaded once, when the
/// accessor is built. Tile ground sizes are kept in meters, finest level
/// first, for [`zoom_level`](Self::zoom_level).
pub struct TileDao<'a> {
    dao: UserDao<'a, TileRowMapper>,
    tile_matrix_set: TileMatrixSet,
    tile_matrices: Vec<TileMatrix>,
    zoom_index: BTreeMap<i64, usize>,
    min_zoom: i64,
    max_zoom: i64,
    widths: Vec<f64>,
    heights: Vec<f64>,
    projection: Box<dyn Projection>,
}

impl<'a> TileDao<'a> {
    /// Build an accessor over `table`. `tile_matrices` must be in ascending
    /// zoom order; a zoom level declared twice keeps its last matrix.
    pub fn new(
        gpkg: &'a Gpkg,
        table: Arc<UserTable>,
        tile_matrix_set: TileMatrixSet,
        tile_matrices: Vec<TileMatrix>,
        projection: Box<dyn Projection>,
    ) -> Self {
        let count = tile_matrices.len();
        let (min_zoom, max_zoom) = match (tile_matrices.first(), tile_matrices.last()) {
            (Some(first), Some(last)) => (first.zoom_level, last.zoom_level),
            _ => (0, 0),
        };

        let mut zoom_index = BTreeMap::new();
        let mut widths = vec![0.0; count];
        let mut heights = vec![0.0; count];
        for (i, matrix) in tile_matrices.iter().enumerate() {
            if zoom_index.insert(matrix.zoom_level, i).is_some() {
                tracing::warn!(
                    table = table.name(),
                    zoom_level = matrix.zoom_level,
                    "duplicate tile matrix zoom level"
                );
            }
            widths[count - i - 1] =
                projection.to_meters(matrix.pixel_x_size * matrix.tile_width as f64);
            heights[count - i - 1] =
                projection.to_meters(matrix.pixel_y_size * matrix.tile_height as f64);
        }

        Self {
            dao: UserDao::new(gpkg, table, TileRowMapper),
            tile_matrix_set,
            tile_matrices,
            zoom_index,
            min_zoom,
            max_zoom,
            widths,
            heights,
            projection,
        }
    }

    pub fn tile_matrix_set(&self) -> &TileMatrixSet {
        &self.tile_matrix_set
    }

    pub fn tile_matrices(&self) -> &[TileMatrix] {
        &self.tile_matrices
    }

    pub fn tile_matrix(&self, zoom_level: i64) -> Option<&TileMatrix> {
        self.zoom_index
            .get(&zoom_level)
            .map(|&i| &self.tile_matrices[i])
    }

    pub fn min_zoom(&self) -> i64 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> i64 {
        self.max_zoom
    }

    pub fn projection(&self) -> &dyn Projection {
        self.projection.as_ref()
    }

    pub fn new_tile_row(&self) -> TileRow {
        TileRow {
            row: self.dao.new_row(),
        }
    }

    /// The tile at `(column, row, zoom_level)`. More than one match is a data
    /// anomaly of the file; the first one is returned.
    pub fn query_for_tile(
        &self,
        column: i64,
        row: i64,
        zoom_level: i64,
    ) -> Result<Option<TileRow>> {
        let (where_clause, args) = Self::tile_where(column, row, zoom_level);
        let mut query = self.dao.query(Some(&where_clause), &args, None)?;
        let mut cursor = query.cursor()?;
        let tile = cursor.next().transpose()?;
        if tile.is_some() && cursor.advance()? {
            tracing::warn!(
                table = self.dao.table_name(),
                column,
                row,
                zoom_level,
                "more than one tile at the same coordinates"
            );
        }
        Ok(tile)
    }

    pub fn query_for_tiles(&self, zoom_level: i64) -> Result<UserQuery<'a, TileRowMapper>> {
        self.dao.query_for_eq(TILE_ZOOM_LEVEL_COLUMN, zoom_level)
    }

    /// Tiles at `zoom_level`, bottom row first and right to left within a row.
    pub fn query_for_tiles_descending(
        &self,
        zoom_level: i64,
    ) -> Result<UserQuery<'a, TileRowMapper>> {
        let zoom = Value::Int64(zoom_level);
        let where_clause = UserDao::<TileRowMapper>::build_where(TILE_ZOOM_LEVEL_COLUMN, &zoom);
        let order_by = format!(
            "{} DESC, {} DESC",
            quote_identifier(TILE_ROW_COLUMN),
            quote_identifier(TILE_COLUMN_COLUMN)
        );
        self.dao.query(Some(&where_clause), &[zoom], Some(&order_by))
    }

    pub fn query_for_tiles_in_column(
        &self,
        column: i64,
        zoom_level: i64,
    ) -> Result<UserQuery<'a, TileRowMapper>> {
        self.dao.query_for_field_values(&[
            (TILE_COLUMN_COLUMN, Value::Int64(column)),
            (TILE_ZOOM_LEVEL_COLUMN, Value::Int64(zoom_level)),
        ])
    }

    pub fn query_for_tiles_in_row(
        &self,
        row: i64,
        zoom_level: i64,
    ) -> Result<UserQuery<'a, TileRowMapper>> {
        self.dao.query_for_field_values(&[
            (TILE_ROW_COLUMN, Value::Int64(row)),
            (TILE_ZOOM_LEVEL_COLUMN, Value::Int64(zoom_level)),
        ])
    }

    /// Tiles of `zoom_level` inside `grid`. No grid means there is nothing to
    /// query, and `Ok(None)` is returned without touching the database.
    pub fn query_by_tile_grid(
        &self,
        grid: Option<&TileGrid>,
        zoom_level: i64,
    ) -> Result<Option<UserQuery<'a, TileRowMapper>>> {
        let Some(grid) = grid else {
            return Ok(None);
        };

        type Dao<'d> = UserDao<'d, TileRowMapper>;
        let args = [
            Value::Int64(zoom_level),
            Value::Int64(grid.min_x),
            Value::Int64(grid.max_x),
            Value::Int64(grid.min_y),
            Value::Int64(grid.max_y),
        ];
        let where_clause = [
            Dao::build_where_op(TILE_ZOOM_LEVEL_COLUMN, &args[0], "="),
            Dao::build_where_op(TILE_COLUMN_COLUMN, &args[1], ">="),
            Dao::build_where_op(TILE_COLUMN_COLUMN, &args[2], "<="),
            Dao::build_where_op(TILE_ROW_COLUMN, &args[3], ">="),
            Dao::build_where_op(TILE_ROW_COLUMN, &args[4], "<="),
        ]
        .join(" AND ");

        self.dao.query(Some(&where_clause), &args, None).map(Some)
    }

    /// Zoom level whose tile ground size best matches `length` meters, see
    /// [`tile_utils::zoom_level`].
    pub fn zoom_level(&self, length: f64) -> Option<i64> {
        tile_utils::zoom_level(&self.widths, &self.heights, &self.tile_matrices, length)
    }

    /// Whether the pyramid is the global Web Mercator quad-tree.
    pub fn is_web_mercator_conformant(&self) -> Result<bool> {
        let wgs84 = self.projection.transform_bounding_box(
            &self.tile_matrix_set.bounding_box(),
            EPSG_WORLD_GEODETIC_SYSTEM,
        )?;
        Ok(tile_utils::is_web_mercator_conformant(
            &wgs84,
            &self.tile_matrices,
        ))
    }

    /// Widen under-declared matrix dimensions of the loaded pyramid. Only the
    /// in-memory matrices change.
    pub fn adjust_tile_matrix_lengths(&mut self) -> usize {
        tile_utils::adjust_tile_matrix_lengths(&self.tile_matrix_set, &mut self.tile_matrices)
    }

    /// Tiles at `zoom_level` covering `bbox` (in the set's CRS).
    pub fn tile_grid(&self, bbox: &BoundingBox, zoom_level: i64) -> Option<TileGrid> {
        let matrix = self.tile_matrix(zoom_level)?;
        tile_utils::tile_grid(bbox, matrix, &self.tile_matrix_set.bounding_box())
    }

    pub fn delete_tile(&self, column: i64, row: i64, zoom_level: i64) -> Result<usize> {
        let (where_clause, args) = Self::tile_where(column, row, zoom_level);
        self.dao.delete(Some(&where_clause), &args)
    }

    pub fn count_at_zoom(&self, zoom_level: i64) -> Result<i64> {
        let zoom = Value::Int64(zoom_level);
        let where_clause = UserDao::<TileRowMapper>::build_where(TILE_ZOOM_LEVEL_COLUMN, &zoom);
        self.dao.count(Some(&where_clause), &[zoom])
    }

    fn tile_where(column: i64, row: i64, zoom_level: i64) -> (String, Vec<Value>) {
        let args = vec![
            Value::Int64(zoom_level),
            Value::Int64(column),
            Value::Int64(row),
        ];
        let where_clause = [TILE_ZOOM_LEVEL_COLUMN, TILE_COLUMN_COLUMN, TILE_ROW_COLUMN]
            .iter()
            .zip(&args)
            .map(|(name, value)| UserDao::<TileRowMapper>::build_where(name, value))
            .collect::<Vec<String>>()
            .join(" AND ");
        (where_clause, args)
    }
}

impl<'a> Deref for TileDao<'a> {
    type Target = UserDao<'a, TileRowMapper>;

    fn deref(&self) -> &Self::Target {
        &self.dao
    }
}
