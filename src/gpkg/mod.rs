//! Typed access to the user tables of a GeoPackage.
//!
//! [`Gpkg`] opens the file and builds accessors: [`UserDao`] for any table,
//! [`FeatureDao`] for feature tables and [`TileDao`] for tile pyramids.
//! Queries return a [`UserQuery`] whose [`UserCursor`] yields typed rows.

mod cursor;
mod dao;
mod feature;
mod geometry;
mod gpkg;
mod metadata;
mod registry;
mod row;
mod table;
mod tile;
pub mod tile_utils;

#[cfg(test)]
mod testing;

pub use cursor::{RowMapper, UserCursor, UserQuery, UserRowMapper};
pub use dao::UserDao;
pub use feature::{FeatureDao, FeatureRow, FeatureRowMapper};
pub use geometry::{Envelope, GeometryData};
pub use gpkg::Gpkg;
pub use metadata::{
    Contents, DATA_TYPE_ATTRIBUTES, DATA_TYPE_FEATURES, DATA_TYPE_TILES, GeometryColumns,
    SpatialRefSys, TileMatrix, TileMatrixSet,
};
pub use registry::TableRegistry;
pub use row::UserRow;
pub use table::{
    TILE_COLUMN_COLUMN, TILE_DATA_COLUMN, TILE_ID_COLUMN, TILE_ROW_COLUMN, TILE_ZOOM_LEVEL_COLUMN,
    TableKind, UserColumn, UserTable,
};
pub use tile::{TileDao, TileRow, TileRowMapper};
pub use tile_utils::TileGrid;
