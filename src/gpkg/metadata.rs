//! Records of the GeoPackage metadata tables consulted by the accessors.

use crate::conversions::{dimension_from_zm, geometry_type_from_str};
use crate::error::Result;
use crate::projection::BoundingBox;

pub const DATA_TYPE_FEATURES: &str = "features";
pub const DATA_TYPE_TILES: &str = "tiles";
pub const DATA_TYPE_ATTRIBUTES: &str = "attributes";

/// A `gpkg_contents` row.
#[derive(Clone, Debug, PartialEq)]
pub struct Contents {
    pub table_name: String,
    pub data_type: String,
    pub identifier: Option<String>,
    pub description: Option<String>,
    pub last_change: String,
    pub min_x: Option<f64>,
    pub min_y: Option<f64>,
    pub max_x: Option<f64>,
    pub max_y: Option<f64>,
    pub srs_id: Option<i32>,
}

impl Contents {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            table_name: row.get(0)?,
            data_type: row.get(1)?,
            identifier: row.get(2)?,
            description: row.get(3)?,
            last_change: row.get(4)?,
            min_x: row.get(5)?,
            min_y: row.get(6)?,
            max_x: row.get(7)?,
            max_y: row.get(8)?,
            srs_id: row.get(9)?,
        })
    }

    pub fn is_features(&self) -> bool {
        self.data_type.eq_ignore_ascii_case(DATA_TYPE_FEATURES)
    }

    pub fn is_tiles(&self) -> bool {
        self.data_type.eq_ignore_ascii_case(DATA_TYPE_TILES)
    }
}

/// A `gpkg_spatial_ref_sys` row.
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialRefSys {
    pub srs_name: String,
    pub srs_id: i32,
    pub organization: String,
    pub organization_coordsys_id: i32,
    pub definition: String,
    pub description: Option<String>,
}

impl SpatialRefSys {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            srs_name: row.get(0)?,
            srs_id: row.get(1)?,
            organization: row.get(2)?,
            organization_coordsys_id: row.get(3)?,
            definition: row.get(4)?,
            description: row.get(5)?,
        })
    }
}

/// A `gpkg_geometry_columns` row.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryColumns {
    pub table_name: String,
    pub column_name: String,
    pub geometry_type_name: String,
    pub srs_id: i32,
    pub z: i8,
    pub m: i8,
}

impl GeometryColumns {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            table_name: row.get(0)?,
            column_name: row.get(1)?,
            geometry_type_name: row.get(2)?,
            srs_id: row.get(3)?,
            z: row.get(4)?,
            m: row.get(5)?,
        })
    }

    pub fn geometry_type(&self) -> Result<wkb::reader::GeometryType> {
        geometry_type_from_str(&self.geometry_type_name)
    }

    pub fn dimension(&self) -> Result<wkb::reader::Dimension> {
        dimension_from_zm(self.z, self.m)
    }
}

/// A `gpkg_tile_matrix_set` row.
#[derive(Clone, Debug, PartialEq)]
pub struct TileMatrixSet {
    pub table_name: String,
    pub srs_id: i32,
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl TileMatrixSet {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            table_name: row.get(0)?,
            srs_id: row.get(1)?,
            min_x: row.get(2)?,
            min_y: row.get(3)?,
            max_x: row.get(4)?,
            max_y: row.get(5)?,
        })
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

/// A `gpkg_tile_matrix` row: the tiling parameters of one zoom level.
#[derive(Clone, Debug, PartialEq)]
pub struct TileMatrix {
    pub table_name: String,
    pub zoom_level: i64,
    pub matrix_width: i64,
    pub matrix_height: i64,
    pub tile_width: i64,
    pub tile_height: i64,
    pub pixel_x_size: f64,
    pub pixel_y_size: f64,
}

impl TileMatrix {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            table_name: row.get(0)?,
            zoom_level: row.get(1)?,
            matrix_width: row.get(2)?,
            matrix_height: row.get(3)?,
            tile_width: row.get(4)?,
            tile_height: row.get(5)?,
            pixel_x_size: row.get(6)?,
            pixel_y_size: row.get(7)?,
        })
    }
}
