//! Fixtures shared by the unit tests.

use super::gpkg::Gpkg;
use super::metadata::TileMatrix;
use super::tile::TileDao;
use super::tile_utils::tiles_per_side;
use crate::error::Result;
use crate::projection::{BoundingBox, EPSG_WEB_MERCATOR, WEB_MERCATOR_HALF_WORLD_WIDTH};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const TILE_SIZE: i64 = 256;

const EPSG3857_WKT: &str = r#"PROJCS["WGS 84 / Pseudo-Mercator",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]],PROJECTION["Mercator_1SP"],PARAMETER["central_meridian",0],PARAMETER["scale_factor",1],PARAMETER["false_easting",0],PARAMETER["false_northing",0],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AXIS["Easting",EAST],AXIS["Northing",NORTH],AUTHORITY["EPSG","3857"]]"#;

/// Unique path in the temp dir that does not exist yet.
pub(crate) fn temp_path(name: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time")
        .as_nanos();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut path = std::env::temp_dir();
    path.push(format!("rusqlite_gpkg_access_{name}_{nanos}_{seq}.gpkg"));
    path
}

pub(crate) fn register_web_mercator(gpkg: &Gpkg) -> Result<()> {
    if gpkg.spatial_ref_sys(EPSG_WEB_MERCATOR)?.is_some() {
        return Ok(());
    }
    gpkg.register_srs(
        "WGS 84 / Pseudo-Mercator",
        EPSG_WEB_MERCATOR,
        "EPSG",
        EPSG_WEB_MERCATOR,
        EPSG3857_WKT,
        "Web Mercator",
    )
}

/// Web Mercator tile table covering the whole world, with one `2^z x 2^z`
/// level of 256 pixel tiles per zoom in `zooms`.
pub(crate) fn world_tile_table(gpkg: &Gpkg, name: &str, zooms: RangeInclusive<i64>) -> Result<()> {
    register_web_mercator(gpkg)?;
    let world = BoundingBox::web_mercator_world();
    gpkg.create_tile_table(name, EPSG_WEB_MERCATOR, &world)?;
    for zoom_level in zooms {
        let side = tiles_per_side(zoom_level).expect("zoom level in range");
        let pixel = 2.0 * WEB_MERCATOR_HALF_WORLD_WIDTH / (TILE_SIZE * side) as f64;
        gpkg.create_tile_matrix(&TileMatrix {
            table_name: name.to_string(),
            zoom_level,
            matrix_width: side,
            matrix_height: side,
            tile_width: TILE_SIZE,
            tile_height: TILE_SIZE,
            pixel_x_size: pixel,
            pixel_y_size: pixel,
        })?;
    }
    Ok(())
}

/// Store every tile of `zoom_level`, each holding the zoom level as its only
/// byte.
pub(crate) fn fill_level(dao: &TileDao<'_>, zoom_level: i64) -> Result<()> {
    let side = tiles_per_side(zoom_level).expect("zoom level in range");
    for column in 0..side {
        for row in 0..side {
            let mut tile = dao.new_tile_row();
            tile.set_zoom_level(zoom_level)?;
            tile.set_tile_column(column)?;
            tile.set_tile_row(row)?;
            tile.set_tile_data(vec![zoom_level as u8])?;
            dao.insert(&tile)?;
        }
    }
    Ok(())
}
