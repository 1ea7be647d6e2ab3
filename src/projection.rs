//! Coordinate reference system support for tile pyramids.
//!
//! The tile accessor needs two things from a projection: converting a length in
//! the CRS's native unit to meters, and transforming a bounding box into another
//! CRS. [`Projection`] captures that contract; [`ProjProjection`] implements it
//! in pure Rust with `proj4rs` and the `crs-definitions` EPSG catalog.

use crate::error::{GpkgError, Result};
use crate::gpkg::SpatialRefSys;
use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use std::f64::consts::PI;
use std::fmt;

pub const EPSG_WORLD_GEODETIC_SYSTEM: i32 = 4326;
pub const EPSG_WEB_MERCATOR: i32 = 3857;

/// Latitude band covered by the global Web Mercator tiling scheme.
pub const WEB_MERCATOR_MAX_LAT_RANGE: f64 = 85.0511287798066;
pub const WEB_MERCATOR_MIN_LAT_RANGE: f64 = -85.05112877980659;

/// Half the earth's circumference in Web Mercator meters.
pub const WEB_MERCATOR_HALF_WORLD_WIDTH: f64 = 20037508.342789244;

const EARTH_RADIUS_METERS: f64 = 6378137.0;
const METERS_PER_DEGREE: f64 = 2.0 * PI * EARTH_RADIUS_METERS / 360.0;

/// Axis-aligned bounding box in some coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The whole world in Web Mercator meters.
    pub fn web_mercator_world() -> Self {
        Self::new(
            -WEB_MERCATOR_HALF_WORLD_WIDTH,
            -WEB_MERCATOR_HALF_WORLD_WIDTH,
            WEB_MERCATOR_HALF_WORLD_WIDTH,
            WEB_MERCATOR_HALF_WORLD_WIDTH,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Projection of a tile matrix set's coordinate reference system.
pub trait Projection {
    /// Convert a length in the CRS's native unit to meters.
    fn to_meters(&self, value: f64) -> f64;

    /// Transform a bounding box into the CRS identified by `target_epsg`.
    fn transform_bounding_box(&self, bbox: &BoundingBox, target_epsg: i32)
    -> Result<BoundingBox>;
}

/// [`Projection`] backed by `proj4rs` with EPSG definitions from `crs-definitions`.
pub struct ProjProjection {
    epsg: i32,
    proj: Proj,
    geographic: bool,
    meters_per_unit: f64,
}

impl fmt::Debug for ProjProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjProjection")
            .field("epsg", &self.epsg)
            .field("geographic", &self.geographic)
            .field("meters_per_unit", &self.meters_per_unit)
            .finish()
    }
}

impl ProjProjection {
    pub fn from_epsg(epsg: i32) -> Result<Self> {
        let proj_string = get_proj_string(epsg).ok_or(GpkgError::UnsupportedProjection { epsg })?;
        let proj = Proj::from_proj_string(proj_string)
            .map_err(|e| GpkgError::Projection(format!("invalid projection EPSG:{epsg}: {e:?}")))?;
        let geographic = is_geographic_proj(proj_string);
        let meters_per_unit = if geographic {
            METERS_PER_DEGREE
        } else {
            meters_per_unit(proj_string)
        };

        Ok(Self {
            epsg,
            proj,
            geographic,
            meters_per_unit,
        })
    }

    /// Resolve the projection of a `gpkg_spatial_ref_sys` entry. EPSG entries
    /// use their organization code, everything else falls back to the `srs_id`.
    pub fn from_spatial_ref_sys(srs: &SpatialRefSys) -> Result<Self> {
        if srs.organization.eq_ignore_ascii_case("EPSG") {
            Self::from_epsg(srs.organization_coordsys_id)
        } else {
            Self::from_epsg(srs.srs_id)
        }
    }

    pub fn epsg(&self) -> i32 {
        self.epsg
    }

    pub fn is_geographic(&self) -> bool {
        self.geographic
    }

    fn transform_point(
        &self,
        target: &Proj,
        target_geographic: bool,
        x: f64,
        y: f64,
    ) -> Result<(f64, f64)> {
        // proj4rs uses radians for geographic coordinates
        let mut point = if self.geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        transform(&self.proj, target, &mut point)
            .map_err(|e| GpkgError::Projection(format!("transform failed: {e:?}")))?;

        if target_geographic {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }
}

impl Projection for ProjProjection {
    fn to_meters(&self, value: f64) -> f64 {
        value * self.meters_per_unit
    }

    fn transform_bounding_box(
        &self,
        bbox: &BoundingBox,
        target_epsg: i32,
    ) -> Result<BoundingBox> {
        if target_epsg == self.epsg {
            return Ok(*bbox);
        }

        let target_str = get_proj_string(target_epsg).ok_or(GpkgError::UnsupportedProjection {
            epsg: target_epsg,
        })?;
        let target = Proj::from_proj_string(target_str).map_err(|e| {
            GpkgError::Projection(format!("invalid projection EPSG:{target_epsg}: {e:?}"))
        })?;
        let target_geographic = is_geographic_proj(target_str);

        let corners = [
            (bbox.min_x, bbox.min_y),
            (bbox.min_x, bbox.max_y),
            (bbox.max_x, bbox.min_y),
            (bbox.max_x, bbox.max_y),
        ];
        let mut out: Option<BoundingBox> = None;
        for (x, y) in corners {
            let (tx, ty) = self.transform_point(&target, target_geographic, x, y)?;
            out = Some(match out {
                Some(b) => BoundingBox::new(
                    b.min_x.min(tx),
                    b.min_y.min(ty),
                    b.max_x.max(tx),
                    b.max_y.max(ty),
                ),
                None => BoundingBox::new(tx, ty, tx, ty),
            });
        }

        Ok(out.unwrap_or(*bbox))
    }
}

/// Get PROJ4 string for an EPSG code using the crs-definitions database
#[inline]
pub(crate) fn get_proj_string(epsg: i32) -> Option<&'static str> {
    u16::try_from(epsg)
        .ok()
        .and_then(crs_definitions::from_code)
        .map(|def| def.proj4)
}

fn is_geographic_proj(proj_string: &str) -> bool {
    proj_string.contains("+proj=longlat") || proj_string.contains("+proj=latlong")
}

fn meters_per_unit(proj_string: &str) -> f64 {
    for token in proj_string.split_whitespace() {
        if let Some(value) = token.strip_prefix("+to_meter=") {
            if let Ok(value) = value.parse::<f64>() {
                return value;
            }
        }
        if let Some(unit) = token.strip_prefix("+units=") {
            return match unit {
                "km" => 1000.0,
                "ft" => 0.3048,
                "us-ft" => 1200.0 / 3937.0,
                _ => 1.0,
            };
        }
    }
    1.0
}
