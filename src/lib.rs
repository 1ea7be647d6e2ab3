//! Typed table access for GeoPackage files, built on top of rusqlite.
//!
//! ## Overview
//!
//! - `Gpkg` is the connection to one GeoPackage and the factory of accessors.
//! - `UserDao` reads and writes the rows of any user table with a single
//!   integer primary key.
//! - `FeatureDao` adds geometry handling for feature tables.
//! - `TileDao` adds tile lookup and zoom level resolution for tile pyramids.
//! - `Value` represents a single column value of a row.
//!
//! Accessors are built from a table name or from a metadata record:
//!
//! - `Gpkg::feature_dao(name)` / `Gpkg::feature_dao_for_contents(&contents)`
//! - `Gpkg::tile_dao(name)` / `Gpkg::tile_dao_for_contents(&contents)`
//! - `Gpkg::user_dao(name)` for attribute tables
//!
//! Queries return a `UserQuery` that owns the prepared statement. Its
//! `cursor()` walks the result rows one at a time, so only the current row is
//! held in memory.
//!
//! ## Usage
//!
//! ```
//! use rusqlite_gpkg_access::{ColumnSpec, DataType, Dimension, GeometryType, Gpkg, Value};
//!
//! let gpkg = Gpkg::new_in_memory()?;
//! let dao = gpkg.create_feature_table(
//!     "cities",
//!     "geom",
//!     GeometryType::Point,
//!     Dimension::Xy,
//!     4326,
//!     &[ColumnSpec::new("name", DataType::Text).max(64)],
//! )?;
//!
//! let id = dao.insert_geometry(
//!     &geo_types::Point::new(139.7, 35.7),
//!     &[("name", Value::from("Tokyo"))],
//! )?;
//!
//! let mut query = dao.query_for_eq("name", "Tokyo")?;
//! let mut cursor = query.cursor()?;
//! while cursor.advance()? {
//!     let city = cursor.current_row().expect("row after advance");
//!     assert_eq!(city.id(), Some(id));
//!     let geometry = city.geometry()?.expect("stored geometry");
//!     assert_eq!(geometry.srs_id(), 4326);
//! }
//! # Ok::<(), rusqlite_gpkg_access::GpkgError>(())
//! ```
//!
//! Values convert with `try_into()`. `NULL` converts to `None` when the target
//! is an `Option<T>` and is an error otherwise:
//!
//! ```
//! use rusqlite_gpkg_access::Value;
//!
//! let value = Value::Null;
//! let maybe_i64: Option<i64> = value.try_into()?;
//! assert_eq!(maybe_i64, None);
//! # Ok::<(), rusqlite_gpkg_access::GpkgError>(())
//! ```
//!
//! ## Writes
//!
//! Every value written is checked against the declared column type before it
//! reaches SQLite. Integer values are only accepted by columns at least as
//! wide, text and blobs must fit the declared maximum length, and geometry
//! columns only take geometry values. Failures carry an [`ErrorKind`] so
//! callers can tell constraint violations from missing tables or broken
//! metadata.
mod conversions;
mod error;
pub mod gpkg;
mod ogc_sql;
pub mod projection;
mod types;

pub use error::{ErrorKind, GpkgError, Result};
pub use gpkg::{
    FeatureDao, FeatureRow, GeometryData, Gpkg, TableKind, TileDao, TileRow, UserCursor, UserDao,
    UserQuery, UserRow, UserTable,
};
pub use projection::{BoundingBox, ProjProjection, Projection};
pub use types::{ColumnSpec, DataType, Value};

// Re-export types used in public signatures to keep the public API stable.
pub use wkb::reader::{Dimension, GeometryType};
