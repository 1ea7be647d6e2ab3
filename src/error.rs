use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Crate error type for GeoPackage operations.
#[derive(Debug)]
pub enum GpkgError {
    /// Wraps errors returned by `rusqlite`.
    Sql(rusqlite::Error),
    /// Wraps errors returned by the `wkb` crate.
    Wkb(wkb::error::WkbError),
    /// The GeoPackage file to open does not exist.
    PathNotFound { path: PathBuf },
    /// The GeoPackage file to create already exists.
    PathAlreadyExists { path: PathBuf },
    /// A geometry type in metadata could not be mapped to a supported WKB geometry type.
    UnsupportedGeometryType(String),
    /// A column type declared in SQLite metadata is not supported by this crate.
    UnsupportedColumnType {
        table: String,
        column: String,
        declared_type: String,
    },
    /// Invalid or mixed `z` / `m` dimension flags in GeoPackage metadata.
    InvalidDimension { z: i8, m: i8 },
    /// GeoPackage geometry blob does not start with the `GP` magic bytes.
    InvalidGpkgGeometryMagic([u8; 2]),
    /// Invalid GeoPackage geometry flags byte.
    InvalidGpkgGeometryFlags(u8),
    /// GeoPackage geometry blob is too short for the fixed header.
    InvalidGpkgGeometryLength { len: usize, minimum: usize },
    /// GeoPackage geometry blob is too short for the declared envelope payload.
    InvalidGpkgGeometryEnvelope { len: usize, required: usize },
    /// Table schema has multiple primary key columns, which is unsupported.
    CompositePrimaryKeyUnsupported { table: String },
    /// Table schema has no primary key column.
    MissingPrimaryKeyColumn { table: String },
    /// Feature table schema has no geometry column.
    MissingGeometryColumn { table: String },
    /// Table schema declares more than one geometry column.
    MultipleGeometryColumns { table: String },
    /// Two columns in the same table share a name.
    DuplicateColumnName { table: String, column: String },
    /// Column indices must be dense and zero-based.
    ColumnIndexMismatch {
        table: String,
        column: String,
        expected: usize,
        got: usize,
    },
    /// A column the table type requires is absent.
    MissingRequiredColumn { table: String, column: &'static str },
    /// The column name or index does not exist in the table.
    NoSuchColumn { table: String, column: String },
    /// Dynamic `Value` type did not match the expected conversion target or column type.
    ValueTypeMismatch {
        column: Option<String>,
        expected: &'static str,
        actual: &'static str,
    },
    /// Numeric conversion failed because the value is out of range.
    ValueOutOfRange { target: &'static str },
    /// Text or blob value is longer than the column's declared maximum.
    ValueTooLong {
        column: String,
        len: usize,
        max: u32,
    },
    /// The value has no storage mapping for the column.
    UnsupportedValue {
        column: String,
        value_type: &'static str,
    },
    /// Update requires a row with a primary key value.
    MissingRowId { table: String },
    /// No metadata row matched the table name.
    TableNotFound {
        table: String,
        metadata: &'static str,
    },
    /// More than one metadata row matched a table name that must be unique.
    AmbiguousTable {
        table: String,
        metadata: &'static str,
        count: usize,
    },
    /// The table has no `gpkg_contents` row.
    MissingContents { table: String },
    /// Referenced `srs_id` does not exist in `gpkg_spatial_ref_sys`.
    MissingSpatialRefSysId { srs_id: i32 },
    /// A features table has no `gpkg_geometry_columns` row.
    MissingGeometryColumns { table: String },
    /// A tiles table has no `gpkg_tile_matrix_set` row.
    MissingTileMatrixSet { table: String },
    /// A table with the same name already exists.
    TableAlreadyExists { table: String },
    /// The coordinate reference system is not in the projection catalog.
    UnsupportedProjection { epsg: i32 },
    /// Coordinate transformation failed.
    Projection(String),
    ReadOnly,
}

/// Coarse error category, one per failure class of the access layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Schema,
    Constraint,
    UnsupportedValue,
    NotFound,
    Ambiguity,
    Integrity,
    Storage,
    Geometry,
    Projection,
    Conversion,
    ReadOnly,
}

impl GpkgError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Sql(_) | Self::PathNotFound { .. } | Self::PathAlreadyExists { .. } => {
                ErrorKind::Storage
            }
            Self::Wkb(_)
            | Self::UnsupportedGeometryType(_)
            | Self::InvalidDimension { .. }
            | Self::InvalidGpkgGeometryMagic(_)
            | Self::InvalidGpkgGeometryFlags(_)
            | Self::InvalidGpkgGeometryLength { .. }
            | Self::InvalidGpkgGeometryEnvelope { .. } => ErrorKind::Geometry,
            Self::UnsupportedColumnType { .. }
            | Self::CompositePrimaryKeyUnsupported { .. }
            | Self::MissingPrimaryKeyColumn { .. }
            | Self::MissingGeometryColumn { .. }
            | Self::MultipleGeometryColumns { .. }
            | Self::DuplicateColumnName { .. }
            | Self::ColumnIndexMismatch { .. }
            | Self::MissingRequiredColumn { .. }
            | Self::NoSuchColumn { .. }
            | Self::TableAlreadyExists { .. } => ErrorKind::Schema,
            Self::ValueTypeMismatch { column: Some(_), .. }
            | Self::ValueTooLong { .. }
            | Self::MissingRowId { .. } => ErrorKind::Constraint,
            Self::ValueTypeMismatch { column: None, .. } | Self::ValueOutOfRange { .. } => {
                ErrorKind::Conversion
            }
            Self::UnsupportedValue { .. } => ErrorKind::UnsupportedValue,
            Self::TableNotFound { .. } => ErrorKind::NotFound,
            Self::AmbiguousTable { .. } => ErrorKind::Ambiguity,
            Self::MissingContents { .. }
            | Self::MissingSpatialRefSysId { .. }
            | Self::MissingGeometryColumns { .. }
            | Self::MissingTileMatrixSet { .. } => ErrorKind::Integrity,
            Self::UnsupportedProjection { .. } | Self::Projection(_) => ErrorKind::Projection,
            Self::ReadOnly => ErrorKind::ReadOnly,
        }
    }
}

impl fmt::Display for GpkgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sql(err) => write!(f, "{err}"),
            Self::Wkb(err) => write!(f, "{err}"),
            Self::PathNotFound { path } => {
                write!(f, "GeoPackage file does not exist: {}", path.display())
            }
            Self::PathAlreadyExists { path } => {
                write!(f, "GeoPackage file already exists: {}", path.display())
            }
            Self::UnsupportedGeometryType(ty) => write!(f, "unsupported geometry type: {ty}"),
            Self::UnsupportedColumnType {
                table,
                column,
                declared_type,
            } => write!(
                f,
                "unsupported column type for column '{table}.{column}': {declared_type}"
            ),
            Self::InvalidDimension { z, m } => {
                write!(f, "invalid or mixed geometry dimension (z={z}, m={m})")
            }
            Self::InvalidGpkgGeometryMagic(magic) => {
                write!(f, "invalid gpkg geometry magic: {magic:02x?}")
            }
            Self::InvalidGpkgGeometryFlags(flags) => {
                write!(f, "invalid gpkg geometry flags: {flags:#04x}")
            }
            Self::InvalidGpkgGeometryLength { len, minimum } => {
                write!(
                    f,
                    "invalid gpkg geometry length: got {len} bytes, expected at least {minimum}"
                )
            }
            Self::InvalidGpkgGeometryEnvelope { len, required } => {
                write!(
                    f,
                    "invalid gpkg geometry envelope length: got {len} bytes, required {required}"
                )
            }
            Self::CompositePrimaryKeyUnsupported { table } => write!(
                f,
                "composite primary keys are not supported yet for table: {table}"
            ),
            Self::MissingPrimaryKeyColumn { table } => {
                write!(f, "no primary key column found for table: {table}")
            }
            Self::MissingGeometryColumn { table } => {
                write!(f, "no geometry column found for table: {table}")
            }
            Self::MultipleGeometryColumns { table } => {
                write!(f, "more than one geometry column declared for table: {table}")
            }
            Self::DuplicateColumnName { table, column } => {
                write!(f, "duplicate column name '{column}' in table: {table}")
            }
            Self::ColumnIndexMismatch {
                table,
                column,
                expected,
                got,
            } => write!(
                f,
                "column '{table}.{column}' has index {got}, expected {expected}"
            ),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "table {table} is missing required column '{column}'")
            }
            Self::NoSuchColumn { table, column } => {
                write!(f, "no column '{column}' in table: {table}")
            }
            Self::ValueTypeMismatch {
                column: Some(column),
                expected,
                actual,
            } => write!(
                f,
                "illegal value for column '{column}': expected {expected}, got {actual}"
            ),
            Self::ValueTypeMismatch {
                column: None,
                expected,
                actual,
            } => write!(f, "expected {expected}, got {actual}"),
            Self::ValueOutOfRange { target } => {
                write!(f, "value out of range for {target}")
            }
            Self::ValueTooLong { column, len, max } => write!(
                f,
                "value is larger than the column max. size: {len}, max: {max}, column: {column}"
            ),
            Self::UnsupportedValue { column, value_type } => write!(
                f,
                "unsupported value for column '{column}': {value_type}"
            ),
            Self::MissingRowId { table } => {
                write!(f, "row has no primary key value for table: {table}")
            }
            Self::TableNotFound { table, metadata } => {
                write!(f, "no {metadata} entry exists for table name: {table}")
            }
            Self::AmbiguousTable {
                table,
                metadata,
                count,
            } => write!(
                f,
                "more than one {metadata} entry matched table name: {table}, count: {count}"
            ),
            Self::MissingContents { table } => {
                write!(f, "table {table} has no gpkg_contents entry")
            }
            Self::MissingSpatialRefSysId { srs_id } => {
                write!(f, "srs_id {srs_id} not found in gpkg_spatial_ref_sys")
            }
            Self::MissingGeometryColumns { table } => {
                write!(f, "table {table} has no gpkg_geometry_columns entry")
            }
            Self::MissingTileMatrixSet { table } => {
                write!(f, "table {table} has no gpkg_tile_matrix_set entry")
            }
            Self::TableAlreadyExists { table } => write!(f, "table already exists: {table}"),
            Self::UnsupportedProjection { epsg } => {
                write!(f, "EPSG:{epsg} is not in the projection catalog")
            }
            Self::Projection(err) => write!(f, "projection error: {err}"),
            Self::ReadOnly => write!(f, "operation not allowed on read-only connection"),
        }
    }
}

impl Error for GpkgError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sql(err) => Some(err),
            Self::Wkb(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for GpkgError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sql(err)
    }
}

impl From<wkb::error::WkbError> for GpkgError {
    fn from(err: wkb::error::WkbError) -> Self {
        Self::Wkb(err)
    }
}

pub type Result<T> = std::result::Result<T, GpkgError>;
