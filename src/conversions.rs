use crate::error::GpkgError;
use crate::types::{DataType, Value};
use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, ValueRef};

#[inline]
pub(crate) fn geometry_type_to_str(geometry_type: wkb::reader::GeometryType) -> &'static str {
    match geometry_type {
        wkb::reader::GeometryType::GeometryCollection => "GEOMETRYCOLLECTION",
        wkb::reader::GeometryType::Point => "POINT",
        wkb::reader::GeometryType::LineString => "LINESTRING",
        wkb::reader::GeometryType::Polygon => "POLYGON",
        wkb::reader::GeometryType::MultiPoint => "MULTIPOINT",
        wkb::reader::GeometryType::MultiLineString => "MULTILINESTRING",
        wkb::reader::GeometryType::MultiPolygon => "MULTIPOLYGON",
        _ => "GEOMETRY",
    }
}

#[inline]
pub(crate) fn geometry_type_from_str(
    geometry_type_str: &str,
) -> Result<wkb::reader::GeometryType, GpkgError> {
    let s = geometry_type_str;
    if s.eq_ignore_ascii_case("GEOMETRY") || s.eq_ignore_ascii_case("GEOMETRYCOLLECTION") {
        Ok(wkb::reader::GeometryType::GeometryCollection)
    } else if s.eq_ignore_ascii_case("POINT") {
        Ok(wkb::reader::GeometryType::Point)
    } else if s.eq_ignore_ascii_case("LINESTRING") {
        Ok(wkb::reader::GeometryType::LineString)
    } else if s.eq_ignore_ascii_case("POLYGON") {
        Ok(wkb::reader::GeometryType::Polygon)
    } else if s.eq_ignore_ascii_case("MULTIPOINT") {
        Ok(wkb::reader::GeometryType::MultiPoint)
    } else if s.eq_ignore_ascii_case("MULTILINESTRING") {
        Ok(wkb::reader::GeometryType::MultiLineString)
    } else if s.eq_ignore_ascii_case("MULTIPOLYGON") {
        Ok(wkb::reader::GeometryType::MultiPolygon)
    } else {
        Err(GpkgError::UnsupportedGeometryType(
            geometry_type_str.to_string(),
        ))
    }
}

#[inline]
pub(crate) fn dimension_to_zm(dimension: wkb::reader::Dimension) -> (i8, i8) {
    match dimension {
        wkb::reader::Dimension::Xy => (0, 0),
        wkb::reader::Dimension::Xyz => (1, 0),
        wkb::reader::Dimension::Xym => (0, 1),
        wkb::reader::Dimension::Xyzm => (1, 1),
    }
}

#[inline]
pub(crate) fn dimension_from_zm(z: i8, m: i8) -> Result<wkb::reader::Dimension, GpkgError> {
    match (z, m) {
        (0, 0) => Ok(wkb::reader::Dimension::Xy),
        (1, 0) => Ok(wkb::reader::Dimension::Xyz),
        (0, 1) => Ok(wkb::reader::Dimension::Xym),
        (1, 1) => Ok(wkb::reader::Dimension::Xyzm),
        // z and m may also be 2 ("optional"), which has no single WKB dimension.
        _ => Err(GpkgError::InvalidDimension { z, m }),
    }
}

#[inline]
pub(crate) fn data_type_to_str(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Boolean => "BOOLEAN",
        DataType::Int8 => "TINYINT",
        DataType::Int16 => "SMALLINT",
        DataType::Int32 => "MEDIUMINT",
        DataType::Int64 => "INTEGER",
        DataType::Float32 => "FLOAT",
        DataType::Float64 => "DOUBLE",
        DataType::Text => "TEXT",
        DataType::Blob => "BLOB",
    }
}

#[inline]
pub(crate) fn is_geometry_type_name(s: &str) -> bool {
    s.eq_ignore_ascii_case("GEOMETRY")
        || s.eq_ignore_ascii_case("POINT")
        || s.eq_ignore_ascii_case("LINESTRING")
        || s.eq_ignore_ascii_case("POLYGON")
        || s.eq_ignore_ascii_case("MULTIPOINT")
        || s.eq_ignore_ascii_case("MULTILINESTRING")
        || s.eq_ignore_ascii_case("MULTIPOLYGON")
        || s.eq_ignore_ascii_case("GEOMETRYCOLLECTION")
}

/// Parse a declared SQLite column type such as `TEXT(10)` into its data type
/// and optional maximum length.
// cf. https://www.geopackage.org/spec140/index.html#_sqlite_container
pub(crate) fn data_type_from_str(declared_type: &str) -> Option<(DataType, Option<u32>)> {
    let declared_type = declared_type.trim();
    let (s, max) = match declared_type.split_once('(') {
        Some((name, rest)) => {
            let max = rest.strip_suffix(')')?.trim().parse::<u32>().ok()?;
            (name.trim(), Some(max))
        }
        None => (declared_type, None),
    };

    let data_type = if s.eq_ignore_ascii_case("BOOLEAN") {
        DataType::Boolean
    } else if s.eq_ignore_ascii_case("TINYINT") {
        DataType::Int8
    } else if s.eq_ignore_ascii_case("SMALLINT") {
        DataType::Int16
    } else if s.eq_ignore_ascii_case("MEDIUMINT") {
        DataType::Int32
    } else if s.eq_ignore_ascii_case("INT") || s.eq_ignore_ascii_case("INTEGER") {
        DataType::Int64
    } else if s.eq_ignore_ascii_case("FLOAT") {
        DataType::Float32
    } else if s.eq_ignore_ascii_case("DOUBLE") || s.eq_ignore_ascii_case("REAL") {
        DataType::Float64
    } else if s.eq_ignore_ascii_case("TEXT")
        || s.eq_ignore_ascii_case("DATE")
        || s.eq_ignore_ascii_case("DATETIME")
    {
        DataType::Text
    } else if s.eq_ignore_ascii_case("BLOB") || is_geometry_type_name(s) {
        DataType::Blob
    } else {
        return None;
    };

    Some((data_type, max))
}

/// Decode a raw storage value into the typed value of a column with the given
/// declared type. Storage that disagrees with the declared type keeps its
/// natural variant.
pub(crate) fn value_from_storage(data_type: DataType, value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => match data_type {
            DataType::Boolean => Value::Bool(v != 0),
            DataType::Int8 => i8::try_from(v).map_or(Value::Int64(v), Value::Int8),
            DataType::Int16 => i16::try_from(v).map_or(Value::Int64(v), Value::Int16),
            DataType::Int32 => i32::try_from(v).map_or(Value::Int64(v), Value::Int32),
            DataType::Float32 if v as f32 as f64 == v as f64 && is_exact_f64(v) => {
                Value::Float32(v as f32)
            }
            DataType::Float64 if is_exact_f64(v) => Value::Float64(v as f64),
            _ => Value::Int64(v),
        },
        ValueRef::Real(v) => match data_type {
            DataType::Float32 if v as f32 as f64 == v => Value::Float32(v as f32),
            _ => Value::Float64(v),
        },
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

/// Whether `v` survives a trip through `f64` unchanged.
pub(crate) fn is_exact_f64(v: i64) -> bool {
    let f = v as f64;
    // i64::MAX rounds up to 2^63, which saturates back to i64::MAX
    f < i64::MAX as f64 && f as i64 == v
}

/// Binds a value as a query argument. Booleans bind as 0/1 and geometries as
/// GeoPackage binary blobs.
impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as SqlValue;

        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Bool(v) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*v))),
            Value::Int8(v) => ToSqlOutput::Owned(SqlValue::Integer((*v).into())),
            Value::Int16(v) => ToSqlOutput::Owned(SqlValue::Integer((*v).into())),
            Value::Int32(v) => ToSqlOutput::Owned(SqlValue::Integer((*v).into())),
            Value::Int64(v) => ToSqlOutput::Owned(SqlValue::Integer(*v)),
            Value::Float32(v) => ToSqlOutput::Owned(SqlValue::Real((*v).into())),
            Value::Float64(v) => ToSqlOutput::Owned(SqlValue::Real(*v)),
            Value::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::Blob(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
            Value::Geometry(v) => ToSqlOutput::Owned(SqlValue::Blob(v.to_bytes())),
        })
    }
}
