use crate::conversions::is_exact_f64;
use crate::error::GpkgError;
use crate::gpkg::GeometryData;

/// Semantic column type of a user table column.
///
/// Mirrors the GeoPackage data types: `TINYINT` is `Int8`, `SMALLINT` is
/// `Int16`, `MEDIUMINT` is `Int32`, `INT`/`INTEGER` are `Int64`, `FLOAT` is
/// `Float32` and `DOUBLE`/`REAL` are `Float64`. Geometry columns are `Blob`
/// columns flagged as geometry on the [`UserColumn`](crate::UserColumn).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Text,
    Blob,
}

impl DataType {
    pub fn name(self) -> &'static str {
        match self {
            DataType::Boolean => "boolean",
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Text => "text",
            DataType::Blob => "blob",
        }
    }
}

/// Column definition used when creating a user table.
#[derive(Clone, Debug)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: DataType,
    pub not_null: bool,
    pub max: Option<u32>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            not_null: false,
            max: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn max(mut self, max: u32) -> Self {
        self.max = Some(max);
        self
    }
}

/// Owned dynamic value of a single column in a user row.
///
/// The variant is fixed when the value is built, so write validation matches
/// on the tag instead of inspecting the value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Blob(Vec<u8>),
    Geometry(GeometryData),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int8(_) => "int8",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Geometry(_) => "geometry",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Equality that compares numbers by value across widths, so an
    /// `Int16(7)` equals the `Int32(7)` read back from a MEDIUMINT column.
    /// Non-numeric values compare as with `==`.
    pub fn numeric_eq(&self, other: &Value) -> bool {
        match (
            self.as_integer(),
            other.as_integer(),
            self.as_float(),
            other.as_float(),
        ) {
            (Some(a), Some(b), _, _) => a == b,
            (Some(i), _, _, Some(f)) | (_, Some(i), Some(f), _) => {
                is_exact_f64(i) && i as f64 == f
            }
            (_, _, Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Int8(v) => Some((*v).into()),
            Value::Int16(v) => Some((*v).into()),
            Value::Int32(v) => Some((*v).into()),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some((*v).into()),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    fn mismatch(&self, expected: &'static str) -> GpkgError {
        GpkgError::ValueTypeMismatch {
            column: None,
            expected,
            actual: self.type_name(),
        }
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from_for_value!(
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    String => Text,
    Vec<u8> => Blob,
    GeometryData => Geometry,
);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Blob(value.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Value::Null,
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int8(v) => Ok(v.into()),
            Value::Int16(v) => Ok(v.into()),
            Value::Int32(v) => Ok(v.into()),
            Value::Int64(v) => Ok(v),
            other => Err(other.mismatch("i64")),
        }
    }
}

impl TryFrom<Value> for i32 {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let wide = i64::try_from(value)?;
        i32::try_from(wide).map_err(|_| GpkgError::ValueOutOfRange { target: "i32" })
    }
}

impl TryFrom<Value> for f64 {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Float32(v) => Ok(v.into()),
            Value::Float64(v) => Ok(v),
            other => Err(other.mismatch("f64")),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(other.mismatch("bool")),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(other.mismatch("text")),
        }
    }
}

impl TryFrom<Value> for Vec<u8> {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Blob(v) => Ok(v),
            other => Err(other.mismatch("blob")),
        }
    }
}

impl TryFrom<Value> for GeometryData {
    type Error = GpkgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Geometry(v) => Ok(v),
            other => Err(other.mismatch("geometry")),
        }
    }
}

macro_rules! impl_try_from_for_option {
    ($($ty:ty),* $(,)?) => {
        $(
            impl TryFrom<Value> for Option<$ty> {
                type Error = GpkgError;

                fn try_from(value: Value) -> Result<Self, Self::Error> {
                    match value {
                        Value::Null => Ok(None),
                        other => <$ty>::try_from(other).map(Some),
                    }
                }
            }
        )*
    };
}

impl_try_from_for_option!(i64, i32, f64, bool, String, Vec<u8>, GeometryData);

#[cfg(test)]
mod tests {
    use super::Value;
    use crate::Result;
    use crate::error::GpkgError;

    #[test]
    fn widening_integer_extraction() -> Result<()> {
        let v: i64 = Value::Int8(-3).try_into()?;
        assert_eq!(v, -3);
        let v: i32 = Value::Int64(42).try_into()?;
        assert_eq!(v, 42);
        Ok(())
    }

    #[test]
    fn narrowing_out_of_range_fails() {
        let err = i32::try_from(Value::Int64(i64::MAX)).expect_err("out of range");
        assert!(matches!(err, GpkgError::ValueOutOfRange { target: "i32" }));
    }

    #[test]
    fn null_converts_to_none() -> Result<()> {
        let v: Option<String> = Value::Null.try_into()?;
        assert_eq!(v, None);
        let v: Option<String> = Value::from("alpha").try_into()?;
        assert_eq!(v.as_deref(), Some("alpha"));
        Ok(())
    }

    #[test]
    fn mismatched_extraction_reports_types() {
        let err = bool::try_from(Value::Text("yes".to_string())).expect_err("mismatch");
        match err {
            GpkgError::ValueTypeMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, "bool");
                assert_eq!(actual, "text");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn option_into_value() {
        assert_eq!(Value::from(Option::<i64>::None), Value::Null);
        assert_eq!(Value::from(Some(2.5_f64)), Value::Float64(2.5));
    }

    #[test]
    fn numeric_eq_ignores_width() {
        assert!(Value::Int16(7).numeric_eq(&Value::Int32(7)));
        assert!(Value::Int64(1 << 53).numeric_eq(&Value::Float64(9007199254740992.0)));
        assert!(!Value::Int64((1 << 53) + 1).numeric_eq(&Value::Float64(9007199254740992.0)));
        assert!(Value::Float32(1.5).numeric_eq(&Value::Float64(1.5)));
        assert!(!Value::Int8(1).numeric_eq(&Value::Bool(true)));
        assert!(Value::from("a").numeric_eq(&Value::from("a")));
    }
}
