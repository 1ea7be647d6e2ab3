use super::geometry::GeometryData;
use super::table::{UserColumn, UserTable};
use crate::conversions::is_exact_f64;
use crate::error::{GpkgError, Result};
use crate::types::{DataType, Value};
use rusqlite::types::Value as SqlValue;
use std::sync::Arc;

/// A row of a user table: one [`Value`] per column, in column index order.
///
/// Geometry columns hold the raw stored blob until [`UserRow::value`] is
/// called, so rows that are skipped never pay for geometry decoding.
#[derive(Clone, Debug)]
pub struct UserRow {
    table: Arc<UserTable>,
    values: Vec<Value>,
}

impl UserRow {
    /// Empty row bound to `table`, every value `Null`.
    pub fn new(table: Arc<UserTable>) -> Self {
        let values = vec![Value::Null; table.column_count()];
        Self { table, values }
    }

    pub(crate) fn from_values(table: Arc<UserTable>, values: Vec<Value>) -> Self {
        debug_assert_eq!(table.column_count(), values.len());
        Self { table, values }
    }

    pub fn table(&self) -> &Arc<UserTable> {
        &self.table
    }

    pub(crate) fn values_mut(&mut self) -> &mut [Value] {
        &mut self.values
    }

    pub fn column_count(&self) -> usize {
        self.values.len()
    }

    /// Value of the named column. Geometry blobs are decoded on the way out;
    /// a null or empty blob reads as `Null`.
    pub fn value(&self, column: &str) -> Result<Value> {
        let index = self.table.column_index(column)?;
        self.value_at(index)
    }

    pub fn value_at(&self, index: usize) -> Result<Value> {
        let value = self.raw_value_at(index)?;
        if self.table.geometry_index() != Some(index) {
            return Ok(value.clone());
        }
        match value {
            Value::Blob(bytes) => Ok(GeometryData::from_blob(Some(bytes.as_slice()))?
                .map(Value::Geometry)
                .unwrap_or(Value::Null)),
            other => Ok(other.clone()),
        }
    }

    /// The value as stored, without geometry decoding.
    pub fn raw_value(&self, column: &str) -> Result<&Value> {
        let index = self.table.column_index(column)?;
        self.raw_value_at(index)
    }

    pub fn raw_value_at(&self, index: usize) -> Result<&Value> {
        self.values.get(index).ok_or_else(|| self.no_such_index(index))
    }

    pub fn set_value(&mut self, column: &str, value: impl Into<Value>) -> Result<()> {
        let index = self.table.column_index(column)?;
        self.set_value_at(index, value)
    }

    pub fn set_value_at(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(self.no_such_index(index)),
        }
    }

    /// Primary key value, if the row has been stored or assigned one.
    pub fn id(&self) -> Option<i64> {
        match &self.values[self.table.primary_key_index()] {
            Value::Int8(v) => Some((*v).into()),
            Value::Int16(v) => Some((*v).into()),
            Value::Int32(v) => Some((*v).into()),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn set_id(&mut self, id: i64) {
        let index = self.table.primary_key_index();
        self.values[index] = Value::Int64(id);
    }

    /// Validated storage values of every non primary key column, in column
    /// order, ready to bind to an insert or update. `Null` is kept as an
    /// explicit SQL NULL.
    pub fn to_write_values(&self) -> Result<Vec<(&str, SqlValue)>> {
        let primary_key = self.table.primary_key_index();
        self.table
            .columns()
            .iter()
            .zip(&self.values)
            .filter(|(column, _)| column.index != primary_key)
            .map(|(column, value)| Ok((column.name.as_str(), encode_value(column, value)?)))
            .collect()
    }

    fn no_such_index(&self, index: usize) -> GpkgError {
        GpkgError::NoSuchColumn {
            table: self.table.name().to_string(),
            column: index.to_string(),
        }
    }
}

impl AsRef<UserRow> for UserRow {
    fn as_ref(&self) -> &UserRow {
        self
    }
}

/// Validate `value` against the declared type of `column` and convert it to
/// its storage representation.
///
/// Numeric values are only accepted by columns that read them back without
/// loss (an `Int32` fits `Int32` and `Int64` columns, never `Int16`).
pub(crate) fn encode_value(column: &UserColumn, value: &Value) -> Result<SqlValue> {
    if column.geometry {
        return match value {
            Value::Null => Ok(SqlValue::Null),
            Value::Geometry(geometry) => Ok(SqlValue::Blob(geometry.to_bytes())),
            other => Err(unsupported(column, other)),
        };
    }

    use DataType::*;
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Int8(v) => {
            accept(column, value, &[Int8, Int16, Int32, Int64])?;
            Ok(SqlValue::Integer((*v).into()))
        }
        Value::Int16(v) => {
            accept(column, value, &[Int16, Int32, Int64])?;
            Ok(SqlValue::Integer((*v).into()))
        }
        Value::Int32(v) => {
            accept(column, value, &[Int32, Int64])?;
            Ok(SqlValue::Integer((*v).into()))
        }
        // a DOUBLE column stores the value as REAL, so it must be exact there
        Value::Int64(v) if column.data_type == Float64 && !is_exact_f64(*v) => {
            Err(mismatch(column, value))
        }
        Value::Int64(v) => {
            accept(column, value, &[Int64, Float64])?;
            Ok(SqlValue::Integer(*v))
        }
        Value::Float32(v) => {
            accept(column, value, &[Float32])?;
            Ok(SqlValue::Real((*v).into()))
        }
        Value::Float64(v) => {
            accept(column, value, &[Float64])?;
            Ok(SqlValue::Real(*v))
        }
        Value::Text(v) => {
            accept(column, value, &[Text])?;
            check_max(column, v.chars().count())?;
            Ok(SqlValue::Text(v.clone()))
        }
        Value::Blob(v) => {
            accept(column, value, &[Blob])?;
            check_max(column, v.len())?;
            Ok(SqlValue::Blob(v.clone()))
        }
        // stored as a 0/1 integer
        Value::Bool(v) => {
            accept(column, value, &[Boolean])?;
            Ok(SqlValue::Integer(i64::from(*v)))
        }
        Value::Geometry(_) => Err(unsupported(column, value)),
    }
}

fn accept(column: &UserColumn, value: &Value, accepted: &[DataType]) -> Result<()> {
    if accepted.contains(&column.data_type) {
        Ok(())
    } else {
        Err(mismatch(column, value))
    }
}

fn mismatch(column: &UserColumn, value: &Value) -> GpkgError {
    GpkgError::ValueTypeMismatch {
        column: Some(column.name.clone()),
        expected: column.data_type.name(),
        actual: value.type_name(),
    }
}

fn check_max(column: &UserColumn, len: usize) -> Result<()> {
    match column.max {
        Some(max) if len > max as usize => Err(GpkgError::ValueTooLong {
            column: column.name.clone(),
            len,
            max,
        }),
        _ => Ok(()),
    }
}

fn unsupported(column: &UserColumn, value: &Value) -> GpkgError {
    GpkgError::UnsupportedValue {
        column: column.name.clone(),
        value_type: value.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::gpkg::table::TableKind;

    fn column(index: usize, name: &str, data_type: DataType) -> UserColumn {
        UserColumn {
            index,
            name: name.to_string(),
            data_type,
            max: None,
            not_null: false,
            primary_key: index == 0,
            geometry: false,
        }
    }

    fn table() -> Arc<UserTable> {
        let mut geom = column(4, "geom", DataType::Blob);
        geom.geometry = true;
        let mut name = column(1, "name", DataType::Text);
        name.max = Some(10);
        let table = UserTable::new(
            "places",
            TableKind::Features,
            vec![
                column(0, "fid", DataType::Int64),
                name,
                column(2, "population", DataType::Int32),
                column(3, "visited", DataType::Boolean),
                geom,
            ],
        )
        .expect("valid table");
        Arc::new(table)
    }

    #[test]
    fn text_max_length_is_enforced() -> Result<()> {
        let mut row = UserRow::new(table());
        row.set_value("name", "abcdefghij")?;
        assert!(row.to_write_values().is_ok());

        row.set_value("name", "abcdefghijk")?;
        let err = row.to_write_values().expect_err("too long");
        assert_eq!(err.kind(), ErrorKind::Constraint);
        assert!(matches!(err, GpkgError::ValueTooLong { len: 11, max: 10, .. }));
        Ok(())
    }

    #[test]
    fn numeric_width_must_not_truncate() -> Result<()> {
        let mut row = UserRow::new(table());
        row.set_value("population", 7_i16)?;
        assert!(row.to_write_values().is_ok());

        row.set_value("population", 7_i64)?;
        let err = row.to_write_values().expect_err("i64 into MEDIUMINT");
        assert!(matches!(
            err,
            GpkgError::ValueTypeMismatch {
                expected: "int32",
                actual: "int64",
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn int64_into_double_must_be_exact() {
        let score = column(1, "score", DataType::Float64);
        for v in [0, 1 << 53, -(1 << 53), 1 << 60, i64::MIN] {
            assert_eq!(encode_value(&score, &Value::Int64(v)).ok(), Some(SqlValue::Integer(v)));
        }
        for v in [(1 << 53) + 1, -(1 << 53) - 1, i64::MAX] {
            let err = encode_value(&score, &Value::Int64(v)).expect_err("inexact in f64");
            assert!(matches!(
                err,
                GpkgError::ValueTypeMismatch {
                    expected: "float64",
                    actual: "int64",
                    ..
                }
            ));
        }
    }

    #[test]
    fn write_values_skip_primary_key_and_keep_nulls() -> Result<()> {
        let mut row = UserRow::new(table());
        row.set_id(9);
        row.set_value("visited", true)?;
        let values = row.to_write_values()?;
        let names: Vec<&str> = values.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["name", "population", "visited", "geom"]);
        assert_eq!(values[0].1, SqlValue::Null);
        assert_eq!(values[2].1, SqlValue::Integer(1));
        Ok(())
    }

    #[test]
    fn geometry_column_rules() -> Result<()> {
        let mut row = UserRow::new(table());
        row.set_value("geom", vec![1_u8, 2, 3])?;
        let err = row.to_write_values().expect_err("blob into geometry");
        assert_eq!(err.kind(), ErrorKind::UnsupportedValue);

        let point = geo_types::Point::new(1.0, 2.0);
        let geometry = GeometryData::from_geometry(4326, &point)?;
        row.set_value("name", geometry.clone())?;
        let err = row.to_write_values().expect_err("geometry into text");
        assert_eq!(err.kind(), ErrorKind::UnsupportedValue);

        row.set_value("name", Value::Null)?;
        row.set_value("geom", geometry.clone())?;
        let values = row.to_write_values()?;
        assert_eq!(values[3].1, SqlValue::Blob(geometry.to_bytes()));
        Ok(())
    }

    #[test]
    fn geometry_is_decoded_on_read() -> Result<()> {
        let point = geo_types::Point::new(3.0, 4.0);
        let geometry = GeometryData::from_geometry(4326, &point)?;
        let mut row = UserRow::new(table());
        row.set_value_at(4, geometry.to_bytes())?;

        assert!(matches!(row.raw_value("geom")?, Value::Blob(_)));
        assert_eq!(row.value("geom")?, Value::Geometry(geometry));

        row.set_value_at(4, Vec::<u8>::new())?;
        assert_eq!(row.value("geom")?, Value::Null);
        Ok(())
    }

    #[test]
    fn unknown_columns_fail() {
        let mut row = UserRow::new(table());
        assert!(matches!(
            row.set_value("nope", 1_i64),
            Err(GpkgError::NoSuchColumn { .. })
        ));
        assert!(row.value_at(17).is_err());
    }
}
