use super::cursor::{RowMapper, UserQuery};
use super::gpkg::Gpkg;
use super::row::UserRow;
use super::table::UserTable;
use crate::error::{GpkgError, Result};
use crate::ogc_sql::{quote_identifier, sql_count, sql_delete, sql_insert, sql_select, sql_update};
use crate::types::Value;
use std::sync::Arc;

/// Table-scoped data access over one user table.
///
/// Every read returns a [`UserQuery`] whose rows are produced by the
/// accessor's [`RowMapper`]. Where clauses are built from column names with
/// [`build_where`](Self::build_where) and friends, and their arguments are
/// always bound as parameters.
#[derive(Debug)]
pub struct UserDao<'a, M> {
    gpkg: &'a Gpkg,
    table: Arc<UserTable>,
    mapper: M,
}

impl<'a, M: RowMapper + Clone> UserDao<'a, M> {
    pub(crate) fn new(gpkg: &'a Gpkg, table: Arc<UserTable>, mapper: M) -> Self {
        Self {
            gpkg,
            table,
            mapper,
        }
    }

    pub fn gpkg(&self) -> &'a Gpkg {
        self.gpkg
    }

    pub fn table(&self) -> &Arc<UserTable> {
        &self.table
    }

    pub fn table_name(&self) -> &str {
        self.table.name()
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    /// An empty row bound to this table.
    pub fn new_row(&self) -> UserRow {
        UserRow::new(self.table.clone())
    }

    /// Rows whose `column` equals `value` (`IS NULL` for `Value::Null`).
    pub fn query_for_eq(&self, column: &str, value: impl Into<Value>) -> Result<UserQuery<'a, M>> {
        let value = value.into();
        self.table.column_index(column)?;
        let where_clause = Self::build_where(column, &value);
        let args = Self::build_where_args(std::slice::from_ref(&value));
        self.query(Some(&where_clause), &args, None)
    }

    /// Rows matching every `(column, value)` pair. No pairs scans the table.
    pub fn query_for_field_values(&self, fields: &[(&str, Value)]) -> Result<UserQuery<'a, M>> {
        if fields.is_empty() {
            return self.query_for_all();
        }

        let mut clauses = Vec::with_capacity(fields.len());
        let mut args = Vec::with_capacity(fields.len());
        for (column, value) in fields {
            self.table.column_index(column)?;
            clauses.push(Self::build_where(column, value));
            if !value.is_null() {
                args.push(value.clone());
            }
        }
        self.query(Some(&clauses.join(" AND ")), &args, None)
    }

    pub fn query_for_all(&self) -> Result<UserQuery<'a, M>> {
        self.query(None, &[], None)
    }

    /// Select every column of the table with a caller-built predicate.
    /// `args` bind positionally to the `?` placeholders of `where_clause`.
    pub fn query(
        &self,
        where_clause: Option<&str>,
        args: &[Value],
        order_by: Option<&str>,
    ) -> Result<UserQuery<'a, M>> {
        let sql = sql_select(
            self.table.name(),
            self.table.column_names(),
            where_clause,
            order_by,
        );
        tracing::trace!(table = self.table.name(), sql = %sql, args = args.len(), "query");

        let stmt = self.gpkg.connection().prepare_cached(&sql)?;
        Ok(UserQuery::new(
            stmt,
            args.to_vec(),
            self.table.clone(),
            self.mapper.clone(),
        ))
    }

    pub fn query_for_id(&self, id: i64) -> Result<Option<M::Row>> {
        let primary_key = self.table.primary_key().name.clone();
        self.query_for_eq(&primary_key, id)?.first()
    }

    pub fn count(&self, where_clause: Option<&str>, args: &[Value]) -> Result<i64> {
        let sql = sql_count(self.table.name(), where_clause);
        tracing::trace!(table = self.table.name(), sql = %sql, args = args.len(), "count");

        let mut stmt = self.gpkg.connection().prepare_cached(&sql)?;
        let count = stmt.query_row(rusqlite::params_from_iter(args.iter()), |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_all(&self) -> Result<i64> {
        self.count(None, &[])
    }

    /// Delete matching rows and return how many were removed.
    pub fn delete(&self, where_clause: Option<&str>, args: &[Value]) -> Result<usize> {
        self.ensure_writable()?;
        let sql = sql_delete(self.table.name(), where_clause);
        tracing::trace!(table = self.table.name(), sql = %sql, args = args.len(), "delete");

        let mut stmt = self.gpkg.connection().prepare_cached(&sql)?;
        Ok(stmt.execute(rusqlite::params_from_iter(args.iter()))?)
    }

    pub fn delete_by_id(&self, id: i64) -> Result<usize> {
        let where_clause = Self::build_where(&self.table.primary_key().name, &Value::Int64(id));
        self.delete(Some(&where_clause), &[Value::Int64(id)])
    }

    /// Insert a row and return the generated primary key. The row's own
    /// primary key value is not written.
    pub fn insert<R: AsRef<UserRow>>(&self, row: &R) -> Result<i64> {
        self.ensure_writable()?;
        let values = row.as_ref().to_write_values()?;
        let sql = sql_insert(self.table.name(), values.iter().map(|(name, _)| *name));
        tracing::trace!(table = self.table.name(), sql = %sql, args = values.len(), "insert");

        let conn = self.gpkg.connection();
        let mut stmt = conn.prepare_cached(&sql)?;
        stmt.execute(rusqlite::params_from_iter(values.iter().map(|(_, v)| v)))?;
        Ok(conn.last_insert_rowid())
    }

    /// Write every non primary key column of a stored row, keyed by its id.
    pub fn update<R: AsRef<UserRow>>(&self, row: &R) -> Result<usize> {
        self.ensure_writable()?;
        let row = row.as_ref();
        let id = row.id().ok_or_else(|| GpkgError::MissingRowId {
            table: self.table.name().to_string(),
        })?;
        let values = row.to_write_values()?;
        if values.is_empty() {
            return Ok(0);
        }

        let sql = sql_update(
            self.table.name(),
            values.iter().map(|(name, _)| *name),
            &self.table.primary_key().name,
        );
        tracing::trace!(table = self.table.name(), sql = %sql, args = values.len() + 1, "update");

        let mut args: Vec<rusqlite::types::Value> = values.into_iter().map(|(_, v)| v).collect();
        args.push(rusqlite::types::Value::Integer(id));
        let mut stmt = self.gpkg.connection().prepare_cached(&sql)?;
        Ok(stmt.execute(rusqlite::params_from_iter(args.iter()))?)
    }

    /// `"column" = ?`, or `"column" IS NULL` when `value` is `Null`.
    pub fn build_where(column: &str, value: &Value) -> String {
        if value.is_null() {
            format!("{} IS NULL", quote_identifier(column))
        } else {
            Self::build_where_op(column, value, "=")
        }
    }

    /// `"column" <op> ?`. A `Null` value turns `=` into `IS NULL` and any
    /// other operator into `IS NOT NULL`.
    pub fn build_where_op(column: &str, value: &Value, op: &str) -> String {
        match (value.is_null(), op) {
            (true, "=") => format!("{} IS NULL", quote_identifier(column)),
            (true, _) => format!("{} IS NOT NULL", quote_identifier(column)),
            (false, _) => format!("{} {op} ?", quote_identifier(column)),
        }
    }

    /// Bound arguments for predicates built from `values`. `Null` values
    /// become `IS [NOT] NULL` and take no argument.
    pub fn build_where_args(values: &[Value]) -> Vec<Value> {
        values.iter().filter(|v| !v.is_null()).cloned().collect()
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.gpkg.is_read_only() {
            return Err(GpkgError::ReadOnly);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpkg::cursor::UserRowMapper;
    use crate::types::{ColumnSpec, DataType};

    type Dao<'a> = UserDao<'a, UserRowMapper>;

    fn fixture(gpkg: &Gpkg) -> Result<Dao<'_>> {
        gpkg.create_attributes_table(
            "people",
            &[
                ColumnSpec::new("name", DataType::Text).max(10),
                ColumnSpec::new("age", DataType::Int32),
                ColumnSpec::new("score", DataType::Float64),
            ],
        )?;
        let dao = gpkg.user_dao("people")?;
        for (name, age, score) in [("ann", 31, 1.5), ("bob", 42, 2.5), ("cy", 31, 3.5)] {
            let mut row = dao.new_row();
            row.set_value("name", name)?;
            row.set_value("age", age)?;
            row.set_value("score", score)?;
            dao.insert(&row)?;
        }
        let mut row = dao.new_row();
        row.set_value("age", 50)?;
        dao.insert(&row)?;
        Ok(dao)
    }

    #[test]
    fn equality_queries() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = fixture(&gpkg)?;

        let rows = dao.query_for_eq("age", 31)?.collect_rows()?;
        let names: Vec<String> = rows
            .iter()
            .map(|row| row.value("name").and_then(String::try_from))
            .collect::<Result<_>>()?;
        assert_eq!(names, ["ann", "cy"]);

        let rows = dao.query_for_eq("name", Value::Null)?.collect_rows()?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value("age")?, Value::Int32(50));

        assert!(matches!(
            dao.query_for_eq("nope", 1),
            Err(GpkgError::NoSuchColumn { .. })
        ));
        Ok(())
    }

    #[test]
    fn field_values_are_conjunctive() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = fixture(&gpkg)?;

        let rows = dao
            .query_for_field_values(&[("age", Value::Int32(31)), ("name", "cy".into())])?
            .collect_rows()?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value("score")?, Value::Float64(3.5));

        let all = dao.query_for_field_values(&[])?.collect_rows()?;
        assert_eq!(all.len(), 4);
        Ok(())
    }

    #[test]
    fn custom_predicates_bind_arguments() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = fixture(&gpkg)?;

        let where_clause = Dao::build_where_op("age", &Value::Int32(35), ">");
        let args = Dao::build_where_args(&[Value::Int32(35)]);
        let mut query = dao.query(Some(&where_clause), &args, Some(r#""age" DESC"#))?;
        let ages: Vec<Value> = query
            .cursor()?
            .map(|row| row.and_then(|row| row.value("age")))
            .collect::<Result<_>>()?;
        assert_eq!(ages, [Value::Int32(50), Value::Int32(42)]);

        assert_eq!(dao.count(Some(&where_clause), &args)?, 2);
        assert_eq!(dao.count_all()?, 4);

        // a hostile value stays a bound argument
        let injected = dao.query_for_eq("name", "x' OR '1'='1")?.collect_rows()?;
        assert!(injected.is_empty());
        Ok(())
    }

    #[test]
    fn cursor_steps_forward_only() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = fixture(&gpkg)?;

        let mut query = dao.query(None, &[], Some(r#""id""#))?;
        let mut cursor = query.cursor()?;
        assert!(cursor.current_row().is_none());
        assert!(cursor.advance()?);
        let first = cursor.current_row().map(|row| row.id());
        assert_eq!(first, Some(Some(1)));
        let mut seen = 1;
        while cursor.advance()? {
            seen += 1;
        }
        assert_eq!(seen, 4);
        assert!(cursor.current_row().is_none());
        cursor.close();
        Ok(())
    }

    #[test]
    fn update_and_delete_by_id() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = fixture(&gpkg)?;

        let mut row = dao.query_for_id(2)?.expect("row 2 exists");
        row.set_value("score", 9.0)?;
        assert_eq!(dao.update(&row)?, 1);
        let row = dao.query_for_id(2)?.expect("row 2 exists");
        assert_eq!(row.value("score")?, Value::Float64(9.0));

        let err = dao.update(&dao.new_row()).expect_err("no id");
        assert!(matches!(err, GpkgError::MissingRowId { .. }));

        assert_eq!(dao.delete_by_id(2)?, 1);
        assert!(dao.query_for_id(2)?.is_none());
        assert_eq!(dao.count_all()?, 3);
        Ok(())
    }

    #[test]
    fn invalid_values_are_not_written() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = fixture(&gpkg)?;

        let mut row = dao.new_row();
        row.set_value("name", "abcdefghijk")?;
        assert!(matches!(
            dao.insert(&row),
            Err(GpkgError::ValueTooLong { .. })
        ));
        row.set_value("name", "abcdefghij")?;
        row.set_value("age", 1_i64)?;
        assert!(matches!(
            dao.insert(&row),
            Err(GpkgError::ValueTypeMismatch { .. })
        ));
        assert_eq!(dao.count_all()?, 4);
        Ok(())
    }

    // Every value tag written to every column type that accepts it reads back
    // as the same number, text or bytes. Integer widths may change on the way
    // back, so values are compared with `numeric_eq`.
    #[test]
    fn accepted_values_round_trip() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        gpkg.create_attributes_table(
            "matrix",
            &[
                ColumnSpec::new("tiny", DataType::Int8),
                ColumnSpec::new("small", DataType::Int16),
                ColumnSpec::new("medium", DataType::Int32),
                ColumnSpec::new("big", DataType::Int64),
                ColumnSpec::new("float", DataType::Float32),
                ColumnSpec::new("double", DataType::Float64),
                ColumnSpec::new("label", DataType::Text).max(8),
                ColumnSpec::new("bytes", DataType::Blob).max(4),
                ColumnSpec::new("flag", DataType::Boolean),
            ],
        )?;
        let dao = gpkg.user_dao("matrix")?;

        let mut cases: Vec<(&str, Value)> = Vec::new();
        for v in [i8::MIN, -1, 0, i8::MAX] {
            for column in ["tiny", "small", "medium", "big"] {
                cases.push((column, Value::Int8(v)));
            }
        }
        for v in [i16::MIN, i16::MAX] {
            for column in ["small", "medium", "big"] {
                cases.push((column, Value::Int16(v)));
            }
        }
        for v in [i32::MIN, i32::MAX] {
            for column in ["medium", "big"] {
                cases.push((column, Value::Int32(v)));
            }
        }
        for v in [i64::MIN, i64::MAX] {
            cases.push(("big", Value::Int64(v)));
        }
        for v in [0, 1 << 53, -(1 << 53), 1 << 60, i64::MIN] {
            cases.push(("double", Value::Int64(v)));
        }
        for v in [f32::MIN, f32::MAX, f32::MIN_POSITIVE, -1.5, 0.1] {
            cases.push(("float", Value::Float32(v)));
        }
        for v in [f64::MIN, f64::MAX, f64::MIN_POSITIVE, 0.1] {
            cases.push(("double", Value::Float64(v)));
        }
        for v in ["", "\u{c5}\u{c4}\u{d6}abcde"] {
            cases.push(("label", Value::from(v)));
        }
        for v in [Vec::new(), vec![0_u8, 1, 2, 255]] {
            cases.push(("bytes", Value::Blob(v)));
        }
        for v in [true, false] {
            cases.push(("flag", Value::Bool(v)));
        }

        for (column, value) in &cases {
            let mut row = dao.new_row();
            row.set_value(column, value.clone())?;
            let id = dao.insert(&row)?;
            let stored = dao.query_for_id(id)?.expect("stored row");
            let read = stored.value(column)?;
            assert!(
                read.numeric_eq(value),
                "{column}: wrote {value:?}, read {read:?}"
            );
        }
        assert_eq!(dao.count_all()?, cases.len() as i64);

        // rejected before reaching SQLite
        let mut row = dao.new_row();
        row.set_value("double", Value::Int64((1 << 53) + 1))?;
        assert!(matches!(
            dao.insert(&row),
            Err(GpkgError::ValueTypeMismatch { .. })
        ));
        row.set_value("double", Value::Null)?;
        row.set_value("tiny", Value::Int16(1))?;
        assert!(matches!(
            dao.insert(&row),
            Err(GpkgError::ValueTypeMismatch { .. })
        ));
        assert_eq!(dao.count_all()?, cases.len() as i64);
        Ok(())
    }
}
