//! Forward-only typed result streams over user tables.
//!
//! A rusqlite `Rows` borrows its prepared statement, so reads hand out a
//! [`UserQuery`] that owns the statement and its bound arguments. Opening a
//! [`UserCursor`] from it starts the stream. Both release their SQLite
//! resources when dropped.

use super::row::UserRow;
use super::table::UserTable;
use crate::conversions::value_from_storage;
use crate::error::Result;
use crate::types::Value;
use rusqlite::{CachedStatement, Rows};
use std::sync::Arc;

/// Turns the generic [`UserRow`] read by a cursor into the row type of an
/// accessor.
pub trait RowMapper {
    type Row;

    fn map_row(&self, row: UserRow) -> Self::Row;
}

/// Yields plain [`UserRow`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct UserRowMapper;

impl RowMapper for UserRowMapper {
    type Row = UserRow;

    fn map_row(&self, row: UserRow) -> UserRow {
        row
    }
}

/// A prepared read over one user table, not yet executed.
pub struct UserQuery<'conn, M> {
    stmt: CachedStatement<'conn>,
    args: Vec<Value>,
    table: Arc<UserTable>,
    mapper: M,
}

impl<'conn, M: RowMapper + Clone> UserQuery<'conn, M> {
    pub(crate) fn new(
        stmt: CachedStatement<'conn>,
        args: Vec<Value>,
        table: Arc<UserTable>,
        mapper: M,
    ) -> Self {
        Self {
            stmt,
            args,
            table,
            mapper,
        }
    }

    pub fn table(&self) -> &Arc<UserTable> {
        &self.table
    }

    /// Execute the statement and open a cursor positioned before the first row.
    pub fn cursor(&mut self) -> Result<UserCursor<'_, M>> {
        // Result columns are matched to table columns by name, so the select
        // list may be any subset of the table in any order.
        let positions: Vec<Option<usize>> = self
            .stmt
            .column_names()
            .into_iter()
            .map(|name| self.table.column(name).map(|column| column.index))
            .collect();
        let rows = self.stmt.query(rusqlite::params_from_iter(self.args.iter()))?;

        Ok(UserCursor {
            rows,
            table: self.table.clone(),
            mapper: self.mapper.clone(),
            positions,
            current: None,
        })
    }

    /// First row of the result, if any.
    pub fn first(&mut self) -> Result<Option<M::Row>> {
        self.cursor()?.next().transpose()
    }

    pub fn collect_rows(&mut self) -> Result<Vec<M::Row>> {
        self.cursor()?.collect()
    }
}

/// Forward-only cursor over the rows of a [`UserQuery`].
///
/// Iterating yields mapped rows; [`UserCursor::advance`] and
/// [`UserCursor::current_row`] give the same stream one step at a time.
pub struct UserCursor<'stmt, M> {
    rows: Rows<'stmt>,
    table: Arc<UserTable>,
    mapper: M,
    positions: Vec<Option<usize>>,
    current: Option<UserRow>,
}

impl<M: RowMapper> UserCursor<'_, M> {
    /// Move to the next row. Returns `false` once the stream is exhausted.
    pub fn advance(&mut self) -> Result<bool> {
        let Some(row) = self.rows.next()? else {
            self.current = None;
            return Ok(false);
        };

        let mut values = vec![Value::Null; self.table.column_count()];
        for (i, position) in self.positions.iter().enumerate() {
            if let Some(index) = *position {
                let data_type = self.table.columns()[index].data_type;
                values[index] = value_from_storage(data_type, row.get_ref(i)?);
            }
        }

        self.current = Some(UserRow::from_values(self.table.clone(), values));
        Ok(true)
    }

    /// The row at the current position, or `None` before the first
    /// [`advance`](Self::advance) and after the end.
    pub fn current_row(&self) -> Option<M::Row> {
        self.current
            .as_ref()
            .map(|row| self.mapper.map_row(row.clone()))
    }

    pub fn table(&self) -> &Arc<UserTable> {
        &self.table
    }

    /// Release the cursor. Equivalent to dropping it.
    pub fn close(self) {}
}

impl<M: RowMapper> Iterator for UserCursor<'_, M> {
    type Item = Result<M::Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(true) => self.current.take().map(|row| Ok(self.mapper.map_row(row))),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
