use crate::error::{GpkgError, Result};
use crate::types::DataType;
use std::collections::HashMap;

pub const TILE_ID_COLUMN: &str = "id";
pub const TILE_ZOOM_LEVEL_COLUMN: &str = "zoom_level";
pub const TILE_COLUMN_COLUMN: &str = "tile_column";
pub const TILE_ROW_COLUMN: &str = "tile_row";
pub const TILE_DATA_COLUMN: &str = "tile_data";

/// A column of a user table as read from the physical schema.
#[derive(Clone, Debug, PartialEq)]
pub struct UserColumn {
    pub index: usize,
    pub name: String,
    pub data_type: DataType,
    pub max: Option<u32>,
    pub not_null: bool,
    pub primary_key: bool,
    pub geometry: bool,
}

/// Which kind of user table a schema describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableKind {
    Attributes,
    Features,
    Tiles,
}

/// Immutable schema of a user table.
///
/// Construction checks the shape every accessor relies on: dense zero-based
/// column indices, unique names, exactly one primary key and at most one
/// geometry column (exactly one for feature tables). Tile tables must also
/// carry the standard tile columns.
#[derive(Debug, PartialEq)]
pub struct UserTable {
    name: String,
    kind: TableKind,
    columns: Vec<UserColumn>,
    by_name: HashMap<String, usize>,
    primary_key: usize,
    geometry: Option<usize>,
}

impl UserTable {
    pub fn new(name: impl Into<String>, kind: TableKind, columns: Vec<UserColumn>) -> Result<Self> {
        let name = name.into();
        let mut by_name = HashMap::with_capacity(columns.len());
        let mut primary_key = None;
        let mut geometry = None;

        for (expected, column) in columns.iter().enumerate() {
            if column.index != expected {
                return Err(GpkgError::ColumnIndexMismatch {
                    table: name,
                    column: column.name.clone(),
                    expected,
                    got: column.index,
                });
            }
            if by_name.insert(column.name.clone(), expected).is_some() {
                return Err(GpkgError::DuplicateColumnName {
                    table: name,
                    column: column.name.clone(),
                });
            }
            if column.primary_key {
                if primary_key.is_some() {
                    return Err(GpkgError::CompositePrimaryKeyUnsupported { table: name });
                }
                primary_key = Some(expected);
            }
            if column.geometry {
                if geometry.is_some() {
                    return Err(GpkgError::MultipleGeometryColumns { table: name });
                }
                geometry = Some(expected);
            }
        }

        let Some(primary_key) = primary_key else {
            return Err(GpkgError::MissingPrimaryKeyColumn { table: name });
        };

        match kind {
            TableKind::Features if geometry.is_none() => {
                return Err(GpkgError::MissingGeometryColumn { table: name });
            }
            TableKind::Tiles => {
                for required in [
                    TILE_ZOOM_LEVEL_COLUMN,
                    TILE_COLUMN_COLUMN,
                    TILE_ROW_COLUMN,
                    TILE_DATA_COLUMN,
                ] {
                    if !by_name.contains_key(required) {
                        return Err(GpkgError::MissingRequiredColumn {
                            table: name,
                            column: required,
                        });
                    }
                }
            }
            _ => {}
        }

        Ok(Self {
            name,
            kind,
            columns,
            by_name,
            primary_key,
            geometry,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn columns(&self) -> &[UserColumn] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&UserColumn> {
        self.by_name.get(name).map(|&i| &self.columns[i])
    }

    pub fn column_at(&self, index: usize) -> Option<&UserColumn> {
        self.columns.get(index)
    }

    /// Index of the named column, or `NoSuchColumn`.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| GpkgError::NoSuchColumn {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }

    pub fn primary_key(&self) -> &UserColumn {
        &self.columns[self.primary_key]
    }

    pub fn primary_key_index(&self) -> usize {
        self.primary_key
    }

    pub fn geometry_column(&self) -> Option<&UserColumn> {
        self.geometry.map(|i| &self.columns[i])
    }

    pub fn geometry_index(&self) -> Option<usize> {
        self.geometry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(index: usize, name: &str, data_type: DataType) -> UserColumn {
        UserColumn {
            index,
            name: name.to_string(),
            data_type,
            max: None,
            not_null: false,
            primary_key: false,
            geometry: false,
        }
    }

    fn pk(index: usize, name: &str) -> UserColumn {
        UserColumn {
            primary_key: true,
            not_null: true,
            ..column(index, name, DataType::Int64)
        }
    }

    fn geom(index: usize, name: &str) -> UserColumn {
        UserColumn {
            geometry: true,
            ..column(index, name, DataType::Blob)
        }
    }

    #[test]
    fn builds_feature_table() -> Result<()> {
        let table = UserTable::new(
            "roads",
            TableKind::Features,
            vec![
                pk(0, "fid"),
                geom(1, "geom"),
                column(2, "name", DataType::Text),
            ],
        )?;
        assert_eq!(table.primary_key().name, "fid");
        assert_eq!(table.geometry_index(), Some(1));
        assert_eq!(table.column_index("name")?, 2);
        assert_eq!(table.column("name").map(|c| c.data_type), Some(DataType::Text));
        assert!(matches!(
            table.column_index("missing"),
            Err(GpkgError::NoSuchColumn { .. })
        ));
        Ok(())
    }

    #[test]
    fn rejects_missing_primary_key() {
        let err = UserTable::new(
            "t",
            TableKind::Attributes,
            vec![column(0, "a", DataType::Text)],
        )
        .expect_err("no primary key");
        assert!(matches!(err, GpkgError::MissingPrimaryKeyColumn { .. }));
    }

    #[test]
    fn rejects_second_geometry_column() {
        let err = UserTable::new(
            "t",
            TableKind::Features,
            vec![pk(0, "fid"), geom(1, "a"), geom(2, "b")],
        )
        .expect_err("two geometry columns");
        assert!(matches!(err, GpkgError::MultipleGeometryColumns { .. }));
    }

    #[test]
    fn rejects_colliding_names() {
        let err = UserTable::new(
            "t",
            TableKind::Attributes,
            vec![pk(0, "id"), column(1, "id", DataType::Text)],
        )
        .expect_err("duplicate name");
        assert!(matches!(err, GpkgError::DuplicateColumnName { .. }));
    }

    #[test]
    fn rejects_sparse_indices() {
        let err = UserTable::new(
            "t",
            TableKind::Attributes,
            vec![pk(0, "id"), column(2, "a", DataType::Text)],
        )
        .expect_err("sparse index");
        assert!(matches!(
            err,
            GpkgError::ColumnIndexMismatch {
                expected: 1,
                got: 2,
                ..
            }
        ));
    }

    #[test]
    fn tile_tables_need_tile_columns() {
        let err = UserTable::new(
            "t",
            TableKind::Tiles,
            vec![pk(0, "id"), column(1, "zoom_level", DataType::Int64)],
        )
        .expect_err("missing tile columns");
        assert!(matches!(
            err,
            GpkgError::MissingRequiredColumn {
                column: "tile_column",
                ..
            }
        ));
    }

    #[test]
    fn feature_tables_need_geometry() {
        let err = UserTable::new("t", TableKind::Features, vec![pk(0, "fid")])
            .expect_err("missing geometry");
        assert!(matches!(err, GpkgError::MissingGeometryColumn { .. }));
    }
}
