use super::table::UserTable;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

/// Schemas of the user tables opened through one [`Gpkg`](super::Gpkg),
/// keyed by table name.
///
/// The accessor factory registers every table it builds an accessor for, so
/// that arbitrary SQL over that table can later be read back as typed rows
/// with [`Gpkg::query_registered`](super::Gpkg::query_registered).
#[derive(Debug, Default)]
pub struct TableRegistry {
    tables: RefCell<HashMap<String, Arc<UserTable>>>,
}

impl TableRegistry {
    /// Register `table`, replacing and returning any previous schema with the
    /// same name.
    pub fn register(&self, table: Arc<UserTable>) -> Option<Arc<UserTable>> {
        self.tables
            .borrow_mut()
            .insert(table.name().to_string(), table)
    }

    pub fn get(&self, name: &str) -> Option<Arc<UserTable>> {
        self.tables.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.borrow().contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<UserTable>> {
        self.tables.borrow_mut().remove(name)
    }

    /// Registered table names, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use crate::gpkg::table::{TableKind, UserColumn};
    use crate::types::DataType;

    fn table(name: &str) -> Result<Arc<UserTable>> {
        let id = UserColumn {
            index: 0,
            name: "id".to_string(),
            data_type: DataType::Int64,
            max: None,
            not_null: true,
            primary_key: true,
            geometry: false,
        };
        Ok(Arc::new(UserTable::new(name, TableKind::Attributes, vec![id])?))
    }

    #[test]
    fn registry_is_keyed_by_table_name() -> Result<()> {
        let registry = TableRegistry::default();
        assert!(registry.is_empty());

        assert!(registry.register(table("b")?).is_none());
        assert!(registry.register(table("a")?).is_none());
        assert!(registry.register(table("a")?).is_some());
        assert_eq!(registry.table_names(), ["a", "b"]);
        assert!(registry.contains("a"));
        assert_eq!(registry.get("b").map(|t| t.name().to_string()), Some("b".to_string()));

        assert!(registry.remove("a").is_some());
        assert_eq!(registry.len(), 1);
        Ok(())
    }
}
