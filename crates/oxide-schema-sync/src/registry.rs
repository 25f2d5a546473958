//! A caller-owned set of table definitions.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::definition::TableDefinition;
use crate::error::{Result, SyncError};

/// The on-disk shape of a definitions file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    tables: Vec<TableDefinition>,
}

/// Table definitions, kept in registration order.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: Vec<TableDefinition>,
    by_name: HashMap<String, usize>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table definition.
    ///
    /// The definition is validated; registering a second table with the
    /// same qualified name is an error.
    pub fn register(&mut self, mut table: TableDefinition) -> Result<()> {
        table.link_foreign_keys();
        table.validate()?;

        let key = table.qualified_name();
        if self.by_name.contains_key(&key) {
            return Err(SyncError::definition(key, "table is already registered"));
        }
        self.by_name.insert(key, self.tables.len());
        self.tables.push(table);
        Ok(())
    }

    /// Gets a table by qualified name (`schema.name`, or `name` without a
    /// schema).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TableDefinition> {
        self.by_name.get(name).map(|&i| &self.tables[i])
    }

    /// Returns all tables in registration order.
    #[must_use]
    pub fn tables(&self) -> &[TableDefinition] {
        &self.tables
    }

    /// Returns the number of registered tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Builds a registry from a JSON document of the form
    /// `{"tables": [...]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: RegistryFile = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for table in file.tables {
            registry.register(table)?;
        }
        Ok(registry)
    }

    /// Loads a registry from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::definition::FieldDefinition;

    const DEFINITIONS: &str = r#"{
        "tables": [
            {
                "name": "parent",
                "fields": [{"name": "id", "type": "INTEGER NOT NULL", "identity": true}]
            },
            {
                "name": "child",
                "fields": [
                    {"name": "id", "type": "INTEGER NOT NULL", "identity": true},
                    {"name": "parent_id", "type": "INTEGER"}
                ],
                "foreign_keys": {
                    "fk_parent": {
                        "columns": ["parent_id"],
                        "references_table": "parent",
                        "references_columns": ["id"]
                    }
                }
            }
        ]
    }"#;

    fn users(schema: Option<&str>) -> TableDefinition {
        let mut builder = TableDefinition::builder("users")
            .field(FieldDefinition::new("id", "INTEGER NOT NULL").identity());
        if let Some(schema) = schema {
            builder = builder.schema(schema);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = SchemaRegistry::new();
        registry.register(users(None)).unwrap();
        registry.register(users(Some("aux"))).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("users").is_some());
        let aux = registry.get("aux.users").unwrap();
        assert_eq!(aux.schema.as_deref(), Some("aux"));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = SchemaRegistry::new();
        registry.register(users(None)).unwrap();
        let err = registry.register(users(None)).unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_from_json_links_foreign_keys() {
        let registry = SchemaRegistry::from_json(DEFINITIONS).unwrap();
        let names: Vec<&str> = registry.tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["parent", "child"]);

        let child = registry.get("child").unwrap();
        assert!(child
            .field("parent_id")
            .unwrap()
            .foreign_keys
            .contains("fk_parent"));
    }

    #[test]
    fn test_from_json_rejects_invalid_table() {
        let json = r#"{"tables": [{"name": "empty", "fields": []}]}"#;
        assert!(matches!(
            SchemaRegistry::from_json(json),
            Err(SyncError::Definition { .. })
        ));
        assert!(matches!(
            SchemaRegistry::from_json("not json"),
            Err(SyncError::Serialization(_))
        ));
    }

    #[test]
    fn test_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DEFINITIONS.as_bytes()).unwrap();
        let registry = SchemaRegistry::load(file.path()).unwrap();
        assert_eq!(registry.len(), 2);

        assert!(matches!(
            SchemaRegistry::load("/nonexistent/schema.json"),
            Err(SyncError::Io(_))
        ));
    }
}
