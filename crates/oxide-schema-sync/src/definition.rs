//! Declared table definitions.
//!
//! A [`TableDefinition`] describes what a table *should* look like. It is
//! produced once by [`TableBuilder`] (or loaded from a file by the
//! [`registry`](crate::registry)) and never mutated afterwards; the planner
//! compares it against what the catalog says the table *does* look like.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::catalog::generic_foreign_key_id;
use crate::column_type::{parse_column_type, TypeAffinity};
use crate::error::{Result, SyncError};

/// A declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Column name.
    pub name: String,
    /// Declared type, including constraints (e.g. `"TEXT NOT NULL DEFAULT ''"`).
    #[serde(rename = "type")]
    pub db_type: String,
    /// Whether this column is part of the primary key.
    #[serde(default)]
    pub identity: bool,
    /// Names of the foreign-key constraints this column takes part in.
    #[serde(default)]
    pub foreign_keys: BTreeSet<String>,
}

impl FieldDefinition {
    /// Creates a new field definition.
    #[must_use]
    pub fn new(name: impl Into<String>, db_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_type: db_type.into(),
            identity: false,
            foreign_keys: BTreeSet::new(),
        }
    }

    /// Marks the field as part of the primary key.
    #[must_use]
    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }
}

/// A column of a declared index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Column name.
    pub name: String,
    /// Whether the column is sorted descending.
    #[serde(default)]
    pub desc: bool,
}

/// A declared index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Indexed columns, in order.
    pub columns: Vec<IndexColumn>,
    /// Whether this is a unique index.
    #[serde(default)]
    pub unique: bool,
}

impl IndexDefinition {
    /// Creates an empty index definition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an ascending column.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(IndexColumn {
            name: name.into(),
            desc: false,
        });
        self
    }

    /// Adds a descending column.
    #[must_use]
    pub fn column_desc(mut self, name: impl Into<String>) -> Self {
        self.columns.push(IndexColumn {
            name: name.into(),
            desc: true,
        });
        self
    }

    /// Makes the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Returns the indexed column names, in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// A declared foreign-key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDefinition {
    /// Referencing columns of this table, in order.
    pub columns: Vec<String>,
    /// Referenced table name.
    pub references_table: String,
    /// Referenced columns, in the same order as `columns`.
    pub references_columns: Vec<String>,
}

impl ForeignKeyDefinition {
    /// Creates a new foreign-key definition.
    #[must_use]
    pub fn new<L, R>(columns: L, references_table: impl Into<String>, references_columns: R) -> Self
    where
        L: IntoIterator,
        L::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            references_table: references_table.into(),
            references_columns: references_columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the name-independent identity of this constraint.
    #[must_use]
    pub fn generic_id(&self) -> String {
        generic_foreign_key_id(
            &self.columns,
            &self.references_table,
            &self.references_columns,
        )
    }
}

/// A complete, validated table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Table name.
    pub name: String,
    /// Schema (attached database) name; `None` means the default lookup.
    #[serde(default)]
    pub schema: Option<String>,
    /// Columns in declaration order.
    pub fields: Vec<FieldDefinition>,
    /// Indexes by name.
    #[serde(default)]
    pub indexes: BTreeMap<String, IndexDefinition>,
    /// Foreign keys by constraint name.
    #[serde(default)]
    pub foreign_keys: BTreeMap<String, ForeignKeyDefinition>,
    /// Whether the single INTEGER primary key column uses AUTOINCREMENT.
    #[serde(default)]
    pub autoincrement: bool,
    /// Whether the table is created `WITHOUT ROWID`.
    #[serde(default)]
    pub without_rowid: bool,
}

impl TableDefinition {
    /// Starts building a table definition.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> TableBuilder {
        TableBuilder::new(name)
    }

    /// Returns `schema.name`, or just `name` when no schema is set.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }

    /// Gets a field by column name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the primary-key fields in declaration order.
    pub fn identity_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.identity)
    }

    /// Recomputes each field's foreign-key memberships from the
    /// foreign-key definitions.
    pub(crate) fn link_foreign_keys(&mut self) {
        for field in &mut self.fields {
            field.foreign_keys = self
                .foreign_keys
                .iter()
                .filter(|(_, fk)| fk.columns.contains(&field.name))
                .map(|(name, _)| name.clone())
                .collect();
        }
    }

    /// Checks the structural invariants of the definition.
    pub fn validate(&self) -> Result<()> {
        let table = self.qualified_name();
        let fail = |message: String| Err(SyncError::definition(&table, message));

        if self.name.is_empty() {
            return fail("table name is empty".to_string());
        }
        if self.fields.is_empty() {
            return fail("at least one field is required".to_string());
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.to_ascii_lowercase()) {
                return fail(format!("column '{}' is mapped more than once", field.name));
            }
            parse_column_type(&field.db_type)?;
            for fk_name in &field.foreign_keys {
                if !self.foreign_keys.contains_key(fk_name) {
                    return fail(format!(
                        "field '{}' refers to unknown foreign key '{}'",
                        field.name, fk_name
                    ));
                }
            }
        }

        for (name, fk) in &self.foreign_keys {
            if fk.columns.is_empty() {
                return fail(format!("foreign key '{}' has no columns", name));
            }
            if fk.columns.len() != fk.references_columns.len() {
                return fail(format!(
                    "foreign key '{}' has {} columns but references {}",
                    name,
                    fk.columns.len(),
                    fk.references_columns.len()
                ));
            }
            if let Some(col) = fk.columns.iter().find(|c| self.field(c).is_none()) {
                return fail(format!("foreign key '{}' uses undeclared column '{}'", name, col));
            }
        }

        for (name, index) in &self.indexes {
            if index.columns.is_empty() {
                return fail(format!("index '{}' has no columns", name));
            }
            if let Some(col) = index.column_names().find(|c| self.field(c).is_none()) {
                return fail(format!("index '{}' uses undeclared column '{}'", name, col));
            }
        }

        if self.autoincrement {
            let identity: Vec<_> = self.identity_fields().collect();
            let single_integer = match identity.as_slice() {
                [field] => parse_column_type(&field.db_type)?.affinity == TypeAffinity::Integer,
                _ => false,
            };
            if !single_integer {
                return fail(
                    "autoincrement requires exactly one INTEGER identity field".to_string(),
                );
            }
        }

        Ok(())
    }
}

/// Builds a [`TableDefinition`].
#[derive(Debug, Clone)]
pub struct TableBuilder {
    table: TableDefinition,
}

impl TableBuilder {
    /// Creates a builder for the named table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table: TableDefinition {
                name: name.into(),
                schema: None,
                fields: Vec::new(),
                indexes: BTreeMap::new(),
                foreign_keys: BTreeMap::new(),
                autoincrement: false,
                without_rowid: false,
            },
        }
    }

    /// Places the table in an attached schema.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.table.schema = Some(schema.into());
        self
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.table.fields.push(field);
        self
    }

    /// Adds a named index.
    #[must_use]
    pub fn index(mut self, name: impl Into<String>, index: IndexDefinition) -> Self {
        self.table.indexes.insert(name.into(), index);
        self
    }

    /// Adds a named foreign key.
    #[must_use]
    pub fn foreign_key(mut self, name: impl Into<String>, fk: ForeignKeyDefinition) -> Self {
        self.table.foreign_keys.insert(name.into(), fk);
        self
    }

    /// Uses AUTOINCREMENT for the single INTEGER primary key.
    #[must_use]
    pub fn autoincrement(mut self) -> Self {
        self.table.autoincrement = true;
        self
    }

    /// Creates the table `WITHOUT ROWID`.
    #[must_use]
    pub fn without_rowid(mut self) -> Self {
        self.table.without_rowid = true;
        self
    }

    /// Finishes the definition.
    pub fn build(mut self) -> Result<TableDefinition> {
        self.table.link_foreign_keys();
        self.table.validate()?;
        Ok(self.table)
    }
}
