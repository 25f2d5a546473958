//! What the catalog says a table looks like.
//!
//! These values are produced by the [`introspect`](crate::introspect) module
//! and consumed by the planner. They are rebuilt on every planning call.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::column_type::TypeAffinity;

/// Builds the name-independent identity of a foreign key.
///
/// Two constraints with different names but the same columns, referenced
/// table and referenced columns (in the same order) get the same id.
#[must_use]
pub fn generic_foreign_key_id<S: AsRef<str>>(
    columns: &[S],
    references_table: &str,
    references_columns: &[S],
) -> String {
    let join = |cols: &[S]| {
        cols.iter()
            .map(|c| c.as_ref())
            .collect::<Vec<_>>()
            .join(",")
    };
    format!(
        "({}) => {}({})",
        join(columns),
        references_table,
        join(references_columns)
    )
}

/// A column as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogColumn {
    /// Column name.
    pub name: String,
    /// Type text exactly as stored (e.g. `VARCHAR(20)`).
    pub type_text: String,
    /// Affinity of the type text.
    pub affinity: TypeAffinity,
    /// Whether the column is NOT NULL.
    pub not_null: bool,
    /// Default value text exactly as stored.
    pub default_value: Option<String>,
}

/// A column of a catalog index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogIndexColumn {
    /// Column name.
    pub name: String,
    /// Whether the column is sorted descending.
    pub desc: bool,
}

/// An index as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogIndex {
    /// Index name.
    pub name: String,
    /// Whether the index is unique.
    pub unique: bool,
    /// Whether the index is partial (has a WHERE clause).
    pub partial: bool,
    /// Whether SQLite created the index for an inline `UNIQUE` constraint.
    /// Such indexes cannot be dropped and have no declared counterpart.
    pub constraint: bool,
    /// Key columns, in order.
    pub columns: Vec<CatalogIndexColumn>,
}

impl CatalogIndex {
    /// Returns the key column names, in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// A foreign key as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogForeignKey {
    /// Referenced table name.
    pub references_table: String,
    /// Referencing columns, in order.
    pub columns: Vec<String>,
    /// Referenced columns, in order.
    pub references_columns: Vec<String>,
}

impl CatalogForeignKey {
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

/// Everything the catalog knows about one existing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogTableInfo {
    /// Table name.
    pub name: String,
    /// Schema the table was read from.
    pub schema: String,
    /// Columns by name.
    pub columns: BTreeMap<String, CatalogColumn>,
    /// Primary-key column names, in key order.
    pub primary_key: Vec<String>,
    /// Whether the table appears to use AUTOINCREMENT.
    ///
    /// Detected by searching the stored CREATE statement for the keyword,
    /// so a comment or a column default containing "AUTOINCREMENT" yields a
    /// false positive.
    pub autoincrement: bool,
    /// Indexes by name (primary-key indexes excluded).
    pub indexes: BTreeMap<String, CatalogIndex>,
    /// Foreign keys by generic id.
    pub foreign_keys: BTreeMap<String, CatalogForeignKey>,
}

impl CatalogTableInfo {
    /// Returns `schema.name`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Gets a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&CatalogColumn> {
        self.columns.get(name)
    }

    /// Returns the indexes created with `CREATE INDEX`, skipping those
    /// backing a `UNIQUE` constraint.
    pub fn declared_indexes(&self) -> impl Iterator<Item = (&String, &CatalogIndex)> {
        self.indexes.iter().filter(|(_, index)| !index.constraint)
    }
}
