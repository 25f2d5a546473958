//! Upgrade planning.
//!
//! Compares a [`TableDefinition`] with the [`CatalogTableInfo`] of the live
//! table and decides what has to happen. The checks run in a fixed order and
//! the first one that fires decides the mode; later checks rely on earlier
//! ones having passed (the primary-key position check, for instance, assumes
//! the key lengths already agree).

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::CatalogTableInfo;
use crate::column_type::{canonical_default, parse_column_type};
use crate::definition::TableDefinition;
use crate::error::{Result, SyncError};

/// What an upgrade has to do to a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpgradeMode {
    /// The table already matches its definition.
    Actual,
    /// The table does not exist.
    Create,
    /// Columns have to be added or indexes changed; done in place.
    Alter,
    /// The change cannot be applied in place; the table is rebuilt.
    Recreate,
}

impl fmt::Display for UpgradeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Actual => "ACTUAL",
            Self::Create => "CREATE",
            Self::Alter => "ALTER",
            Self::Recreate => "RECREATE",
        };
        f.write_str(name)
    }
}

/// Options controlling how a table is upgraded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeOptions {
    /// Keep catalog columns that no longer have a field (as nullable
    /// columns) instead of dropping them.
    pub keep_old_columns: bool,
    /// Always rebuild the table.
    pub force_recreate: bool,
}

impl UpgradeOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps columns that are no longer declared.
    #[must_use]
    pub fn keep_old_columns(mut self) -> Self {
        self.keep_old_columns = true;
        self
    }

    /// Forces a rebuild.
    #[must_use]
    pub fn force_recreate(mut self) -> Self {
        self.force_recreate = true;
        self
    }
}

/// The planning result for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeInfo {
    /// The catalog view of the table; `None` exactly when `mode` is `Create`.
    pub catalog: Option<CatalogTableInfo>,
    /// The chosen mode.
    pub mode: UpgradeMode,
    /// The options the plan was made with.
    pub options: UpgradeOptions,
    /// Human-readable reason for the chosen mode.
    pub reason: String,
}

impl UpgradeInfo {
    /// Checks that mode and catalog agree.
    pub fn check_invariants(&self) -> Result<()> {
        match (self.mode, &self.catalog) {
            (UpgradeMode::Create, None) => Ok(()),
            (UpgradeMode::Create, Some(catalog)) => Err(SyncError::Invariant(format!(
                "CREATE planned for existing table '{}'",
                catalog.qualified_name()
            ))),
            (mode, None) => {
                Err(SyncError::Invariant(format!("{} planned without catalog information", mode)))
            }
            (_, Some(_)) => Ok(()),
        }
    }
}

/// Plans the upgrade of `table` given its current catalog state.
pub fn plan(
    table: &TableDefinition,
    catalog: Option<CatalogTableInfo>,
    options: Option<UpgradeOptions>,
) -> Result<UpgradeInfo> {
    table.validate()?;
    let options = options.unwrap_or_default();
    let (mode, reason) = match &catalog {
        None => (UpgradeMode::Create, "table does not exist".to_string()),
        Some(catalog) => classify(table, catalog, &options)?,
    };
    debug!(table = %table.qualified_name(), mode = %mode, reason = %reason, "Planned upgrade");
    Ok(UpgradeInfo {
        catalog,
        mode,
        options,
        reason,
    })
}

fn classify(
    table: &TableDefinition,
    catalog: &CatalogTableInfo,
    options: &UpgradeOptions,
) -> Result<(UpgradeMode, String)> {
    use UpgradeMode::{Actual, Alter, Recreate};

    if options.force_recreate {
        return Ok((Recreate, "recreate forced".to_string()));
    }

    if table.foreign_keys.len() != catalog.foreign_keys.len() {
        return Ok((
            Recreate,
            format!(
                "{} foreign keys declared, {} in catalog",
                table.foreign_keys.len(),
                catalog.foreign_keys.len()
            ),
        ));
    }
    for (name, fk) in &table.foreign_keys {
        if !catalog.foreign_keys.contains_key(&fk.generic_id()) {
            return Ok((Recreate, format!("foreign key '{}' changed", name)));
        }
    }

    let mut kept_old_columns = 0usize;
    for (name, column) in &catalog.columns {
        let Some(field) = table.field(name) else {
            if !options.keep_old_columns {
                return Ok((Recreate, format!("column '{}' is no longer declared", name)));
            }
            if column.not_null {
                return Ok((
                    Recreate,
                    format!("undeclared column '{}' is NOT NULL", name),
                ));
            }
            kept_old_columns += 1;
            continue;
        };

        let declared = parse_column_type(&field.db_type)?;
        if declared.affinity != column.affinity {
            return Ok((
                Recreate,
                format!(
                    "column '{}' changed type affinity from {} to {}",
                    name, column.affinity, declared.affinity
                ),
            ));
        }
        if declared.not_null != column.not_null {
            return Ok((Recreate, format!("column '{}' changed NOT NULL", name)));
        }
        let catalog_default = column.default_value.as_deref().map(canonical_default);
        if declared.default_value != catalog_default {
            return Ok((Recreate, format!("column '{}' changed default", name)));
        }
    }

    let identity: Vec<&str> = table.identity_fields().map(|f| f.name.as_str()).collect();
    if identity.len() != catalog.primary_key.len() {
        return Ok((
            Recreate,
            format!(
                "primary key has {} columns, declared {}",
                catalog.primary_key.len(),
                identity.len()
            ),
        ));
    }
    if let Some((declared, actual)) = identity
        .iter()
        .zip(&catalog.primary_key)
        .find(|(declared, actual)| **declared != actual.as_str())
    {
        return Ok((
            Recreate,
            format!(
                "primary key column '{}' expected where '{}' is",
                declared, actual
            ),
        ));
    }

    if catalog.columns.len() - kept_old_columns != table.fields.len() {
        return Ok((Alter, "columns to add".to_string()));
    }

    // Indexes backing inline UNIQUE constraints belong to the columns and
    // are never declared separately.
    let catalog_indexes = catalog.declared_indexes().count();
    if catalog_indexes != table.indexes.len() {
        return Ok((
            Alter,
            format!(
                "{} indexes declared, {} in catalog",
                table.indexes.len(),
                catalog_indexes
            ),
        ));
    }
    for (name, index) in catalog.declared_indexes() {
        let matches = table
            .indexes
            .get(name)
            .is_some_and(|declared| declared.column_names().eq(index.column_names()));
        if !matches {
            return Ok((Alter, format!("index '{}' changed", name)));
        }
    }

    Ok((Actual, "table is up to date".to_string()))
}
