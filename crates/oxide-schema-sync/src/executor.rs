//! Upgrade executor.
//!
//! Turns an [`UpgradeInfo`] into an [`UpgradeScript`] and runs it against a
//! [`Session`].

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::CatalogTableInfo;
use crate::definition::{FieldDefinition, TableDefinition};
use crate::dialect::SqliteDialect;
use crate::error::{Result, SyncError};
use crate::planner::{UpgradeInfo, UpgradeMode, UpgradeOptions};
use crate::session::Session;

/// Suffix of the name the live table is moved to during a recreate.
pub const RECREATE_SUFFIX: &str = "_autoupgrade";

/// How the statements of a phase are run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PhaseKind {
    /// Independent statements, issued together and awaited as a group.
    Concurrent,
    /// Statements run in order inside one transaction.
    Transaction,
}

/// One step of an upgrade script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Phase {
    /// What the phase does, used as error context (e.g. "alter table").
    pub action: &'static str,
    /// How the statements are run.
    pub kind: PhaseKind,
    /// The statements.
    pub statements: Vec<String>,
    /// Statements attempted, best effort, when the phase fails.
    pub cleanup: Vec<String>,
}

impl Phase {
    fn concurrent(action: &'static str, statements: Vec<String>) -> Self {
        Self {
            action,
            kind: PhaseKind::Concurrent,
            statements,
            cleanup: Vec::new(),
        }
    }

    fn transaction(action: &'static str, statements: Vec<String>, cleanup: Vec<String>) -> Self {
        Self {
            action,
            kind: PhaseKind::Transaction,
            statements,
            cleanup,
        }
    }
}

/// The statements an upgrade runs, grouped into ordered phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeScript {
    /// Qualified table name.
    pub table: String,
    /// The mode the script was rendered for.
    pub mode: UpgradeMode,
    /// Phases, run one after the other.
    pub phases: Vec<Phase>,
}

impl UpgradeScript {
    /// Returns all statements in execution order.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.phases
            .iter()
            .flat_map(|p| p.statements.iter().map(String::as_str))
    }

    /// Returns the number of statements.
    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.phases.iter().map(|p| p.statements.len()).sum()
    }

    /// Returns whether the script issues nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statement_count() == 0
    }
}

/// Applies planned upgrades.
#[derive(Debug, Clone)]
pub struct UpgradeExecutor {
    session: Session,
    dialect: SqliteDialect,
    dry_run: bool,
}

impl UpgradeExecutor {
    /// Creates a new executor.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session,
            dialect: SqliteDialect::new(),
            dry_run: false,
        }
    }

    /// Enables dry-run mode (statements are logged and returned, not run).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &SqliteDialect {
        &self.dialect
    }

    /// Renders the script for a planned upgrade without touching the
    /// database.
    pub fn script(&self, table: &TableDefinition, info: &UpgradeInfo) -> Result<UpgradeScript> {
        info.check_invariants()?;
        let phases = match (info.mode, info.catalog.as_ref()) {
            (UpgradeMode::Actual, _) => Vec::new(),
            (UpgradeMode::Create, _) => self.create_phases(table),
            (UpgradeMode::Alter, Some(catalog)) => self.alter_phases(table, catalog),
            (UpgradeMode::Recreate, Some(catalog)) => {
                self.recreate_phases(table, catalog, &info.options)
            }
            (mode, None) => {
                return Err(SyncError::Invariant(format!(
                    "{} planned for '{}' without catalog information",
                    mode,
                    table.qualified_name()
                )));
            }
        };
        Ok(UpgradeScript {
            table: table.qualified_name(),
            mode: info.mode,
            phases: phases
                .into_iter()
                .filter(|p| !p.statements.is_empty())
                .collect(),
        })
    }

    /// Runs a planned upgrade and returns the script that was run.
    pub async fn execute(
        &self,
        table: &TableDefinition,
        info: &UpgradeInfo,
    ) -> Result<UpgradeScript> {
        let script = self.script(table, info)?;
        if script.is_empty() {
            debug!(table = %script.table, "Table is up to date");
            return Ok(script);
        }

        info!(
            table = %script.table,
            mode = %script.mode,
            statements = script.statement_count(),
            "Upgrading table"
        );

        if self.dry_run {
            for sql in script.statements() {
                info!(table = %script.table, sql = %sql, "Dry run, not executing");
            }
            return Ok(script);
        }

        for phase in &script.phases {
            self.run_phase(&script.table, phase).await?;
        }

        info!(table = %script.table, mode = %script.mode, "Table upgraded");
        Ok(script)
    }

    async fn run_phase(&self, table: &str, phase: &Phase) -> Result<()> {
        let result = match phase.kind {
            PhaseKind::Concurrent => {
                let pending = phase.statements.iter().map(|s| self.session.execute(s));
                try_join_all(pending).await.map(|_| ())
            }
            PhaseKind::Transaction => self.session.transaction(&phase.statements).await,
        };

        if let Err(err) = result {
            for sql in &phase.cleanup {
                if let Err(cleanup_err) = self.session.execute(sql).await {
                    warn!(
                        table = %table,
                        sql = %sql,
                        error = %cleanup_err,
                        "Cleanup statement failed"
                    );
                }
            }
            return Err(SyncError::driver(table, phase.action)(err));
        }
        Ok(())
    }

    fn create_phases(&self, table: &TableDefinition) -> Vec<Phase> {
        vec![
            Phase::concurrent(
                "create table",
                vec![self.dialect.create_table_sql(table, &[])],
            ),
            Phase::concurrent("create indexes", self.create_index_statements(table)),
        ]
    }

    fn alter_phases(&self, table: &TableDefinition, catalog: &CatalogTableInfo) -> Vec<Phase> {
        let schema = table.schema.as_deref();

        let mut alter: Vec<String> = table
            .fields
            .iter()
            .filter(|f| catalog.column(&f.name).is_none())
            .map(|f| self.dialect.add_column_sql(table, f))
            .collect();

        let mut unchanged = Vec::new();
        for (name, index) in catalog.declared_indexes() {
            let same = table
                .indexes
                .get(name)
                .is_some_and(|declared| declared.column_names().eq(index.column_names()));
            if same {
                unchanged.push(name.as_str());
            } else {
                alter.push(self.dialect.drop_index_sql(schema, name));
            }
        }

        let create: Vec<String> = table
            .indexes
            .iter()
            .filter(|(name, _)| !unchanged.contains(&name.as_str()))
            .map(|(name, index)| self.dialect.create_index_sql(table, name, index))
            .collect();

        vec![
            Phase::concurrent("alter table", alter),
            Phase::concurrent("create indexes", create),
        ]
    }

    fn recreate_phases(
        &self,
        table: &TableDefinition,
        catalog: &CatalogTableInfo,
        options: &UpgradeOptions,
    ) -> Vec<Phase> {
        let dialect = &self.dialect;
        let schema = table.schema.as_deref();
        let temp_name = format!("{}{}", table.name, RECREATE_SUFFIX);

        let (orphans, declared): (Vec<_>, Vec<_>) = catalog
            .columns
            .values()
            .partition(|c| table.field(&c.name).is_none());

        let mut extra_fields = Vec::new();
        let copied: Vec<String> = if options.keep_old_columns {
            for column in &orphans {
                let mut db_type = column.type_text.clone();
                if let Some(default) = &column.default_value {
                    db_type = format!("{} DEFAULT ({})", db_type, default)
                        .trim()
                        .to_string();
                }
                extra_fields.push(FieldDefinition::new(&column.name, db_type));
            }
            catalog.columns.keys().cloned().collect()
        } else {
            if !orphans.is_empty() {
                let names: Vec<&str> = orphans.iter().map(|c| c.name.as_str()).collect();
                warn!(
                    table = %table.qualified_name(),
                    columns = ?names,
                    "Recreate discards columns that are no longer declared"
                );
            }
            declared.iter().map(|c| c.name.clone()).collect()
        };

        let mut statements = vec![
            dialect.legacy_alter_table_sql(true),
            dialect.rename_table_sql(schema, &table.name, &temp_name),
            dialect.create_table_sql(table, &extra_fields),
        ];
        if !copied.is_empty() {
            statements.push(dialect.copy_rows_sql(schema, &temp_name, &table.name, &copied));
        }
        statements.push(dialect.drop_table_sql(schema, &temp_name));
        statements.push(dialect.legacy_alter_table_sql(false));

        vec![
            Phase::transaction(
                "recreate table",
                statements,
                vec![dialect.legacy_alter_table_sql(false)],
            ),
            Phase::concurrent("create indexes", self.create_index_statements(table)),
        ]
    }

    fn create_index_statements(&self, table: &TableDefinition) -> Vec<String> {
        table
            .indexes
            .iter()
            .map(|(name, index)| self.dialect.create_index_sql(table, name, index))
            .collect()
    }
}
