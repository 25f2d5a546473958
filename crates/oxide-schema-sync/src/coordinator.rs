//! Batch upgrades.
//!
//! [`AutoUpgrader`] is the entry point most callers want: it plans and
//! applies upgrades for a set of tables while foreign-key enforcement is
//! switched off, then puts enforcement back the way it found it.

use futures::future::join_all;
use tracing::{debug, error, info};

use crate::definition::TableDefinition;
use crate::error::{Result, SyncError};
use crate::executor::{UpgradeExecutor, UpgradeScript};
use crate::introspect::CatalogReader;
use crate::planner::{plan, UpgradeInfo, UpgradeMode, UpgradeOptions};
use crate::session::Session;

/// Keeps database tables in line with their definitions.
#[derive(Debug, Clone)]
pub struct AutoUpgrader {
    session: Session,
    dry_run: bool,
}

impl AutoUpgrader {
    /// Creates an upgrader over the given session.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session,
            dry_run: false,
        }
    }

    /// Enables dry-run mode: plans are rendered and logged, nothing is
    /// executed and the foreign-key flag is left alone.
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Returns the session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn executor(&self) -> UpgradeExecutor {
        UpgradeExecutor::new(self.session.clone()).dry_run(self.dry_run)
    }

    /// Reads the catalog and plans the upgrade of one table.
    pub async fn upgrade_info(
        &self,
        table: &TableDefinition,
        options: Option<UpgradeOptions>,
    ) -> Result<UpgradeInfo> {
        let catalog = CatalogReader::new(&self.session)
            .read_table_info(&table.name, table.schema.as_deref())
            .await?;
        plan(table, catalog, options)
    }

    /// Plans the upgrade of every table, in order.
    pub async fn upgrade_infos(
        &self,
        tables: &[TableDefinition],
        options: Option<UpgradeOptions>,
    ) -> Result<Vec<UpgradeInfo>> {
        let mut infos = Vec::with_capacity(tables.len());
        for table in tables {
            infos.push(self.upgrade_info(table, options).await?);
        }
        Ok(infos)
    }

    /// Returns whether every table already matches its definition.
    pub async fn is_actual(
        &self,
        tables: &[TableDefinition],
        options: Option<UpgradeOptions>,
    ) -> Result<bool> {
        let infos = self.upgrade_infos(tables, options).await?;
        Ok(infos.iter().all(|i| i.mode == UpgradeMode::Actual))
    }

    /// Returns the statements an upgrade of the table would run.
    pub async fn sql_for(
        &self,
        table: &TableDefinition,
        options: Option<UpgradeOptions>,
    ) -> Result<UpgradeScript> {
        let info = self.upgrade_info(table, options).await?;
        self.executor().script(table, &info)
    }

    /// Upgrades a single table. Foreign-key enforcement is handled as for a
    /// batch.
    pub async fn upgrade_table(
        &self,
        table: &TableDefinition,
        options: Option<UpgradeOptions>,
    ) -> Result<UpgradeScript> {
        let mut scripts = self
            .upgrade_tables(std::slice::from_ref(table), options)
            .await?;
        scripts
            .pop()
            .ok_or_else(|| SyncError::Invariant("upgrade produced no script".to_string()))
    }

    /// Upgrades a batch of tables.
    ///
    /// Foreign-key enforcement is disabled for the duration of the batch if
    /// it was on. All tables are planned and upgraded concurrently; every
    /// failure is reported. Enforcement is restored whatever the outcome, and
    /// a failure to restore it is only returned when the batch itself
    /// succeeded.
    ///
    /// Two definitions for the same table in one batch are not supported.
    pub async fn upgrade_tables(
        &self,
        tables: &[TableDefinition],
        options: Option<UpgradeOptions>,
    ) -> Result<Vec<UpgradeScript>> {
        if self.dry_run {
            return self.run_batch(tables, options).await;
        }

        let enforced = self.session.foreign_keys_enabled().await?;
        if enforced {
            debug!("Disabling foreign key enforcement for the upgrade");
            self.session.set_foreign_keys(false).await?;
        }

        let outcome = self.run_batch(tables, options).await;

        if !enforced {
            return outcome;
        }
        debug!("Restoring foreign key enforcement");
        let restored = self.session.set_foreign_keys(true).await;
        settle(outcome, restored)
    }

    async fn run_batch(
        &self,
        tables: &[TableDefinition],
        options: Option<UpgradeOptions>,
    ) -> Result<Vec<UpgradeScript>> {
        let executor = self.executor();
        let outcomes = join_all(tables.iter().map(|table| {
            let executor = &executor;
            async move {
                let info = self.upgrade_info(table, options).await?;
                info!(
                    table = %table.qualified_name(),
                    mode = %info.mode,
                    reason = %info.reason,
                    "Upgrade planned"
                );
                executor.execute(table, &info).await
            }
        }))
        .await;

        let mut scripts = Vec::with_capacity(outcomes.len());
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(script) => scripts.push(script),
                Err(err) => errors.push(err),
            }
        }
        match SyncError::collect(errors) {
            Some(err) => Err(err),
            None => Ok(scripts),
        }
    }

    /// Returns whether foreign-key constraints are enforced.
    pub async fn foreign_keys_enabled(&self) -> Result<bool> {
        Ok(self.session.foreign_keys_enabled().await?)
    }

    /// Turns foreign-key enforcement on or off.
    pub async fn set_foreign_keys(&self, enabled: bool) -> Result<()> {
        Ok(self.session.set_foreign_keys(enabled).await?)
    }
}

/// Combines a batch outcome with the result of restoring foreign-key
/// enforcement. A batch failure takes precedence; a restore failure is then
/// only logged.
fn settle<T>(outcome: Result<T>, restored: std::result::Result<(), sqlx::Error>) -> Result<T> {
    match (outcome, restored) {
        (outcome, Ok(())) => outcome,
        (Ok(_), Err(err)) => Err(err.into()),
        (Err(batch), Err(err)) => {
            error!(error = %err, "Failed to restore foreign key enforcement");
            Err(batch)
        }
    }
}
