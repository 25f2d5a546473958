//! The database session the engine talks to.
//!
//! Everything the engine does to the database goes through [`Session`]:
//! executing a statement, running a list of statements as one transaction,
//! catalog reads, and the foreign-key enforcement flag.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::debug;

/// A database session backed by an SQLite connection pool.
///
/// SQLite keeps the foreign-key enforcement flag per connection, so the pool
/// should hold a single connection when batch upgrades rely on toggling it.
/// [`Session::connect`] opens such a pool.
#[derive(Debug, Clone)]
pub struct Session {
    pool: SqlitePool,
}

impl Session {
    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a single-connection pool for the given database URL.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Executes a single statement.
    pub async fn execute(&self, sql: &str) -> Result<u64, sqlx::Error> {
        debug!(sql = %sql, "Executing SQL");
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Executes the statements in order inside one transaction.
    ///
    /// If any statement fails the transaction is rolled back and the error
    /// of the failing statement is returned.
    pub async fn transaction(&self, statements: &[String]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for sql in statements {
            debug!(sql = %sql, "Executing SQL in transaction");
            if let Err(err) = sqlx::query(sql).execute(&mut *tx).await {
                tx.rollback().await?;
                return Err(err);
            }
        }
        tx.commit().await
    }

    /// Runs a catalog query and returns all rows.
    ///
    /// Catalog statements are not cached: pragma results would otherwise be
    /// served from a statement prepared against an older schema.
    pub async fn fetch_catalog(&self, sql: &str) -> Result<Vec<SqliteRow>, sqlx::Error> {
        debug!(sql = %sql, "Reading catalog");
        sqlx::query(sql)
            .persistent(false)
            .fetch_all(&self.pool)
            .await
    }

    /// Returns whether foreign-key constraints are enforced.
    pub async fn foreign_keys_enabled(&self) -> Result<bool, sqlx::Error> {
        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .persistent(false)
            .fetch_one(&self.pool)
            .await?;
        Ok(enabled != 0)
    }

    /// Turns foreign-key enforcement on or off.
    pub async fn set_foreign_keys(&self, enabled: bool) -> Result<(), sqlx::Error> {
        let sql = format!(
            "PRAGMA foreign_keys = {}",
            if enabled { "ON" } else { "OFF" }
        );
        self.execute(&sql).await?;
        Ok(())
    }
}
