//! Keep SQLite tables in line with their declared definitions.
//!
//! `oxide-schema-sync` compares what a table *should* look like (a
//! [`TableDefinition`](definition::TableDefinition)) with what the SQLite
//! catalog says it *does* look like, and applies the smallest change that
//! makes them agree:
//! - **CREATE** a missing table and its indexes
//! - **ALTER** in place when only columns were added or indexes changed
//! - **RECREATE** (rename, create, copy, drop, in one transaction) for
//!   everything SQLite cannot change in place: dropped or retyped columns,
//!   primary-key and foreign-key changes
//!
//! There is no migration history: the catalog itself is the state.
//!
//! # Architecture
//!
//! - **Normalizer** - Splits a declared type into affinity, NOT NULL and default
//! - **Introspector** - Reads the catalog into a `CatalogTableInfo`
//! - **Planner** - Decides the upgrade mode for a table
//! - **Executor** - Renders and runs the statements for a plan
//! - **Coordinator** - Upgrades a batch with foreign-key enforcement off
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_schema_sync::prelude::*;
//!
//! let users = TableDefinition::builder("users")
//!     .field(FieldDefinition::new("id", "INTEGER NOT NULL").identity())
//!     .field(FieldDefinition::new("email", "TEXT NOT NULL DEFAULT ''"))
//!     .index("idx_users_email", IndexDefinition::new().column("email").unique())
//!     .build()?;
//!
//! let session = Session::connect("sqlite:app.db").await?;
//! let upgrader = AutoUpgrader::new(session);
//! upgrader
//!     .upgrade_tables(&[users], Some(UpgradeOptions::new().keep_old_columns()))
//!     .await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Show what would happen to every table in schema.json
//! oxide-schema-sync plan
//!
//! # Print the statements without running them
//! oxide-schema-sync sql
//!
//! # Upgrade, keeping columns that are no longer declared
//! oxide-schema-sync upgrade --keep-old-columns
//! ```

pub mod catalog;
pub mod column_type;
pub mod coordinator;
pub mod definition;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod introspect;
pub mod planner;
pub mod registry;
pub mod session;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::catalog::{generic_foreign_key_id, CatalogTableInfo};
    pub use crate::column_type::{parse_column_type, ColumnType, TypeAffinity};
    pub use crate::coordinator::AutoUpgrader;
    pub use crate::definition::{
        FieldDefinition, ForeignKeyDefinition, IndexColumn, IndexDefinition, TableBuilder,
        TableDefinition,
    };
    pub use crate::dialect::SqliteDialect;
    pub use crate::error::{Result, SyncError};
    pub use crate::executor::{Phase, PhaseKind, UpgradeExecutor, UpgradeScript};
    pub use crate::introspect::CatalogReader;
    pub use crate::planner::{plan, UpgradeInfo, UpgradeMode, UpgradeOptions};
    pub use crate::registry::SchemaRegistry;
    pub use crate::session::Session;
}
