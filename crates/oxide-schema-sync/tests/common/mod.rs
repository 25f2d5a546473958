#![allow(dead_code)]

use oxide_schema_sync::prelude::*;

pub async fn create_test_upgrader() -> AutoUpgrader {
    let session = Session::connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite session");
    AutoUpgrader::new(session)
}

/// `T(id INTEGER NOT NULL identity, content TEXT)` plus any extra fields.
pub fn notes(extra: &[(&str, &str)]) -> TableDefinition {
    let mut builder = TableDefinition::builder("notes")
        .field(FieldDefinition::new("id", "INTEGER NOT NULL").identity())
        .field(FieldDefinition::new("content", "TEXT"));
    for (name, db_type) in extra {
        builder = builder.field(FieldDefinition::new(*name, *db_type));
    }
    builder
        .build()
        .unwrap_or_else(|e| panic!("Invalid test table: {e}"))
}

pub async fn execute(upgrader: &AutoUpgrader, sql: &str) {
    upgrader
        .session()
        .execute(sql)
        .await
        .unwrap_or_else(|e| panic!("Failed to execute: {sql}\nError: {e}"));
}

pub async fn catalog(upgrader: &AutoUpgrader, table: &str) -> Option<CatalogTableInfo> {
    CatalogReader::new(upgrader.session())
        .read_table_info(table, None)
        .await
        .unwrap_or_else(|e| panic!("Failed to read catalog for {table}: {e}"))
}

pub async fn mode_of(
    upgrader: &AutoUpgrader,
    table: &TableDefinition,
    options: UpgradeOptions,
) -> UpgradeMode {
    upgrader
        .upgrade_info(table, Some(options))
        .await
        .unwrap_or_else(|e| panic!("Failed to plan {}: {e}", table.name))
        .mode
}

pub async fn scalar_text(upgrader: &AutoUpgrader, sql: &str) -> Option<String> {
    sqlx::query_scalar(sql)
        .fetch_one(upgrader.session().pool())
        .await
        .unwrap_or_else(|e| panic!("Failed to query: {sql}\nError: {e}"))
}
