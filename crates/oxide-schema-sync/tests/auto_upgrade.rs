//! End-to-end upgrade scenarios against an in-memory SQLite database.

mod common;

use common::{catalog, create_test_upgrader, execute, mode_of, notes, scalar_text};
use oxide_schema_sync::prelude::*;
use tokio_test::{assert_err, assert_ok};

// =============================================================================
// CREATE / ACTUAL
// =============================================================================

#[tokio::test]
async fn create_then_actual() {
    let upgrader = create_test_upgrader().await;
    let table = notes(&[]);

    assert_eq!(
        mode_of(&upgrader, &table, UpgradeOptions::default()).await,
        UpgradeMode::Create
    );
    let script = assert_ok!(upgrader.upgrade_table(&table, None).await);
    assert_eq!(script.mode, UpgradeMode::Create);

    assert_eq!(
        mode_of(&upgrader, &table, UpgradeOptions::default()).await,
        UpgradeMode::Actual
    );
    let script = assert_ok!(upgrader.upgrade_table(&table, None).await);
    assert!(script.is_empty());
    assert_eq!(script.statements().count(), 0);
}

#[tokio::test]
async fn autoincrement_table_is_actual_after_create() {
    let upgrader = create_test_upgrader().await;
    let table = assert_ok!(TableDefinition::builder("events")
        .field(FieldDefinition::new("id", "INTEGER NOT NULL").identity())
        .field(FieldDefinition::new("kind", "TEXT NOT NULL DEFAULT 'info'"))
        .autoincrement()
        .build());

    assert_ok!(upgrader.upgrade_table(&table, None).await);
    let info = catalog(&upgrader, "events").await.unwrap();
    assert!(info.autoincrement);
    assert_eq!(info.primary_key, ["id"]);
    assert_eq!(
        mode_of(&upgrader, &table, UpgradeOptions::default()).await,
        UpgradeMode::Actual
    );
}

// =============================================================================
// ALTER
// =============================================================================

#[tokio::test]
async fn add_nullable_column() {
    let upgrader = create_test_upgrader().await;
    assert_ok!(upgrader.upgrade_table(&notes(&[]), None).await);
    execute(
        &upgrader,
        "INSERT INTO notes (id, content) VALUES (1, 'hello')",
    )
    .await;

    let table = notes(&[("content2", "TEXT")]);
    assert_eq!(
        mode_of(&upgrader, &table, UpgradeOptions::default()).await,
        UpgradeMode::Alter
    );
    assert_ok!(upgrader.upgrade_table(&table, None).await);

    let info = catalog(&upgrader, "notes").await.unwrap();
    assert_eq!(info.columns.len(), 3);
    assert!(info.column("content2").is_some());
    assert_eq!(
        scalar_text(&upgrader, "SELECT content2 FROM notes WHERE id = 1").await,
        None
    );
    assert_eq!(
        mode_of(&upgrader, &table, UpgradeOptions::default()).await,
        UpgradeMode::Actual
    );
}

#[tokio::test]
async fn add_not_null_column_without_default_fails() {
    let upgrader = create_test_upgrader().await;
    assert_ok!(upgrader.upgrade_table(&notes(&[]), None).await);
    execute(
        &upgrader,
        "INSERT INTO notes (id, content) VALUES (1, 'hello')",
    )
    .await;

    let table = notes(&[("content2", "TEXT NOT NULL")]);
    assert_eq!(
        mode_of(&upgrader, &table, UpgradeOptions::default()).await,
        UpgradeMode::Alter
    );
    let err = assert_err!(upgrader.upgrade_table(&table, None).await);
    assert!(matches!(err, SyncError::Driver { .. }));
    assert!(err.to_string().contains("notes"));
}

#[tokio::test]
async fn index_order_change_is_alter() {
    let upgrader = create_test_upgrader().await;
    let build = |columns: [&str; 2]| {
        assert_ok!(TableDefinition::builder("notes")
            .field(FieldDefinition::new("id", "INTEGER NOT NULL").identity())
            .field(FieldDefinition::new("content", "TEXT"))
            .field(FieldDefinition::new("title", "TEXT"))
            .index(
                "idx_notes",
                IndexDefinition::new().column(columns[0]).column(columns[1]),
            )
            .build())
    };

    let v1 = build(["content", "title"]);
    assert_ok!(upgrader.upgrade_table(&v1, None).await);

    let v2 = build(["title", "content"]);
    assert_eq!(
        mode_of(&upgrader, &v2, UpgradeOptions::default()).await,
        UpgradeMode::Alter
    );
    assert_ok!(upgrader.upgrade_table(&v2, None).await);

    let info = catalog(&upgrader, "notes").await.unwrap();
    let columns: Vec<&str> = info.indexes["idx_notes"].column_names().collect();
    assert_eq!(columns, ["title", "content"]);
    assert_eq!(
        mode_of(&upgrader, &v2, UpgradeOptions::default()).await,
        UpgradeMode::Actual
    );
}

#[tokio::test]
async fn inline_unique_column_stays_actual() {
    let upgrader = create_test_upgrader().await;
    let table = notes(&[("email", "TEXT UNIQUE")]);
    assert_ok!(upgrader.upgrade_table(&table, None).await);

    let info = catalog(&upgrader, "notes").await.unwrap();
    assert_eq!(info.indexes.len(), 1);
    assert_eq!(
        mode_of(&upgrader, &table, UpgradeOptions::default()).await,
        UpgradeMode::Actual
    );
    let script = assert_ok!(upgrader.upgrade_table(&table, None).await);
    assert!(script.is_empty());

    // An ALTER leaves the constraint index alone.
    let extended = notes(&[("email", "TEXT UNIQUE"), ("title", "TEXT")]);
    let script = assert_ok!(upgrader.upgrade_table(&extended, None).await);
    assert_eq!(script.mode, UpgradeMode::Alter);
    assert!(!script.statements().any(|s| s.starts_with("DROP INDEX")));
    assert_eq!(catalog(&upgrader, "notes").await.unwrap().indexes.len(), 1);
    assert_eq!(
        mode_of(&upgrader, &extended, UpgradeOptions::default()).await,
        UpgradeMode::Actual
    );
}

// =============================================================================
// RECREATE
// =============================================================================

#[tokio::test]
async fn keyword_default_recreates_on_every_run() {
    let upgrader = create_test_upgrader().await;
    let table = notes(&[("created", "TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP")]);
    assert_ok!(upgrader.upgrade_table(&table, None).await);

    let info = assert_ok!(upgrader.upgrade_info(&table, None).await);
    assert_eq!(info.mode, UpgradeMode::Recreate);
    assert_eq!(info.reason, "column 'created' changed default");
}

#[tokio::test]
async fn removed_column_is_dropped() {
    let upgrader = create_test_upgrader().await;
    let legacy = notes(&[("legacy", "TEXT")]);
    assert_ok!(upgrader.upgrade_table(&legacy, None).await);
    execute(
        &upgrader,
        "INSERT INTO notes (id, content, legacy) VALUES (1, 'one', 'x'), (2, 'two', 'y')",
    )
    .await;

    let table = notes(&[]);
    assert_eq!(
        mode_of(&upgrader, &table, UpgradeOptions::default()).await,
        UpgradeMode::Recreate
    );
    assert_ok!(upgrader.upgrade_table(&table, None).await);

    let info = catalog(&upgrader, "notes").await.unwrap();
    assert!(info.column("legacy").is_none());
    assert_eq!(
        scalar_text(&upgrader, "SELECT content FROM notes WHERE id = 1").await,
        Some("one".to_string())
    );
    assert_eq!(
        scalar_text(&upgrader, "SELECT content FROM notes WHERE id = 2").await,
        Some("two".to_string())
    );
}

#[tokio::test]
async fn removed_column_is_kept_when_requested() {
    let upgrader = create_test_upgrader().await;
    let legacy = notes(&[("legacy", "TEXT")]);
    assert_ok!(upgrader.upgrade_table(&legacy, None).await);

    let table = notes(&[]);
    let options = UpgradeOptions::new().keep_old_columns();
    assert_eq!(
        mode_of(&upgrader, &table, options).await,
        UpgradeMode::Actual
    );

    let script = assert_ok!(upgrader.upgrade_table(&table, Some(options)).await);
    assert!(script.is_empty());
    let info = catalog(&upgrader, "notes").await.unwrap();
    assert!(info.column("legacy").is_some());
}

#[tokio::test]
async fn force_recreate_preserves_data() {
    let upgrader = create_test_upgrader().await;
    let table = notes(&[]);
    assert_ok!(upgrader.upgrade_table(&table, None).await);
    execute(
        &upgrader,
        "INSERT INTO notes (id, content) VALUES (7, 'kept')",
    )
    .await;

    let options = UpgradeOptions::new().force_recreate();
    assert_eq!(
        mode_of(&upgrader, &table, options).await,
        UpgradeMode::Recreate
    );
    let script = assert_ok!(upgrader.upgrade_table(&table, Some(options)).await);
    assert_eq!(script.mode, UpgradeMode::Recreate);

    assert_eq!(
        scalar_text(&upgrader, "SELECT content FROM notes WHERE id = 7").await,
        Some("kept".to_string())
    );
    assert_eq!(
        mode_of(&upgrader, &table, UpgradeOptions::default()).await,
        UpgradeMode::Actual
    );
}

fn parent() -> TableDefinition {
    assert_ok!(TableDefinition::builder("parent")
        .field(FieldDefinition::new("id", "INTEGER NOT NULL").identity())
        .field(FieldDefinition::new("code", "TEXT"))
        .index(
            "idx_parent_code",
            IndexDefinition::new().column("code").unique(),
        )
        .build())
}

fn child(references_column: &str) -> TableDefinition {
    assert_ok!(TableDefinition::builder("child")
        .field(FieldDefinition::new("id", "INTEGER NOT NULL").identity())
        .field(FieldDefinition::new("parent_ref", "INTEGER"))
        .foreign_key(
            "fk_child_parent",
            ForeignKeyDefinition::new(["parent_ref"], "parent", [references_column]),
        )
        .build())
}

#[tokio::test]
async fn foreign_key_target_change_is_recreate() {
    let upgrader = create_test_upgrader().await;
    let tables = [parent(), child("id")];
    assert_ok!(upgrader.upgrade_tables(&tables, None).await);

    let changed = child("code");
    assert_eq!(
        mode_of(&upgrader, &changed, UpgradeOptions::default()).await,
        UpgradeMode::Recreate
    );
    assert_ok!(upgrader.upgrade_table(&changed, None).await);

    let info = catalog(&upgrader, "child").await.unwrap();
    let fk = generic_foreign_key_id(&["parent_ref"], "parent", &["code"]);
    assert!(info.foreign_keys.contains_key(&fk));
    assert_eq!(
        mode_of(&upgrader, &changed, UpgradeOptions::default()).await,
        UpgradeMode::Actual
    );
}

#[tokio::test]
async fn recreating_parent_keeps_child_references() {
    let upgrader = create_test_upgrader().await;
    assert_ok!(upgrader.set_foreign_keys(true).await);
    let tables = [parent(), child("id")];
    assert_ok!(upgrader.upgrade_tables(&tables, None).await);
    execute(&upgrader, "INSERT INTO parent (id, code) VALUES (1, 'a')").await;
    execute(
        &upgrader,
        "INSERT INTO child (id, parent_ref) VALUES (10, 1)",
    )
    .await;

    let options = UpgradeOptions::new().force_recreate();
    assert_ok!(upgrader.upgrade_table(&parent(), Some(options)).await);

    assert!(assert_ok!(upgrader.foreign_keys_enabled().await));
    let info = catalog(&upgrader, "child").await.unwrap();
    let fk = generic_foreign_key_id(&["parent_ref"], "parent", &["id"]);
    assert!(info.foreign_keys.contains_key(&fk));
    let parent_info = catalog(&upgrader, "parent").await.unwrap();
    assert!(parent_info.indexes.contains_key("idx_parent_code"));
    assert_eq!(
        scalar_text(&upgrader, "SELECT code FROM parent WHERE id = 1").await,
        Some("a".to_string())
    );
}

// =============================================================================
// Attached schemas
// =============================================================================

#[tokio::test]
async fn attached_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aux.db");
    let upgrader = create_test_upgrader().await;
    let dialect = SqliteDialect::new();
    execute(
        &upgrader,
        &format!(
            "ATTACH DATABASE {} AS aux",
            dialect.quote_literal(&path.to_string_lossy())
        ),
    )
    .await;

    let build = |extra: Option<&str>| {
        let mut builder = TableDefinition::builder("notes")
            .schema("aux")
            .field(FieldDefinition::new("id", "INTEGER NOT NULL").identity())
            .field(FieldDefinition::new("content", "TEXT"));
        if let Some(name) = extra {
            builder = builder
                .field(FieldDefinition::new(name, "TEXT"))
                .index("idx_aux_notes", IndexDefinition::new().column(name));
        }
        assert_ok!(builder.build())
    };

    let v1 = build(Some("legacy"));
    assert_ok!(upgrader.upgrade_table(&v1, None).await);
    execute(
        &upgrader,
        "INSERT INTO aux.notes (id, content) VALUES (1, 'x')",
    )
    .await;

    let reader = CatalogReader::new(upgrader.session());
    assert!(assert_ok!(reader.read_schemas().await).contains(&"aux".to_string()));
    assert_eq!(assert_ok!(reader.read_tables("aux").await), ["notes"]);
    assert!(assert_ok!(reader.read_tables("main").await).is_empty());

    let v2 = build(None);
    assert_eq!(
        mode_of(&upgrader, &v2, UpgradeOptions::default()).await,
        UpgradeMode::Recreate
    );
    assert_ok!(upgrader.upgrade_table(&v2, None).await);
    assert_eq!(
        mode_of(&upgrader, &v2, UpgradeOptions::default()).await,
        UpgradeMode::Actual
    );
    assert_eq!(
        scalar_text(&upgrader, "SELECT content FROM aux.notes WHERE id = 1").await,
        Some("x".to_string())
    );
}
