//! Catalog introspection.
//!
//! Reads what SQLite's pragmas report about an existing table and turns it
//! into a [`CatalogTableInfo`].

use std::collections::BTreeMap;

use sqlx::Row;
use tracing::debug;

use crate::catalog::{
    CatalogColumn, CatalogForeignKey, CatalogIndex, CatalogIndexColumn, CatalogTableInfo,
};
use crate::column_type::TypeAffinity;
use crate::dialect::SqliteDialect;
use crate::error::{Result, SyncError};
use crate::session::Session;

const READ_CATALOG: &str = "read catalog";

/// Reads table metadata from the live catalog.
#[derive(Debug, Clone, Copy)]
pub struct CatalogReader<'a> {
    session: &'a Session,
    dialect: SqliteDialect,
}

impl<'a> CatalogReader<'a> {
    /// Creates a reader over the given session.
    #[must_use]
    pub fn new(session: &'a Session) -> Self {
        Self {
            session,
            dialect: SqliteDialect::new(),
        }
    }

    /// Lists the attached schemas (`main`, `temp`, and any attached database).
    pub async fn read_schemas(&self) -> Result<Vec<String>> {
        let rows = self.session.fetch_catalog("PRAGMA database_list").await?;
        let mut schemas = Vec::with_capacity(rows.len());
        for row in rows {
            schemas.push(row.try_get::<String, _>("name")?);
        }
        Ok(schemas)
    }

    /// Lists the user tables of a schema.
    pub async fn read_tables(&self, schema: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT name FROM {} WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' ORDER BY name",
            self.dialect.qualified(Some(schema), "sqlite_master")
        );
        let rows = self.session.fetch_catalog(&sql).await?;
        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            tables.push(row.try_get::<String, _>("name")?);
        }
        Ok(tables)
    }

    /// Reads everything the catalog knows about a table.
    ///
    /// Returns `None` when the table does not exist.
    pub async fn read_table_info(
        &self,
        table: &str,
        schema: Option<&str>,
    ) -> Result<Option<CatalogTableInfo>> {
        let wrap = |err: sqlx::Error| SyncError::driver(table, READ_CATALOG)(err);

        let column_rows = self
            .session
            .fetch_catalog(&self.dialect.pragma(schema, "table_info", table))
            .await
            .map_err(wrap)?;
        if column_rows.is_empty() {
            debug!(table = %table, "Table not found in catalog");
            return Ok(None);
        }

        let mut columns = BTreeMap::new();
        let mut primary_key: Vec<(i64, String)> = Vec::new();
        for row in &column_rows {
            let name: String = row.try_get("name").map_err(wrap)?;
            let type_text: String = row
                .try_get::<Option<String>, _>("type")
                .map_err(wrap)?
                .unwrap_or_default();
            let not_null: i64 = row.try_get("notnull").map_err(wrap)?;
            let default_value: Option<String> = row.try_get("dflt_value").map_err(wrap)?;
            let pk: i64 = row.try_get("pk").map_err(wrap)?;

            if pk > 0 {
                primary_key.push((pk, name.clone()));
            }
            columns.insert(
                name.clone(),
                CatalogColumn {
                    name,
                    affinity: TypeAffinity::of_catalog_type(&type_text),
                    type_text,
                    not_null: not_null != 0,
                    default_value,
                },
            );
        }
        primary_key.sort_by_key(|(position, _)| *position);
        let primary_key: Vec<String> = primary_key.into_iter().map(|(_, name)| name).collect();

        let indexes = self.read_indexes(table, schema).await.map_err(wrap)?;
        let foreign_keys = self.read_foreign_keys(table, schema).await.map_err(wrap)?;

        let integer_key = match primary_key.as_slice() {
            [pk] => columns.get(pk).map(|c| c.affinity) == Some(TypeAffinity::Integer),
            _ => false,
        };
        let autoincrement = if integer_key {
            self.creation_sql_mentions_autoincrement(table, schema)
                .await
                .map_err(wrap)?
        } else {
            false
        };

        Ok(Some(CatalogTableInfo {
            name: table.to_string(),
            schema: schema.unwrap_or("main").to_string(),
            columns,
            primary_key,
            autoincrement,
            indexes,
            foreign_keys,
        }))
    }

    async fn read_indexes(
        &self,
        table: &str,
        schema: Option<&str>,
    ) -> std::result::Result<BTreeMap<String, CatalogIndex>, sqlx::Error> {
        let mut indexes = BTreeMap::new();
        let list = self
            .session
            .fetch_catalog(&self.dialect.pragma(schema, "index_list", table))
            .await?;

        for row in list {
            let origin: String = row.try_get("origin")?;
            if origin == "pk" {
                continue;
            }
            let name: String = row.try_get("name")?;
            let unique: i64 = row.try_get("unique")?;
            let partial: i64 = row.try_get("partial")?;

            let xinfo = self
                .session
                .fetch_catalog(&self.dialect.pragma(schema, "index_xinfo", &name))
                .await?;
            let mut info: Vec<(i64, bool, CatalogIndexColumn)> = Vec::with_capacity(xinfo.len());
            for col in xinfo {
                let seqno: i64 = col.try_get("seqno")?;
                let key: i64 = col.try_get("key")?;
                let desc: i64 = col.try_get("desc")?;
                let column: Option<String> = col.try_get("name")?;
                let column = CatalogIndexColumn {
                    name: column.unwrap_or_default(),
                    desc: desc != 0,
                };
                info.push((seqno, key != 0, column));
            }
            info.sort_by_key(|(seqno, _, _)| *seqno);

            indexes.insert(
                name.clone(),
                CatalogIndex {
                    name,
                    unique: unique != 0,
                    partial: partial != 0,
                    constraint: origin == "u",
                    columns: info
                        .into_iter()
                        .filter(|(_, key, _)| *key)
                        .map(|(_, _, column)| column)
                        .collect(),
                },
            );
        }
        Ok(indexes)
    }

    async fn read_foreign_keys(
        &self,
        table: &str,
        schema: Option<&str>,
    ) -> std::result::Result<BTreeMap<String, CatalogForeignKey>, sqlx::Error> {
        let rows = self
            .session
            .fetch_catalog(&self.dialect.pragma(schema, "foreign_key_list", table))
            .await?;

        // Rows of one constraint share an id; seq orders their columns.
        let mut grouped: BTreeMap<i64, Vec<(i64, String, String, String)>> = BTreeMap::new();
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let seq: i64 = row.try_get("seq")?;
            let references_table: String = row.try_get("table")?;
            let from: String = row.try_get("from")?;
            let to: Option<String> = row.try_get("to")?;
            grouped
                .entry(id)
                .or_default()
                .push((seq, references_table, from, to.unwrap_or_default()));
        }

        let mut foreign_keys = BTreeMap::new();
        for (_, mut parts) in grouped {
            parts.sort_by_key(|(seq, ..)| *seq);
            let references_table = parts[0].1.clone();
            let fk = CatalogForeignKey {
                references_table,
                columns: parts.iter().map(|(_, _, from, _)| from.clone()).collect(),
                references_columns: parts.iter().map(|(_, _, _, to)| to.clone()).collect(),
            };
            foreign_keys.insert(fk.generic_id(), fk);
        }
        Ok(foreign_keys)
    }

    /// Heuristic AUTOINCREMENT detection: a case-insensitive search of the
    /// stored CREATE statement. Any occurrence counts, including one inside
    /// a comment or a string literal.
    async fn creation_sql_mentions_autoincrement(
        &self,
        table: &str,
        schema: Option<&str>,
    ) -> std::result::Result<bool, sqlx::Error> {
        let sql = format!(
            "SELECT sql FROM {} WHERE type = 'table' AND name = {}",
            self.dialect.qualified(schema, "sqlite_master"),
            self.dialect.quote_literal(table)
        );
        let rows = self.session.fetch_catalog(&sql).await?;
        let Some(row) = rows.first() else {
            return Ok(false);
        };
        let create_sql: Option<String> = row.try_get("sql")?;
        Ok(create_sql.is_some_and(|s| s.to_ascii_uppercase().contains("AUTOINCREMENT")))
    }
}
