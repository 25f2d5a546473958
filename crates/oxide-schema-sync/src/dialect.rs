//! SQLite SQL text generation.
//!
//! SQLite cannot drop or retype columns, change a primary key or touch
//! foreign keys in place, so the only in-place changes used here are
//! `ADD COLUMN` and index creation/removal. Everything else goes through the
//! rename/create/copy/drop sequence built by the executor.

use crate::definition::{FieldDefinition, IndexDefinition, TableDefinition};

/// SQLite SQL generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Quotes an identifier, doubling embedded quotes.
    #[must_use]
    pub fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quotes a string literal, doubling embedded single quotes.
    #[must_use]
    pub fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Quotes `name`, prefixed by the quoted schema if there is one.
    #[must_use]
    pub fn qualified(&self, schema: Option<&str>, name: &str) -> String {
        match schema {
            Some(schema) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(name)
            ),
            None => self.quote_identifier(name),
        }
    }

    /// Builds a schema-qualified pragma call, e.g.
    /// `PRAGMA "main".table_info("users")`.
    #[must_use]
    pub fn pragma(&self, schema: Option<&str>, pragma: &str, argument: &str) -> String {
        let prefix = schema
            .map(|s| format!("{}.", self.quote_identifier(s)))
            .unwrap_or_default();
        format!(
            "PRAGMA {}{}({})",
            prefix,
            pragma,
            self.quote_identifier(argument)
        )
    }

    /// Generates a column definition: the quoted name followed by the
    /// declared type verbatim.
    #[must_use]
    pub fn column_definition(&self, field: &FieldDefinition) -> String {
        format!(
            "{} {}",
            self.quote_identifier(&field.name),
            field.db_type.trim()
        )
    }

    /// Generates `CREATE TABLE IF NOT EXISTS` for the table, with
    /// `extra_fields` appended after the declared fields.
    #[must_use]
    pub fn create_table_sql(
        &self,
        table: &TableDefinition,
        extra_fields: &[FieldDefinition],
    ) -> String {
        let identity: Vec<&FieldDefinition> = table.identity_fields().collect();
        let inline_autoincrement = table.autoincrement && identity.len() == 1;

        let mut defs: Vec<String> = table
            .fields
            .iter()
            .chain(extra_fields)
            .map(|field| {
                let mut def = self.column_definition(field);
                if inline_autoincrement && field.identity {
                    def.push_str(" PRIMARY KEY AUTOINCREMENT");
                }
                def
            })
            .collect();

        if !identity.is_empty() && !inline_autoincrement {
            let quoted: Vec<String> = identity
                .iter()
                .map(|f| self.quote_identifier(&f.name))
                .collect();
            defs.push(format!("PRIMARY KEY ({})", quoted.join(", ")));
        }

        for (name, fk) in &table.foreign_keys {
            let columns: Vec<String> = fk
                .columns
                .iter()
                .map(|c| self.quote_identifier(c))
                .collect();
            let references: Vec<String> = fk
                .references_columns
                .iter()
                .map(|c| self.quote_identifier(c))
                .collect();
            defs.push(format!(
                "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                self.quote_identifier(name),
                columns.join(", "),
                self.quote_identifier(&fk.references_table),
                references.join(", ")
            ));
        }

        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            self.qualified(table.schema.as_deref(), &table.name),
            defs.join(",\n  ")
        );
        if table.without_rowid {
            sql.push_str(" WITHOUT ROWID");
        }
        sql
    }

    /// Generates `ALTER TABLE ... ADD COLUMN`.
    #[must_use]
    pub fn add_column_sql(&self, table: &TableDefinition, field: &FieldDefinition) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.qualified(table.schema.as_deref(), &table.name),
            self.column_definition(field)
        )
    }

    /// Generates `CREATE [UNIQUE] INDEX IF NOT EXISTS`.
    ///
    /// The schema qualifies the index name; SQLite resolves the `ON` table
    /// within that schema.
    #[must_use]
    pub fn create_index_sql(
        &self,
        table: &TableDefinition,
        name: &str,
        index: &IndexDefinition,
    ) -> String {
        let columns: Vec<String> = index
            .columns
            .iter()
            .map(|c| {
                let quoted = self.quote_identifier(&c.name);
                if c.desc {
                    format!("{} DESC", quoted)
                } else {
                    quoted
                }
            })
            .collect();
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            self.qualified(table.schema.as_deref(), name),
            self.quote_identifier(&table.name),
            columns.join(", ")
        )
    }

    /// Generates `DROP INDEX IF EXISTS`.
    #[must_use]
    pub fn drop_index_sql(&self, schema: Option<&str>, name: &str) -> String {
        format!("DROP INDEX IF EXISTS {}", self.qualified(schema, name))
    }

    /// Generates `ALTER TABLE ... RENAME TO`. The new name stays in the
    /// same schema and is therefore never qualified.
    #[must_use]
    pub fn rename_table_sql(&self, schema: Option<&str>, old_name: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.qualified(schema, old_name),
            self.quote_identifier(new_name)
        )
    }

    /// Generates `DROP TABLE IF EXISTS`.
    #[must_use]
    pub fn drop_table_sql(&self, schema: Option<&str>, name: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.qualified(schema, name))
    }

    /// Generates `INSERT INTO to (cols) SELECT cols FROM from`.
    #[must_use]
    pub fn copy_rows_sql(
        &self,
        schema: Option<&str>,
        from: &str,
        to: &str,
        columns: &[String],
    ) -> String {
        let quoted: Vec<String> = columns.iter().map(|c| self.quote_identifier(c)).collect();
        let list = quoted.join(", ");
        format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            self.qualified(schema, to),
            list,
            list,
            self.qualified(schema, from)
        )
    }

    /// Generates the statement toggling legacy `ALTER TABLE ... RENAME`
    /// behaviour, under which renaming a table leaves references to it in
    /// other tables' foreign keys untouched.
    #[must_use]
    pub fn legacy_alter_table_sql(&self, enabled: bool) -> String {
        format!(
            "PRAGMA legacy_alter_table = {}",
            if enabled { "ON" } else { "OFF" }
        )
    }
}
