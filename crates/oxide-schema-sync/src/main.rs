//! oxide-schema-sync CLI
//!
//! Command-line tool for bringing an SQLite database in line with a file of
//! table definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_schema_sync::prelude::*;

/// Keeps SQLite tables in sync with declared table definitions.
#[derive(Parser)]
#[command(name = "oxide-schema-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// JSON file with the table definitions.
    #[arg(short = 'f', long, default_value = "schema.json")]
    definitions: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct OptionArgs {
    /// Keep columns that are no longer declared instead of dropping them.
    #[arg(long)]
    keep_old_columns: bool,

    /// Rebuild every table even if nothing changed.
    #[arg(long)]
    force_recreate: bool,
}

impl From<OptionArgs> for UpgradeOptions {
    fn from(args: OptionArgs) -> Self {
        Self {
            keep_old_columns: args.keep_old_columns,
            force_recreate: args.force_recreate,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the upgrade mode of every table.
    Plan {
        #[command(flatten)]
        options: OptionArgs,
    },

    /// Upgrade every table.
    Upgrade {
        #[command(flatten)]
        options: OptionArgs,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the SQL an upgrade would run.
    Sql {
        #[command(flatten)]
        options: OptionArgs,
    },

    /// List attached schemas, or the tables of one schema.
    Tables {
        /// Schema to list tables of.
        #[arg(short, long)]
        schema: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let session = Session::connect(&cli.database).await?;

    match cli.command {
        Commands::Tables { schema } => {
            let reader = CatalogReader::new(&session);
            match schema {
                Some(schema) => {
                    for table in reader.read_tables(&schema).await? {
                        println!("{}", table);
                    }
                }
                None => {
                    for schema in reader.read_schemas().await? {
                        println!("{}", schema);
                    }
                }
            }
        }

        Commands::Plan { options } => {
            let registry = SchemaRegistry::load(&cli.definitions)?;
            let upgrader = AutoUpgrader::new(session);
            let infos = upgrader
                .upgrade_infos(registry.tables(), Some(options.into()))
                .await?;

            println!("\n{:<40} {:<10} REASON", "TABLE", "MODE");
            println!("{:-<72}", "");
            for (table, info) in registry.tables().iter().zip(&infos) {
                println!(
                    "{:<40} {:<10} {}",
                    table.qualified_name(),
                    info.mode.to_string(),
                    info.reason
                );
            }
            println!();
        }

        Commands::Sql { options } => {
            let registry = SchemaRegistry::load(&cli.definitions)?;
            let upgrader = AutoUpgrader::new(session);
            for table in registry.tables() {
                let script = upgrader.sql_for(table, Some(options.into())).await?;
                if script.is_empty() {
                    continue;
                }
                println!("-- {} ({})", script.table, script.mode);
                for sql in script.statements() {
                    println!("{};", sql);
                }
                println!();
            }
        }

        Commands::Upgrade { options, dry_run } => {
            let registry = SchemaRegistry::load(&cli.definitions)?;
            if registry.is_empty() {
                info!("No tables defined in {}.", cli.definitions.display());
                return Ok(());
            }

            if dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
            }

            let upgrader = AutoUpgrader::new(session).dry_run(dry_run);
            let scripts = upgrader
                .upgrade_tables(registry.tables(), Some(options.into()))
                .await?;

            if dry_run {
                for script in scripts.iter().filter(|s| !s.is_empty()) {
                    for sql in script.statements() {
                        println!("{};", sql);
                    }
                }
            }

            let changed = scripts.iter().filter(|s| !s.is_empty()).count();
            info!("{} of {} tables upgraded.", changed, scripts.len());
        }
    }

    Ok(())
}
