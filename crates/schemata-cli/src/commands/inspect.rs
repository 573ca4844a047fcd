//! The `inspect` management command.
//!
//! Introspects a SQLite database and prints its catalog as JSON.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use schemata_catalog::Catalog;
use schemata_core::logging::catalog_span;
use schemata_core::{SchemaError, SchemaResult, Settings};
use schemata_sqlite::{DatabaseIntrospector, Filter, SqliteDatabase};
use tracing::Instrument;

use crate::command::ManagementCommand;

/// Introspects a database into a catalog snapshot.
///
/// `--table` and `--exclude-table` add to the lists from the settings file;
/// `--database` replaces the configured path.
pub struct InspectCommand;

/// Opens the configured database and reads its catalog. A missing database
/// file is an error rather than an empty catalog.
pub async fn inspect_database(settings: &Settings) -> SchemaResult<Catalog> {
    let source = settings.database.path.display().to_string();
    async {
        let db = SqliteDatabase::open_existing(
            settings.database.path.clone(),
            settings.database.pool_size,
            Duration::from_millis(settings.database.busy_timeout_ms),
        )?;
        let filter = Filter::from_settings(&settings.introspection);
        let mut introspector = DatabaseIntrospector::new(db, filter);
        let mut catalog = Catalog::default();
        introspector.write_catalog(&mut catalog).await?;
        Ok::<_, SchemaError>(catalog)
    }
    .instrument(catalog_span("inspect", &source))
    .await
}

#[async_trait]
impl ManagementCommand for InspectCommand {
    fn name(&self) -> &'static str {
        "inspect"
    }

    fn help(&self) -> &'static str {
        "Introspect a database and print its catalog as JSON"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("database")
                .long("database")
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Database file to introspect"),
        )
        .arg(
            clap::Arg::new("table")
                .long("table")
                .action(clap::ArgAction::Append)
                .help("Only introspect this table (repeatable)"),
        )
        .arg(
            clap::Arg::new("exclude-table")
                .long("exclude-table")
                .action(clap::ArgAction::Append)
                .help("Skip this table (repeatable)"),
        )
        .arg(
            clap::Arg::new("output")
                .long("output")
                .short('o')
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Write the catalog to a file instead of stdout"),
        )
    }

    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> SchemaResult<()> {
        let mut settings = settings.clone();
        if let Some(path) = matches.get_one::<PathBuf>("database") {
            settings.database.path.clone_from(path);
        }
        if let Some(tables) = matches.get_many::<String>("table") {
            settings.introspection.tables.extend(tables.cloned());
        }
        if let Some(tables) = matches.get_many::<String>("exclude-table") {
            settings.introspection.exclude_tables.extend(tables.cloned());
        }

        let catalog = inspect_database(&settings).await?;
        let json = serde_json::to_string_pretty(&catalog)?;

        match matches.get_one::<PathBuf>("output") {
            Some(output) => {
                tokio::fs::write(output, format!("{json}\n")).await?;
                tracing::info!(output = %output.display(), "catalog written");
            }
            None => println!("{json}"),
        }
        Ok(())
    }
}
