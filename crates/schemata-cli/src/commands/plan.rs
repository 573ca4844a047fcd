//! The `plan` management command.
//!
//! Compares two catalog snapshots and prints the changes that turn the first
//! into the second.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use schemata_catalog::Catalog;
use schemata_core::logging::catalog_span;
use schemata_core::{SchemaError, SchemaResult, Settings};
use schemata_migrate::{Automigrator, DiffPlan};
use tracing::Instrument;

use crate::command::ManagementCommand;

/// Plans a migration between two catalog JSON files.
///
/// `--drop-objects` (or `migration.drop_objects` in the settings) allows
/// drops and column rewrites; otherwise the plan is additive only.
pub struct PlanCommand;

/// How a plan is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Json,
    Text,
}

impl std::str::FromStr for PlanFormat {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            other => Err(SchemaError::CommandError(format!("Unknown plan format: {other}"))),
        }
    }
}

/// Reads a catalog snapshot written by `inspect`.
pub async fn load_catalog(path: &Path) -> SchemaResult<Catalog> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

/// Renders a plan as pretty JSON or as one line per change.
pub fn render_plan(plan: &DiffPlan, format: PlanFormat) -> SchemaResult<String> {
    match format {
        PlanFormat::Json => Ok(serde_json::to_string_pretty(plan)?),
        PlanFormat::Text if plan.is_empty() => Ok("no changes".to_string()),
        PlanFormat::Text => Ok(plan.describe().join("\n")),
    }
}

#[async_trait]
impl ManagementCommand for PlanCommand {
    fn name(&self) -> &'static str {
        "plan"
    }

    fn help(&self) -> &'static str {
        "Plan the changes between two catalog snapshots"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("src")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Catalog JSON of the current database"),
        )
        .arg(
            clap::Arg::new("dest")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Catalog JSON of the desired database"),
        )
        .arg(
            clap::Arg::new("drop-objects")
                .long("drop-objects")
                .action(clap::ArgAction::SetTrue)
                .help("Allow dropping tables, columns, indexes and constraints"),
        )
        .arg(
            clap::Arg::new("format")
                .long("format")
                .value_parser(["json", "text"])
                .default_value("json")
                .help("Output format"),
        )
    }

    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> SchemaResult<()> {
        let src_path = matches
            .get_one::<PathBuf>("src")
            .ok_or_else(|| SchemaError::CommandError("missing source catalog".to_string()))?;
        let dest_path = matches
            .get_one::<PathBuf>("dest")
            .ok_or_else(|| SchemaError::CommandError("missing destination catalog".to_string()))?;
        let format: PlanFormat = matches
            .get_one::<String>("format")
            .map_or("json", String::as_str)
            .parse()?;
        let drop_objects = matches.get_flag("drop-objects") || settings.migration.drop_objects;

        let span = catalog_span("plan", &dest_path.display().to_string());
        let plan = async {
            let src = load_catalog(src_path).await?;
            let dest = load_catalog(dest_path).await?;
            Ok::<_, SchemaError>(Automigrator::new(&src, &dest, drop_objects).plan())
        }
        .instrument(span)
        .await?;

        println!("{}", render_plan(&plan, format)?);
        Ok(())
    }
}
