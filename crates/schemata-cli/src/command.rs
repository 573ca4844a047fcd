//! Management command framework.
//!
//! [`ManagementCommand`] defines one CLI subcommand and [`CommandRegistry`]
//! collects them into a single clap application with a global `--settings`
//! option.
//!
//! ## Defining a Custom Command
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use schemata_cli::command::ManagementCommand;
//! use schemata_core::{SchemaResult, Settings};
//!
//! struct VersionCommand;
//!
//! #[async_trait]
//! impl ManagementCommand for VersionCommand {
//!     fn name(&self) -> &str { "version" }
//!     fn help(&self) -> &str { "Print the schemata version" }
//!
//!     async fn handle(
//!         &self,
//!         _matches: &clap::ArgMatches,
//!         _settings: &Settings,
//!     ) -> SchemaResult<()> {
//!         println!("{}", env!("CARGO_PKG_VERSION"));
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use schemata_core::{SchemaError, SchemaResult, Settings};

/// The id of the global settings file option.
pub const SETTINGS_ARG: &str = "settings";

/// A subcommand that can be registered and invoked through the CLI.
#[async_trait]
pub trait ManagementCommand: Send + Sync {
    /// The subcommand name.
    fn name(&self) -> &str;

    /// A short help description.
    fn help(&self) -> &str;

    /// Adds positional arguments, flags, or options to the subcommand.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Runs the command with its argument matches and the loaded settings.
    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> SchemaResult<()>;
}

/// Commands by name, and the dispatcher over them.
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn ManagementCommand>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registers a command, replacing any command with the same name.
    pub fn register(&mut self, command: Box<dyn ManagementCommand>) {
        let name = command.name().to_string();
        self.commands.insert(name, command);
    }

    pub fn get(&self, name: &str) -> Option<&dyn ManagementCommand> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// Returns the registered command names, sorted.
    pub fn list_commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds the top-level clap `Command` with every registered subcommand.
    pub fn build_cli(&self) -> clap::Command {
        let mut app = clap::Command::new("schemata")
            .about("Database schema introspection and automigration planning")
            .version(env!("CARGO_PKG_VERSION"))
            .subcommand_required(true)
            .arg(
                clap::Arg::new(SETTINGS_ARG)
                    .long("settings")
                    .global(true)
                    .value_name("FILE")
                    .help("TOML settings file"),
            );

        let mut entries: Vec<_> = self.commands.iter().collect();
        entries.sort_by_key(|(name, _)| (*name).clone());

        for (name, cmd) in entries {
            // clap wants 'static names; commands are registered once at startup.
            let static_name: &'static str = Box::leak(name.clone().into_boxed_str());
            let subcmd = clap::Command::new(static_name).about(cmd.help().to_string());
            app = app.subcommand(cmd.add_arguments(subcmd));
        }

        app
    }

    /// Dispatches to the subcommand named in `matches`.
    pub async fn execute(&self, matches: &clap::ArgMatches, settings: &Settings) -> SchemaResult<()> {
        let (name, sub_matches) = matches
            .subcommand()
            .ok_or_else(|| SchemaError::CommandError("No subcommand specified".to_string()))?;

        let cmd = self
            .get(name)
            .ok_or_else(|| SchemaError::CommandError(format!("Unknown command: {name}")))?;

        cmd.handle(sub_matches, settings).await
    }
}

/// Loads settings from the global `--settings` file, or defaults plus
/// `SCHEMATA_*` environment overrides when none is given.
pub fn load_settings(matches: &clap::ArgMatches) -> SchemaResult<Settings> {
    match matches.get_one::<String>(SETTINGS_ARG) {
        Some(path) => schemata_core::settings_loader::from_toml_file_with_env(path),
        None => Ok(schemata_core::settings_loader::from_env()),
    }
}
