use schemata_cli::{load_settings, register_builtin_commands, CommandRegistry};
use schemata_core::logging::setup_logging;

#[tokio::main]
async fn main() {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);

    let matches = registry.build_cli().get_matches();
    let settings = match load_settings(&matches) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(e.exit_code());
        }
    };
    setup_logging(&settings);

    if let Err(e) = registry.execute(&matches, &settings).await {
        tracing::error!(error = %e, "command failed");
        eprintln!("{e}");
        std::process::exit(e.exit_code());
    }
}
