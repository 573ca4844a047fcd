//! Built-in management commands.

pub mod inspect;
pub mod plan;

pub use inspect::InspectCommand;
pub use plan::PlanCommand;

use crate::command::CommandRegistry;

/// Registers every built-in command into the given registry.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register(Box::new(InspectCommand));
    registry.register(Box::new(PlanCommand));
}
