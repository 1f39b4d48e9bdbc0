//! Built-in Relay tools.

pub mod brief;
pub mod guess_card;

use relay_executor::ToolRegistry;
use relay_types::RelayError;

pub fn register_builtins(registry: &mut ToolRegistry) -> Result<(), RelayError> {
    registry.register(guess_card::tool())?;
    registry.register(brief::tool())?;
    Ok(())
}
