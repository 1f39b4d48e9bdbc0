//! Responsive-phase adapters.
//!
//! Each adapter implements [`relay_runtime::Backchannel`], so a tool body runs
//! unchanged whether a person, a model, or a script answers it.

mod automated;
mod interactive;
mod parse;
mod provider;
mod scripted;

pub use automated::{AutomatedAdapter, InputPolicy};
pub use interactive::InteractiveAdapter;
pub use parse::{extract_json, parse_structured};
pub use provider::{CompletionProvider, InputSurface, ProviderFut};
pub use scripted::{DEFAULT_INPUT_TYPES, Recorded, ScriptedAdapter, ScriptedResponse};
