//! Core domain types for Relay.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything that crosses the authoritative/responsive boundary is defined here and
//! is serializable: call ids, messages, limits, capability tags, completion and input
//! records, the handoff snapshot, and the error taxonomy.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod budget;
mod capability;
mod completion;
mod error;
mod handoff;
mod ids;
mod input;
mod message;
mod notify;

pub use budget::{Limits, narrow};
pub use capability::{Capability, CapabilitySet, ContextMode};
pub use completion::{CompletionOptions, CompletionResult, Prompt, StopReason};
pub use error::{Interrupt, RelayError, TimeoutScope};
pub use handoff::{Authority, HandoffData, Outcome, SetupOutcome};
pub use ids::{BranchId, CallId, CallIdSource, UuidCallIds};
pub use input::{DeclineReason, InputOutcome, InputSpec};
pub use message::{Message, Role};
pub use notify::{LogLevel, Notification};
