//! Branch runtime for responsive-phase execution.
//!
//! A tool's responsive phase runs against a [`Branch`]: a scope that forwards
//! completions and input requests to a [`Backchannel`], tracks conversation history,
//! and enforces depth, token and time ceilings inherited through spawned children.

mod backchannel;
mod branch;
mod estimate;
mod guard;
mod ledger;

pub use backchannel::{Backchannel, BackchannelFut, CompletionRequest, ScopeInfo};
pub use branch::{Branch, BranchOptions, ScopeState};
pub use estimate::{MESSAGE_OVERHEAD_TOKENS, estimate_messages, estimate_tokens};
pub use guard::{Deadline, guarded};
pub use ledger::TokenLedger;
