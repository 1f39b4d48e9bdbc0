//! Error taxonomy shared by every layer.
//!
//! [`RelayError`] is the typed failure surfaced to transports. [`Interrupt`] is what
//! tool bodies return: a failure, or a cancellation unwinding the body. Cancellation
//! never becomes a `RelayError`; public operations report it as
//! [`Outcome::Cancelled`](crate::Outcome::Cancelled).

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::capability::Capability;
use crate::ids::CallId;

/// Which wall-clock ceiling elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutScope {
    /// The call-wide ceiling on the root scope.
    Call,
    /// A branch's own ceiling.
    Branch { depth: u32 },
}

impl fmt::Display for TimeoutScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutScope::Call => f.write_str("call"),
            TimeoutScope::Branch { depth } => write!(f, "branch at depth {depth}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid params: {message}")]
    Validation { message: String },
    #[error("Invalid tool schema: {message}")]
    InvalidSchema { message: String },
    #[error("Tool '{tool}' requires capability '{missing}' which adapter '{adapter}' does not provide")]
    Capability {
        tool: String,
        missing: Capability,
        adapter: String,
    },
    #[error("Capability '{capability}' is unavailable on adapter '{adapter}'")]
    Unavailable {
        capability: Capability,
        adapter: String,
    },
    #[error("Branch depth {depth} exceeds limit {limit}")]
    DepthLimit { depth: u32, limit: u32 },
    #[error("Token budget exceeded at depth {depth}: used {used} of {budget}")]
    TokenBudget { used: u64, budget: u64, depth: u32 },
    #[error("Timed out: {scope} exceeded {limit:?}")]
    Timeout { scope: TimeoutScope, limit: Duration },
    #[error("Response did not match schema: {message}")]
    ResponseParse { message: String, raw: String },
    #[error("Script error: {message}")]
    Script { message: String },
    #[error("Completion provider failed: {message}")]
    Provider { message: String },
    #[error("Branch scope is closed ({state})")]
    ScopeClosed { state: &'static str },
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },
    #[error("Duplicate tool registered: {name}")]
    DuplicateTool { name: String },
    #[error("Unknown call: {call_id}")]
    UnknownCall { call_id: CallId },
    #[error("Call {call_id} already has a phase in flight")]
    CallInProgress { call_id: CallId },
    #[error("Call {call_id} is closed ({phase})")]
    CallClosed { call_id: CallId, phase: &'static str },
    #[error("Call {call_id} does not match its record: {field} differs")]
    CallMismatch { call_id: CallId, field: &'static str },
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{source}")]
    Tool {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl RelayError {
    /// Wrap an error raised by tool code so it propagates unchanged.
    pub fn tool(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        RelayError::Tool {
            source: source.into(),
        }
    }
}

/// Why a body stopped before producing a value.
#[derive(Debug, Error)]
pub enum Interrupt {
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Failed(#[from] RelayError),
}

impl Interrupt {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Interrupt::Cancelled)
    }

    #[must_use]
    pub fn failure(&self) -> Option<&RelayError> {
        match self {
            Interrupt::Cancelled => None,
            Interrupt::Failed(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for Interrupt {
    fn from(value: serde_json::Error) -> Self {
        Interrupt::Failed(RelayError::Serialization(value))
    }
}
