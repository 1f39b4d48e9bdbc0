//! The handoff snapshot and phase outcomes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Interrupt, RelayError};
use crate::ids::CallId;

/// Serializable snapshot a setup step hands to the responsive side.
///
/// Holds only data: no open resources, no callables. Exactly one snapshot exists per
/// call instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffData {
    pub call_id: CallId,
    pub tool: String,
    pub payload: Value,
}

/// Result of phase 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SetupOutcome {
    /// Setup finished the call by itself; no responsive phase follows.
    Result { value: Value },
    /// Setup halted; the responsive phase must run before `resume`.
    Handoff { data: HandoffData },
}

impl SetupOutcome {
    #[must_use]
    pub fn is_simple(&self) -> bool {
        matches!(self, SetupOutcome::Result { .. })
    }

    #[must_use]
    pub fn handoff(&self) -> Option<&HandoffData> {
        match self {
            SetupOutcome::Handoff { data } => Some(data),
            SetupOutcome::Result { .. } => None,
        }
    }
}

/// Which side's step is authoritative for a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Authority {
    /// Setup runs first and owns the secrets; finalize scores the response.
    #[default]
    Setup,
    /// The responsive phase runs first with only parameters; finalize runs once after.
    Responsive,
}

/// How a call or scope terminated when it did not fail.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    Cancelled,
}

impl<T> Outcome<T> {
    /// Split a body's flow into a termination outcome and a real error.
    pub fn from_flow(flow: Result<T, Interrupt>) -> Result<Self, RelayError> {
        match flow {
            Ok(value) => Ok(Outcome::Completed(value)),
            Err(Interrupt::Cancelled) => Ok(Outcome::Cancelled),
            Err(Interrupt::Failed(err)) => Err(err),
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    #[must_use]
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Cancelled => None,
        }
    }
}
