//! Structured input requests and their tagged outcomes.
//!
//! Declining or cancelling is a normal answer, not an error: bodies match on
//! [`InputOutcome`] and decide what a refusal means for their result.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    /// Registered kind of input (e.g. `choice`, `text`, `confirm`).
    pub input_type: String,
    /// Prompt shown to the actor.
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    /// JSON schema for accepted data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

impl InputSpec {
    #[must_use]
    pub fn new(input_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            input_type: input_type.into(),
            message: message.into(),
            choices: Vec::new(),
            schema: None,
        }
    }

    #[must_use]
    pub fn choice(message: impl Into<String>, choices: Vec<String>) -> Self {
        Self {
            choices,
            ..Self::new("choice", message)
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclineReason {
    Declined,
    Cancelled,
}

impl DeclineReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeclineReason::Declined => "declined",
            DeclineReason::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum InputOutcome {
    Accepted { data: Value },
    Declined,
    Cancelled,
}

impl InputOutcome {
    #[must_use]
    pub fn accepted(data: Value) -> Self {
        InputOutcome::Accepted { data }
    }

    #[must_use]
    pub fn refused(reason: DeclineReason) -> Self {
        match reason {
            DeclineReason::Declined => InputOutcome::Declined,
            DeclineReason::Cancelled => InputOutcome::Cancelled,
        }
    }

    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, InputOutcome::Accepted { .. })
    }

    /// Why the actor refused, or `None` when data was accepted.
    #[must_use]
    pub fn refusal(&self) -> Option<DeclineReason> {
        match self {
            InputOutcome::Accepted { .. } => None,
            InputOutcome::Declined => Some(DeclineReason::Declined),
            InputOutcome::Cancelled => Some(DeclineReason::Cancelled),
        }
    }
}
