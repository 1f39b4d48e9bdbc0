//! Scripted adapter: answers every capability call from an ordered response list.
//!
//! Used by tests and by `relay run --adapter scripted`. The script is consumed
//! front to back; asking for more than was scripted, asking for a completion when
//! the next entry is input (or the reverse), or using an input type the adapter was
//! not told about all fail with [`RelayError::Script`].

use std::collections::{BTreeSet, VecDeque};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use relay_runtime::{Backchannel, BackchannelFut, CompletionRequest, ScopeInfo};
use relay_types::{
    CapabilitySet, CompletionResult, DeclineReason, InputOutcome, InputSpec, LogLevel,
    Notification, RelayError, StopReason,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parse::parse_structured;

/// Input types accepted unless the script registers its own.
pub const DEFAULT_INPUT_TYPES: [&str; 4] = ["text", "choice", "confirm", "number"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptedResponse {
    Completion {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_id: Option<String>,
    },
    Input {
        input_type: String,
        outcome: InputOutcome,
    },
}

impl ScriptedResponse {
    pub fn completion(text: impl Into<String>) -> Self {
        ScriptedResponse::Completion {
            text: text.into(),
            model_id: None,
        }
    }

    pub fn accept(input_type: impl Into<String>, data: Value) -> Self {
        ScriptedResponse::Input {
            input_type: input_type.into(),
            outcome: InputOutcome::accepted(data),
        }
    }

    pub fn decline(input_type: impl Into<String>) -> Self {
        ScriptedResponse::Input {
            input_type: input_type.into(),
            outcome: InputOutcome::refused(DeclineReason::Declined),
        }
    }

    pub fn cancel(input_type: impl Into<String>) -> Self {
        ScriptedResponse::Input {
            input_type: input_type.into(),
            outcome: InputOutcome::refused(DeclineReason::Cancelled),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ScriptedResponse::Completion { .. } => "completion",
            ScriptedResponse::Input { .. } => "input",
        }
    }
}

/// One-way traffic the scripted adapter saw.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Log {
        scope: ScopeInfo,
        level: LogLevel,
        message: String,
    },
    Notify {
        scope: ScopeInfo,
        notification: Notification,
    },
}

#[derive(Debug, Default)]
struct ScriptState {
    responses: VecDeque<ScriptedResponse>,
    consumed: usize,
    completions: Vec<CompletionRequest>,
    inputs: Vec<InputSpec>,
    recorded: Vec<Recorded>,
}

impl ScriptState {
    fn next(&mut self, wanted: &'static str) -> Result<ScriptedResponse, RelayError> {
        let position = self.consumed + 1;
        let Some(next) = self.responses.front() else {
            return Err(RelayError::Script {
                message: format!(
                    "script exhausted: {wanted} request #{position} has no scripted response"
                ),
            });
        };
        if next.kind() != wanted {
            return Err(RelayError::Script {
                message: format!(
                    "script entry #{position} is {}, but the body requested {wanted}",
                    next.kind()
                ),
            });
        }
        self.consumed += 1;
        self.responses.pop_front().ok_or_else(|| RelayError::Script {
            message: "script exhausted".to_string(),
        })
    }
}

#[derive(Debug)]
pub struct ScriptedAdapter {
    state: Mutex<ScriptState>,
    input_types: BTreeSet<String>,
    capabilities: CapabilitySet,
}

impl ScriptedAdapter {
    #[must_use]
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            state: Mutex::new(ScriptState {
                responses: responses.into(),
                ..ScriptState::default()
            }),
            input_types: DEFAULT_INPUT_TYPES.iter().map(|t| (*t).to_string()).collect(),
            capabilities: CapabilitySet::all(),
        }
    }

    /// Parse a JSON array of responses.
    pub fn from_json(json: &str) -> Result<Self, RelayError> {
        let responses: Vec<ScriptedResponse> = serde_json::from_str(json)?;
        Ok(Self::new(responses))
    }

    pub fn load(path: &Path) -> Result<Self, RelayError> {
        let json = std::fs::read_to_string(path).map_err(|e| RelayError::Script {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        Self::from_json(&json)
    }

    /// Replace the set of input types the script may answer.
    #[must_use]
    pub fn with_input_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Advertise fewer capabilities, e.g. to exercise capability negotiation.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Responses not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.lock().responses.len()
    }

    #[must_use]
    pub fn consumed(&self) -> usize {
        self.lock().consumed
    }

    #[must_use]
    pub fn completion_requests(&self) -> Vec<CompletionRequest> {
        self.lock().completions.clone()
    }

    #[must_use]
    pub fn input_requests(&self) -> Vec<InputSpec> {
        self.lock().inputs.clone()
    }

    #[must_use]
    pub fn recorded(&self) -> Vec<Recorded> {
        self.lock().recorded.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn answer_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResult, RelayError> {
        let mut state = self.lock();
        let next = state.next("completion")?;
        let schema = request.options.schema.clone();
        state.completions.push(request);
        drop(state);

        let ScriptedResponse::Completion { text, model_id } = next else {
            return Err(RelayError::Script {
                message: "scripted entry is not a completion".to_string(),
            });
        };
        let parsed = match &schema {
            Some(schema) => Some(parse_structured(&text, schema)?),
            None => None,
        };
        Ok(CompletionResult {
            text,
            model_id: Some(model_id.unwrap_or_else(|| "scripted".to_string())),
            stop_reason: Some(StopReason::EndTurn),
            parsed,
        })
    }

    fn answer_input(&self, spec: InputSpec) -> Result<InputOutcome, RelayError> {
        if !self.input_types.contains(&spec.input_type) {
            return Err(RelayError::Script {
                message: format!(
                    "input type '{}' is not registered (known: {})",
                    spec.input_type,
                    self.input_types.iter().cloned().collect::<Vec<_>>().join(", ")
                ),
            });
        }

        let mut state = self.lock();
        let next = state.next("input")?;
        let ScriptedResponse::Input {
            input_type,
            outcome,
        } = next
        else {
            return Err(RelayError::Script {
                message: "scripted entry is not an input".to_string(),
            });
        };
        if input_type != spec.input_type {
            return Err(RelayError::Script {
                message: format!(
                    "script entry #{} answers '{input_type}' input, but the body asked for '{}'",
                    state.consumed, spec.input_type
                ),
            });
        }
        state.inputs.push(spec);
        Ok(outcome)
    }
}

impl Backchannel for ScriptedAdapter {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    fn complete<'a>(&'a self, request: CompletionRequest) -> BackchannelFut<'a, CompletionResult> {
        let result = self.answer_completion(request);
        Box::pin(async move { result })
    }

    fn request_input<'a>(
        &'a self,
        _scope: ScopeInfo,
        spec: InputSpec,
    ) -> BackchannelFut<'a, InputOutcome> {
        let result = self.answer_input(spec);
        Box::pin(async move { result })
    }

    fn log(&self, scope: ScopeInfo, level: LogLevel, message: &str) {
        self.lock().recorded.push(Recorded::Log {
            scope,
            level,
            message: message.to_string(),
        });
    }

    fn notify(&self, scope: ScopeInfo, notification: &Notification) {
        self.lock().recorded.push(Recorded::Notify {
            scope,
            notification: notification.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{Recorded, ScriptedAdapter, ScriptedResponse};
    use relay_runtime::{Backchannel, Branch};
    use relay_types::{
        CompletionOptions, InputOutcome, InputSpec, Interrupt, Limits, LogLevel, RelayError,
    };
    use serde_json::json;
    use std::io::Write;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn branch(adapter: &Arc<ScriptedAdapter>) -> Branch {
        let backchannel: Arc<dyn Backchannel> = adapter.clone();
        Branch::root(backchannel, Limits::unbounded(), &CancellationToken::new())
    }

    fn script_error(result: Result<impl std::fmt::Debug, Interrupt>) -> String {
        match result {
            Err(Interrupt::Failed(RelayError::Script { message })) => message,
            other => panic!("expected script error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn responses_are_consumed_in_order() {
        let adapter = Arc::new(ScriptedAdapter::new(vec![
            ScriptedResponse::completion("first"),
            ScriptedResponse::accept("choice", json!("b")),
            ScriptedResponse::completion("second"),
        ]));
        let mut scope = branch(&adapter);

        assert_eq!(scope.complete("q1").await.unwrap(), "first");
        let picked = scope
            .request_input(InputSpec::choice("pick", vec!["a".into(), "b".into()]))
            .await
            .unwrap();
        assert_eq!(picked, InputOutcome::accepted(json!("b")));
        assert_eq!(adapter.remaining(), 1);
        assert_eq!(scope.complete("q2").await.unwrap(), "second");
        assert_eq!(adapter.remaining(), 0);
        assert_eq!(adapter.consumed(), 3);
        assert_eq!(adapter.completion_requests().len(), 2);
    }

    #[tokio::test]
    async fn exhaustion_is_descriptive() {
        let adapter = Arc::new(ScriptedAdapter::new(vec![ScriptedResponse::completion("only")]));
        let mut scope = branch(&adapter);
        scope.complete("one").await.unwrap();

        let message = script_error(scope.complete("two").await);
        assert!(message.contains("exhausted"), "{message}");
        assert!(message.contains("#2"), "{message}");
    }

    #[tokio::test]
    async fn kind_mismatch_is_reported_without_consuming() {
        let adapter = Arc::new(ScriptedAdapter::new(vec![ScriptedResponse::decline("confirm")]));
        let mut scope = branch(&adapter);

        let message = script_error(scope.complete("hi").await);
        assert!(message.contains("is input"), "{message}");
        assert_eq!(adapter.remaining(), 1);
    }

    #[tokio::test]
    async fn unregistered_input_type_fails() {
        let adapter = Arc::new(
            ScriptedAdapter::new(vec![ScriptedResponse::accept("color", json!("red"))])
                .with_input_types(["text"]),
        );
        let mut scope = branch(&adapter);

        let message = script_error(scope.request_input(InputSpec::new("color", "fav?")).await);
        assert!(message.contains("'color' is not registered"), "{message}");
    }

    #[tokio::test]
    async fn input_type_must_match_the_entry() {
        let adapter = Arc::new(ScriptedAdapter::new(vec![ScriptedResponse::accept(
            "text",
            json!("x"),
        )]));
        let mut scope = branch(&adapter);
        let message = script_error(scope.request_input(InputSpec::new("confirm", "ok?")).await);
        assert!(message.contains("asked for 'confirm'"), "{message}");
    }

    #[tokio::test]
    async fn structured_completions_are_parsed() {
        let adapter = Arc::new(ScriptedAdapter::new(vec![ScriptedResponse::completion(
            "{\"n\": 1}",
        )]));
        let mut scope = branch(&adapter);
        let result = scope
            .request_completion(
                "count",
                CompletionOptions::default().with_schema(json!({"type": "object"})),
            )
            .await
            .unwrap();
        assert_eq!(result.parsed, Some(json!({"n": 1})));
        assert_eq!(result.model_id.as_deref(), Some("scripted"));
    }

    #[tokio::test]
    async fn one_way_traffic_is_recorded() {
        let adapter = Arc::new(ScriptedAdapter::new(Vec::new()));
        let scope = branch(&adapter);
        scope.log(LogLevel::Info, "hello");
        scope.notify("half", Some(0.5));

        let recorded = adapter.recorded();
        assert_eq!(recorded.len(), 2);
        assert!(matches!(&recorded[0], Recorded::Log { message, .. } if message == "hello"));
        assert!(matches!(
            &recorded[1],
            Recorded::Notify { notification, .. } if notification.progress == Some(0.5)
        ));
    }

    #[test]
    fn scripts_load_from_json_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"kind": "completion", "text": "hi"}},
                {{"kind": "input", "input_type": "choice",
                  "outcome": {{"outcome": "accepted", "data": "Ace of Spades"}}}},
                {{"kind": "input", "input_type": "confirm", "outcome": {{"outcome": "declined"}}}}
            ]"#
        )
        .unwrap();

        let adapter = ScriptedAdapter::load(file.path()).unwrap();
        assert_eq!(adapter.remaining(), 3);
    }

    #[test]
    fn malformed_scripts_are_rejected() {
        let err = ScriptedAdapter::from_json("[{\"kind\": \"telepathy\"}]").unwrap_err();
        assert!(matches!(err, RelayError::Serialization(_)));
    }
}
