//! Automated adapter: completions go to a model provider, input is policy-driven.

use std::sync::Arc;

use relay_runtime::{Backchannel, BackchannelFut, CompletionRequest, ScopeInfo};
use relay_types::{
    Capability, CapabilitySet, CompletionResult, InputOutcome, InputSpec, LogLevel, Notification,
    RelayError,
};
use serde_json::Value;

use crate::parse::parse_structured;
use crate::provider::CompletionProvider;

/// What the automated adapter does when a body asks for input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputPolicy {
    /// Input is not advertised; requests fail with `Unavailable`.
    #[default]
    Unavailable,
    /// Accept with the first listed choice, or `null` when there are none.
    AutoAccept,
    Decline,
}

pub struct AutomatedAdapter {
    provider: Arc<dyn CompletionProvider>,
    input: InputPolicy,
}

impl std::fmt::Debug for AutomatedAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomatedAdapter")
            .field("provider", &self.provider.name())
            .field("input", &self.input)
            .finish()
    }
}

impl AutomatedAdapter {
    #[must_use]
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            input: InputPolicy::Unavailable,
        }
    }

    #[must_use]
    pub fn with_input_policy(mut self, input: InputPolicy) -> Self {
        self.input = input;
        self
    }
}

impl Backchannel for AutomatedAdapter {
    fn name(&self) -> &'static str {
        "automated"
    }

    fn capabilities(&self) -> CapabilitySet {
        let base = CapabilitySet::from(Capability::Completion).with(Capability::Notify);
        match self.input {
            InputPolicy::Unavailable => base,
            InputPolicy::AutoAccept | InputPolicy::Decline => base.with(Capability::Input),
        }
    }

    fn complete<'a>(&'a self, request: CompletionRequest) -> BackchannelFut<'a, CompletionResult> {
        Box::pin(async move {
            let mut result = self
                .provider
                .complete(&request.messages, &request.options)
                .await
                .inspect_err(|err| {
                    tracing::error!(
                        provider = self.provider.name(),
                        depth = request.scope.depth,
                        %err,
                        "Completion provider failed"
                    );
                })?;
            if let Some(schema) = &request.options.schema {
                result.parsed = Some(parse_structured(&result.text, schema)?);
            }
            Ok(result)
        })
    }

    fn request_input<'a>(
        &'a self,
        scope: ScopeInfo,
        spec: InputSpec,
    ) -> BackchannelFut<'a, InputOutcome> {
        Box::pin(async move {
            match self.input {
                InputPolicy::Unavailable => Err(RelayError::Unavailable {
                    capability: Capability::Input,
                    adapter: self.name().to_string(),
                }),
                InputPolicy::AutoAccept => {
                    let data = spec
                        .choices
                        .first()
                        .map_or(Value::Null, |choice| Value::String(choice.clone()));
                    tracing::debug!(
                        depth = scope.depth,
                        input_type = %spec.input_type,
                        "Input auto-accepted"
                    );
                    Ok(InputOutcome::accepted(data))
                }
                InputPolicy::Decline => {
                    tracing::debug!(
                        depth = scope.depth,
                        input_type = %spec.input_type,
                        "Input auto-declined"
                    );
                    Ok(InputOutcome::Declined)
                }
            }
        })
    }

    fn log(&self, scope: ScopeInfo, level: LogLevel, message: &str) {
        tracing::trace!(branch = %scope.branch, ?level, "{message}");
    }

    fn notify(&self, scope: ScopeInfo, notification: &Notification) {
        tracing::info!(
            branch = %scope.branch,
            progress = ?notification.progress,
            "{}",
            notification.message
        );
    }
}
