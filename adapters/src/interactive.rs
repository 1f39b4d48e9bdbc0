//! Interactive adapter: a real actor answers input through an [`InputSurface`].
//!
//! Completions are optional and go to a provider the adapter's owner controls;
//! without one the adapter does not advertise the completion capability.

use std::sync::Arc;

use relay_runtime::{Backchannel, BackchannelFut, CompletionRequest, ScopeInfo};
use relay_types::{
    Capability, CapabilitySet, CompletionResult, InputOutcome, InputSpec, LogLevel, Notification,
    RelayError,
};

use crate::parse::parse_structured;
use crate::provider::{CompletionProvider, InputSurface};

pub struct InteractiveAdapter {
    surface: Arc<dyn InputSurface>,
    provider: Option<Arc<dyn CompletionProvider>>,
}

impl std::fmt::Debug for InteractiveAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractiveAdapter")
            .field("provider", &self.provider.as_ref().map(|p| p.name()))
            .finish_non_exhaustive()
    }
}

impl InteractiveAdapter {
    #[must_use]
    pub fn new(surface: Arc<dyn InputSurface>) -> Self {
        Self {
            surface,
            provider: None,
        }
    }

    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }
}

impl Backchannel for InteractiveAdapter {
    fn name(&self) -> &'static str {
        "interactive"
    }

    fn capabilities(&self) -> CapabilitySet {
        let base = CapabilitySet::from(Capability::Input).with(Capability::Notify);
        if self.provider.is_some() {
            base.with(Capability::Completion)
        } else {
            base
        }
    }

    fn complete<'a>(&'a self, request: CompletionRequest) -> BackchannelFut<'a, CompletionResult> {
        Box::pin(async move {
            let Some(provider) = &self.provider else {
                return Err(RelayError::Unavailable {
                    capability: Capability::Completion,
                    adapter: self.name().to_string(),
                });
            };
            let mut result = provider
                .complete(&request.messages, &request.options)
                .await?;
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
            let outcome = self.surface.present(scope, &spec).await?;
            if let (InputOutcome::Accepted { data }, Some(schema)) = (&outcome, &spec.schema) {
                let validator =
                    jsonschema::validator_for(schema).map_err(|e| RelayError::InvalidSchema {
                        message: e.to_string(),
                    })?;
                if let Err(err) = validator.validate(data) {
                    return Err(RelayError::ResponseParse {
                        message: err.to_string(),
                        raw: data.to_string(),
                    });
                }
            }
            tracing::debug!(
                depth = scope.depth,
                input_type = %spec.input_type,
                accepted = outcome.is_accepted(),
                "Input answered"
            );
            Ok(outcome)
        })
    }

    fn log(&self, scope: ScopeInfo, level: LogLevel, message: &str) {
        self.surface.log(scope, level, message);
    }

    fn notify(&self, scope: ScopeInfo, notification: &Notification) {
        self.surface.show(scope, notification);
    }
}
