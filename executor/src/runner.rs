//! End-to-end runs of a registered tool through one configured adapter.

use std::sync::Arc;

use relay_runtime::{Backchannel, Deadline};
use relay_types::{CallId, CallIdSource, Limits, Outcome, RelayError, SetupOutcome, UuidCallIds};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::handoff::HandoffExecutor;
use crate::definition::ToolDefinition;
use crate::registry::ToolRegistry;
use crate::respond::{call_deadline, respond_phase_until};

/// Phase 1, the responsive phase, and phase 2 for a single process that plays both
/// sides of the boundary.
pub struct ToolRunner {
    registry: ToolRegistry,
    executor: HandoffExecutor,
    backchannel: Arc<dyn Backchannel>,
    defaults: Limits,
    ids: Arc<dyn CallIdSource>,
}

impl std::fmt::Debug for ToolRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRunner")
            .field("registry", &self.registry)
            .field("adapter", &self.backchannel.name())
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl ToolRunner {
    #[must_use]
    pub fn new(registry: ToolRegistry, backchannel: Arc<dyn Backchannel>) -> Self {
        let executor = HandoffExecutor::for_backchannel(backchannel.as_ref());
        Self {
            registry,
            executor,
            backchannel,
            defaults: Limits::unbounded(),
            ids: Arc::new(UuidCallIds),
        }
    }

    /// Limits applied where a tool leaves a field unset.
    #[must_use]
    pub fn with_defaults(mut self, defaults: Limits) -> Self {
        self.defaults = defaults;
        self
    }

    #[must_use]
    pub fn with_call_ids(mut self, ids: Arc<dyn CallIdSource>) -> Self {
        self.ids = ids;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    #[must_use]
    pub fn executor(&self) -> &HandoffExecutor {
        &self.executor
    }

    pub async fn run(
        &self,
        tool: &str,
        params: Value,
        signal: &CancellationToken,
    ) -> Result<Outcome<Value>, RelayError> {
        let call_id = self.ids.next_id();
        self.run_with_id(tool, &call_id, params, signal).await
    }

    /// Run `tool` to completion under `call_id`.
    ///
    /// One deadline, started here, bounds setup, the responsive phase and finalize.
    /// The call's record is dropped once it is terminal, so the id may be reused.
    pub async fn run_with_id(
        &self,
        tool: &str,
        call_id: &CallId,
        params: Value,
        signal: &CancellationToken,
    ) -> Result<Outcome<Value>, RelayError> {
        let definition = self.registry.lookup(tool)?;
        let deadline = call_deadline(&definition, self.defaults);
        tracing::info!(%call_id, tool, adapter = self.backchannel.name(), "Running tool");

        let result = self.drive(&definition, call_id, params, deadline, signal).await;
        if self.executor.forget(call_id) {
            tracing::trace!(%call_id, "Call record dropped");
        }
        result
    }

    async fn drive(
        &self,
        definition: &ToolDefinition,
        call_id: &CallId,
        params: Value,
        deadline: Option<Deadline>,
        signal: &CancellationToken,
    ) -> Result<Outcome<Value>, RelayError> {
        let handoff = match self
            .executor
            .run_setup_until(definition, call_id, params.clone(), deadline, signal)
            .await?
        {
            Outcome::Cancelled => return Ok(Outcome::Cancelled),
            Outcome::Completed(SetupOutcome::Result { value }) => {
                return Ok(Outcome::Completed(value));
            }
            Outcome::Completed(SetupOutcome::Handoff { data }) => data,
        };

        let responded = respond_phase_until(
            definition,
            &params,
            &handoff,
            Arc::clone(&self.backchannel),
            self.defaults,
            deadline,
            signal,
        )
        .await;
        let response = match responded {
            Ok(Outcome::Completed(response)) => response,
            Ok(Outcome::Cancelled) => {
                self.executor.abandon(call_id, true);
                return Ok(Outcome::Cancelled);
            }
            Err(err) => {
                self.executor.abandon(call_id, false);
                return Err(err);
            }
        };

        self.executor
            .resume_until(definition, call_id, &params, &handoff, response, deadline, signal)
            .await
    }
}
