//! The two-phase handoff state machine.
//!
//! Per call id the executor keeps one record:
//!
//! ```text
//! SettingUp --Done--> Finished(simple)
//!     |
//!     +--Handoff--> AwaitingResponse --resume--> Finalizing --> Finished(final)
//!     |                                               |
//!     +--error/cancel--> Failed | Cancelled <----------+
//! ```
//!
//! Setup and finalize each run at most once per call id. Repeated `run_setup` and
//! `resume` calls are answered from the record; failures and cancellations are
//! terminal. A call whose responsive phase never answers is closed with `abandon`,
//! and any terminal record can be dropped with `forget`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use relay_runtime::{Backchannel, Deadline, guarded};
use relay_types::{
    Authority, CallId, CapabilitySet, HandoffData, Interrupt, Outcome, RelayError, SetupOutcome,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::definition::{FinalizeCtx, SetupCtx, SetupStep, ToolDefinition};
use crate::validate::{JsonSchemaValidator, ParamValidator};

#[derive(Debug, Clone)]
enum CallPhase {
    SettingUp,
    AwaitingResponse { handoff: HandoffData },
    Finalizing,
    Simple { value: Value },
    Finished { handoff: HandoffData, result: Value },
    Failed,
    Cancelled,
}

impl CallPhase {
    fn as_str(&self) -> &'static str {
        match self {
            CallPhase::SettingUp => "setting_up",
            CallPhase::AwaitingResponse { .. } => "awaiting_response",
            CallPhase::Finalizing => "finalizing",
            CallPhase::Simple { .. } => "simple",
            CallPhase::Finished { .. } => "finished",
            CallPhase::Failed => "failed",
            CallPhase::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug)]
struct CallRecord {
    tool: String,
    params: Value,
    phase: CallPhase,
}

impl CallRecord {
    fn check(&self, call_id: &CallId, tool: &str, params: &Value) -> Result<(), RelayError> {
        let field = if self.tool != tool {
            "tool"
        } else if self.params != *params {
            "params"
        } else {
            return Ok(());
        };
        Err(RelayError::CallMismatch {
            call_id: call_id.clone(),
            field,
        })
    }
}

/// Runs setup and finalize for tool calls, each exactly once per call id.
///
/// Configured with the name and capabilities of the adapter that will drive the
/// responsive phase, so capability mismatches surface before any phase runs.
pub struct HandoffExecutor {
    adapter: String,
    capabilities: CapabilitySet,
    validator: Arc<dyn ParamValidator>,
    calls: Mutex<HashMap<CallId, CallRecord>>,
}

impl std::fmt::Debug for HandoffExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandoffExecutor")
            .field("adapter", &self.adapter)
            .field("capabilities", &self.capabilities)
            .field("calls", &self.lock().len())
            .finish_non_exhaustive()
    }
}

impl HandoffExecutor {
    #[must_use]
    pub fn new(adapter: impl Into<String>, capabilities: CapabilitySet) -> Self {
        Self {
            adapter: adapter.into(),
            capabilities,
            validator: Arc::new(JsonSchemaValidator),
            calls: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn for_backchannel(backchannel: &dyn Backchannel) -> Self {
        Self::new(backchannel.name(), backchannel.capabilities())
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn ParamValidator>) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    /// Fail with [`RelayError::Capability`] if the adapter lacks anything the tool needs.
    pub fn check_capabilities(&self, tool: &ToolDefinition) -> Result<(), RelayError> {
        let required = tool.effective_capabilities();
        if let Some(missing) = required.missing_from(self.capabilities).first() {
            tracing::warn!(
                tool = %tool.name,
                adapter = %self.adapter,
                missing = %missing,
                "Adapter lacks required capability"
            );
            return Err(RelayError::Capability {
                tool: tool.name.clone(),
                missing: *missing,
                adapter: self.adapter.clone(),
            });
        }
        Ok(())
    }

    /// Phase 1. Validates, then runs setup once for `call_id`.
    ///
    /// Responsive-authority tools skip setup and hand off an empty snapshot.
    pub async fn run_setup(
        &self,
        tool: &ToolDefinition,
        call_id: &CallId,
        params: Value,
        signal: &CancellationToken,
    ) -> Result<Outcome<SetupOutcome>, RelayError> {
        self.run_setup_until(tool, call_id, params, None, signal).await
    }

    /// [`run_setup`](Self::run_setup) with setup bounded by `deadline`.
    ///
    /// A setup that outlives the deadline fails the call with
    /// [`RelayError::Timeout`] and leaves the record failed.
    pub async fn run_setup_until(
        &self,
        tool: &ToolDefinition,
        call_id: &CallId,
        params: Value,
        deadline: Option<Deadline>,
        signal: &CancellationToken,
    ) -> Result<Outcome<SetupOutcome>, RelayError> {
        self.check_capabilities(tool)?;
        let params = self.validator.validate(&tool.schema, &params)?;

        {
            let mut calls = self.lock();
            if let Some(record) = calls.get(call_id) {
                record.check(call_id, &tool.name, &params)?;
                return match &record.phase {
                    CallPhase::AwaitingResponse { handoff } => {
                        tracing::debug!(%call_id, tool = %tool.name, "Setup replayed from cache");
                        Ok(Outcome::Completed(SetupOutcome::Handoff {
                            data: handoff.clone(),
                        }))
                    }
                    CallPhase::Simple { value } => Ok(Outcome::Completed(SetupOutcome::Result {
                        value: value.clone(),
                    })),
                    CallPhase::SettingUp | CallPhase::Finalizing => {
                        Err(RelayError::CallInProgress {
                            call_id: call_id.clone(),
                        })
                    }
                    phase => Err(RelayError::CallClosed {
                        call_id: call_id.clone(),
                        phase: phase.as_str(),
                    }),
                };
            }
            calls.insert(
                call_id.clone(),
                CallRecord {
                    tool: tool.name.clone(),
                    params: params.clone(),
                    phase: CallPhase::SettingUp,
                },
            );
        }

        if tool.authority == Authority::Responsive {
            let handoff = HandoffData {
                call_id: call_id.clone(),
                tool: tool.name.clone(),
                payload: Value::Null,
            };
            tracing::debug!(%call_id, tool = %tool.name, "Responsive authority; setup skipped");
            self.set_phase(
                call_id,
                CallPhase::AwaitingResponse {
                    handoff: handoff.clone(),
                },
            );
            return Ok(Outcome::Completed(SetupOutcome::Handoff { data: handoff }));
        }

        tracing::debug!(%call_id, tool = %tool.name, "Setup started");
        let ctx = SetupCtx {
            call_id: call_id.clone(),
            params,
            signal: signal.clone(),
        };
        let flow = guarded(signal, deadline, (tool.setup)(ctx)).await;

        let (phase, outcome) = match flow {
            Ok(SetupStep::Done(value)) => (
                CallPhase::Simple {
                    value: value.clone(),
                },
                Ok(Outcome::Completed(SetupOutcome::Result { value })),
            ),
            Ok(SetupStep::Handoff(payload)) => {
                let handoff = HandoffData {
                    call_id: call_id.clone(),
                    tool: tool.name.clone(),
                    payload,
                };
                (
                    CallPhase::AwaitingResponse {
                        handoff: handoff.clone(),
                    },
                    Ok(Outcome::Completed(SetupOutcome::Handoff { data: handoff })),
                )
            }
            Err(Interrupt::Cancelled) => (CallPhase::Cancelled, Ok(Outcome::Cancelled)),
            Err(Interrupt::Failed(err)) => (CallPhase::Failed, Err(err)),
        };
        self.finish_phase(call_id, &tool.name, "Setup", phase, outcome)
    }

    /// Phase 2. Runs finalize once with the cached snapshot and the responsive result.
    ///
    /// `handoff` must be the snapshot phase 1 produced for `call_id`; anything else
    /// fails with [`RelayError::CallMismatch`].
    pub async fn resume(
        &self,
        tool: &ToolDefinition,
        call_id: &CallId,
        params: &Value,
        handoff: &HandoffData,
        response: Value,
        signal: &CancellationToken,
    ) -> Result<Outcome<Value>, RelayError> {
        self.resume_until(tool, call_id, params, handoff, response, None, signal).await
    }

    /// [`resume`](Self::resume) with finalize bounded by `deadline`.
    #[allow(clippy::too_many_arguments)]
    pub async fn resume_until(
        &self,
        tool: &ToolDefinition,
        call_id: &CallId,
        params: &Value,
        handoff: &HandoffData,
        response: Value,
        deadline: Option<Deadline>,
        signal: &CancellationToken,
    ) -> Result<Outcome<Value>, RelayError> {
        let handoff = {
            let mut calls = self.lock();
            let record = calls
                .get_mut(call_id)
                .ok_or_else(|| RelayError::UnknownCall {
                    call_id: call_id.clone(),
                })?;
            record.check(call_id, &tool.name, params)?;
            match &record.phase {
                CallPhase::AwaitingResponse { handoff: cached } => {
                    if cached != handoff {
                        return Err(mismatch(call_id, "handoff"));
                    }
                    let cached = cached.clone();
                    record.phase = CallPhase::Finalizing;
                    cached
                }
                CallPhase::Finished {
                    handoff: cached,
                    result,
                } => {
                    if cached != handoff {
                        return Err(mismatch(call_id, "handoff"));
                    }
                    tracing::debug!(%call_id, tool = %tool.name, "Finalize replayed from cache");
                    return Ok(Outcome::Completed(result.clone()));
                }
                CallPhase::SettingUp | CallPhase::Finalizing => {
                    return Err(RelayError::CallInProgress {
                        call_id: call_id.clone(),
                    });
                }
                phase => {
                    return Err(RelayError::CallClosed {
                        call_id: call_id.clone(),
                        phase: phase.as_str(),
                    });
                }
            }
        };

        tracing::debug!(%call_id, tool = %tool.name, "Finalize started");
        let snapshot = match tool.authority {
            Authority::Setup => Some(handoff.payload.clone()),
            Authority::Responsive => None,
        };
        let ctx = FinalizeCtx {
            call_id: call_id.clone(),
            params: params.clone(),
            handoff: snapshot,
            response,
            signal: signal.clone(),
        };
        let flow = guarded(signal, deadline, (tool.finalize)(ctx)).await;

        let (phase, outcome) = match flow {
            Ok(result) => (
                CallPhase::Finished {
                    handoff,
                    result: result.clone(),
                },
                Ok(Outcome::Completed(result)),
            ),
            Err(Interrupt::Cancelled) => (CallPhase::Cancelled, Ok(Outcome::Cancelled)),
            Err(Interrupt::Failed(err)) => (CallPhase::Failed, Err(err)),
        };
        self.finish_phase(call_id, &tool.name, "Finalize", phase, outcome)
    }

    /// Current phase name for `call_id`, if the executor has seen it.
    #[must_use]
    pub fn phase(&self, call_id: &CallId) -> Option<&'static str> {
        self.lock().get(call_id).map(|record| record.phase.as_str())
    }

    /// Close a call whose responsive phase never produced a response.
    ///
    /// Moves an `awaiting_response` record to `cancelled` or `failed` so it can be
    /// forgotten. Returns false, leaving the record as it was, in any other phase.
    pub fn abandon(&self, call_id: &CallId, cancelled: bool) -> bool {
        let mut calls = self.lock();
        let Some(record) = calls.get_mut(call_id) else {
            return false;
        };
        if !matches!(record.phase, CallPhase::AwaitingResponse { .. }) {
            return false;
        }
        record.phase = if cancelled {
            CallPhase::Cancelled
        } else {
            CallPhase::Failed
        };
        tracing::debug!(
            %call_id,
            tool = %record.tool,
            next = record.phase.as_str(),
            "Call abandoned"
        );
        true
    }

    /// Drop the record for a call that reached a terminal phase.
    ///
    /// Returns false (and keeps the record) while a phase is pending or in flight.
    pub fn forget(&self, call_id: &CallId) -> bool {
        let mut calls = self.lock();
        let terminal = matches!(
            calls.get(call_id).map(|record| &record.phase),
            Some(
                CallPhase::Simple { .. }
                    | CallPhase::Finished { .. }
                    | CallPhase::Failed
                    | CallPhase::Cancelled
            )
        );
        if terminal {
            calls.remove(call_id);
        }
        terminal
    }

    fn finish_phase<T>(
        &self,
        call_id: &CallId,
        tool: &str,
        step: &'static str,
        phase: CallPhase,
        outcome: Result<Outcome<T>, RelayError>,
    ) -> Result<Outcome<T>, RelayError> {
        match &outcome {
            Ok(Outcome::Completed(_)) => {
                tracing::debug!(%call_id, tool, next = phase.as_str(), "{step} finished");
            }
            Ok(Outcome::Cancelled) => {
                tracing::debug!(%call_id, tool, "{step} cancelled");
            }
            Err(err) => {
                tracing::debug!(%call_id, tool, %err, "{step} failed");
            }
        }
        self.set_phase(call_id, phase);
        outcome
    }

    fn set_phase(&self, call_id: &CallId, phase: CallPhase) {
        if let Some(record) = self.lock().get_mut(call_id) {
            record.phase = phase;
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CallId, CallRecord>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn mismatch(call_id: &CallId, field: &'static str) -> RelayError {
    RelayError::CallMismatch {
        call_id: call_id.clone(),
        field,
    }
}
