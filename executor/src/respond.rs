//! Driving a tool's responsive phase against a root [`Branch`].

use std::sync::Arc;

use relay_runtime::{Backchannel, Branch, Deadline};
use relay_types::{Authority, HandoffData, Limits, Outcome, RelayError, TimeoutScope};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::definition::{RespondCtx, ToolDefinition};

/// The call-wide deadline for `tool`, started now.
///
/// The timeout is the tool's own, falling back to `defaults`.
#[must_use]
pub fn call_deadline(tool: &ToolDefinition, defaults: Limits) -> Option<Deadline> {
    tool.limits
        .or(defaults)
        .timeout
        .map(|limit| Deadline::after(limit, TimeoutScope::Call))
}

/// Run `tool`'s respond function once against `backchannel`.
///
/// The root scope's limits are the tool's own, with unset fields taken from
/// `defaults`; its timeout becomes the call-wide deadline, started now.
pub async fn respond_phase(
    tool: &ToolDefinition,
    params: &Value,
    handoff: &HandoffData,
    backchannel: Arc<dyn Backchannel>,
    defaults: Limits,
    signal: &CancellationToken,
) -> Result<Outcome<Value>, RelayError> {
    let deadline = call_deadline(tool, defaults);
    respond_phase_until(tool, params, handoff, backchannel, defaults, deadline, signal).await
}

/// [`respond_phase`] under a call deadline that started before this phase.
pub async fn respond_phase_until(
    tool: &ToolDefinition,
    params: &Value,
    handoff: &HandoffData,
    backchannel: Arc<dyn Backchannel>,
    defaults: Limits,
    deadline: Option<Deadline>,
    signal: &CancellationToken,
) -> Result<Outcome<Value>, RelayError> {
    let limits = tool.limits.or(defaults);
    let root = Branch::root_until(backchannel, limits, deadline, signal);
    let snapshot = match tool.authority {
        Authority::Setup => Some(handoff.payload.clone()),
        Authority::Responsive => None,
    };

    tracing::debug!(
        call_id = %handoff.call_id,
        tool = %tool.name,
        max_depth = ?limits.max_depth,
        max_tokens = ?limits.max_tokens,
        remaining = ?deadline.map(|d| d.remaining()),
        "Responsive phase started"
    );

    let respond = Arc::clone(&tool.respond);
    let call_id = handoff.call_id.clone();
    let params = params.clone();
    let flow = root
        .run(move |branch| {
            respond(RespondCtx {
                call_id,
                params,
                handoff: snapshot,
                branch,
            })
        })
        .await;

    if let Err(err) = &flow {
        tracing::debug!(
            call_id = %handoff.call_id,
            tool = %tool.name,
            %err,
            "Responsive phase stopped"
        );
    }
    Outcome::from_flow(flow)
}
