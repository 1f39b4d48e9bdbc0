//! Tool definitions: an immutable record of a tool's schema, mode and three phases.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use relay_runtime::Branch;
use relay_types::{
    Authority, CallId, CapabilitySet, ContextMode, Interrupt, Limits, RelayError,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Phase future type alias.
pub type ToolFut<T> = Pin<Box<dyn Future<Output = Result<T, Interrupt>> + Send + 'static>>;

pub type SetupFn = Arc<dyn Fn(SetupCtx) -> ToolFut<SetupStep> + Send + Sync>;
pub type RespondFn = Arc<dyn Fn(RespondCtx) -> ToolFut<Value> + Send + Sync>;
pub type FinalizeFn = Arc<dyn Fn(FinalizeCtx) -> ToolFut<Value> + Send + Sync>;

/// What setup decided: finish now, or halt and hand a snapshot to the responsive side.
///
/// Setup returns exactly one step, so a call can never produce a second handoff.
#[derive(Debug, Clone, PartialEq)]
pub enum SetupStep {
    Handoff(Value),
    Done(Value),
}

impl SetupStep {
    pub fn handoff<T: Serialize>(data: &T) -> Result<Self, Interrupt> {
        Ok(SetupStep::Handoff(serde_json::to_value(data)?))
    }

    pub fn done<T: Serialize>(value: &T) -> Result<Self, Interrupt> {
        Ok(SetupStep::Done(serde_json::to_value(value)?))
    }
}

/// Deserialize validated params into a tool's own type.
pub fn parse_params<T: DeserializeOwned>(params: &Value) -> Result<T, RelayError> {
    serde_json::from_value(params.clone()).map_err(|e| RelayError::Validation {
        message: e.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct SetupCtx {
    pub call_id: CallId,
    pub params: Value,
    pub signal: CancellationToken,
}

impl SetupCtx {
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, RelayError> {
        parse_params(&self.params)
    }
}

/// Input to the responsive phase. `handoff` is `None` for responsive-authority tools.
#[derive(Debug)]
pub struct RespondCtx {
    pub call_id: CallId,
    pub params: Value,
    pub handoff: Option<Value>,
    pub branch: Branch,
}

impl RespondCtx {
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, RelayError> {
        parse_params(&self.params)
    }

    pub fn handoff<T: DeserializeOwned>(&self) -> Result<T, RelayError> {
        decode_snapshot(self.handoff.as_ref())
    }
}

#[derive(Debug, Clone)]
pub struct FinalizeCtx {
    pub call_id: CallId,
    pub params: Value,
    pub handoff: Option<Value>,
    pub response: Value,
    pub signal: CancellationToken,
}

impl FinalizeCtx {
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, RelayError> {
        parse_params(&self.params)
    }

    pub fn handoff<T: DeserializeOwned>(&self) -> Result<T, RelayError> {
        decode_snapshot(self.handoff.as_ref())
    }

    pub fn response<T: DeserializeOwned>(&self) -> Result<T, RelayError> {
        Ok(serde_json::from_value(self.response.clone())?)
    }
}

fn decode_snapshot<T: DeserializeOwned>(snapshot: Option<&Value>) -> Result<T, RelayError> {
    let value = snapshot.cloned().unwrap_or(Value::Null);
    Ok(serde_json::from_value(value)?)
}

/// A registered tool. Fields are public; construct with [`ToolDefinition::new`] and
/// adjust the optional parts directly or with the `with_*` helpers.
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub schema: Value,
    pub mode: ContextMode,
    /// Declared in addition to what `mode` implies.
    pub required_capabilities: CapabilitySet,
    /// Tool defaults; unset fields fall back to the runner's defaults.
    pub limits: Limits,
    pub authority: Authority,
    pub setup: SetupFn,
    pub respond: RespondFn,
    pub finalize: FinalizeFn,
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("required_capabilities", &self.required_capabilities)
            .field("limits", &self.limits)
            .field("authority", &self.authority)
            .finish_non_exhaustive()
    }
}

impl ToolDefinition {
    pub fn new<S, SFut, R, RFut, F, FFut>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        setup: S,
        respond: R,
        finalize: F,
    ) -> Self
    where
        S: Fn(SetupCtx) -> SFut + Send + Sync + 'static,
        SFut: Future<Output = Result<SetupStep, Interrupt>> + Send + 'static,
        R: Fn(RespondCtx) -> RFut + Send + Sync + 'static,
        RFut: Future<Output = Result<Value, Interrupt>> + Send + 'static,
        F: Fn(FinalizeCtx) -> FFut + Send + Sync + 'static,
        FFut: Future<Output = Result<Value, Interrupt>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            mode: ContextMode::default(),
            required_capabilities: CapabilitySet::empty(),
            limits: Limits::unbounded(),
            authority: Authority::Setup,
            setup: Arc::new(move |ctx: SetupCtx| -> ToolFut<SetupStep> { Box::pin(setup(ctx)) }),
            respond: Arc::new(move |ctx: RespondCtx| -> ToolFut<Value> { Box::pin(respond(ctx)) }),
            finalize: Arc::new(move |ctx: FinalizeCtx| -> ToolFut<Value> {
                Box::pin(finalize(ctx))
            }),
        }
    }

    /// A tool whose responsive phase runs first with only the params; setup is never
    /// invoked and finalize sees no handoff snapshot.
    pub fn responsive<R, RFut, F, FFut>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        respond: R,
        finalize: F,
    ) -> Self
    where
        R: Fn(RespondCtx) -> RFut + Send + Sync + 'static,
        RFut: Future<Output = Result<Value, Interrupt>> + Send + 'static,
        F: Fn(FinalizeCtx) -> FFut + Send + Sync + 'static,
        FFut: Future<Output = Result<Value, Interrupt>> + Send + 'static,
    {
        let mut tool = Self::new(
            name,
            description,
            schema,
            |_ctx: SetupCtx| async { Ok(SetupStep::Handoff(Value::Null)) },
            respond,
            finalize,
        );
        tool.authority = Authority::Responsive;
        tool
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ContextMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.required_capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Everything the adapter must advertise before any phase of this tool runs.
    #[must_use]
    pub fn effective_capabilities(&self) -> CapabilitySet {
        self.required_capabilities
            .union(self.mode.implied_capabilities())
    }

    #[must_use]
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            schema: self.schema.clone(),
            mode: self.mode,
            capabilities: self.effective_capabilities().iter().collect(),
        }
    }
}

/// Serializable summary of a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub schema: Value,
    pub mode: ContextMode,
    pub capabilities: Vec<relay_types::Capability>,
}

#[cfg(test)]
mod tests {
    use super::{SetupStep, ToolDefinition, parse_params};
    use relay_types::{Authority, Capability, CapabilitySet, ContextMode, RelayError};
    use serde::Deserialize;
    use serde_json::{Value, json};

    fn passthrough() -> ToolDefinition {
        ToolDefinition::new(
            "echo",
            "Echo params",
            json!({"type": "object"}),
            |ctx| async move { Ok(SetupStep::Done(ctx.params)) },
            |_ctx| async { Ok(Value::Null) },
            |ctx| async move { Ok(ctx.response) },
        )
    }

    #[test]
    fn mode_implies_capabilities() {
        let tool = passthrough()
            .with_mode(ContextMode::Interactive)
            .with_capabilities(CapabilitySet::from(Capability::Notify));
        let caps = tool.effective_capabilities();
        assert!(caps.contains(Capability::Input));
        assert!(caps.contains(Capability::Notify));
        assert!(!caps.contains(Capability::Completion));
        assert_eq!(
            tool.descriptor().capabilities,
            vec![Capability::Input, Capability::Notify]
        );
    }

    #[test]
    fn responsive_tools_declare_their_authority() {
        let tool = ToolDefinition::responsive(
            "ask",
            "Ask first",
            json!({}),
            |_ctx| async { Ok(json!("answer")) },
            |ctx| async move { Ok(ctx.response) },
        );
        assert_eq!(tool.authority, Authority::Responsive);
        assert_eq!(passthrough().authority, Authority::Setup);
    }

    #[test]
    fn parse_params_reports_validation_errors() {
        #[derive(Debug, Deserialize)]
        struct Params {
            #[allow(dead_code)]
            count: u32,
        }
        let err = parse_params::<Params>(&json!({"count": "many"})).unwrap_err();
        assert!(matches!(err, RelayError::Validation { .. }));
    }

    #[test]
    fn setup_steps_serialize_their_payload() {
        #[derive(serde::Serialize)]
        struct Secret {
            card: &'static str,
        }
        let step = SetupStep::handoff(&Secret { card: "Ace" }).unwrap();
        assert_eq!(step, SetupStep::Handoff(json!({"card": "Ace"})));
    }
}
