//! Two-phase handoff execution for Relay tools.
//!
//! A [`ToolDefinition`] names three phases. [`HandoffExecutor::run_setup`] runs setup
//! once and either finishes the call or produces a [`HandoffData`] snapshot;
//! [`respond_phase`] runs the responsive body against a branch runtime; and
//! [`HandoffExecutor::resume`] runs finalize once with the cached snapshot and the
//! responsive result. [`ToolRunner`] strings the three together for one adapter,
//! under a single call deadline.
//!
//! [`HandoffData`]: relay_types::HandoffData

mod definition;
mod handoff;
mod registry;
mod respond;
mod runner;
mod validate;

pub use definition::{
    FinalizeCtx, FinalizeFn, RespondCtx, RespondFn, SetupCtx, SetupFn, SetupStep, ToolDefinition,
    ToolDescriptor, ToolFut, parse_params,
};
pub use handoff::HandoffExecutor;
pub use registry::ToolRegistry;
pub use respond::{call_deadline, respond_phase, respond_phase_until};
pub use runner::ToolRunner;
pub use validate::{JsonSchemaValidator, ParamValidator};
