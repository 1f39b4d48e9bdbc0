//! Shared test utilities and fixtures

#![allow(dead_code)]

use std::sync::Arc;

use relay_adapters::{ScriptedAdapter, ScriptedResponse};
use relay_executor::{ToolRegistry, ToolRunner};
use relay_runtime::Backchannel;
use relay_tools::{brief, guess_card};
use relay_types::{CallId, CallIdSource, Limits};

/// Always hands out the same call id.
pub struct FixedIds(pub &'static str);

impl CallIdSource for FixedIds {
    fn next_id(&self) -> CallId {
        CallId::new(self.0)
    }
}

/// Built-ins, with `guess_card` always drawing the first card.
pub fn registry() -> ToolRegistry {
    let mut registry = ToolRegistry::default();
    registry
        .register(guess_card::tool_with_draw(Arc::new(|_| 0)))
        .unwrap();
    registry.register(brief::tool()).unwrap();
    registry
}

pub fn scripted(responses: Vec<ScriptedResponse>) -> Arc<ScriptedAdapter> {
    Arc::new(ScriptedAdapter::new(responses))
}

pub fn runner(adapter: &Arc<ScriptedAdapter>) -> ToolRunner {
    runner_with(adapter, Limits::unbounded())
}

pub fn runner_with(adapter: &Arc<ScriptedAdapter>, defaults: Limits) -> ToolRunner {
    let backchannel: Arc<dyn Backchannel> = adapter.clone();
    ToolRunner::new(registry(), backchannel)
        .with_defaults(defaults)
        .with_call_ids(Arc::new(FixedIds("call-1")))
}
