//! The capability context seam between tool bodies and their environment.
//!
//! A [`Backchannel`] is what an adapter implements: it answers completions and
//! input requests, and receives one-way log and notify traffic. Bodies never see an
//! adapter directly; they talk to a [`Branch`](crate::Branch), which adds history,
//! budgets, deadlines and cancellation around each call.

use std::future::Future;
use std::pin::Pin;

use relay_types::{
    BranchId, CapabilitySet, CompletionOptions, CompletionResult, InputOutcome, InputSpec,
    LogLevel, Message, Notification, RelayError,
};

/// Backchannel future type alias.
pub type BackchannelFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, RelayError>> + Send + 'a>>;

/// Where a backchannel call originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeInfo {
    pub branch: BranchId,
    pub depth: u32,
}

/// A completion as handed to the adapter: fully assembled context plus options.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub scope: ScopeInfo,
    pub messages: Vec<Message>,
    pub options: CompletionOptions,
}

pub trait Backchannel: Send + Sync {
    /// Adapter name used in capability errors and logs.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> CapabilitySet;

    fn complete<'a>(&'a self, request: CompletionRequest) -> BackchannelFut<'a, CompletionResult>;

    fn request_input<'a>(
        &'a self,
        scope: ScopeInfo,
        spec: InputSpec,
    ) -> BackchannelFut<'a, InputOutcome>;

    fn log(&self, scope: ScopeInfo, level: LogLevel, message: &str) {
        let _ = (scope, level, message);
    }

    fn notify(&self, scope: ScopeInfo, notification: &Notification) {
        let _ = (scope, notification);
    }
}

impl std::fmt::Debug for dyn Backchannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Backchannel {}>", self.name())
    }
}
