//! External collaborators the adapters delegate to.

use std::future::Future;
use std::pin::Pin;

use relay_runtime::ScopeInfo;
use relay_types::{
    CompletionOptions, CompletionResult, InputOutcome, InputSpec, LogLevel, Message, Notification,
    RelayError,
};

/// Provider future type alias.
pub type ProviderFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, RelayError>> + Send + 'a>>;

/// A model endpoint: takes assembled messages, returns generated text.
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    fn complete<'a>(
        &'a self,
        messages: &'a [Message],
        options: &'a CompletionOptions,
    ) -> ProviderFut<'a, CompletionResult>;
}

/// A surface that puts input requests in front of a real actor.
pub trait InputSurface: Send + Sync {
    fn present<'a>(
        &'a self,
        scope: ScopeInfo,
        spec: &'a InputSpec,
    ) -> ProviderFut<'a, InputOutcome>;

    fn show(&self, scope: ScopeInfo, notification: &Notification) {
        let _ = (scope, notification);
    }

    fn log(&self, scope: ScopeInfo, level: LogLevel, message: &str) {
        let _ = (scope, level, message);
    }
}
