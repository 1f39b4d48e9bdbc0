//! Branch scopes: one conversation context with its own depth, budget and deadline.
//!
//! # Lifecycle
//!
//! ```text
//! Active --capability call--> Suspended --reply--> Active --body returns--> reduced
//!    |                            |
//!    |                            +--budget/timeout--> Failed
//!    +--signal fired--------------------------------> Cancelled
//! ```
//!
//! A body owns its `Branch` by value, so a scope is dropped exactly when its body
//! finishes, fails, or is cancelled. Scopes hold only data; nothing needs cleanup.
//!
//! # Inheritance
//!
//! A child receives a copy of its parent's history and directive (unless the
//! [`BranchOptions`] say otherwise), a ledger node chained to the parent's, a depth
//! ceiling no looser than the parent's, a deadline no later than the parent's, and a
//! child cancellation token.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use relay_types::{
    BranchId, Capability, CapabilitySet, CompletionOptions, CompletionResult, InputOutcome,
    InputSpec, Interrupt, Limits, LogLevel, Message, Notification, Prompt, RelayError,
    TimeoutScope, narrow,
};
use tokio_util::sync::CancellationToken;

use crate::backchannel::{Backchannel, CompletionRequest, ScopeInfo};
use crate::estimate::{estimate_messages, estimate_tokens};
use crate::guard::{Deadline, guarded};
use crate::ledger::TokenLedger;

/// Observable state of a scope while its body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Active,
    /// Waiting on the adapter for a completion or input.
    Suspended,
    /// A budget or deadline was exceeded; every further capability call fails.
    Failed,
    Cancelled,
}

impl ScopeState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeState::Active => "active",
            ScopeState::Suspended => "suspended",
            ScopeState::Failed => "failed",
            ScopeState::Cancelled => "cancelled",
        }
    }
}

/// How a child scope is derived from its parent.
#[derive(Debug, Clone)]
pub struct BranchOptions {
    pub inherit_history: bool,
    pub inherit_directive: bool,
    /// Replaces the directive for the child (and its descendants).
    pub directive: Option<String>,
    /// Per-branch overrides; each one can only tighten the inherited ceiling.
    pub limits: Limits,
    pub label: Option<String>,
}

impl Default for BranchOptions {
    fn default() -> Self {
        Self {
            inherit_history: true,
            inherit_directive: true,
            directive: None,
            limits: Limits::unbounded(),
            label: None,
        }
    }
}

impl BranchOptions {
    /// A child that starts with an empty history and no directive.
    #[must_use]
    pub fn isolated() -> Self {
        Self {
            inherit_history: false,
            inherit_directive: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = Some(directive.into());
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.limits.max_depth = Some(depth);
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, tokens: u64) -> Self {
        self.limits.max_tokens = Some(tokens);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.limits.timeout = Some(timeout);
        self
    }
}

pub struct Branch {
    info: ScopeInfo,
    label: Option<String>,
    history: Vec<Message>,
    directive: Option<String>,
    depth_ceiling: Option<u32>,
    ledger: Arc<TokenLedger>,
    deadline: Option<Deadline>,
    signal: CancellationToken,
    backchannel: Arc<dyn Backchannel>,
    state: ScopeState,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Branch")
            .field("branch", &self.info.branch)
            .field("depth", &self.info.depth)
            .field("label", &self.label)
            .field("history_len", &self.history.len())
            .field("state", &self.state)
            .field("tokens_used", &self.ledger.used())
            .field("backchannel", &self.backchannel.name())
            .finish_non_exhaustive()
    }
}

impl Branch {
    /// Root scope of a call's responsive phase.
    ///
    /// `limits.timeout` becomes the call-wide deadline, starting now. The caller's
    /// signal is wrapped in a child token so scope-local cancellation never leaks back
    /// to the caller.
    #[must_use]
    pub fn root(
        backchannel: Arc<dyn Backchannel>,
        limits: Limits,
        signal: &CancellationToken,
    ) -> Self {
        let deadline = limits
            .timeout
            .map(|limit| Deadline::after(limit, TimeoutScope::Call));
        Self::root_until(backchannel, limits, deadline, signal)
    }

    /// Root scope bound to a deadline the caller already started.
    ///
    /// `limits.timeout` is ignored; `deadline` is the call-wide ceiling.
    #[must_use]
    pub fn root_until(
        backchannel: Arc<dyn Backchannel>,
        limits: Limits,
        deadline: Option<Deadline>,
        signal: &CancellationToken,
    ) -> Self {
        Self {
            info: ScopeInfo {
                branch: BranchId::ROOT,
                depth: 0,
            },
            label: None,
            history: Vec::new(),
            directive: None,
            depth_ceiling: limits.max_depth,
            ledger: TokenLedger::root(limits.max_tokens),
            deadline,
            signal: signal.child_token(),
            backchannel,
            state: ScopeState::Active,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = Some(directive.into());
        self
    }

    /// Seed the history, e.g. with the transcript that led to this call.
    #[must_use]
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    #[must_use]
    pub fn id(&self) -> BranchId {
        self.info.branch
    }

    #[must_use]
    pub fn depth(&self) -> u32 {
        self.info.depth
    }

    #[must_use]
    pub fn scope(&self) -> ScopeInfo {
        self.info
    }

    #[must_use]
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    #[must_use]
    pub fn directive(&self) -> Option<&str> {
        self.directive.as_deref()
    }

    #[must_use]
    pub fn state(&self) -> ScopeState {
        self.state
    }

    #[must_use]
    pub fn depth_ceiling(&self) -> Option<u32> {
        self.depth_ceiling
    }

    /// Tokens charged to this scope's subtree.
    #[must_use]
    pub fn tokens_used(&self) -> u64 {
        self.ledger.used()
    }

    /// Capabilities of the adapter behind this scope.
    #[must_use]
    pub fn capabilities(&self) -> CapabilitySet {
        self.backchannel.capabilities()
    }

    #[must_use]
    pub fn signal(&self) -> &CancellationToken {
        &self.signal
    }

    /// Ask the model, suspending until the adapter replies.
    ///
    /// A `Prompt::Text` is sent after the directive and the scope's history, and both
    /// the prompt and the reply are appended to the history. A `Prompt::Messages` list
    /// is sent verbatim and the history is left as it was.
    pub async fn request_completion(
        &mut self,
        prompt: impl Into<Prompt>,
        options: CompletionOptions,
    ) -> Result<CompletionResult, Interrupt> {
        self.ensure_active()?;
        self.require(Capability::Completion)?;

        let (messages, tracked) = match prompt.into() {
            Prompt::Text(text) => {
                let prompt = Message::user(text);
                let mut messages = self.context_messages();
                messages.push(prompt.clone());
                (messages, Some(prompt))
            }
            Prompt::Messages(messages) => (messages, None),
        };
        let input_tokens = estimate_messages(&messages);

        tracing::debug!(
            branch = %self.info.branch,
            depth = self.info.depth,
            messages = messages.len(),
            tracked = tracked.is_some(),
            "Completion requested"
        );

        let backchannel = Arc::clone(&self.backchannel);
        let request = CompletionRequest {
            scope: self.info,
            messages,
            options,
        };
        let result = self
            .suspend(async move { backchannel.complete(request).await.map_err(Interrupt::from) })
            .await?;

        let charged = input_tokens + estimate_tokens(&result.text);
        if let Err(err) = self.ledger.charge(charged) {
            tracing::warn!(
                branch = %self.info.branch,
                depth = self.info.depth,
                charged,
                %err,
                "Token budget exceeded"
            );
            self.state = ScopeState::Failed;
            return Err(err.into());
        }

        if let Some(prompt) = tracked {
            self.history.push(prompt);
            self.history.push(Message::assistant(result.text.clone()));
        }
        Ok(result)
    }

    /// Shorthand for a tracked text prompt with default options.
    pub async fn complete(&mut self, prompt: impl Into<String>) -> Result<String, Interrupt> {
        let result = self
            .request_completion(Prompt::Text(prompt.into()), CompletionOptions::default())
            .await?;
        Ok(result.text)
    }

    /// Ask the external actor for structured input.
    ///
    /// Declined and cancelled answers come back as [`InputOutcome`] values; only
    /// adapter failures, deadlines and the call's own cancellation interrupt the body.
    pub async fn request_input(&mut self, spec: InputSpec) -> Result<InputOutcome, Interrupt> {
        self.ensure_active()?;
        self.require(Capability::Input)?;

        tracing::debug!(
            branch = %self.info.branch,
            depth = self.info.depth,
            input_type = %spec.input_type,
            "Input requested"
        );

        let backchannel = Arc::clone(&self.backchannel);
        let scope = self.info;
        self.suspend(async move {
            backchannel
                .request_input(scope, spec)
                .await
                .map_err(Interrupt::from)
        })
        .await
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => {
                tracing::debug!(branch = %self.info.branch, depth = self.info.depth, "{message}");
            }
            LogLevel::Info => {
                tracing::info!(branch = %self.info.branch, depth = self.info.depth, "{message}");
            }
            LogLevel::Warn => {
                tracing::warn!(branch = %self.info.branch, depth = self.info.depth, "{message}");
            }
            LogLevel::Error => {
                tracing::error!(branch = %self.info.branch, depth = self.info.depth, "{message}");
            }
        }
        self.backchannel.log(self.info, level, message);
    }

    pub fn notify(&self, message: impl Into<String>, progress: Option<f32>) {
        if !self.capabilities().contains(Capability::Notify) {
            return;
        }
        let notification = Notification::new(message, progress);
        self.backchannel.notify(self.info, &notification);
    }

    /// Run `body` in a child scope at `depth + 1` and return what it reduces to.
    ///
    /// The depth ceiling is checked before the child exists. A failing child fails
    /// only this call; the parent stays usable.
    pub async fn spawn<T, F, Fut>(&self, options: BranchOptions, body: F) -> Result<T, Interrupt>
    where
        F: FnOnce(Branch) -> Fut,
        Fut: Future<Output = Result<T, Interrupt>>,
    {
        let child = self.fork(&options)?;
        child.run(body).await
    }

    /// Run several bodies in sibling child scopes concurrently on the current task.
    ///
    /// Every child is created before any body starts, so a depth failure rejects the
    /// whole fan-out. All bodies run to completion; results come back in the order
    /// the bodies were given, and if any failed, the earliest failure in that order
    /// is returned.
    pub async fn fan_out<T, I, F, Fut>(
        &self,
        options: BranchOptions,
        bodies: I,
    ) -> Result<Vec<T>, Interrupt>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce(Branch) -> Fut,
        Fut: Future<Output = Result<T, Interrupt>>,
    {
        let bodies: Vec<F> = bodies.into_iter().collect();
        let mut children = Vec::with_capacity(bodies.len());
        for _ in 0..bodies.len() {
            children.push(self.fork(&options)?);
        }

        tracing::debug!(
            branch = %self.info.branch,
            depth = self.info.depth,
            width = children.len(),
            "Fan-out started"
        );

        let runs = children
            .into_iter()
            .zip(bodies)
            .map(|(child, body)| child.run(body));
        join_all(runs).await.into_iter().collect()
    }

    /// Run `body` against this scope under its deadline and cancellation signal.
    pub async fn run<T, F, Fut>(self, body: F) -> Result<T, Interrupt>
    where
        F: FnOnce(Branch) -> Fut,
        Fut: Future<Output = Result<T, Interrupt>>,
    {
        let info = self.info;
        let signal = self.signal.clone();
        let deadline = self.deadline;

        let outcome = guarded(&signal, deadline, body(self)).await;
        match &outcome {
            Ok(_) => {
                tracing::debug!(branch = %info.branch, depth = info.depth, "Branch reduced");
            }
            Err(Interrupt::Cancelled) => {
                tracing::debug!(branch = %info.branch, depth = info.depth, "Branch cancelled");
            }
            Err(Interrupt::Failed(err)) => {
                tracing::debug!(branch = %info.branch, depth = info.depth, %err, "Branch failed");
            }
        }
        outcome
    }

    fn fork(&self, options: &BranchOptions) -> Result<Branch, Interrupt> {
        self.check_open()?;

        let depth = self.info.depth + 1;
        let depth_ceiling = narrow(self.depth_ceiling, options.limits.max_depth);
        if let Some(limit) = depth_ceiling
            && depth > limit
        {
            tracing::warn!(
                branch = %self.info.branch,
                depth,
                limit,
                "Branch depth limit reached"
            );
            return Err(RelayError::DepthLimit { depth, limit }.into());
        }

        let branch = BranchId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let history = if options.inherit_history {
            self.history.clone()
        } else {
            Vec::new()
        };
        let directive = options.directive.clone().or_else(|| {
            if options.inherit_directive {
                self.directive.clone()
            } else {
                None
            }
        });

        tracing::debug!(
            parent = %self.info.branch,
            branch = %branch,
            depth,
            label = options.label.as_deref().unwrap_or(""),
            "Branch spawned"
        );

        Ok(Branch {
            info: ScopeInfo { branch, depth },
            label: options.label.clone(),
            history,
            directive,
            depth_ceiling,
            ledger: TokenLedger::child(&self.ledger, options.limits.max_tokens),
            deadline: Deadline::narrowed(self.deadline, options.limits.timeout, depth),
            signal: self.signal.child_token(),
            backchannel: Arc::clone(&self.backchannel),
            state: ScopeState::Active,
            next_id: Arc::clone(&self.next_id),
        })
    }

    fn context_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if let Some(directive) = &self.directive {
            messages.push(Message::system(directive.clone()));
        }
        messages.extend(self.history.iter().cloned());
        messages
    }

    fn require(&self, capability: Capability) -> Result<(), Interrupt> {
        if self.capabilities().contains(capability) {
            return Ok(());
        }
        Err(RelayError::Unavailable {
            capability,
            adapter: self.backchannel.name().to_string(),
        }
        .into())
    }

    fn check_open(&self) -> Result<(), Interrupt> {
        if self.signal.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        match self.state {
            ScopeState::Active | ScopeState::Suspended => Ok(()),
            ScopeState::Cancelled => Err(Interrupt::Cancelled),
            ScopeState::Failed => Err(RelayError::ScopeClosed {
                state: ScopeState::Failed.as_str(),
            }
            .into()),
        }
    }

    fn ensure_active(&mut self) -> Result<(), Interrupt> {
        let open = self.check_open();
        if matches!(open, Err(Interrupt::Cancelled)) {
            self.state = ScopeState::Cancelled;
        }
        open
    }

    async fn suspend<T, F>(&mut self, fut: F) -> Result<T, Interrupt>
    where
        F: Future<Output = Result<T, Interrupt>>,
    {
        self.state = ScopeState::Suspended;
        let result = guarded(&self.signal, self.deadline, fut).await;
        self.state = match &result {
            Ok(_) => ScopeState::Active,
            Err(Interrupt::Cancelled) => ScopeState::Cancelled,
            Err(Interrupt::Failed(RelayError::Timeout { .. })) => ScopeState::Failed,
            Err(Interrupt::Failed(_)) => ScopeState::Active,
        };
        result
    }
}
