//! Deadline and cancellation racing for suspension points.

use std::future::Future;
use std::time::Duration;

use relay_types::{Interrupt, RelayError, TimeoutScope};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// An absolute wall-clock ceiling and the scope that set it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub at: Instant,
    pub limit: Duration,
    pub scope: TimeoutScope,
}

impl Deadline {
    #[must_use]
    pub fn after(limit: Duration, scope: TimeoutScope) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
            scope,
        }
    }

    /// The earlier of an inherited deadline and a fresh one for a child at `depth`.
    ///
    /// A child never outlives its parent, so time spent in the child always counts
    /// against the parent's clock.
    #[must_use]
    pub fn narrowed(
        inherited: Option<Deadline>,
        limit: Option<Duration>,
        depth: u32,
    ) -> Option<Self> {
        let own = limit.map(|limit| Deadline::after(limit, TimeoutScope::Branch { depth }));
        match (inherited, own) {
            (Some(parent), Some(own)) => Some(if own.at < parent.at { own } else { parent }),
            (Some(d), None) | (None, Some(d)) => Some(d),
            (None, None) => None,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    fn elapsed_error(&self) -> Interrupt {
        Interrupt::Failed(RelayError::Timeout {
            scope: self.scope,
            limit: self.limit,
        })
    }
}

/// Run `fut` until it finishes, the deadline passes, or `signal` fires.
///
/// Cancellation wins ties so a cancelled call never reports a late success.
pub async fn guarded<T, F>(
    signal: &CancellationToken,
    deadline: Option<Deadline>,
    fut: F,
) -> Result<T, Interrupt>
where
    F: Future<Output = Result<T, Interrupt>>,
{
    let timed = async move {
        match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline.at, fut).await {
                Ok(result) => result,
                Err(_elapsed) => Err(deadline.elapsed_error()),
            },
            None => fut.await,
        }
    };

    tokio::select! {
        biased;
        () = signal.cancelled() => Err(Interrupt::Cancelled),
        result = timed => result,
    }
}
