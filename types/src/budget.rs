//! Resource ceilings for a call's branch tree.
//!
//! Every ceiling is optional; `None` means unbounded. Narrowing two ceilings always
//! takes the tighter bound, so an override can tighten a ceiling but never widen it.

use std::time::Duration;

/// Depth, token and wall-clock ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Limits {
    /// Deepest branch depth allowed (root is depth 0).
    pub max_depth: Option<u32>,
    /// Estimated tokens the scope's subtree may consume.
    pub max_tokens: Option<u64>,
    /// Wall-clock ceiling measured from scope creation.
    pub timeout: Option<Duration>,
}

impl Limits {
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_depth: None,
            max_tokens: None,
            timeout: None,
        }
    }

    #[must_use]
    pub const fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, tokens: u64) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Field-wise fallback: keep our value where set, otherwise take `defaults`.
    #[must_use]
    pub fn or(self, defaults: Limits) -> Self {
        Self {
            max_depth: self.max_depth.or(defaults.max_depth),
            max_tokens: self.max_tokens.or(defaults.max_tokens),
            timeout: self.timeout.or(defaults.timeout),
        }
    }
}

/// The tighter of two optional ceilings.
#[must_use]
pub fn narrow<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}
