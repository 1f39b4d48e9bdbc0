//! Token ledger shared up a branch tree.
//!
//! Each scope owns one ledger node holding its subtree's usage and an optional
//! ceiling. A charge is added to the node and every ancestor; the first node (walking
//! upward from the charging scope) whose ceiling is now exceeded determines the
//! failure. Usage is never rolled back.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use relay_types::RelayError;

#[derive(Debug)]
pub struct TokenLedger {
    depth: u32,
    used: AtomicU64,
    ceiling: Option<u64>,
    parent: Option<Arc<TokenLedger>>,
}

impl TokenLedger {
    #[must_use]
    pub fn root(ceiling: Option<u64>) -> Arc<Self> {
        Arc::new(Self {
            depth: 0,
            used: AtomicU64::new(0),
            ceiling,
            parent: None,
        })
    }

    #[must_use]
    pub fn child(parent: &Arc<TokenLedger>, ceiling: Option<u64>) -> Arc<Self> {
        Arc::new(Self {
            depth: parent.depth + 1,
            used: AtomicU64::new(0),
            ceiling,
            parent: Some(Arc::clone(parent)),
        })
    }

    /// Tokens charged to this node's subtree so far.
    #[must_use]
    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Relaxed)
    }

    pub fn charge(&self, tokens: u64) -> Result<(), RelayError> {
        let mut breach = None;
        for node in self.chain() {
            let used = node.used.fetch_add(tokens, Ordering::Relaxed) + tokens;
            if breach.is_none()
                && let Some(budget) = node.ceiling
                && used > budget
            {
                breach = Some(RelayError::TokenBudget {
                    used,
                    budget,
                    depth: node.depth,
                });
            }
        }
        match breach {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn chain(&self) -> impl Iterator<Item = &TokenLedger> {
        std::iter::successors(Some(self), |node| node.parent.as_deref())
    }
}
