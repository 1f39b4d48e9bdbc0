use std::fmt;

/// Identifier of one call instance, from phase-1 start to phase-2 completion.
///
/// Transports may supply their own ids, so this is an opaque string rather than a
/// parsed UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random (v4) id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CallId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Source of collision-resistant call ids.
pub trait CallIdSource: Send + Sync {
    fn next_id(&self) -> CallId;
}

/// Default id source backed by random UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidCallIds;

impl CallIdSource for UuidCallIds {
    fn next_id(&self) -> CallId {
        CallId::generate()
    }
}

/// Identifier of a branch scope within one call's branch tree.
///
/// The root scope is always `BranchId(0)`; children are numbered in spawn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct BranchId(u64);

impl BranchId {
    pub const ROOT: BranchId = BranchId(0);

    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{BranchId, CallId, CallIdSource, UuidCallIds};

    #[test]
    fn generated_call_ids_are_distinct() {
        let ids = UuidCallIds;
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn call_id_serializes_as_plain_string() {
        let id = CallId::new("call-7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"call-7\"");
        let back: CallId = serde_json::from_str("\"call-7\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn root_branch_id() {
        assert!(BranchId::ROOT.is_root());
        assert!(!BranchId::new(3).is_root());
    }
}
