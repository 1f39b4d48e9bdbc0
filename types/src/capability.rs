//! Capability tags and context modes.
//!
//! A tool declares a [`ContextMode`] and optionally extra capabilities; an adapter
//! advertises a [`CapabilitySet`]. The executor compares the two before any phase
//! runs, so tool bodies never probe their context at runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Remote model completion.
    Completion,
    /// Structured input from an external actor.
    Input,
    /// One-way progress notifications.
    Notify,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::Completion,
        Capability::Input,
        Capability::Notify,
    ];

    const fn bit(self) -> u8 {
        match self {
            Capability::Completion => 1,
            Capability::Input => 1 << 1,
            Capability::Notify => 1 << 2,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Completion => "completion",
            Capability::Input => "input",
            Capability::Notify => "notify",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A small set of capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn all() -> Self {
        Self(0b111)
    }

    #[must_use]
    pub const fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    #[must_use]
    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    #[must_use]
    pub const fn union(self, other: CapabilitySet) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Capabilities in `self` that `available` lacks, in declaration order.
    #[must_use]
    pub fn missing_from(self, available: CapabilitySet) -> Vec<Capability> {
        self.iter().filter(|c| !available.contains(*c)).collect()
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter()
            .fold(CapabilitySet::empty(), CapabilitySet::with)
    }
}

impl From<Capability> for CapabilitySet {
    fn from(value: Capability) -> Self {
        CapabilitySet::empty().with(value)
    }
}

/// What kind of responsive phase a tool body is written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    /// Needs a human (or stand-in) answering input requests.
    Interactive,
    /// Needs model completions only.
    Automated,
    /// Uses no backchannel at all.
    #[default]
    Pure,
}

impl ContextMode {
    /// Capabilities every adapter must advertise to run a body in this mode.
    #[must_use]
    pub const fn implied_capabilities(self) -> CapabilitySet {
        match self {
            ContextMode::Interactive => CapabilitySet::empty().with(Capability::Input),
            ContextMode::Automated => CapabilitySet::empty().with(Capability::Completion),
            ContextMode::Pure => CapabilitySet::empty(),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContextMode::Interactive => "interactive",
            ContextMode::Automated => "automated",
            ContextMode::Pure => "pure",
        }
    }
}
