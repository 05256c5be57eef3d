//! Resolution results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resource::Resource;
use crate::rule::Level;

/// The path through which a decision was reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionLevel {
    /// An exact child-level fragment won.
    Child,

    /// A parent-level fragment won.
    Parent,

    /// A global fragment won.
    Global,

    /// No fragment applied; the action default was used.
    Default,

    /// The actor is root and nothing explicitly denied the resource.
    Root,
}

impl From<Level> for DecisionLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Child => Self::Child,
            Level::Parent => Self::Parent,
            Level::Global => Self::Global,
        }
    }
}

impl fmt::Display for DecisionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Child => write!(f, "child"),
            Self::Parent => write!(f, "parent"),
            Self::Global => write!(f, "global"),
            Self::Default => write!(f, "default"),
            Self::Root => write!(f, "root"),
        }
    }
}

/// The final allow/deny for one resource under one action.
///
/// Besides the verdict, a decision keeps enough of its derivation for
/// diagnostics. It is produced fresh for every call and never cached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// The action that was evaluated.
    pub action: String,

    /// The resource the decision applies to.
    pub resource: Resource,

    /// The verdict, including restriction gating and also-required actions.
    pub allowed: bool,

    /// The level whose fragments determined the outcome.
    pub level: DecisionLevel,

    /// Reason of the winning fragment, if any.
    pub reason: Option<String>,

    /// Provider identity of the winning fragment, if any.
    pub source: Option<String>,

    /// Whether the outcome fell through to a default.
    pub used_default: bool,

    /// Every distinct reason of the winning polarity at the winning level.
    pub reasons: Vec<String>,

    /// Whether the actor's restriction scope, rather than the providers,
    /// produced the outcome.
    pub restricted: bool,

    /// Decisions for also-required actions, evaluated on ancestor resources.
    pub requirements: Vec<Decision>,
}

impl Decision {
    /// Whether every also-required action was allowed.
    pub fn requirements_met(&self) -> bool {
        self.requirements.iter().all(|r| r.allowed)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} on {} ({}",
            if self.allowed { "allow" } else { "deny" },
            self.action,
            self.resource,
            self.level
        )?;
        if let Some(reason) = &self.reason {
            write!(f, ": {}", reason)?;
        }
        write!(f, ")")
    }
}
