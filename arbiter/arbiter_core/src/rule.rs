//! Rule fragments.
//!
//! A rule fragment is one provider's allow/deny opinion about a scope of
//! resources. Fragments carry no precedence of their own; the resolver
//! derives precedence from the fragment's [`Level`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resource::Resource;

/// Precedence level of a fragment. Later variants win.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Global,
    Parent,
    Child,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Parent => write!(f, "parent"),
            Self::Child => write!(f, "child"),
        }
    }
}

/// The set of resources a fragment speaks about.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Every resource.
    Global,

    /// A parent and all of its children.
    Parent(String),

    /// Exactly one child resource.
    Child(String, String),
}

impl Scope {
    pub fn level(&self) -> Level {
        match self {
            Self::Global => Level::Global,
            Self::Parent(_) => Level::Parent,
            Self::Child(_, _) => Level::Child,
        }
    }

    /// Whether this scope covers `resource`.
    ///
    /// Parent scopes cover the parent resource itself as well as its
    /// children. The instance resource is only covered by the global scope.
    pub fn covers(&self, resource: &Resource) -> bool {
        match self {
            Self::Global => true,
            Self::Parent(parent) => resource.parent() == Some(parent.as_str()),
            Self::Child(parent, child) => {
                resource.parent() == Some(parent.as_str()) && resource.child() == Some(child.as_str())
            }
        }
    }
}

/// One allow/deny opinion with its reason and originating provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleFragment {
    pub scope: Scope,
    pub allow: bool,
    pub reason: String,
    pub source: String,
}

impl RuleFragment {
    pub fn new(scope: Scope, allow: bool, reason: impl Into<String>) -> Self {
        Self {
            scope,
            allow,
            reason: reason.into(),
            source: String::new(),
        }
    }

    /// A fragment covering every resource.
    pub fn global(allow: bool, reason: impl Into<String>) -> Self {
        Self::new(Scope::Global, allow, reason)
    }

    /// A fragment covering `parent` and all of its children.
    pub fn parent(parent: impl Into<String>, allow: bool, reason: impl Into<String>) -> Self {
        Self::new(Scope::Parent(parent.into()), allow, reason)
    }

    /// A fragment covering exactly `(parent, child)`.
    pub fn child(
        parent: impl Into<String>,
        child: impl Into<String>,
        allow: bool,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(Scope::Child(parent.into(), child.into()), allow, reason)
    }

    /// Set the provider identity this fragment is attributed to.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn level(&self) -> Level {
        self.scope.level()
    }

    pub fn covers(&self, resource: &Resource) -> bool {
        self.scope.covers(resource)
    }
}
