//! # Arbiter Policy
//!
//! `arbiter_policy` turns independently-authored rules into decisions.
//!
//! Key concepts:
//!
//! 1. **Rule Provider**: A source of rule fragments for an (actor, action)
//!    pair. The built-in [`ConfigRuleProvider`] reads the permission
//!    configuration tree; extensions register their own providers.
//!
//! 2. **Aggregation**: Every registered provider is asked concurrently and
//!    the fragments are concatenated. A provider that fails, times out or
//!    panics contributes nothing.
//!
//! 3. **Cascading Resolution**: Fragments are reduced per resource by
//!    precedence (child over parent over global over default), with deny
//!    beating allow inside a level.

pub mod config;
pub mod gather;
pub mod provider;
pub mod resolver;

// Re-export key types and traits for convenience
pub use config::{ConfigRuleProvider, PermissionConfig};
pub use gather::gather_fragments;
pub use provider::{FnRuleProvider, ProviderRegistry, RuleProvider};
pub use resolver::{CascadingResolver, FragmentIndex};
