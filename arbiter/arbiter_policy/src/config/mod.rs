//! Configuration-backed rules.
//!
//! The permission configuration tree holds allow blocks at the instance,
//! database and table/query levels. The [`ConfigRuleProvider`] turns every
//! block relevant to the requested action into exactly one fragment at the
//! block's level.

mod matcher;
mod model;
mod provider;

pub use matcher::actor_matches_allow;
pub use model::{ChildConfig, DatabaseConfig, PermissionConfig, QueryConfig};
pub use provider::{ConfigRuleProvider, CONFIG_PROVIDER_ID};
