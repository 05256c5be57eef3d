//! # Arbiter Core
//!
//! Core types and interfaces for the Arbiter permission resolution engine.
//!
//! This crate defines the vocabulary shared by every other crate in the
//! workspace:
//!
//! - Resources and resource types (instance, database, table, query)
//! - Actors and their optional restriction scopes
//! - Actions and the action registry
//! - Rule fragments, the unit of allow/deny opinion
//! - Decisions, the result of resolving fragments for one resource
//! - The resource catalog interface and an atomically swappable snapshot
//! - Engine settings and the error hierarchy

pub mod action;
pub mod actor;
pub mod catalog;
pub mod decision;
pub mod error;
pub mod resource;
pub mod rule;
pub mod settings;

// Re-export key items for convenience
pub use action::{Action, ActionRegistry};
pub use actor::{Actor, RestrictionScope, RESTRICTION_SOURCE};
pub use catalog::{CatalogSnapshot, CatalogSource, InMemoryCatalog};
pub use decision::{Decision, DecisionLevel};
pub use error::{ActionError, ConfigError, Error, ProviderError};
pub use resource::{Resource, ResourceType};
pub use rule::{Level, RuleFragment, Scope};
pub use settings::EngineSettings;

/// A type alias for Result with our error types
pub type Result<T, E = error::Error> = std::result::Result<T, E>;
