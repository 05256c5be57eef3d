//! Error types for the Arbiter permission engine.
//!
//! The root [`Error`] carries the caller-visible failure categories. Provider
//! failures have their own type so they can be logged, but the engine never
//! returns them to a caller.

use thiserror::Error;

use crate::resource::ResourceType;

/// Root error type for the Arbiter engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Action {action} applies to {expected} resources, not {actual}")]
    ResourceTypeMismatch {
        action: String,
        expected: ResourceType,
        actual: ResourceType,
    },

    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while registering actions.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Action already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Abbreviation {abbr} is already used by {existing}")]
    AbbreviationInUse { abbr: String, existing: String },

    #[error("Action {action} requires unregistered action {required}")]
    UnknownRequirement { action: String, required: String },

    #[error("Action {0} cannot require itself")]
    SelfRequirement(String),

    #[error("Action {action} ({action_type}) cannot require {required} ({required_type})")]
    IncompatibleRequirement {
        action: String,
        action_type: ResourceType,
        required: String,
        required_type: ResourceType,
    },
}

/// Errors produced by rule providers.
///
/// These never reach a caller of the engine: a failing provider contributes
/// zero fragments and the failure is logged.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Provider {provider} failed: {message}")]
    Failed { provider: String, message: String },

    #[error("Provider {provider} timed out after {millis}ms")]
    TimedOut { provider: String, millis: u64 },

    #[error("Provider {0} panicked")]
    Panicked(String),
}

impl ProviderError {
    /// Shorthand for a [`ProviderError::Failed`].
    pub fn failed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Errors related to settings and the permission configuration tree.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
