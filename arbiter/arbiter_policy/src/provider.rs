//! Rule providers.
//!
//! This module defines the provider interface and the registry the host
//! uses to add and remove providers at runtime.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::info;

use arbiter_core::error::ProviderError;
use arbiter_core::{Action, Actor, RuleFragment};

/// A source of rule fragments.
///
/// Providers are independent reads: they must not depend on each other or on
/// the order in which they are called.
#[async_trait]
pub trait RuleProvider: Send + Sync {
    /// Identity attached to every fragment this provider emits.
    fn id(&self) -> &str;

    /// Produce the fragments this provider holds for `actor` performing
    /// `action`.
    ///
    /// # Arguments
    ///
    /// * `actor` - The actor being evaluated.
    /// * `action` - The action being evaluated.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<RuleFragment>)` - Zero or more fragments.
    /// * `Err` - If the provider could not produce an answer. The caller
    ///   treats this as zero fragments.
    async fn rules(&self, actor: &Actor, action: &Action) -> Result<Vec<RuleFragment>, ProviderError>;
}

type RuleFn = dyn Fn(&Actor, &Action) -> Result<Vec<RuleFragment>, ProviderError> + Send + Sync;

/// A provider backed by a synchronous closure.
pub struct FnRuleProvider {
    id: String,
    rules: Box<RuleFn>,
}

impl FnRuleProvider {
    pub fn new<F>(id: impl Into<String>, rules: F) -> Self
    where
        F: Fn(&Actor, &Action) -> Result<Vec<RuleFragment>, ProviderError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            rules: Box::new(rules),
        }
    }
}

impl fmt::Debug for FnRuleProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRuleProvider").field("id", &self.id).finish()
    }
}

#[async_trait]
impl RuleProvider for FnRuleProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn rules(&self, actor: &Actor, action: &Action) -> Result<Vec<RuleFragment>, ProviderError> {
        (self.rules)(actor, action)
    }
}

/// The set of currently registered providers.
///
/// Providers are keyed by id. Registration order is not retained; nothing
/// downstream may depend on it.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: DashMap<String, Arc<dyn RuleProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the provider was registered.
    /// * `Err(ProviderError::AlreadyRegistered)` - If the id is taken.
    pub fn register(&self, provider: Arc<dyn RuleProvider>) -> Result<(), ProviderError> {
        let id = provider.id().to_string();
        match self.providers.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(ProviderError::AlreadyRegistered(id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(provider);
                info!(provider = %id, "registered rule provider");
                Ok(())
            }
        }
    }

    /// Remove a provider. Returns whether it was registered.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.providers.remove(id).is_some();
        if removed {
            info!(provider = %id, "unregistered rule provider");
        }
        removed
    }

    /// The providers registered right now.
    pub fn snapshot(&self) -> Vec<Arc<dyn RuleProvider>> {
        self.providers.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
