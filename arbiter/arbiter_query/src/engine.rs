//! The permission engine.
//!
//! Every call looks the action up, gathers fragments from all providers
//! (once per action, including also-required ones), translates the actor's
//! restriction scope, and only then resolves. Resolution itself does no I/O.
//!
//! The provider set and the configuration tree are read once per call and
//! shared by every action the call resolves, including also-required ones.
//! Extension providers are still asked once per action and may answer from
//! different states of their own.

use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use tracing::debug;

use arbiter_capability::RestrictionTranslator;
use arbiter_core::{
    Action, ActionRegistry, Actor, CatalogSource, Decision, EngineSettings, Error, InMemoryCatalog, Resource,
    Result,
};
use arbiter_policy::{gather_fragments, CascadingResolver, ConfigRuleProvider, PermissionConfig, ProviderRegistry, RuleProvider};
use serde::{Deserialize, Serialize};

use crate::audit::{CheckLog, CheckRecord};
use crate::page::{Page, PageItem, PageToken, ResourceQuery};

/// A resolver for one action and for each action it also requires.
struct Plan {
    action: Arc<Action>,
    resolver: CascadingResolver,
    requirements: Vec<Plan>,
}

impl Plan {
    fn decide(&self, resource: &Resource) -> Decision {
        let mut decision = self.resolver.decide(resource);
        for requirement in &self.requirements {
            // Registration only admits requirements on the same or a coarser type
            let Some(target) = resource.ancestor(requirement.action.resource_type) else {
                continue;
            };
            decision.requirements.push(requirement.decide(&target));
        }
        if !decision.requirements_met() {
            decision.allowed = false;
        }
        decision
    }
}

/// Whether something is visible to an actor, and whether it is private.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    /// The actor passes at least one of the checks.
    pub visible: bool,

    /// Visible to the actor but not to the anonymous actor.
    pub private: bool,
}

/// Answers permission questions.
///
/// Calls must run inside a Tokio runtime with the timer enabled; provider
/// timeouts rely on it.
pub struct PermissionEngine {
    actions: Arc<ActionRegistry>,
    providers: Arc<ProviderRegistry>,
    config: Arc<ConfigRuleProvider>,
    catalog: Arc<dyn CatalogSource>,
    translator: RestrictionTranslator,
    settings: EngineSettings,
    check_log: CheckLog,
}

impl PermissionEngine {
    pub fn builder() -> PermissionEngineBuilder {
        PermissionEngineBuilder::default()
    }

    /// Whether `actor` may perform `action` on `resource`.
    ///
    /// # Arguments
    ///
    /// * `actor` - The actor performing the action.
    /// * `action` - The registered action name.
    /// * `resource` - The target resource. It need not exist in the catalog.
    ///
    /// # Returns
    ///
    /// * `Ok(bool)` - The final decision.
    /// * `Err` - If the action is unknown or applies to a different resource type.
    pub async fn allowed(&self, actor: &Actor, action: &str, resource: &Resource) -> Result<bool> {
        Ok(self.check(actor, action, resource).await?.allowed)
    }

    /// Whether `actor` may perform at least one of `checks`.
    ///
    /// Checks run in order and stop at the first allow.
    ///
    /// # Arguments
    ///
    /// * `actor` - The actor performing the actions.
    /// * `checks` - `(action, resource)` pairs, at least one.
    ///
    /// # Returns
    ///
    /// * `Ok(bool)` - Whether any check passed.
    /// * `Err` - If `checks` is empty, or a check names an unknown action or
    ///   a resource of the wrong type.
    pub async fn allowed_any(&self, actor: &Actor, checks: &[(&str, Resource)]) -> Result<bool> {
        if checks.is_empty() {
            return Err(Error::InvalidArgument("at least one check is required".to_string()));
        }
        for (action, resource) in checks {
            if self.allowed(actor, action, resource).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether `actor` passes any of `checks`, and whether the anonymous
    /// actor would fail all of them.
    pub async fn check_visibility(&self, actor: &Actor, checks: &[(&str, Resource)]) -> Result<Visibility> {
        if !self.allowed_any(actor, checks).await? {
            return Ok(Visibility::default());
        }
        let public = self.allowed_any(&Actor::anonymous(), checks).await?;
        Ok(Visibility {
            visible: true,
            private: !public,
        })
    }

    /// Explain how a check is decided.
    ///
    /// The result is diagnostic. Enforcement must go through
    /// [`PermissionEngine::allowed`].
    pub async fn explain_check(&self, actor: &Actor, action: &str, resource: &Resource) -> Result<Decision> {
        self.check(actor, action, resource).await
    }

    /// Enumerate, one page at a time, the resources `actor` may perform the
    /// query's action on, ordered by `(parent, child)`.
    ///
    /// # Arguments
    ///
    /// * `actor` - The actor performing the action.
    /// * `query` - The action, optional filters and the page position.
    ///
    /// # Returns
    ///
    /// * `Ok(Page)` - The allowed resources on this page.
    /// * `Err` - If the action is unknown, the page size is below the
    ///   minimum, the page token is malformed, or a child filter is given
    ///   without a parent filter.
    pub async fn allowed_resources(&self, actor: &Actor, query: &ResourceQuery) -> Result<Page> {
        if query.child.is_some() && query.parent.is_none() {
            return Err(Error::InvalidArgument(
                "a child filter requires a parent filter".to_string(),
            ));
        }
        let page_size = self.page_size(query.page_size)?;
        let after = query.page_token.as_deref().map(PageToken::decode).transpose()?;

        let action = self.actions.lookup(&query.action)?;
        let providers = self.call_providers();
        let plan = self.prepare(&providers, actor, action.clone()).await?;
        let anonymous = Actor::anonymous();
        let public_plan = if query.include_private {
            Some(self.prepare(&providers, &anonymous, action.clone()).await?)
        } else {
            None
        };

        let mut resources = self.catalog.resources_of(action.resource_type);
        resources.sort();

        let allowed: Vec<Decision> = resources
            .iter()
            .filter(|r| query.parent.as_deref().map_or(true, |p| r.parent() == Some(p)))
            .filter(|r| query.child.as_deref().map_or(true, |c| r.child() == Some(c)))
            .map(|r| plan.decide(r))
            .filter(|decision| decision.allowed)
            .collect();
        let total = allowed.len();

        let mut remaining = allowed
            .into_iter()
            .filter(|decision| after.as_ref().map_or(true, |token| token.precedes(&decision.resource)))
            .peekable();
        let page: Vec<Decision> = remaining.by_ref().take(page_size).collect();
        let next_page_token = match (remaining.peek(), page.last()) {
            (Some(_), Some(last)) => Some(PageToken::after(&last.resource).encode()),
            _ => None,
        };

        debug!(
            action = %action.name,
            actor = actor.id().unwrap_or("-"),
            total,
            returned = page.len(),
            "enumerated allowed resources"
        );

        let items = page
            .into_iter()
            .map(|decision| PageItem {
                parent: decision.resource.parent().map(str::to_string),
                child: decision.resource.child().map(str::to_string),
                private: public_plan
                    .as_ref()
                    .map(|public| !public.decide(&decision.resource).allowed),
                reasons: query.include_reasons.then_some(decision.reasons),
            })
            .collect();

        Ok(Page {
            items,
            next_page_token,
            total,
        })
    }

    /// Up to `limit` recent point checks and explanations, newest first.
    pub fn recent_checks(&self, limit: usize) -> Vec<CheckRecord> {
        self.check_log.recent(limit)
    }

    /// Register an action at runtime.
    pub fn register_action(&self, action: Action) -> Result<()> {
        self.actions.register(action)
    }

    /// Register an extension rule provider.
    pub fn register_provider(&self, provider: Arc<dyn RuleProvider>) -> Result<()> {
        Ok(self.providers.register(provider)?)
    }

    /// Remove a rule provider. Returns whether it was registered.
    pub fn unregister_provider(&self, id: &str) -> bool {
        self.providers.unregister(id)
    }

    /// Replace the permission configuration read by the built-in provider.
    pub fn replace_config(&self, config: PermissionConfig) {
        self.config.replace(config);
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    async fn check(&self, actor: &Actor, action: &str, resource: &Resource) -> Result<Decision> {
        let action = self.actions.lookup(action)?;
        if resource.kind() != action.resource_type {
            return Err(Error::ResourceTypeMismatch {
                action: action.name.clone(),
                expected: action.resource_type,
                actual: resource.kind(),
            });
        }

        let providers = self.call_providers();
        let plan = self.prepare(&providers, actor, action).await?;
        let decision = plan.decide(resource);

        debug!(
            action = %decision.action,
            resource = %decision.resource,
            actor = actor.id().unwrap_or("-"),
            allowed = decision.allowed,
            level = %decision.level,
            "permission check"
        );
        self.check_log.record(CheckRecord::new(actor, &decision));
        Ok(decision)
    }

    /// The providers for one call, with the configuration tree pinned.
    fn call_providers(&self) -> Vec<Arc<dyn RuleProvider>> {
        let config = Arc::as_ptr(&self.config) as *const ();
        self.providers
            .snapshot()
            .into_iter()
            .map(|provider| {
                if Arc::as_ptr(&provider) as *const () == config {
                    Arc::new(self.config.pinned()) as Arc<dyn RuleProvider>
                } else {
                    provider
                }
            })
            .collect()
    }

    /// Gather everything needed to resolve `action` and its requirements.
    fn prepare<'a>(
        &'a self,
        providers: &'a [Arc<dyn RuleProvider>],
        actor: &'a Actor,
        action: Arc<Action>,
    ) -> BoxFuture<'a, Result<Plan>> {
        async move {
            let fragments = gather_fragments(providers, actor, &action, self.settings.provider_timeout()).await;
            let restrictions = self.translator.translate(actor.restrictions(), &action.name);
            let resolver = CascadingResolver::new(&action, fragments)
                .with_restrictions(restrictions)
                .with_root(actor.is_root());

            let requirements = try_join_all(action.also_requires.iter().map(|name| async move {
                let required = self.actions.lookup(name)?;
                self.prepare(providers, actor, required).await
            }))
            .await?;

            Ok(Plan {
                action,
                resolver,
                requirements,
            })
        }
        .boxed()
    }

    fn page_size(&self, requested: Option<usize>) -> Result<usize> {
        let size = requested.unwrap_or(self.settings.default_page_size);
        if size < self.settings.min_page_size {
            return Err(Error::InvalidArgument(format!(
                "page size {} is below the minimum of {}",
                size, self.settings.min_page_size
            )));
        }
        Ok(size.min(self.settings.max_page_size))
    }
}

/// Builds a [`PermissionEngine`].
#[derive(Default)]
pub struct PermissionEngineBuilder {
    settings: EngineSettings,
    actions: Option<Arc<ActionRegistry>>,
    config: PermissionConfig,
    providers: Vec<Arc<dyn RuleProvider>>,
    catalog: Option<Arc<dyn CatalogSource>>,
}

impl PermissionEngineBuilder {
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use `actions` instead of a registry of the built-in actions.
    pub fn actions(mut self, actions: Arc<ActionRegistry>) -> Self {
        self.actions = Some(actions);
        self
    }

    /// The configuration tree read by the built-in provider.
    pub fn config(mut self, config: PermissionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn provider(mut self, provider: Arc<dyn RuleProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn CatalogSource>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn build(self) -> Result<PermissionEngine> {
        self.settings.validate()?;

        let actions = match self.actions {
            Some(actions) => actions,
            None => Arc::new(ActionRegistry::with_builtin_actions(&self.settings)?),
        };

        let providers = Arc::new(ProviderRegistry::new());
        let config = Arc::new(ConfigRuleProvider::new(self.config));
        providers.register(config.clone())?;
        for provider in self.providers {
            providers.register(provider)?;
        }

        let catalog = self
            .catalog
            .unwrap_or_else(|| Arc::new(InMemoryCatalog::default()));

        Ok(PermissionEngine {
            translator: RestrictionTranslator::new(actions.clone()),
            check_log: CheckLog::new(self.settings.check_log_capacity),
            actions,
            providers,
            config,
            catalog,
            settings: self.settings,
        })
    }
}
