//! Provider aggregation.
//!
//! Every provider is asked concurrently and the answers are concatenated
//! once all have finished. Failures are absorbed here: an erroring,
//! panicking or slow provider contributes zero fragments and is logged.
//!
//! Timeouts use the Tokio timer. Outside a Tokio runtime every provider call
//! panics and is absorbed, so no provider contributes anything.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use tracing::{debug, warn};

use arbiter_core::error::ProviderError;
use arbiter_core::{Action, Actor, RuleFragment};

use crate::provider::RuleProvider;

/// Collect fragments from every provider for `(actor, action)`.
///
/// Each fragment's `source` is set to the id of the provider that emitted
/// it. The result order carries no meaning.
pub async fn gather_fragments(
    providers: &[Arc<dyn RuleProvider>],
    actor: &Actor,
    action: &Action,
    timeout: Duration,
) -> Vec<RuleFragment> {
    let calls = providers.iter().map(|provider| call_provider(provider.as_ref(), actor, action, timeout));
    let results = join_all(calls).await;

    let mut fragments = Vec::new();
    for result in results {
        match result {
            Ok(mut batch) => fragments.append(&mut batch),
            Err(err) => warn!(action = %action.name, error = %err, "rule provider contributed no fragments"),
        }
    }

    debug!(
        action = %action.name,
        providers = providers.len(),
        fragments = fragments.len(),
        "gathered rule fragments"
    );
    fragments
}

async fn call_provider(
    provider: &dyn RuleProvider,
    actor: &Actor,
    action: &Action,
    timeout: Duration,
) -> Result<Vec<RuleFragment>, ProviderError> {
    let id = provider.id().to_string();
    // Built lazily so that a missing timer driver is caught like any other panic
    let call = async { tokio::time::timeout(timeout, provider.rules(actor, action)).await };

    let fragments = match AssertUnwindSafe(call).catch_unwind().await {
        Err(_) => return Err(ProviderError::Panicked(id)),
        Ok(Err(_)) => {
            return Err(ProviderError::TimedOut {
                provider: id,
                millis: timeout.as_millis() as u64,
            })
        }
        Ok(Ok(result)) => result?,
    };

    Ok(fragments
        .into_iter()
        .map(|fragment| fragment.with_source(id.clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FnRuleProvider;
    use arbiter_core::ResourceType;
    use async_trait::async_trait;

    struct SlowProvider;

    #[async_trait]
    impl RuleProvider for SlowProvider {
        fn id(&self) -> &str {
            "slow"
        }

        async fn rules(&self, _actor: &Actor, _action: &Action) -> Result<Vec<RuleFragment>, ProviderError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![RuleFragment::global(true, "too late")])
        }
    }

    struct PanickingProvider;

    #[async_trait]
    impl RuleProvider for PanickingProvider {
        fn id(&self) -> &str {
            "panics"
        }

        async fn rules(&self, _actor: &Actor, _action: &Action) -> Result<Vec<RuleFragment>, ProviderError> {
            panic!("provider bug");
        }
    }

    fn action() -> Action {
        Action::new("view-table", ResourceType::Table)
    }

    #[tokio::test]
    async fn test_concatenates_and_stamps_source() {
        let providers: Vec<Arc<dyn RuleProvider>> = vec![
            Arc::new(FnRuleProvider::new("a", |_, _| {
                Ok(vec![RuleFragment::global(true, "a says yes").with_source("spoofed")])
            })),
            Arc::new(FnRuleProvider::new("b", |_, _| {
                Ok(vec![
                    RuleFragment::parent("db1", false, "b says no"),
                    RuleFragment::parent("db1", false, "b says no"),
                ])
            })),
        ];

        let mut fragments =
            gather_fragments(&providers, &Actor::anonymous(), &action(), Duration::from_secs(1)).await;
        fragments.sort_by(|x, y| x.source.cmp(&y.source));

        // Duplicates are kept
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].source, "a");
        assert_eq!(fragments[1].source, "b");
        assert_eq!(fragments[2].source, "b");
    }

    #[tokio::test]
    async fn test_failures_contribute_nothing() {
        let providers: Vec<Arc<dyn RuleProvider>> = vec![
            Arc::new(FnRuleProvider::new("broken", |_, _| {
                Err(ProviderError::failed("broken", "backend unavailable"))
            })),
            Arc::new(PanickingProvider),
            Arc::new(FnRuleProvider::new("ok", |_, _| Ok(vec![RuleFragment::global(false, "no")]))),
        ];

        let fragments =
            gather_fragments(&providers, &Actor::anonymous(), &action(), Duration::from_secs(1)).await;
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].source, "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let providers: Vec<Arc<dyn RuleProvider>> = vec![
            Arc::new(SlowProvider),
            Arc::new(FnRuleProvider::new("fast", |_, _| Ok(vec![RuleFragment::global(true, "yes")]))),
        ];

        let fragments =
            gather_fragments(&providers, &Actor::anonymous(), &action(), Duration::from_millis(50)).await;
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].source, "fast");
    }

    #[test]
    fn test_no_runtime_degrades_to_no_fragments() {
        let providers: Vec<Arc<dyn RuleProvider>> =
            vec![Arc::new(FnRuleProvider::new("ok", |_, _| Ok(vec![RuleFragment::global(true, "yes")])))];

        let fragments = futures::executor::block_on(gather_fragments(
            &providers,
            &Actor::anonymous(),
            &action(),
            Duration::from_secs(1),
        ));
        assert!(fragments.is_empty());
    }

    #[tokio::test]
    async fn test_no_providers() {
        let fragments = gather_fragments(&[], &Actor::anonymous(), &action(), Duration::from_secs(1)).await;
        assert!(fragments.is_empty());
    }
}
