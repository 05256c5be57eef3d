//! Restriction scope translation.
//!
//! This module turns a restriction scope into the synthetic fragment set the
//! resolver gates provider decisions with.

use std::sync::Arc;

use tracing::debug;

use arbiter_core::{ActionRegistry, RestrictionScope, RuleFragment, RESTRICTION_SOURCE};

use crate::implied::implied_by;

/// Translates restriction scopes into allow fragments.
///
/// Only allow fragments are ever produced. A resource that no fragment
/// covers is denied by the resolver's restriction pass, so an empty result
/// means "nothing is granted" while `None` means "not restricted".
pub struct RestrictionTranslator {
    /// Registry used to normalize abbreviations.
    registry: Arc<ActionRegistry>,
}

impl RestrictionTranslator {
    /// Create a new translator.
    ///
    /// # Arguments
    ///
    /// * `registry` - The action registry whose names and abbreviations are
    ///   accepted in restriction lists.
    ///
    /// # Returns
    ///
    /// A new restriction translator.
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }

    /// Translate `scope` for `action`.
    ///
    /// # Arguments
    ///
    /// * `scope` - The actor's restriction scope, if any.
    /// * `action` - The action being evaluated, by name or abbreviation.
    ///
    /// # Returns
    ///
    /// * `None` - If there is no scope, so nothing is gated.
    /// * `Some(fragments)` - The grants for `action`, possibly empty.
    pub fn translate(&self, scope: Option<&RestrictionScope>, action: &str) -> Option<Vec<RuleFragment>> {
        let scope = scope?;
        let action = self.normalize(action);
        let mut fragments = Vec::new();

        if self.grants(&scope.all, &action) {
            fragments.push(RuleFragment::global(
                true,
                format!("actor restrictions: {} allowed everywhere", action),
            ));
        }

        if let Some(implying) = self.implying_grant(scope, &action) {
            fragments.push(RuleFragment::global(
                true,
                format!("actor restrictions: {} implied by {}", action, implying),
            ));
        }

        for (database, actions) in &scope.databases {
            if self.grants(actions, &action) {
                fragments.push(RuleFragment::parent(
                    database.clone(),
                    true,
                    format!("actor restrictions: {} allowed on {}", action, database),
                ));
            }
        }

        for (database, children) in &scope.resources {
            for (child, actions) in children {
                if self.grants(actions, &action) {
                    fragments.push(RuleFragment::child(
                        database.clone(),
                        child.clone(),
                        true,
                        format!("actor restrictions: {} allowed on {}/{}", action, database, child),
                    ));
                }
            }
        }

        debug!(action = %action, grants = fragments.len(), "translated restriction scope");

        Some(
            fragments
                .into_iter()
                .map(|fragment| fragment.with_source(RESTRICTION_SOURCE))
                .collect(),
        )
    }

    /// Canonical name for a name or abbreviation. Unknown entries are kept
    /// verbatim so they can still match an exact name.
    fn normalize(&self, name: &str) -> String {
        self.registry
            .canonical_name(name)
            .unwrap_or_else(|| name.to_string())
    }

    fn grants(&self, entries: &[String], action: &str) -> bool {
        entries.iter().any(|entry| self.normalize(entry) == action)
    }

    /// The first instance-wide or per-database grant that implies `action`.
    fn implying_grant(&self, scope: &RestrictionScope, action: &str) -> Option<&'static str> {
        let implying = implied_by(action);
        if implying.is_empty() {
            return None;
        }
        let lists = std::iter::once(&scope.all).chain(scope.databases.values());
        for entries in lists {
            for entry in entries {
                let entry = self.normalize(entry);
                if let Some(found) = implying.iter().find(|name| **name == entry) {
                    return Some(*found);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_core::{EngineSettings, Scope};

    fn translator() -> RestrictionTranslator {
        let registry = ActionRegistry::with_builtin_actions(&EngineSettings::default()).unwrap();
        RestrictionTranslator::new(Arc::new(registry))
    }

    #[test]
    fn test_absent_scope_is_not_a_gate() {
        assert_eq!(translator().translate(None, "view-table"), None);
    }

    #[test]
    fn test_empty_scope_grants_nothing() {
        let scope = RestrictionScope::new();
        assert_eq!(translator().translate(Some(&scope), "view-table"), Some(Vec::new()));
    }

    #[test]
    fn test_each_granularity() {
        let scope = RestrictionScope::new()
            .allow_all("insert-row")
            .allow_database("db1", "view-table")
            .allow_resource("db2", "t1", "view-table");

        let fragments = translator().translate(Some(&scope), "view-table").unwrap();
        let scopes: Vec<Scope> = fragments.iter().map(|f| f.scope.clone()).collect();
        assert_eq!(
            scopes,
            vec![Scope::Parent("db1".into()), Scope::Child("db2".into(), "t1".into())]
        );
        assert!(fragments.iter().all(|f| f.allow && f.source == RESTRICTION_SOURCE));

        let fragments = translator().translate(Some(&scope), "insert-row").unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].scope, Scope::Global);
    }

    #[test]
    fn test_abbreviations_normalized() {
        let scope = RestrictionScope::new().allow_resource("db1", "t1", "vt");
        let fragments = translator().translate(Some(&scope), "view-table").unwrap();
        assert_eq!(fragments.len(), 1);

        // The requested action may also be abbreviated
        let fragments = translator().translate(Some(&scope), "vt").unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].reason, "actor restrictions: view-table allowed on db1/t1");
    }

    #[test]
    fn test_view_table_implies_view_instance() {
        let scope = RestrictionScope::new().allow_database("db1", "vt");
        let fragments = translator().translate(Some(&scope), "view-instance").unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].scope, Scope::Global);
        assert_eq!(fragments[0].reason, "actor restrictions: view-instance implied by view-table");
    }

    #[test]
    fn test_per_resource_grant_does_not_imply_view_instance() {
        let scope = RestrictionScope::new().allow_resource("db1", "t1", "view-table");
        let fragments = translator().translate(Some(&scope), "view-instance").unwrap();
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_parsed_actor_scope() {
        let actor = arbiter_core::Actor::from_value(serde_json::json!({
            "id": "bot",
            "_r": {"a": ["vi"], "d": {"db1": ["es"]}}
        }))
        .unwrap();

        let fragments = translator().translate(actor.restrictions(), "execute-sql").unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].scope, Scope::Parent("db1".into()));
    }
}
