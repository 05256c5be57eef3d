//! Cascading resolution.
//!
//! Per resource, the most specific level holding any applicable fragment
//! wins: child over parent over global, falling back to the action default.
//! Inside the winning level a deny beats any number of allows.
//!
//! An optional second fragment set, derived from the actor's restriction
//! scope, is resolved the same way with a forced default of deny and ANDed
//! with the provider result. Root actors bypass both passes unless a
//! provider explicitly denies the resource.
//!
//! Resolution is a pure function of its inputs and performs no I/O.

use std::collections::HashMap;

use arbiter_core::{Action, Decision, DecisionLevel, Level, Resource, RuleFragment, Scope, RESTRICTION_SOURCE};

/// Allow and deny fragments gathered at one level for one key.
#[derive(Clone, Debug, Default)]
struct Tally {
    allows: Vec<RuleFragment>,
    denies: Vec<RuleFragment>,
}

impl Tally {
    fn push(&mut self, fragment: RuleFragment) {
        if fragment.allow {
            self.allows.push(fragment);
        } else {
            self.denies.push(fragment);
        }
    }

    /// The verdict of this level: deny if any fragment denies.
    fn verdict(&self, level: Level) -> Option<LevelVerdict> {
        if !self.denies.is_empty() {
            Some(LevelVerdict::from_fragments(level, false, &self.denies))
        } else if !self.allows.is_empty() {
            Some(LevelVerdict::from_fragments(level, true, &self.allows))
        } else {
            None
        }
    }

    fn deny_verdict(&self, level: Level) -> Option<LevelVerdict> {
        if self.denies.is_empty() {
            None
        } else {
            Some(LevelVerdict::from_fragments(level, false, &self.denies))
        }
    }
}

/// The outcome of a single level for a single resource.
#[derive(Clone, Debug, PartialEq, Eq)]
struct LevelVerdict {
    level: Level,
    allow: bool,
    reason: String,
    source: String,
    reasons: Vec<String>,
}

impl LevelVerdict {
    /// Build from the non-empty fragments of the winning polarity. The
    /// reported reason is the smallest `(source, reason)` pair, so it does
    /// not depend on the order fragments arrived in.
    fn from_fragments(level: Level, allow: bool, fragments: &[RuleFragment]) -> Self {
        let winner = fragments
            .iter()
            .min_by(|a, b| (&a.source, &a.reason).cmp(&(&b.source, &b.reason)));
        let (reason, source) = winner
            .map(|f| (f.reason.clone(), f.source.clone()))
            .unwrap_or_default();

        let mut reasons: Vec<String> = fragments.iter().map(|f| f.reason.clone()).collect();
        reasons.sort();
        reasons.dedup();

        Self {
            level,
            allow,
            reason,
            source,
            reasons,
        }
    }
}

/// Fragments bucketed by level and key for fast per-resource lookup.
#[derive(Clone, Debug, Default)]
pub struct FragmentIndex {
    global: Tally,
    parents: HashMap<String, Tally>,
    children: HashMap<(String, String), Tally>,
    len: usize,
}

impl FragmentIndex {
    pub fn new(fragments: impl IntoIterator<Item = RuleFragment>) -> Self {
        let mut index = Self::default();
        for fragment in fragments {
            index.len += 1;
            match &fragment.scope {
                Scope::Global => index.global.push(fragment),
                Scope::Parent(parent) => {
                    let key = parent.clone();
                    index.parents.entry(key).or_default().push(fragment);
                }
                Scope::Child(parent, child) => {
                    let key = (parent.clone(), child.clone());
                    index.children.entry(key).or_default().push(fragment);
                }
            }
        }
        index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The tallies covering `resource`, most specific first.
    fn tallies_for(&self, resource: &Resource) -> [(Level, Option<&Tally>); 3] {
        let child = match (resource.parent(), resource.child()) {
            (Some(parent), Some(child)) => self.children.get(&(parent.to_string(), child.to_string())),
            _ => None,
        };
        let parent = resource.parent().and_then(|parent| self.parents.get(parent));
        [
            (Level::Child, child),
            (Level::Parent, parent),
            (Level::Global, Some(&self.global)),
        ]
    }

    /// The verdict of the most specific level that has any fragment.
    fn cascade(&self, resource: &Resource) -> Option<LevelVerdict> {
        self.tallies_for(resource)
            .into_iter()
            .find_map(|(level, tally)| tally.and_then(|t| t.verdict(level)))
    }

    /// The most specific deny covering `resource`, at any level.
    fn strongest_deny(&self, resource: &Resource) -> Option<LevelVerdict> {
        self.tallies_for(resource)
            .into_iter()
            .find_map(|(level, tally)| tally.and_then(|t| t.deny_verdict(level)))
    }
}

/// Resolves decisions for one `(actor, action)` query.
///
/// Built once per call from the gathered fragments, then asked about any
/// number of resources. Requirements (also-required actions) are composed
/// by the caller.
#[derive(Clone, Debug)]
pub struct CascadingResolver {
    action: String,
    default_allow: bool,
    providers: FragmentIndex,
    restrictions: Option<FragmentIndex>,
    root: bool,
}

impl CascadingResolver {
    /// Create a resolver for `action` over provider fragments.
    pub fn new(action: &Action, fragments: Vec<RuleFragment>) -> Self {
        Self {
            action: action.name.clone(),
            default_allow: action.default_allow,
            providers: FragmentIndex::new(fragments),
            restrictions: None,
            root: false,
        }
    }

    /// Gate results with restriction-scope fragments. `None` means the actor
    /// has no restriction scope and nothing is gated.
    pub fn with_restrictions(mut self, fragments: Option<Vec<RuleFragment>>) -> Self {
        self.restrictions = fragments.map(FragmentIndex::new);
        self
    }

    /// Evaluate as a root actor.
    pub fn with_root(mut self, root: bool) -> Self {
        self.root = root;
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Decide a single resource.
    pub fn decide(&self, resource: &Resource) -> Decision {
        if self.root {
            return match self.providers.strongest_deny(resource) {
                Some(deny) => self.from_verdict(resource, deny, false),
                None => Decision {
                    action: self.action.clone(),
                    resource: resource.clone(),
                    allowed: true,
                    level: DecisionLevel::Root,
                    reason: Some("root user".to_string()),
                    source: None,
                    used_default: false,
                    reasons: vec!["root user".to_string()],
                    restricted: false,
                    requirements: Vec::new(),
                },
            };
        }

        let provider_decision = match self.providers.cascade(resource) {
            Some(verdict) => self.from_verdict(resource, verdict, false),
            None => self.default_decision(resource),
        };
        if !provider_decision.allowed {
            return provider_decision;
        }

        let Some(restrictions) = &self.restrictions else {
            return provider_decision;
        };
        match restrictions.cascade(resource) {
            Some(verdict) if verdict.allow => provider_decision,
            Some(verdict) => self.from_verdict(resource, verdict, true),
            None => self.restriction_denial(resource),
        }
    }

    /// Decide every resource, preserving input order.
    pub fn resolve_all<'a>(&self, resources: impl IntoIterator<Item = &'a Resource>) -> Vec<Decision> {
        resources.into_iter().map(|resource| self.decide(resource)).collect()
    }

    fn from_verdict(&self, resource: &Resource, verdict: LevelVerdict, restricted: bool) -> Decision {
        Decision {
            action: self.action.clone(),
            resource: resource.clone(),
            allowed: verdict.allow,
            level: verdict.level.into(),
            reason: Some(verdict.reason),
            source: Some(verdict.source),
            used_default: false,
            reasons: verdict.reasons,
            restricted,
            requirements: Vec::new(),
        }
    }

    fn default_decision(&self, resource: &Resource) -> Decision {
        let reason = format!(
            "default {} for {}",
            if self.default_allow { "allow" } else { "deny" },
            self.action
        );
        Decision {
            action: self.action.clone(),
            resource: resource.clone(),
            allowed: self.default_allow,
            level: DecisionLevel::Default,
            reason: Some(reason.clone()),
            source: None,
            used_default: true,
            reasons: vec![reason],
            restricted: false,
            requirements: Vec::new(),
        }
    }

    fn restriction_denial(&self, resource: &Resource) -> Decision {
        let reason = format!("actor restrictions: {} not in allowlist", self.action);
        Decision {
            action: self.action.clone(),
            resource: resource.clone(),
            allowed: false,
            level: DecisionLevel::Default,
            reason: Some(reason.clone()),
            source: Some(RESTRICTION_SOURCE.to_string()),
            used_default: true,
            reasons: vec![reason],
            restricted: true,
            requirements: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_core::ResourceType;

    fn view_table(default_allow: bool) -> Action {
        Action::new("view-table", ResourceType::Table).with_default_allow(default_allow)
    }

    fn tables() -> Vec<Resource> {
        vec![
            Resource::table("db1", "t1"),
            Resource::table("db1", "t2"),
            Resource::table("db2", "t1"),
        ]
    }

    #[test]
    fn test_no_fragments_uses_default() {
        for default_allow in [true, false] {
            let resolver = CascadingResolver::new(&view_table(default_allow), Vec::new());
            let decision = resolver.decide(&Resource::table("db1", "t1"));
            assert_eq!(decision.allowed, default_allow);
            assert!(decision.used_default);
            assert_eq!(decision.level, DecisionLevel::Default);
        }
    }

    #[test]
    fn test_parent_allow_overrides_global_deny() {
        let resolver = CascadingResolver::new(
            &view_table(false),
            vec![
                RuleFragment::global(false, "deny all").with_source("config"),
                RuleFragment::parent("db1", true, "allow db1").with_source("config"),
            ],
        );

        let decisions = resolver.resolve_all(&tables());
        assert!(decisions[0].allowed);
        assert!(decisions[1].allowed);
        assert!(!decisions[2].allowed);
        assert_eq!(decisions[0].level, DecisionLevel::Parent);
        assert_eq!(decisions[2].level, DecisionLevel::Global);
    }

    #[test]
    fn test_deny_beats_allow_within_level() {
        let allow = RuleFragment::child("db1", "t1", true, "plugin a allows").with_source("plugin_a");
        let deny = RuleFragment::child("db1", "t1", false, "plugin b denies").with_source("plugin_b");

        for fragments in [vec![allow.clone(), deny.clone()], vec![deny.clone(), allow.clone()]] {
            let resolver = CascadingResolver::new(&view_table(true), fragments);
            let decision = resolver.decide(&Resource::table("db1", "t1"));
            assert!(!decision.allowed);
            assert_eq!(decision.source.as_deref(), Some("plugin_b"));
            assert_eq!(decision.reason.as_deref(), Some("plugin b denies"));
        }
    }

    #[test]
    fn test_child_overrides_any_polarity() {
        let resolver = CascadingResolver::new(
            &view_table(false),
            vec![
                RuleFragment::global(true, "allow all"),
                RuleFragment::parent("db1", false, "deny db1"),
                RuleFragment::child("db1", "t2", true, "allow t2"),
            ],
        );

        let decisions = resolver.resolve_all(&tables());
        assert!(!decisions[0].allowed);
        assert!(decisions[1].allowed);
        assert_eq!(decisions[1].level, DecisionLevel::Child);
        assert!(decisions[2].allowed);
    }

    #[test]
    fn test_instance_only_sees_global() {
        let action = Action::new("view-instance", ResourceType::Instance).with_default_allow(true);
        let resolver = CascadingResolver::new(&action, vec![RuleFragment::parent("db1", false, "deny db1")]);
        let decision = resolver.decide(&Resource::instance());
        assert!(decision.allowed);
        assert!(decision.used_default);
    }

    #[test]
    fn test_reasons_collects_all_at_winning_level() {
        let resolver = CascadingResolver::new(
            &view_table(false),
            vec![
                RuleFragment::parent("db1", true, "b reason").with_source("b"),
                RuleFragment::parent("db1", true, "a reason").with_source("a"),
                RuleFragment::parent("db1", true, "a reason").with_source("a"),
                RuleFragment::global(true, "global reason"),
            ],
        );
        let decision = resolver.decide(&Resource::table("db1", "t1"));
        assert_eq!(decision.reasons, vec!["a reason".to_string(), "b reason".to_string()]);
        assert_eq!(decision.source.as_deref(), Some("a"));
    }

    #[test]
    fn test_empty_restrictions_deny_everything() {
        let resolver = CascadingResolver::new(&view_table(true), vec![RuleFragment::global(true, "allow all")])
            .with_restrictions(Some(Vec::new()));

        for decision in resolver.resolve_all(&tables()) {
            assert!(!decision.allowed);
            assert!(decision.restricted);
            assert_eq!(decision.source.as_deref(), Some(RESTRICTION_SOURCE));
        }
    }

    #[test]
    fn test_restrictions_intersect() {
        let resolver = CascadingResolver::new(&view_table(false), vec![RuleFragment::parent("db1", true, "allow db1")])
            .with_restrictions(Some(vec![RuleFragment::child("db1", "t1", true, "restriction")]));

        let decisions = resolver.resolve_all(&tables());
        assert!(decisions[0].allowed);
        assert_eq!(decisions[0].reason.as_deref(), Some("allow db1"));
        assert!(!decisions[1].allowed);
        assert!(decisions[1].restricted);
        assert!(!decisions[2].allowed);
        assert!(!decisions[2].restricted);
    }

    #[test]
    fn test_restrictions_never_widen() {
        let resolver = CascadingResolver::new(&view_table(false), vec![RuleFragment::child("db1", "t1", false, "deny t1")])
            .with_restrictions(Some(vec![RuleFragment::global(true, "restriction allows all")]));

        let decisions = resolver.resolve_all(&tables());
        assert!(!decisions[0].allowed);
        assert!(!decisions[0].restricted);
        // Falls through to the action default, which denies
        assert!(!decisions[1].allowed);
        assert!(decisions[1].used_default);
    }

    #[test]
    fn test_absent_restrictions_do_not_gate() {
        let resolver = CascadingResolver::new(&view_table(true), Vec::new()).with_restrictions(None);
        assert!(resolver.decide(&Resource::table("db1", "t1")).allowed);
    }

    #[test]
    fn test_root_bypass() {
        let resolver = CascadingResolver::new(&view_table(false), vec![RuleFragment::global(true, "noise")])
            .with_restrictions(Some(Vec::new()))
            .with_root(true);

        let decision = resolver.decide(&Resource::table("db1", "t1"));
        assert!(decision.allowed);
        assert_eq!(decision.level, DecisionLevel::Root);
        assert!(!decision.used_default);
    }

    #[test]
    fn test_root_stopped_by_explicit_deny_at_any_level() {
        let resolver = CascadingResolver::new(
            &view_table(true),
            vec![
                RuleFragment::global(false, "global deny"),
                RuleFragment::child("db1", "t1", true, "child allow"),
            ],
        )
        .with_root(true);

        // The global deny applies even though a child allow would win the cascade
        let decision = resolver.decide(&Resource::table("db1", "t1"));
        assert!(!decision.allowed);
        assert_eq!(decision.level, DecisionLevel::Global);
        assert_eq!(decision.reason.as_deref(), Some("global deny"));
    }

    #[test]
    fn test_fragment_index_len() {
        let index = FragmentIndex::new(vec![
            RuleFragment::global(true, "a"),
            RuleFragment::parent("db1", true, "b"),
            RuleFragment::child("db1", "t1", false, "c"),
        ]);
        assert_eq!(index.len(), 3);
        assert!(!index.is_empty());
        assert!(FragmentIndex::default().is_empty());
    }
}
