//! The built-in configuration provider.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::info;

use arbiter_core::error::ProviderError;
use arbiter_core::{Action, Actor, RuleFragment, Scope};

use super::matcher::actor_matches_allow;
use super::model::{ChildConfig, PermissionConfig};
use crate::provider::RuleProvider;

/// Provider id used for configuration fragments.
pub const CONFIG_PROVIDER_ID: &str = "config";

/// Which `allow` / `allow_sql` blocks an action consults, per level.
struct AllowBlockUse {
    instance: bool,
    database: bool,
    child: bool,
    sql: bool,
}

fn allow_block_use(action: &str) -> Option<AllowBlockUse> {
    match action {
        "view-instance" => Some(AllowBlockUse { instance: true, database: false, child: false, sql: false }),
        "view-database" => Some(AllowBlockUse { instance: true, database: true, child: false, sql: false }),
        "view-table" | "view-query" => Some(AllowBlockUse { instance: true, database: true, child: true, sql: false }),
        "execute-sql" => Some(AllowBlockUse { instance: true, database: true, child: false, sql: true }),
        _ => None,
    }
}

/// Emits one fragment per configured block relevant to the action.
///
/// The tree can be replaced at runtime; each call reads one consistent
/// version of it.
pub struct ConfigRuleProvider {
    config: RwLock<Arc<PermissionConfig>>,
}

impl ConfigRuleProvider {
    pub fn new(config: PermissionConfig) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
        }
    }

    /// Swap in a new configuration tree.
    pub fn replace(&self, config: PermissionConfig) {
        *self.config.write() = Arc::new(config);
        info!("permission configuration replaced");
    }

    pub fn current(&self) -> Arc<PermissionConfig> {
        self.config.read().clone()
    }

    /// A provider fixed to the current tree. Later calls to
    /// [`ConfigRuleProvider::replace`] on `self` do not affect it.
    pub fn pinned(&self) -> ConfigRuleProvider {
        Self {
            config: RwLock::new(self.current()),
        }
    }

    /// Compute the fragments for `actor` performing `action` against the
    /// current tree.
    pub fn fragments_for(&self, actor: &Actor, action: &Action) -> Vec<RuleFragment> {
        let config = self.current();
        let mut collector = Collector::new(actor, &action.name);
        let blocks = allow_block_use(&action.name);

        collector.permissions(Scope::Global, &config.permissions, "");
        if let Some(blocks) = &blocks {
            let (root_block, label) = if blocks.sql {
                (&config.allow_sql, "allow_sql")
            } else {
                (&config.allow, "allow")
            };
            if blocks.instance {
                collector.block(Scope::Global, root_block.as_ref(), label, "");
            }
        }

        for (db_name, db) in &config.databases {
            let on_db = format!(" on {}", db_name);
            collector.permissions(Scope::Parent(db_name.clone()), &db.permissions, &on_db);
            if let Some(blocks) = &blocks {
                if blocks.database {
                    let (block, label) = if blocks.sql {
                        (&db.allow_sql, "allow_sql")
                    } else {
                        (&db.allow, "allow")
                    };
                    collector.block(Scope::Parent(db_name.clone()), block.as_ref(), label, &on_db);
                }
            }

            let queries: Vec<(&String, &ChildConfig)> = db
                .queries
                .iter()
                .filter_map(|(name, query)| query.rules().map(|rules| (name, rules)))
                .collect();

            for (name, child) in db.tables.iter().chain(queries.iter().copied()) {
                let on_child = format!(" on {}/{}", db_name, name);
                collector.permissions(Scope::Child(db_name.clone(), name.clone()), &child.permissions, &on_child);
            }

            // Child-level allow blocks: tables for view-table, queries for view-query
            if blocks.as_ref().is_some_and(|blocks| blocks.child) {
                let allow_children: Vec<(&String, &ChildConfig)> = if action.name == "view-query" {
                    queries
                } else {
                    db.tables.iter().collect()
                };
                for (name, child) in allow_children {
                    let on_child = format!(" on {}/{}", db_name, name);
                    collector.block(
                        Scope::Child(db_name.clone(), name.clone()),
                        child.allow.as_ref(),
                        "allow",
                        &on_child,
                    );
                }
            }
        }

        collector.finish()
    }
}

#[async_trait]
impl RuleProvider for ConfigRuleProvider {
    fn id(&self) -> &str {
        CONFIG_PROVIDER_ID
    }

    async fn rules(&self, actor: &Actor, action: &Action) -> Result<Vec<RuleFragment>, ProviderError> {
        Ok(self.fragments_for(actor, action))
    }
}

/// Accumulates fragments while walking the tree.
struct Collector<'a> {
    actor: &'a Actor,
    action: &'a str,
    fragments: Vec<RuleFragment>,
}

impl<'a> Collector<'a> {
    fn new(actor: &'a Actor, action: &'a str) -> Self {
        Self {
            actor,
            action,
            fragments: Vec::new(),
        }
    }

    /// Add the fragment for `permissions.<action>`, if configured.
    fn permissions(&mut self, scope: Scope, permissions: &BTreeMap<String, Value>, location: &str) {
        if let Some(block) = permissions.get(self.action) {
            let what = format!("permissions for {}", self.action);
            self.block(scope, Some(block), &what, location);
        }
    }

    /// Add the fragment for one allow block, if configured.
    fn block(&mut self, scope: Scope, block: Option<&Value>, what: &str, location: &str) {
        let Some(allowed) = block.and_then(|block| actor_matches_allow(self.actor, block)) else {
            return;
        };
        let verdict = if allowed { "allow" } else { "deny" };
        let reason = format!("config {} {}{}", verdict, what, location);
        self.fragments.push(RuleFragment::new(scope, allowed, reason).with_source(CONFIG_PROVIDER_ID));
    }

    fn finish(self) -> Vec<RuleFragment> {
        self.fragments
    }
}
