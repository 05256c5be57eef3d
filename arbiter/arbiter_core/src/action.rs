//! Actions and the action registry.
//!
//! An action names something an actor may try to do, the type of resource
//! it applies to, its default verdict, and the other actions that must also
//! be allowed for it to succeed.

use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ActionError, Error};
use crate::resource::ResourceType;
use crate::settings::EngineSettings;
use crate::Result;

/// A registered action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Unique name, e.g. `view-table`.
    pub name: String,

    /// Optional abbreviation accepted in restriction scopes, e.g. `vt`.
    pub abbr: Option<String>,

    /// Human-readable description.
    pub description: Option<String>,

    /// Type of resource this action applies to.
    pub resource_type: ResourceType,

    /// Verdict when no rule fragment applies.
    pub default_allow: bool,

    /// Actions that must independently be allowed on the corresponding
    /// ancestor resource.
    pub also_requires: Vec<String>,
}

impl Action {
    pub fn new(name: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            name: name.into(),
            abbr: None,
            description: None,
            resource_type,
            default_allow: false,
            also_requires: Vec::new(),
        }
    }

    pub fn with_abbr(mut self, abbr: impl Into<String>) -> Self {
        self.abbr = Some(abbr.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default_allow(mut self, default_allow: bool) -> Self {
        self.default_allow = default_allow;
        self
    }

    pub fn also_requires(mut self, action: impl Into<String>) -> Self {
        self.also_requires.push(action.into());
        self
    }
}

/// Static description of a built-in action.
struct BuiltinAction {
    name: &'static str,
    abbr: &'static str,
    description: &'static str,
    resource_type: ResourceType,
    default_allow: bool,
    also_requires: Option<&'static str>,
}

lazy_static! {
    /// Built-in actions, in registration order. Requirements only refer to
    /// earlier entries.
    static ref BUILTIN_ACTIONS: Vec<BuiltinAction> = vec![
        BuiltinAction { name: "view-instance", abbr: "vi", description: "View the instance", resource_type: ResourceType::Instance, default_allow: true, also_requires: None },
        BuiltinAction { name: "permissions-debug", abbr: "pd", description: "Access the permission debug tool", resource_type: ResourceType::Instance, default_allow: false, also_requires: None },
        BuiltinAction { name: "debug-menu", abbr: "dm", description: "View debug menu items", resource_type: ResourceType::Instance, default_allow: false, also_requires: None },
        BuiltinAction { name: "view-database", abbr: "vd", description: "View database", resource_type: ResourceType::Database, default_allow: true, also_requires: None },
        BuiltinAction { name: "view-database-download", abbr: "vdd", description: "Download database file", resource_type: ResourceType::Database, default_allow: true, also_requires: Some("view-database") },
        BuiltinAction { name: "execute-sql", abbr: "es", description: "Execute read-only SQL queries", resource_type: ResourceType::Database, default_allow: true, also_requires: Some("view-database") },
        BuiltinAction { name: "create-table", abbr: "ct", description: "Create tables", resource_type: ResourceType::Database, default_allow: false, also_requires: None },
        BuiltinAction { name: "view-table", abbr: "vt", description: "View table", resource_type: ResourceType::Table, default_allow: true, also_requires: None },
        BuiltinAction { name: "insert-row", abbr: "ir", description: "Insert rows", resource_type: ResourceType::Table, default_allow: false, also_requires: None },
        BuiltinAction { name: "delete-row", abbr: "dr", description: "Delete rows", resource_type: ResourceType::Table, default_allow: false, also_requires: None },
        BuiltinAction { name: "update-row", abbr: "ur", description: "Update rows", resource_type: ResourceType::Table, default_allow: false, also_requires: None },
        BuiltinAction { name: "alter-table", abbr: "at", description: "Alter tables", resource_type: ResourceType::Table, default_allow: false, also_requires: None },
        BuiltinAction { name: "drop-table", abbr: "dt", description: "Drop tables", resource_type: ResourceType::Table, default_allow: false, also_requires: None },
        BuiltinAction { name: "view-query", abbr: "vq", description: "View named query results", resource_type: ResourceType::Query, default_allow: true, also_requires: None },
    ];
}

impl BuiltinAction {
    fn to_action(&self, settings: &EngineSettings) -> Action {
        let mut default_allow = self.default_allow && !settings.default_deny;
        if self.name == "execute-sql" {
            default_allow = default_allow && settings.default_allow_sql;
        }

        let mut action = Action::new(self.name, self.resource_type)
            .with_abbr(self.abbr)
            .with_description(self.description)
            .with_default_allow(default_allow);
        if let Some(required) = self.also_requires {
            action = action.also_requires(required);
        }
        action
    }
}

/// Registry of known actions.
///
/// Registration happens at startup or when an extension loads; lookups
/// happen on every permission check and never block each other.
#[derive(Default)]
pub struct ActionRegistry {
    /// Actions by name.
    actions: DashMap<String, Arc<Action>>,

    /// Canonical action name by name or abbreviation.
    aliases: DashMap<String, String>,

    /// Held for the whole of a registration, so that validating a name and
    /// inserting it happen as one step.
    registration: Mutex<()>,
}

impl ActionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in actions, with defaults
    /// adjusted by `settings`.
    pub fn with_builtin_actions(settings: &EngineSettings) -> Result<Self> {
        let registry = Self::new();
        for builtin in BUILTIN_ACTIONS.iter() {
            registry.register(builtin.to_action(settings))?;
        }
        Ok(registry)
    }

    /// Register an action.
    ///
    /// # Arguments
    ///
    /// * `action` - The action to register.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the action was registered.
    /// * `Err` - If the name or abbreviation is taken, or a requirement is
    ///   unknown, the action itself, or of a finer resource type.
    pub fn register(&self, action: Action) -> Result<()> {
        let _guard = self.registration.lock();
        if self.aliases.contains_key(&action.name) {
            return Err(ActionError::AlreadyRegistered(action.name).into());
        }
        if let Some(abbr) = &action.abbr {
            if let Some(existing) = self.aliases.get(abbr) {
                return Err(ActionError::AbbreviationInUse {
                    abbr: abbr.clone(),
                    existing: existing.value().clone(),
                }
                .into());
            }
            if abbr == &action.name {
                return Err(ActionError::AbbreviationInUse {
                    abbr: abbr.clone(),
                    existing: action.name.clone(),
                }
                .into());
            }
        }

        for required in &action.also_requires {
            if required == &action.name {
                return Err(ActionError::SelfRequirement(action.name.clone()).into());
            }
            let required_action = self.actions.get(required).ok_or_else(|| {
                ActionError::UnknownRequirement {
                    action: action.name.clone(),
                    required: required.clone(),
                }
            })?;
            if !required_action.resource_type.is_ancestor_of(action.resource_type) {
                return Err(ActionError::IncompatibleRequirement {
                    action: action.name.clone(),
                    action_type: action.resource_type,
                    required: required.clone(),
                    required_type: required_action.resource_type,
                }
                .into());
            }
        }

        info!(action = %action.name, resource_type = %action.resource_type, "registered action");

        self.aliases.insert(action.name.clone(), action.name.clone());
        if let Some(abbr) = &action.abbr {
            self.aliases.insert(abbr.clone(), action.name.clone());
        }
        self.actions.insert(action.name.clone(), Arc::new(action));
        Ok(())
    }

    /// Look up an action by its full name.
    pub fn lookup(&self, name: &str) -> Result<Arc<Action>> {
        self.actions
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::UnknownAction(name.to_string()))
    }

    /// Normalize a name or abbreviation to the canonical action name.
    pub fn canonical_name(&self, name_or_abbr: &str) -> Option<String> {
        self.aliases
            .get(name_or_abbr)
            .map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// All registered actions, sorted by name.
    pub fn list(&self) -> Vec<Arc<Action>> {
        let mut actions: Vec<Arc<Action>> = self
            .actions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        actions.sort_by(|a, b| a.name.cmp(&b.name));
        actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
