//! Actors and restriction scopes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Key under which a serialized actor carries its restriction scope.
pub const RESTRICTIONS_KEY: &str = "_r";

/// Source attributed to fragments and decisions derived from a restriction
/// scope.
pub const RESTRICTION_SOURCE: &str = "actor_restrictions";

/// An optional ceiling on what an actor may do.
///
/// The three lists are independent and union together: an action is within
/// the ceiling for a resource if it appears in `all`, in the list for the
/// resource's database, or in the list for the exact child resource.
/// Entries may be full action names or their abbreviations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionScope {
    /// Actions allowed on any resource.
    #[serde(rename = "a", default)]
    pub all: Vec<String>,

    /// Actions allowed per database.
    #[serde(rename = "d", default)]
    pub databases: BTreeMap<String, Vec<String>>,

    /// Actions allowed per child resource, keyed by database then child.
    #[serde(rename = "r", default)]
    pub resources: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl RestrictionScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `action` on every resource.
    pub fn allow_all(mut self, action: impl Into<String>) -> Self {
        self.all.push(action.into());
        self
    }

    /// Allow `action` on `database` and everything inside it.
    pub fn allow_database(mut self, database: impl Into<String>, action: impl Into<String>) -> Self {
        self.databases
            .entry(database.into())
            .or_default()
            .push(action.into());
        self
    }

    /// Allow `action` on a single child resource.
    pub fn allow_resource(
        mut self,
        database: impl Into<String>,
        child: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        self.resources
            .entry(database.into())
            .or_default()
            .entry(child.into())
            .or_default()
            .push(action.into());
        self
    }
}

/// The identity on whose behalf an action is evaluated.
///
/// The engine treats the attribute map as opaque apart from allow-block
/// matching. Root status is granted explicitly by the host and is never
/// derived from the attributes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Actor {
    attributes: Map<String, Value>,
    restrictions: Option<RestrictionScope>,
    root: bool,
    anonymous: bool,
}

impl Actor {
    /// The unauthenticated actor: no attributes, no restrictions.
    pub fn anonymous() -> Self {
        Self {
            anonymous: true,
            ..Self::default()
        }
    }

    /// An actor identified by `id`.
    pub fn new(id: impl Into<String>) -> Self {
        let mut attributes = Map::new();
        attributes.insert("id".to_string(), Value::String(id.into()));
        Self {
            attributes,
            restrictions: None,
            root: false,
            anonymous: false,
        }
    }

    /// A root actor identified by `id`.
    pub fn root(id: impl Into<String>) -> Self {
        Self::new(id).with_root(true)
    }

    /// Parse an actor from its JSON representation.
    ///
    /// `null` yields the anonymous actor. An object's `_r` key, if present,
    /// becomes the restriction scope and is removed from the attributes.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let mut attributes = match value {
            Value::Null => return Ok(Self::anonymous()),
            Value::Object(map) => map,
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "actor must be an object, got {}",
                    other
                )))
            }
        };

        let restrictions = match attributes.remove(RESTRICTIONS_KEY) {
            Some(Value::Null) | None => None,
            Some(raw) => Some(serde_json::from_value::<RestrictionScope>(raw)?),
        };

        Ok(Self {
            attributes,
            restrictions,
            root: false,
            anonymous: false,
        })
    }

    /// Add an attribute. An actor with attributes is no longer anonymous.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.anonymous = false;
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_restrictions(mut self, restrictions: RestrictionScope) -> Self {
        self.restrictions = Some(restrictions);
        self
    }

    pub fn with_root(mut self, root: bool) -> Self {
        self.root = root;
        self
    }

    /// The actor's `id` attribute, if it is a string.
    pub fn id(&self) -> Option<&str> {
        self.attributes.get("id").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Whether this is the unauthenticated actor. Only [`Actor::anonymous`]
    /// and a `null` actor value are; an authenticated actor with no
    /// attributes is not.
    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    pub fn restrictions(&self) -> Option<&RestrictionScope> {
        self.restrictions.as_ref()
    }
}
