//! Permission configuration tree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use arbiter_core::ConfigError;

/// The permission-bearing subset of the host configuration.
///
/// Allow blocks are kept as raw JSON values: `true`, `false`, or an object
/// matched against the actor's attributes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionConfig {
    /// Instance-wide allow blocks, keyed by action name.
    pub permissions: BTreeMap<String, Value>,

    /// Instance-wide allow block for the view actions.
    pub allow: Option<Value>,

    /// Instance-wide allow block for `execute-sql`.
    pub allow_sql: Option<Value>,

    /// Per-database configuration.
    pub databases: BTreeMap<String, DatabaseConfig>,
}

/// Configuration for one database.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub permissions: BTreeMap<String, Value>,
    pub allow: Option<Value>,
    pub allow_sql: Option<Value>,
    pub tables: BTreeMap<String, ChildConfig>,
    pub queries: BTreeMap<String, QueryConfig>,
}

/// Configuration for one table or query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildConfig {
    pub permissions: BTreeMap<String, Value>,
    pub allow: Option<Value>,
}

/// A named query is either bare SQL text or a detailed block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryConfig {
    Sql(String),
    Detailed(ChildConfig),
}

impl QueryConfig {
    /// Permission-bearing part of the query, if any.
    pub fn rules(&self) -> Option<&ChildConfig> {
        match self {
            Self::Sql(_) => None,
            Self::Detailed(config) => Some(config),
        }
    }
}

impl PermissionConfig {
    /// Build the tree from an already-parsed JSON document.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_full_tree() {
        let config = PermissionConfig::from_value(json!({
            "permissions": {"view-instance": {"id": "admin"}},
            "allow_sql": false,
            "databases": {
                "db1": {
                    "allow": {"id": ["alice", "bob"]},
                    "tables": {
                        "t1": {"permissions": {"insert-row": true}}
                    },
                    "queries": {
                        "plain": "select 1",
                        "guarded": {"sql": "select 2", "allow": {"id": "*"}}
                    }
                }
            }
        }))
        .unwrap();

        assert_eq!(config.permissions["view-instance"], json!({"id": "admin"}));
        assert_eq!(config.allow_sql, Some(json!(false)));
        assert!(config.allow.is_none());

        let db = &config.databases["db1"];
        assert_eq!(db.tables["t1"].permissions["insert-row"], json!(true));
        assert!(db.queries["plain"].rules().is_none());
        assert_eq!(
            db.queries["guarded"].rules().and_then(|q| q.allow.clone()),
            Some(json!({"id": "*"}))
        );
    }

    #[test]
    fn test_empty_tree() {
        let config = PermissionConfig::from_value(json!({})).unwrap();
        assert_eq!(config, PermissionConfig::default());
    }

    #[test]
    fn test_malformed_tree() {
        assert!(PermissionConfig::from_value(json!({"databases": ["db1"]})).is_err());
    }
}
