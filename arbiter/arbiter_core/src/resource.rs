//! Resources and resource types.
//!
//! Resources form a two-level hierarchy below a singleton instance:
//! databases are keyed by `(parent, None)` and tables or queries by
//! `(parent, child)`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of resource an action applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// The singleton instance. Has neither parent nor child.
    Instance,

    /// A database, keyed by its name.
    Database,

    /// A table or view inside a database.
    Table,

    /// A named query inside a database.
    Query,
}

impl ResourceType {
    /// Number of key components a resource of this type carries.
    pub fn depth(&self) -> u8 {
        match self {
            Self::Instance => 0,
            Self::Database => 1,
            Self::Table | Self::Query => 2,
        }
    }

    /// Lowercase name, as used in configuration and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Instance => "instance",
            Self::Database => "database",
            Self::Table => "table",
            Self::Query => "query",
        }
    }

    /// Whether resources of this type can stand as ancestors of (or equal to)
    /// resources of `other`.
    pub fn is_ancestor_of(&self, other: ResourceType) -> bool {
        *self == other || self.depth() < other.depth()
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "instance" => Ok(Self::Instance),
            "database" => Ok(Self::Database),
            "table" => Ok(Self::Table),
            "query" => Ok(Self::Query),
            _ => Err(format!("Invalid resource type: {}", s)),
        }
    }
}

/// A concrete, addressable resource.
///
/// Ordering is lexicographic by `(parent, child)` with absent components
/// sorting first; this is the order enumeration results are returned in.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Resource {
    parent: Option<String>,
    child: Option<String>,
    kind: ResourceType,
}

impl Resource {
    /// The instance resource.
    pub fn instance() -> Self {
        Self {
            parent: None,
            child: None,
            kind: ResourceType::Instance,
        }
    }

    /// A database resource.
    pub fn database(name: impl Into<String>) -> Self {
        Self {
            parent: Some(name.into()),
            child: None,
            kind: ResourceType::Database,
        }
    }

    /// A table resource inside `database`.
    pub fn table(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            parent: Some(database.into()),
            child: Some(table.into()),
            kind: ResourceType::Table,
        }
    }

    /// A named query resource inside `database`.
    pub fn query(database: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            parent: Some(database.into()),
            child: Some(query.into()),
            kind: ResourceType::Query,
        }
    }

    /// Build a resource of `kind` from raw key components.
    ///
    /// Returns `None` when the components do not fit the type, e.g. a table
    /// without a child name.
    pub fn from_parts(kind: ResourceType, parent: Option<String>, child: Option<String>) -> Option<Self> {
        match (kind, parent, child) {
            (ResourceType::Instance, None, None) => Some(Self::instance()),
            (ResourceType::Database, Some(parent), None) => Some(Self::database(parent)),
            (ResourceType::Table, Some(parent), Some(child)) => Some(Self::table(parent, child)),
            (ResourceType::Query, Some(parent), Some(child)) => Some(Self::query(parent, child)),
            _ => None,
        }
    }

    pub fn kind(&self) -> ResourceType {
        self.kind
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn child(&self) -> Option<&str> {
        self.child.as_deref()
    }

    /// The ancestor of this resource (or the resource itself) of type `kind`.
    ///
    /// Returns `None` if `kind` is not the same type or a coarser one.
    pub fn ancestor(&self, kind: ResourceType) -> Option<Resource> {
        if kind == self.kind {
            return Some(self.clone());
        }
        match kind {
            ResourceType::Instance => Some(Self::instance()),
            ResourceType::Database if self.kind.depth() > 1 => {
                self.parent.as_ref().map(|p| Self::database(p.clone()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.parent, &self.child) {
            (None, _) => write!(f, "/"),
            (Some(parent), None) => write!(f, "/{}", parent),
            (Some(parent), Some(child)) => write!(f, "/{}/{}", parent, child),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_ordering() {
        let mut resources = vec![
            Resource::table("db2", "a"),
            Resource::table("db1", "t2"),
            Resource::table("db1", "t1"),
        ];
        resources.sort();

        assert_eq!(resources[0], Resource::table("db1", "t1"));
        assert_eq!(resources[1], Resource::table("db1", "t2"));
        assert_eq!(resources[2], Resource::table("db2", "a"));

        // Absent components sort first
        assert!(Resource::instance() < Resource::database("a"));
    }

    #[test]
    fn test_ancestor() {
        let table = Resource::table("db1", "t1");
        assert_eq!(table.ancestor(ResourceType::Database), Some(Resource::database("db1")));
        assert_eq!(table.ancestor(ResourceType::Instance), Some(Resource::instance()));
        assert_eq!(table.ancestor(ResourceType::Table), Some(table.clone()));
        assert_eq!(table.ancestor(ResourceType::Query), None);

        let db = Resource::database("db1");
        assert_eq!(db.ancestor(ResourceType::Table), None);
    }

    #[test]
    fn test_from_parts() {
        assert_eq!(
            Resource::from_parts(ResourceType::Query, Some("db".into()), Some("q".into())),
            Some(Resource::query("db", "q"))
        );
        assert!(Resource::from_parts(ResourceType::Table, Some("db".into()), None).is_none());
        assert!(Resource::from_parts(ResourceType::Instance, Some("db".into()), None).is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(Resource::instance().to_string(), "/");
        assert_eq!(Resource::database("db1").to_string(), "/db1");
        assert_eq!(Resource::table("db1", "t1").to_string(), "/db1/t1");
        assert_eq!("QUERY".parse::<ResourceType>(), Ok(ResourceType::Query));
    }
}
