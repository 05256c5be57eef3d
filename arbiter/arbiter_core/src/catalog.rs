//! Resource catalog.
//!
//! The catalog enumerates every resource of a given type that currently
//! exists. Catalog contents are rebuilt elsewhere and swapped in whole; a
//! reader always sees one complete snapshot.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::resource::{Resource, ResourceType};

/// Source of resource enumerations.
pub trait CatalogSource: Send + Sync {
    /// All resources of `kind`, ordered by `(parent, child)`.
    ///
    /// Implementations must return a consistent view: never a mixture of
    /// two catalog generations.
    fn resources_of(&self, kind: ResourceType) -> Vec<Resource>;
}

/// An immutable view of every known database, table and query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    databases: BTreeSet<String>,
    tables: BTreeSet<(String, String)>,
    queries: BTreeSet<(String, String)>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.databases.insert(database.into());
        self
    }

    /// Add a table, registering its database as well.
    pub fn with_table(mut self, database: impl Into<String>, table: impl Into<String>) -> Self {
        let database = database.into();
        self.databases.insert(database.clone());
        self.tables.insert((database, table.into()));
        self
    }

    /// Add a named query, registering its database as well.
    pub fn with_query(mut self, database: impl Into<String>, query: impl Into<String>) -> Self {
        let database = database.into();
        self.databases.insert(database.clone());
        self.queries.insert((database, query.into()));
        self
    }

    /// Total number of resources across all types, excluding the instance.
    pub fn len(&self) -> usize {
        self.databases.len() + self.tables.len() + self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CatalogSource for CatalogSnapshot {
    fn resources_of(&self, kind: ResourceType) -> Vec<Resource> {
        match kind {
            ResourceType::Instance => vec![Resource::instance()],
            ResourceType::Database => self.databases.iter().map(Resource::database).collect(),
            ResourceType::Table => self
                .tables
                .iter()
                .map(|(db, table)| Resource::table(db.clone(), table.clone()))
                .collect(),
            ResourceType::Query => self
                .queries
                .iter()
                .map(|(db, query)| Resource::query(db.clone(), query.clone()))
                .collect(),
        }
    }
}

/// A catalog whose snapshot can be replaced atomically at runtime.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    current: Arc<RwLock<Arc<CatalogSnapshot>>>,
}

impl InMemoryCatalog {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    /// The current snapshot. Holding it does not block replacement.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.current.read().clone()
    }

    /// Swap in a new snapshot.
    pub fn replace(&self, snapshot: CatalogSnapshot) {
        let size = snapshot.len();
        *self.current.write() = Arc::new(snapshot);
        info!(resources = size, "catalog snapshot replaced");
    }
}

impl CatalogSource for InMemoryCatalog {
    fn resources_of(&self, kind: ResourceType) -> Vec<Resource> {
        self.snapshot().resources_of(kind)
    }
}
