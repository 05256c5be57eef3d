//! # Arbiter Query
//!
//! `arbiter_query` is the surface hosts call: a point check, a paginated
//! enumeration of allowed resources, and a diagnostic explanation of a
//! single check.
//!
//! Key concepts:
//!
//! 1. **Permission Engine**: Ties the action registry, rule providers,
//!    restriction translation and the resource catalog together. Every call
//!    gathers fragments once and resolves them in memory.
//!
//! 2. **Keyset Pagination**: Enumeration pages are addressed by an opaque
//!    token encoding the last `(parent, child)` returned.
//!
//! 3. **Check Log**: A bounded buffer of recent checks, for diagnostics only.

pub mod audit;
pub mod engine;
pub mod logging;
pub mod page;

// Re-export key types for convenience
pub use audit::{CheckLog, CheckRecord};
pub use engine::{PermissionEngine, PermissionEngineBuilder, Visibility};
pub use logging::init_logging;
pub use page::{Page, PageItem, PageToken, ResourceQuery};
