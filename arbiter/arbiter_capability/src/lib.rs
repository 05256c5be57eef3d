//! # Arbiter Capability
//!
//! `arbiter_capability` translates an actor's restriction scope into rule
//! fragments. The fragments only ever narrow what the providers allow: the
//! resolver ANDs them with the provider decision.
//!
//! Key concepts:
//!
//! 1. **Restriction Scope**: An optional allowlist carried on the actor,
//!    with instance-wide, per-database and per-resource entries.
//!
//! 2. **Normalization**: Entries may be abbreviations (`vt` for
//!    `view-table`); they are resolved through the action registry before
//!    matching.
//!
//! 3. **Implied Grants**: Some grants imply others for restricted actors,
//!    independent of an action's own requirements.

pub mod implied;
pub mod translator;

// Re-export key types for convenience
pub use implied::implied_by;
pub use translator::RestrictionTranslator;
