//! Grants implied by other grants.

use std::collections::HashMap;

use lazy_static::lazy_static;

lazy_static! {
    /// Implied action to the actions that imply it when granted instance-wide
    /// or per database.
    static ref IMPLIED_GRANTS: HashMap<&'static str, &'static [&'static str]> = {
        let mut m = HashMap::new();
        m.insert("view-instance", &["view-database", "view-table"][..]);
        m
    };
}

/// The canonical action names that imply `action`, if any.
pub fn implied_by(action: &str) -> &'static [&'static str] {
    IMPLIED_GRANTS.get(action).copied().unwrap_or(&[])
}
