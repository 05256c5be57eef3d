//! Enumeration requests, pages and page tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

use arbiter_core::{Error, Resource, Result};

/// A request to enumerate the resources an actor may access.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuery {
    /// Action to enumerate for.
    pub action: String,

    /// Only resources inside this parent.
    pub parent: Option<String>,

    /// Only the child with this name. Requires `parent`.
    pub child: Option<String>,

    /// Requested page size; the engine default when absent.
    pub page_size: Option<usize>,

    /// Token from a previous page.
    pub page_token: Option<String>,

    /// Attach every reason at the winning level to each item.
    pub include_reasons: bool,

    /// Flag items the anonymous actor could not access.
    pub include_private: bool,
}

impl ResourceQuery {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_child(mut self, child: impl Into<String>) -> Self {
        self.child = Some(child.into());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }

    pub fn with_reasons(mut self) -> Self {
        self.include_reasons = true;
        self
    }

    pub fn with_private(mut self) -> Self {
        self.include_private = true;
        self
    }
}

/// One allowed resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageItem {
    pub parent: Option<String>,
    pub child: Option<String>,

    /// Whether the anonymous actor is denied this resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasons: Option<Vec<String>>,
}

/// One page of an enumeration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<PageItem>,

    /// Present when more items follow.
    pub next_page_token: Option<String>,

    /// Number of allowed resources across all pages.
    pub total: usize,
}

/// The position after which the next page starts.
///
/// Tokens carry no snapshot identity. If rules or the catalog change between
/// pages, the next page starts after the same key under the new state, so
/// items can be skipped or repeated across such a change.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageToken {
    pub parent: Option<String>,
    pub child: Option<String>,
}

impl PageToken {
    /// The token positioned just after `resource`.
    pub fn after(resource: &Resource) -> Self {
        Self {
            parent: resource.parent().map(str::to_string),
            child: resource.child().map(str::to_string),
        }
    }

    pub fn encode(&self) -> String {
        let key = (&self.parent, &self.child);
        // Serializing a pair of optional strings cannot fail
        let json = serde_json::to_vec(&key).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self> {
        let invalid = || Error::InvalidArgument(format!("invalid page token: {}", token));
        let json = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
        let (parent, child): (Option<String>, Option<String>) =
            serde_json::from_slice(&json).map_err(|_| invalid())?;
        Ok(Self { parent, child })
    }

    /// Whether `resource` sorts strictly after this position.
    pub fn precedes(&self, resource: &Resource) -> bool {
        (resource.parent(), resource.child()) > (self.parent.as_deref(), self.child.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let token = PageToken::after(&Resource::table("db/1", "t 1"));
        let decoded = PageToken::decode(&token.encode()).unwrap();
        assert_eq!(decoded, token);
        assert!(!token.encode().contains('='));
    }

    #[test]
    fn test_invalid_tokens() {
        for token in ["not base64!", "", "bm90IGpzb24"] {
            assert!(matches!(PageToken::decode(token), Err(Error::InvalidArgument(_))));
        }
    }

    #[test]
    fn test_precedes() {
        let token = PageToken::after(&Resource::table("db1", "t2"));
        assert!(!token.precedes(&Resource::table("db1", "t1")));
        assert!(!token.precedes(&Resource::table("db1", "t2")));
        assert!(token.precedes(&Resource::table("db1", "t3")));
        assert!(token.precedes(&Resource::table("db2", "a")));

        let token = PageToken::after(&Resource::database("db1"));
        assert!(token.precedes(&Resource::database("db2")));
        assert!(!token.precedes(&Resource::database("db0")));
    }

    #[test]
    fn test_query_builder() {
        let query = ResourceQuery::new("view-table").with_parent("db1").with_page_size(10).with_reasons();
        assert_eq!(query.parent.as_deref(), Some("db1"));
        assert_eq!(query.page_size, Some(10));
        assert!(query.include_reasons);
        assert!(query.child.is_none());
    }
}
