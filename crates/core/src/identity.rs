//! Event identity types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{Error, Result};

/// Kind of tracked event an identity describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCategory {
    PageView,
    Click,
}

impl EventCategory {
    /// Returns the string representation used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageView => "PAGE_VIEW",
            Self::Click => "CLICK",
        }
    }

    /// Prefix used when building identity keys.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Self::PageView => "page_view",
            Self::Click => "click",
        }
    }

    /// Parses the storage representation.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "PAGE_VIEW" => Ok(Self::PageView),
            "CLICK" => Ok(Self::Click),
            other => Err(Error::validation(format!("unknown event category: {}", other))),
        }
    }

    /// Builds the semantic key for a label, e.g. `page_view:/pricing`.
    pub fn key_for(&self, label: &str) -> String {
        format!("{}:{}", self.key_prefix(), label)
    }
}

/// A deduplicated descriptor shared by all occurrences of the same kind of event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EventIdentity {
    pub id: String,
    /// Unique semantic label
    #[validate(length(min = 1, max = 2048))]
    pub key: String,
    pub category: EventCategory,
    pub created_at: DateTime<Utc>,
}

impl EventIdentity {
    /// Creates a new identity.
    ///
    /// The id is derived from the key, so concurrent creators of the same key
    /// converge on one row.
    pub fn new(key: impl Into<String>, category: EventCategory) -> Result<Self> {
        let key = key.into();
        let identity = Self {
            id: Self::stable_id(&key),
            key,
            category,
            created_at: Utc::now(),
        };
        identity
            .validate()
            .map_err(|e| Error::validation(format!("invalid event identity: {}", e)))?;
        Ok(identity)
    }

    /// Deterministic id for a key.
    pub fn stable_id(key: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
    }

    pub fn to_ref(&self) -> IdentityRef {
        IdentityRef {
            id: self.id.clone(),
            key: self.key.clone(),
        }
    }
}

/// The `{id, key}` projection returned alongside query results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityRef {
    pub id: String,
    pub key: String,
}
