//! Shortened URL entity representing a key → original URL mapping.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of the caller that owns shortened URLs.
pub type UserId = Uuid;

/// A short key mapped to an original URL.
///
/// Everything except `is_deleted` is immutable once written. `is_deleted`
/// only ever moves from `false` to `true`.
///
/// Serialized as one JSON object per line by the file backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShortenedUrl {
    pub uuid: Uuid,
    pub short_url: String,
    pub original_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl ShortenedUrl {
    /// Creates a new, not deleted record.
    pub fn new(uuid: Uuid, short_url: String, original_url: String) -> Self {
        Self {
            uuid,
            short_url,
            original_url,
            correlation_id: None,
            is_deleted: false,
        }
    }

    /// Builds a batch-create input item. Identity and key are assigned by the
    /// service.
    pub fn for_batch(original_url: impl Into<String>, correlation_id: Option<String>) -> Self {
        Self {
            uuid: Uuid::nil(),
            short_url: String::new(),
            original_url: original_url.into(),
            correlation_id,
            is_deleted: false,
        }
    }
}

/// Ownership link between a user and a shortened URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserUrl {
    pub uuid: Uuid,
    pub user_id: UserId,
    pub shortened_url_uuid: Uuid,
}

impl UserUrl {
    /// Creates a link with a fresh identity.
    pub fn new(user_id: UserId, shortened_url_uuid: Uuid) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            user_id,
            shortened_url_uuid,
        }
    }
}
