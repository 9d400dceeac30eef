//! Error type shared by the storage backends, the shortener service and the
//! deletion pipeline.

use serde_json::{Value, json};
use std::fmt;

/// Uniqueness constraints a write can violate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueKey {
    ShortUrl,
    OriginalUrl,
    CorrelationId,
}

impl UniqueKey {
    /// Maps a PostgreSQL constraint/index name to the violated key.
    pub fn from_constraint(name: &str) -> Option<Self> {
        match name {
            "shortened_urls_short_url_key" => Some(Self::ShortUrl),
            "shortened_urls_original_url_key" => Some(Self::OriginalUrl),
            "shortened_urls_correlation_id_key" => Some(Self::CorrelationId),
            _ => None,
        }
    }
}

impl fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ShortUrl => "short_url",
            Self::OriginalUrl => "original_url",
            Self::CorrelationId => "correlation_id",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Validation { message: String, details: Value },

    #[error("{message}")]
    NotFound { message: String, details: Value },

    #[error("{message}")]
    Conflict { message: String, details: Value },

    #[error("unique violation on {0}")]
    UniqueViolation(UniqueKey),

    #[error("{message}")]
    Timeout { message: String },

    #[error("{message}")]
    Unavailable { message: String },

    #[error("{message}")]
    Unsupported { message: String },

    #[error("{message}")]
    KeyGeneration { message: String },

    #[error("{message}")]
    Internal { message: String, details: Value },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }
    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }
    pub fn conflict(message: impl Into<String>, details: Value) -> Self {
        Self::Conflict {
            message: message.into(),
            details,
        }
    }
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }
    pub fn key_generation(message: impl Into<String>) -> Self {
        Self::KeyGeneration {
            message: message.into(),
        }
    }
    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    /// Returns true if this is a uniqueness conflict on `key`.
    pub fn is_unique_violation_on(&self, key: UniqueKey) -> bool {
        matches!(self, Self::UniqueViolation(k) if *k == key)
    }

    /// HTTP status code the handler layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } | Self::UniqueViolation(_) => 409,
            Self::Timeout { .. } => 504,
            Self::Unavailable { .. } => 503,
            Self::Unsupported { .. } => 501,
            Self::KeyGeneration { .. } | Self::Internal { .. } => 500,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db) = e.as_database_error()
            && db.is_unique_violation()
        {
            if let Some(key) = db.constraint().and_then(UniqueKey::from_constraint) {
                return Self::UniqueViolation(key);
            }
            return Self::conflict(
                "Unique constraint violation",
                json!({ "constraint": db.constraint() }),
            );
        }

        match e {
            sqlx::Error::PoolTimedOut => Self::timeout("Timed out acquiring a database connection"),
            other => {
                tracing::debug!(error = %other, "database error");
                Self::internal("Database error", json!({ "reason": other.to_string() }))
            }
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        Self::internal("Storage I/O error", json!({ "reason": e.to_string() }))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        Self::internal("Corrupted storage record", json!({ "reason": e.to_string() }))
    }
}
