//! # Shop Error Types Module
//!
//! Structured errors for the storage and lookup collaborators. Handler code
//! works in `anyhow::Result` and only matches on these where a variant changes
//! what the user sees (a missing product, a malformed button payload).

use thiserror::Error;

/// Errors raised by catalog lookups, the order ledger and payload decoding
#[derive(Debug, Error)]
pub enum ShopError {
    /// A catalog entity referenced by the conversation no longer exists
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A callback or invoice payload that does not decode
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Database error (connection, query, etc.)
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Ledger file I/O error
    #[error("ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ledger row (de)serialization error
    #[error("ledger encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl ShopError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ShopError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether the error means the referenced item is gone rather than broken
    pub fn is_not_found(&self) -> bool {
        matches!(self, ShopError::NotFound { .. })
    }
}

/// Result type for storage and lookup operations
pub type Result<T> = std::result::Result<T, ShopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_formatting() {
        let err = ShopError::not_found("Product", 42);
        assert_eq!(err.to_string(), "Product not found: 42");
        assert!(err.is_not_found());

        let err = ShopError::MalformedPayload("buy_x".to_string());
        assert_eq!(err.to_string(), "malformed payload: buy_x");
        assert!(!err.is_not_found());
    }
}
