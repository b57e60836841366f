//! # Cache Error Types
//!
//! Errors shared by the recency heap and the persistent object cache.

use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    // ========================================================================
    // Recency Heap Errors
    // ========================================================================
    /// Item is already tracked; remove it first or use `move_to_top`.
    #[error("Item already tracked: {0}")]
    DuplicateKey(String),

    /// Pop on a heap with no present entries.
    #[error("Recency heap is empty")]
    Empty,

    // ========================================================================
    // Lookup Errors
    // ========================================================================
    /// Key or item is not present in any tier.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Key cannot be mapped to an on-disk name.
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// Value could not be serialized for the disk tier.
    #[error("Failed to encode value: {0}")]
    Encode(String),

    /// Stored payload could not be deserialized.
    #[error("Failed to decode value: {0}")]
    Decode(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// I/O error while writing or pruning the disk tier.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Returns `true` if this error only signals an absent entry.
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
