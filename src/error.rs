//! error
//!
//! Error types for cache operations.
//!
//! # Design
//!
//! Lookup misses (`BranchNotFound`, `CommitNotFound`, `IndexNotFound`) are
//! distinct variants from backend failures (`Store`) so callers can tell
//! "this does not exist" apart from "the store could not answer". Backend
//! failures always carry the name of the store operation that produced them.
//!
//! # Example
//!
//! ```
//! use revcache::error::CacheError;
//!
//! let err = CacheError::BranchNotFound("release-9".to_string());
//! assert!(err.to_string().contains("release-9"));
//! assert!(err.is_not_found());
//! ```

use thiserror::Error;

use crate::config::ConfigError;
use crate::secondary::SecondaryError;
use crate::store::StoreError;

/// Errors from cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The tracked or requested branch does not exist in the commit store.
    #[error("branch '{0}' not found in commit store")]
    BranchNotFound(String),

    /// No commit with this hash is known to the store.
    #[error("commit '{0}' not found")]
    CommitNotFound(String),

    /// No commit at this index is present in the cached window.
    #[error("no commit at index {0} in the cached window")]
    IndexNotFound(usize),

    /// A secondary-repository operation was invoked without one configured.
    #[error("no secondary repository configured")]
    NoSecondaryRepo,

    /// A commit store request failed.
    #[error("commit store {op} failed: {source}")]
    Store {
        /// The store operation that failed.
        op: String,
        /// The underlying store error.
        #[source]
        source: StoreError,
    },

    /// Invalid cache configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Secondary-repository resolution failed.
    #[error("secondary repository error: {0}")]
    Secondary(#[from] SecondaryError),

    /// Internal error (should not happen).
    #[error("internal cache error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Wrap a store failure with the operation that produced it.
    pub fn store(op: &str, source: StoreError) -> Self {
        CacheError::Store {
            op: op.to_string(),
            source,
        }
    }

    /// Check if this error means the requested entity does not exist.
    ///
    /// Retrying a not-found lookup without changing the request will not
    /// succeed.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CacheError::BranchNotFound(_)
                | CacheError::CommitNotFound(_)
                | CacheError::IndexNotFound(_)
        )
    }

    /// Check if this error indicates a transient backend failure that might
    /// succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, CacheError::Store { .. })
    }
}
