//! store
//!
//! Abstraction over the remote commit store.
//!
//! # Architecture
//!
//! The [`GitStore`] trait is the single seam between the cache and the
//! wide-column backend that persists commit history. The backend exposes only
//! index-range and time-range scans plus bulk point lookups. Notably, it has
//! no "is commit C contained in branch B" primitive, which is why containment
//! is resolved by fanning out range queries (see `cache::containment`).
//!
//! All methods are async because every call may cross the network. Dropping
//! the returned future cancels the request; implementations must not leave
//! work running after cancellation.
//!
//! # Modules
//!
//! - `mock`: In-memory implementation for deterministic testing
//!
//! # Example
//!
//! ```
//! use revcache::store::{GitStore, StoreError};
//!
//! async fn head_index(store: &dyn GitStore, branch: &str) -> Result<Option<usize>, StoreError> {
//!     let branches = store.get_branches().await?;
//!     Ok(branches.get(branch).map(|pointer| pointer.index))
//! }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{BranchPointer, IndexCommit, LongCommit};

pub mod mock;

/// Errors from commit store operations.
///
/// Both variants are transport-level failures: the caller decides whether to
/// retry. A hash the store does not know is *not* an error; bulk lookups
/// report it as a positional `None`.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("commit store unavailable: {0}")]
    Unavailable(String),

    /// The backend was reached but the request failed.
    #[error("commit store request failed: {0}")]
    Request(String),
}

/// The commit store contract.
///
/// One instance fronts one repository. Reads are assumed consistent; no
/// transaction support is required of implementations and none is assumed by
/// callers.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the cache shares one instance across
/// lookup calls, containment fan-out tasks, and the background change tracker.
#[async_trait]
pub trait GitStore: Send + Sync {
    /// Fetch the current head pointer of every branch.
    ///
    /// The returned map includes the reserved all-branches pseudo-branch when
    /// the store maintains one.
    async fn get_branches(&self) -> Result<HashMap<String, BranchPointer>, StoreError>;

    /// Fetch commits of `branch` with index in the half-open range
    /// `[start_index, end_index)`, ordered by index ascending.
    ///
    /// An `end_index` past the head is clamped, so `usize::MAX` reads
    /// open-ended to the current head. Indices outside the branch's history
    /// simply yield an empty result.
    async fn range_n(
        &self,
        start_index: usize,
        end_index: usize,
        branch: &str,
    ) -> Result<Vec<IndexCommit>, StoreError>;

    /// Fetch commits of `branch` with timestamp in the half-open range
    /// `[start, end)`, ordered by index ascending.
    ///
    /// Timestamp ties are legal (git has whole-second granularity): all
    /// commits inside the window are returned and the caller disambiguates by
    /// hash.
    async fn range_by_time(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        branch: &str,
    ) -> Result<Vec<IndexCommit>, StoreError>;

    /// Bulk point lookup.
    ///
    /// The result is positionally aligned with `hashes`: unknown hashes yield
    /// `None` at their position rather than an error.
    async fn get(&self, hashes: &[String]) -> Result<Vec<Option<LongCommit>>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        assert_eq!(
            format!("{}", StoreError::Unavailable("connection refused".into())),
            "commit store unavailable: connection refused"
        );
        assert_eq!(
            format!("{}", StoreError::Request("scan aborted".into())),
            "commit store request failed: scan aborted"
        );
    }
}
