//! types
//!
//! Core domain records for commit history.
//!
//! # Types
//!
//! - [`IndexCommit`] - Lightweight commit record (hash, position, timestamp)
//! - [`BranchPointer`] - Head of a branch at a point in time
//! - [`LongCommit`] - Full commit metadata, with optional branch annotation
//! - [`BranchSelector`] - Tracked-branch choice: one named branch, or all of them
//!
//! # Timestamps
//!
//! Git records author/committer times with whole-second granularity, so two
//! distinct commits may carry the same timestamp. Every consumer of these
//! types (range scans, containment resolution) must treat timestamp ties as
//! legal and disambiguate by hash.
//!
//! # Examples
//!
//! ```
//! use revcache::types::{BranchSelector, IndexCommit};
//! use chrono::DateTime;
//!
//! let commit = IndexCommit {
//!     hash: "a1b2c3".to_string(),
//!     index: 7,
//!     timestamp: DateTime::from_timestamp(1_600_000_000, 0).unwrap(),
//! };
//! assert_eq!(commit.index, 7);
//!
//! let tracked = BranchSelector::Branch("main".to_string());
//! assert_eq!(tracked.store_name(), "main");
//! assert!(!tracked.is_all());
//! ```

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved store-level pseudo-branch covering every commit in the repository.
///
/// The commit store materializes this as an ordinary branch whose history is
/// the union of all branches. Cache-level code never compares against this
/// string directly; it goes through [`BranchSelector`].
pub const ALL_BRANCHES: &str = "@all-commits";

/// Lightweight commit record: one commit's position in a single branch's
/// linear history.
///
/// For a cached branch sequence, `index` is contiguous from the first cached
/// index upward and `timestamp` is non-decreasing with position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexCommit {
    /// Commit hash.
    pub hash: String,
    /// Position in the branch's linear history, 0 is the root commit.
    pub index: usize,
    /// Commit timestamp (whole-second granularity; ties are possible).
    pub timestamp: DateTime<Utc>,
}

/// The head of a branch at the time it was last observed.
///
/// Owned by the commit index cache and replaced wholesale on every refresh;
/// never mutated field-by-field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchPointer {
    /// Hash of the head commit.
    pub hash: String,
    /// Index of the head commit in the branch's history.
    pub index: usize,
}

/// Full commit metadata record.
///
/// All fields except `branches` describe the commit itself and are immutable
/// once observed: a commit's content never changes. `branches` is a
/// cache-maintained annotation filled in by containment resolution.
///
/// # Branch annotation
///
/// `branches` is `None` until containment has been resolved for this commit,
/// and `Some(map)` afterwards, including `Some` of an empty map when the
/// commit turned out to be on no branch. Callers therefore check
/// [`LongCommit::branches_resolved`], never map emptiness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongCommit {
    /// Commit hash.
    pub hash: String,
    /// Author, `Name <email>` form.
    pub author: String,
    /// First line of the commit message.
    pub subject: String,
    /// Parent commit hashes.
    pub parents: Vec<String>,
    /// Commit message body.
    pub body: String,
    /// Commit timestamp.
    pub timestamp: DateTime<Utc>,
    /// Position in the tracked branch's history.
    pub index: usize,
    /// Branch containment annotation; `None` until resolved.
    pub branches: Option<HashMap<String, bool>>,
}

impl LongCommit {
    /// Whether branch containment has been resolved for this commit.
    ///
    /// An empty-but-`Some` map means "resolved, contained in no branch" and
    /// still returns `true` here.
    pub fn branches_resolved(&self) -> bool {
        self.branches.is_some()
    }

    /// Project the lightweight index record out of this commit.
    pub fn index_commit(&self) -> IndexCommit {
        IndexCommit {
            hash: self.hash.clone(),
            index: self.index,
            timestamp: self.timestamp,
        }
    }
}

/// Which line of history a cache instance tracks.
///
/// The commit store models "every commit on any branch" as a reserved
/// pseudo-branch; keeping the choice as a tagged enum confines that sentinel
/// string to [`BranchSelector::store_name`] instead of scattering magic-string
/// comparisons through cache logic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BranchSelector {
    /// Track a single named branch.
    Branch(String),
    /// Track the union of all branches.
    AllBranches,
}

impl BranchSelector {
    /// The branch name used when talking to the commit store.
    pub fn store_name(&self) -> &str {
        match self {
            BranchSelector::Branch(name) => name,
            BranchSelector::AllBranches => ALL_BRANCHES,
        }
    }

    /// Whether this selector is the all-branches pseudo-branch.
    pub fn is_all(&self) -> bool {
        matches!(self, BranchSelector::AllBranches)
    }
}

impl fmt::Display for BranchSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.store_name())
    }
}
