//! store::mock
//!
//! Mock commit store for deterministic testing.
//!
//! # Design
//!
//! The mock keeps per-branch linear histories in memory and derives branch
//! pointers and the reserved all-branches pseudo-branch from them. It records
//! every operation for verification (the cache-coherence tests count backend
//! calls) and supports injecting failures per operation, including failing the
//! time-range scan of one specific branch to exercise fail-fast fan-out.
//!
//! # Example
//!
//! ```
//! use revcache::store::mock::{linear_history, MockGitStore};
//! use revcache::store::GitStore;
//! use chrono::DateTime;
//!
//! # tokio_test::block_on(async {
//! let base = DateTime::from_timestamp(1_600_000_000, 0).unwrap();
//! let store = MockGitStore::with_branch("main", linear_history("h", 5, base));
//!
//! let branches = store.get_branches().await.unwrap();
//! assert_eq!(branches["main"].index, 4);
//! assert_eq!(branches["main"].hash, "h4");
//!
//! let window = store.range_n(2, 4, "main").await.unwrap();
//! assert_eq!(window.len(), 2);
//! assert_eq!(window[0].hash, "h2");
//! # });
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::{GitStore, StoreError};
use crate::types::{BranchPointer, IndexCommit, LongCommit, ALL_BRANCHES};

/// Mock commit store for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockGitStore {
    /// Internal state shared across clones.
    inner: Arc<Mutex<MockStoreInner>>,
}

/// Internal mutable state.
#[derive(Debug)]
struct MockStoreInner {
    /// Per-branch histories, each sorted by index ascending.
    branches: BTreeMap<String, Vec<LongCommit>>,
    /// Commit details by hash. First insertion wins when a hash appears on
    /// several branches.
    details: HashMap<String, LongCommit>,
    /// Operation to fail (for testing error paths).
    fail_on: Option<FailOn>,
    /// Recorded operations for verification.
    operations: Vec<StoreOp>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail `get_branches` with the given error.
    GetBranches(StoreError),
    /// Fail `range_n` with the given error.
    RangeN(StoreError),
    /// Fail every `range_by_time` with the given error.
    RangeByTime(StoreError),
    /// Fail `range_by_time` only for one branch; other branches succeed.
    RangeByTimeBranch {
        /// The branch whose scan fails.
        branch: String,
        /// The error to return.
        error: StoreError,
    },
    /// Fail `get` with the given error.
    Get(StoreError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone)]
pub enum StoreOp {
    GetBranches,
    RangeN {
        start_index: usize,
        end_index: usize,
        branch: String,
    },
    RangeByTime {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        branch: String,
    },
    Get {
        hashes: Vec<String>,
    },
}

impl MockGitStore {
    /// Create an empty mock store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockStoreInner {
                branches: BTreeMap::new(),
                details: HashMap::new(),
                fail_on: None,
                operations: Vec::new(),
            })),
        }
    }

    /// Create a mock store with a single pre-populated branch.
    pub fn with_branch(name: &str, commits: Vec<LongCommit>) -> Self {
        let store = Self::new();
        store.add_branch(name, commits);
        store
    }

    /// Install (or replace) a branch's history.
    ///
    /// `commits` must be sorted by index ascending; details for each commit
    /// become available to `get` as well.
    pub fn add_branch(&self, name: &str, commits: Vec<LongCommit>) {
        let mut inner = self.inner.lock().unwrap();
        for commit in &commits {
            inner
                .details
                .entry(commit.hash.clone())
                .or_insert_with(|| commit.clone());
        }
        inner.branches.insert(name.to_string(), commits);
    }

    /// Append commits to a branch, advancing its head.
    pub fn extend_branch(&self, name: &str, commits: Vec<LongCommit>) {
        let mut inner = self.inner.lock().unwrap();
        for commit in &commits {
            inner
                .details
                .entry(commit.hash.clone())
                .or_insert_with(|| commit.clone());
        }
        inner
            .branches
            .entry(name.to_string())
            .or_default()
            .extend(commits);
    }

    /// Delete a branch. Its commits remain reachable through `get`.
    pub fn remove_branch(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.branches.remove(name);
    }

    /// Forget the details of one commit while keeping its index entry.
    ///
    /// Simulates a store whose detail row is missing, which the cache treats
    /// as a warm-up gap and a later point-lookup failure.
    pub fn remove_details(&self, hash: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.details.remove(hash);
    }

    /// Configure the mock to fail on a specific operation.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.set_fail_on(fail_on);
        self
    }

    /// Install a failure mid-test.
    pub fn set_fail_on(&self, fail_on: FailOn) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on = Some(fail_on);
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on = None;
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<StoreOp> {
        let inner = self.inner.lock().unwrap();
        inner.operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.clear();
    }

    /// Current head pointer of a branch (for test verification).
    pub fn head_of(&self, name: &str) -> Option<BranchPointer> {
        let inner = self.inner.lock().unwrap();
        inner.branches.get(name).and_then(|c| pointer_of(c))
    }

    /// Record an operation.
    fn record(&self, op: StoreOp) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(op);
    }

    /// The union view backing the all-branches pseudo-branch: every distinct
    /// commit across branches, ordered by timestamp (hash as tiebreaker) and
    /// reindexed positionally.
    fn all_commits(inner: &MockStoreInner) -> Vec<IndexCommit> {
        let mut seen: HashMap<&str, &LongCommit> = HashMap::new();
        for commits in inner.branches.values() {
            for commit in commits {
                seen.entry(commit.hash.as_str()).or_insert(commit);
            }
        }
        let mut union: Vec<&LongCommit> = seen.into_values().collect();
        union.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.hash.cmp(&b.hash)));
        union
            .into_iter()
            .enumerate()
            .map(|(index, commit)| IndexCommit {
                hash: commit.hash.clone(),
                index,
                timestamp: commit.timestamp,
            })
            .collect()
    }

    /// Index view of one branch, including the pseudo-branch.
    fn branch_view(inner: &MockStoreInner, branch: &str) -> Vec<IndexCommit> {
        if branch == ALL_BRANCHES {
            Self::all_commits(inner)
        } else {
            inner
                .branches
                .get(branch)
                .map(|commits| commits.iter().map(LongCommit::index_commit).collect())
                .unwrap_or_default()
        }
    }
}

impl Default for MockGitStore {
    fn default() -> Self {
        Self::new()
    }
}

fn pointer_of(commits: &[LongCommit]) -> Option<BranchPointer> {
    commits.last().map(|head| BranchPointer {
        hash: head.hash.clone(),
        index: head.index,
    })
}

#[async_trait]
impl GitStore for MockGitStore {
    async fn get_branches(&self) -> Result<HashMap<String, BranchPointer>, StoreError> {
        self.record(StoreOp::GetBranches);

        let inner = self.inner.lock().unwrap();
        if let Some(FailOn::GetBranches(error)) = &inner.fail_on {
            return Err(error.clone());
        }

        let mut branches: HashMap<String, BranchPointer> = inner
            .branches
            .iter()
            .filter_map(|(name, commits)| pointer_of(commits).map(|p| (name.clone(), p)))
            .collect();
        let all = Self::all_commits(&inner);
        if let Some(head) = all.last() {
            branches.insert(
                ALL_BRANCHES.to_string(),
                BranchPointer {
                    hash: head.hash.clone(),
                    index: head.index,
                },
            );
        }
        Ok(branches)
    }

    async fn range_n(
        &self,
        start_index: usize,
        end_index: usize,
        branch: &str,
    ) -> Result<Vec<IndexCommit>, StoreError> {
        self.record(StoreOp::RangeN {
            start_index,
            end_index,
            branch: branch.to_string(),
        });

        let inner = self.inner.lock().unwrap();
        if let Some(FailOn::RangeN(error)) = &inner.fail_on {
            return Err(error.clone());
        }

        Ok(Self::branch_view(&inner, branch)
            .into_iter()
            .filter(|c| c.index >= start_index && c.index < end_index)
            .collect())
    }

    async fn range_by_time(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        branch: &str,
    ) -> Result<Vec<IndexCommit>, StoreError> {
        self.record(StoreOp::RangeByTime {
            start,
            end,
            branch: branch.to_string(),
        });

        let inner = self.inner.lock().unwrap();
        match &inner.fail_on {
            Some(FailOn::RangeByTime(error)) => return Err(error.clone()),
            Some(FailOn::RangeByTimeBranch {
                branch: failing,
                error,
            }) if failing == branch => return Err(error.clone()),
            _ => {}
        }

        Ok(Self::branch_view(&inner, branch)
            .into_iter()
            .filter(|c| c.timestamp >= start && c.timestamp < end)
            .collect())
    }

    async fn get(&self, hashes: &[String]) -> Result<Vec<Option<LongCommit>>, StoreError> {
        self.record(StoreOp::Get {
            hashes: hashes.to_vec(),
        });

        let inner = self.inner.lock().unwrap();
        if let Some(FailOn::Get(error)) = &inner.fail_on {
            return Err(error.clone());
        }

        Ok(hashes
            .iter()
            .map(|hash| inner.details.get(hash).cloned())
            .collect())
    }
}

/// Build one fully-populated commit record for tests.
pub fn commit_at(hash: &str, index: usize, timestamp: DateTime<Utc>) -> LongCommit {
    let parents = if index == 0 {
        Vec::new()
    } else {
        vec![format!("parent-of-{hash}")]
    };
    LongCommit {
        hash: hash.to_string(),
        author: "Test Author <test@example.com>".to_string(),
        subject: format!("commit {index}"),
        parents,
        body: String::new(),
        timestamp,
        index,
        branches: None,
    }
}

/// Build a linear history of `n` commits: hashes `{prefix}0..{prefix}n-1`,
/// indices `0..n`, timestamps advancing one second per commit from `base`.
pub fn linear_history(prefix: &str, n: usize, base: DateTime<Utc>) -> Vec<LongCommit> {
    (0..n)
        .map(|i| {
            let mut commit = commit_at(&format!("{prefix}{i}"), i, base + Duration::seconds(i as i64));
            if i > 0 {
                commit.parents = vec![format!("{prefix}{}", i - 1)];
            }
            commit
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DateTime<Utc> {
        DateTime::from_timestamp(1_600_000_000, 0).unwrap()
    }

    #[tokio::test]
    async fn get_branches_derives_pointers() {
        let store = MockGitStore::with_branch("main", linear_history("h", 3, base()));

        let branches = store.get_branches().await.unwrap();
        assert_eq!(branches["main"].index, 2);
        assert_eq!(branches["main"].hash, "h2");
    }

    #[tokio::test]
    async fn get_branches_includes_pseudo_branch() {
        let store = MockGitStore::with_branch("main", linear_history("m", 2, base()));
        store.add_branch("dev", linear_history("d", 3, base() + Duration::seconds(10)));

        let branches = store.get_branches().await.unwrap();
        // Union of 2 + 3 distinct commits, reindexed 0..5.
        assert_eq!(branches[ALL_BRANCHES].index, 4);
        assert_eq!(branches[ALL_BRANCHES].hash, "d2");
    }

    #[tokio::test]
    async fn empty_store_has_no_branches() {
        let store = MockGitStore::new();
        let branches = store.get_branches().await.unwrap();
        assert!(branches.is_empty());
    }

    #[tokio::test]
    async fn range_n_half_open() {
        let store = MockGitStore::with_branch("main", linear_history("h", 5, base()));

        let window = store.range_n(1, 4, "main").await.unwrap();
        let hashes: Vec<_> = window.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(hashes, ["h1", "h2", "h3"]);
    }

    #[tokio::test]
    async fn range_n_clamps_open_ended_top() {
        let store = MockGitStore::with_branch("main", linear_history("h", 5, base()));

        let window = store.range_n(3, usize::MAX, "main").await.unwrap();
        let hashes: Vec<_> = window.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(hashes, ["h3", "h4"]);
    }

    #[tokio::test]
    async fn range_n_unknown_branch_is_empty() {
        let store = MockGitStore::with_branch("main", linear_history("h", 5, base()));
        assert!(store.range_n(0, 10, "gone").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn range_by_time_half_open_with_ties() {
        // Timestamps T, T+1, T+1, T+3.
        let t = base();
        let commits = vec![
            commit_at("h0", 0, t),
            commit_at("h1", 1, t + Duration::seconds(1)),
            commit_at("h2", 2, t + Duration::seconds(1)),
            commit_at("h3", 3, t + Duration::seconds(3)),
        ];
        let store = MockGitStore::with_branch("main", commits);

        let window = store
            .range_by_time(t + Duration::seconds(1), t + Duration::seconds(3), "main")
            .await
            .unwrap();
        let hashes: Vec<_> = window.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(hashes, ["h1", "h2"]);
    }

    #[tokio::test]
    async fn get_aligns_positionally() {
        let store = MockGitStore::with_branch("main", linear_history("h", 3, base()));

        let result = store
            .get(&["h1".to_string(), "missing".to_string(), "h0".to_string()])
            .await
            .unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].as_ref().unwrap().hash, "h1");
        assert!(result[1].is_none());
        assert_eq!(result[2].as_ref().unwrap().hash, "h0");
    }

    #[tokio::test]
    async fn fail_on_get_branches() {
        let store = MockGitStore::with_branch("main", linear_history("h", 2, base()))
            .fail_on(FailOn::GetBranches(StoreError::Unavailable("down".into())));

        let result = store.get_branches().await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));

        store.clear_fail_on();
        assert!(store.get_branches().await.is_ok());
    }

    #[tokio::test]
    async fn fail_on_range_by_time_single_branch() {
        let store = MockGitStore::with_branch("main", linear_history("m", 2, base()));
        store.add_branch("dev", linear_history("d", 2, base()));
        store.set_fail_on(FailOn::RangeByTimeBranch {
            branch: "dev".to_string(),
            error: StoreError::Request("scan failed".into()),
        });

        let t = base();
        assert!(store
            .range_by_time(t, t + Duration::seconds(5), "main")
            .await
            .is_ok());
        assert!(store
            .range_by_time(t, t + Duration::seconds(5), "dev")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn operations_recorded() {
        let store = MockGitStore::with_branch("main", linear_history("h", 2, base()));

        store.get_branches().await.unwrap();
        store.get(&["h0".to_string()]).await.unwrap();

        let ops = store.operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], StoreOp::GetBranches));
        assert!(matches!(ops[1], StoreOp::Get { .. }));

        store.clear_operations();
        assert!(store.operations().is_empty());
    }

    #[tokio::test]
    async fn extend_branch_advances_head() {
        let store = MockGitStore::with_branch("main", linear_history("h", 3, base()));
        assert_eq!(store.head_of("main").unwrap().index, 2);

        store.extend_branch(
            "main",
            vec![commit_at("h3", 3, base() + Duration::seconds(3))],
        );
        let head = store.head_of("main").unwrap();
        assert_eq!(head.index, 3);
        assert_eq!(head.hash, "h3");
    }

    #[tokio::test]
    async fn remove_details_keeps_index_entry() {
        let store = MockGitStore::with_branch("main", linear_history("h", 3, base()));
        store.remove_details("h1");

        let window = store.range_n(0, 3, "main").await.unwrap();
        assert_eq!(window.len(), 3);

        let details = store.get(&["h1".to_string()]).await.unwrap();
        assert!(details[0].is_none());
    }
}
