//! cache
//!
//! Branch-scoped commit history cache over a remote commit store.
//!
//! # Design
//!
//! [`CommitCache`] keeps three pieces of state as one unit under a single
//! `RwLock`: the tracked branch's head pointer, the contiguous window of
//! index commits `[0, head]`, and a bounded map of commit details. Queries
//! serve from memory under the read lock. Detail misses fall through to the
//! store outside any lock and install the fetched record under a short write
//! lock; two concurrent misses for the same hash may both fetch, which is
//! accepted since the fetch is idempotent and the writes are equivalent.
//!
//! [`CommitCache::refresh`] is the exception to the no-lock-across-IO rule:
//! it holds the write lock across its fetches so concurrent refreshes
//! serialize and readers never observe a head pointer inconsistent with the
//! window.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use revcache::cache::CommitCache;
//! use revcache::config::CacheConfig;
//! use revcache::store::mock::{linear_history, MockGitStore};
//! use revcache::types::BranchSelector;
//! use chrono::DateTime;
//!
//! # tokio_test::block_on(async {
//! let base = DateTime::from_timestamp(1_600_000_000, 0).unwrap();
//! let store = MockGitStore::with_branch("main", linear_history("h", 5, base));
//!
//! let cache = CommitCache::new(
//!     Arc::new(store),
//!     BranchSelector::Branch("main".to_string()),
//!     CacheConfig::default(),
//! )
//! .await
//! .unwrap();
//!
//! let recent = cache.last_n(2).await;
//! assert_eq!(recent[0].hash, "h3");
//! assert_eq!(recent[1].hash, "h4");
//!
//! let details = cache.details("h4", false).await.unwrap();
//! assert_eq!(details.index, 4);
//! # });
//! ```

mod containment;
mod details;
mod tracker;

pub use tracker::TrackerHandle;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::secondary::SecondaryRepo;
use crate::store::GitStore;
use crate::types::{BranchPointer, BranchSelector, IndexCommit, LongCommit, ALL_BRANCHES};

use details::DetailMap;

/// Cached view of one branch's commit history.
pub struct CommitCache {
    store: Arc<dyn GitStore>,
    branch: BranchSelector,
    config: CacheConfig,
    secondary: Option<SecondaryRepo>,
    /// Guards the head pointer, the index window, and the detail map as one
    /// unit.
    state: RwLock<TrackedState>,
}

struct TrackedState {
    /// Head of the tracked branch at last refresh.
    branch_info: Option<BranchPointer>,
    /// Index commits `[0, head]`, ordered by index.
    index_commits: Vec<IndexCommit>,
    /// Commit details by hash.
    details: DetailMap,
}

impl CommitCache {
    /// Build a cache over `branch` and perform the initial refresh.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the initial refresh cannot
    /// complete; a cache that never managed to load its branch is not
    /// considered constructed.
    pub async fn new(
        store: Arc<dyn GitStore>,
        branch: BranchSelector,
        config: CacheConfig,
    ) -> Result<Self, CacheError> {
        config.validate()?;
        let detail_capacity = config.detail_capacity;
        let cache = Self {
            store,
            branch,
            config,
            secondary: None,
            state: RwLock::new(TrackedState {
                branch_info: None,
                index_commits: Vec::new(),
                details: DetailMap::new(detail_capacity),
            }),
        };
        cache.refresh(true, false).await?;
        Ok(cache)
    }

    /// The branch this cache tracks.
    pub fn branch(&self) -> &BranchSelector {
        &self.branch
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The commit store backing this cache.
    pub fn store(&self) -> &Arc<dyn GitStore> {
        &self.store
    }

    /// Head of the tracked branch as of the last successful refresh.
    pub async fn branch_head(&self) -> Option<BranchPointer> {
        self.state.read().await.branch_info.clone()
    }

    /// Attach a secondary repository for cross-repo commit resolution.
    ///
    /// Takes `&mut self`: configure the cache before sharing it.
    pub fn set_secondary_repo(&mut self, secondary: SecondaryRepo) {
        self.secondary = Some(secondary);
    }

    /// Re-pull the tracked branch and re-materialize the index window.
    ///
    /// With `pull` set, the head pointer is re-fetched from the store; with
    /// `all_branches` additionally set, the head of the reserved all-branches
    /// pseudo-branch is used instead of the tracked branch's own. Without
    /// `pull`, the window is rebuilt against the previously fetched head.
    ///
    /// The whole body runs under the write lock: concurrent refreshes
    /// serialize, and on any error the previous state is left untouched.
    /// Detail warm-up is best-effort: a commit whose details are missing
    /// from the store is logged and skipped, and the gap surfaces on the
    /// point lookup that needs it.
    pub async fn refresh(&self, pull: bool, all_branches: bool) -> Result<(), CacheError> {
        let mut state = self.state.write().await;

        let tracked = self.branch.store_name();
        let head = if pull {
            let target = if all_branches { ALL_BRANCHES } else { tracked };
            let heads = self
                .store
                .get_branches()
                .await
                .map_err(|e| CacheError::store("get_branches", e))?;
            match heads.get(target) {
                Some(head) => head.clone(),
                None => return Err(CacheError::BranchNotFound(target.to_string())),
            }
        } else {
            match &state.branch_info {
                Some(head) => head.clone(),
                None => return Err(CacheError::BranchNotFound(tracked.to_string())),
            }
        };

        let window = self
            .store
            .range_n(0, head.index + 1, tracked)
            .await
            .map_err(|e| CacheError::store(&format!("range_n [0, {})", head.index + 1), e))?;

        // Warm the detail map for commits new to the window.
        let uncached: Vec<String> = window
            .iter()
            .filter(|c| !state.details.contains(&c.hash))
            .map(|c| c.hash.clone())
            .collect();
        let mut fetched = Vec::new();
        if !uncached.is_empty() {
            let commits = self
                .store
                .get(&uncached)
                .await
                .map_err(|e| CacheError::store(&format!("get for {} commits", uncached.len()), e))?;
            for (hash, commit) in uncached.iter().zip(commits) {
                match commit {
                    Some(commit) => fetched.push(commit),
                    None => log::warn!("no details for commit {hash} on branch {tracked}"),
                }
            }
        }

        state.branch_info = Some(head);
        state.index_commits = window;
        for commit in fetched {
            state.details.insert(commit);
        }
        Ok(())
    }

    /// The last `min(n, len)` cached index commits, oldest first.
    pub async fn last_n(&self, n: usize) -> Vec<IndexCommit> {
        let state = self.state.read().await;
        let len = state.index_commits.len();
        state.index_commits[len - n.min(len)..].to_vec()
    }

    /// Cached index commits with `begin <= timestamp < end`.
    pub async fn range(&self, begin: DateTime<Utc>, end: DateTime<Utc>) -> Vec<IndexCommit> {
        let state = self.state.read().await;
        Self::time_range(&state.index_commits, begin, end).to_vec()
    }

    /// Hashes of cached commits authored strictly after `start`, oldest
    /// first.
    pub async fn since(&self, start: DateTime<Utc>) -> Vec<String> {
        let state = self.state.read().await;
        let lo = state
            .index_commits
            .partition_point(|c| c.timestamp <= start);
        state.index_commits[lo..]
            .iter()
            .map(|c| c.hash.clone())
            .collect()
    }

    /// Position of `hash` in the tracked branch's history.
    ///
    /// Scans from the head backwards since lookups skew heavily towards
    /// recent commits.
    pub async fn index_of(&self, hash: &str) -> Result<usize, CacheError> {
        let state = self.state.read().await;
        state
            .index_commits
            .iter()
            .rev()
            .find(|c| c.hash == hash)
            .map(|c| c.index)
            .ok_or_else(|| CacheError::CommitNotFound(hash.to_string()))
    }

    /// Details of the commit at index `n` of the tracked branch.
    pub async fn by_index(&self, n: usize) -> Result<LongCommit, CacheError> {
        let hash = {
            let state = self.state.read().await;
            let commits = &state.index_commits;
            let bounds = commits
                .first()
                .zip(commits.last())
                .map(|(first, last)| (first.index, last.index));
            match bounds {
                Some((first, last)) if n >= first && n <= last => {
                    let pos = commits.partition_point(|c| c.index < n);
                    commits[pos].hash.clone()
                }
                _ => return Err(CacheError::IndexNotFound(n)),
            }
        };
        self.details(&hash, false).await
    }

    /// Details of one commit, read-through.
    ///
    /// With `include_branches` set, the result carries resolved branch
    /// membership; a cached entry whose membership was never resolved counts
    /// as a miss and triggers resolution.
    pub async fn details(
        &self,
        hash: &str,
        include_branches: bool,
    ) -> Result<LongCommit, CacheError> {
        {
            let state = self.state.read().await;
            if let Some(found) = state.details.lookup(hash, include_branches) {
                return Ok(found);
            }
        }

        // Miss: fetch outside the lock, then install.
        let commit = self.fetch_details(hash, include_branches).await?;
        let mut state = self.state.write().await;
        state.details.insert(commit.clone());
        Ok(commit)
    }

    /// Details of many commits, positionally aligned with `hashes`.
    ///
    /// Hashes the store does not recognize yield `None` in their slot; this
    /// is not an error. Misses are fetched with one bulk store call, and
    /// membership resolution (when requested) shares one branch-pointer
    /// fetch and one bounded fan-out across all of them.
    pub async fn details_multi(
        &self,
        hashes: &[String],
        include_branches: bool,
    ) -> Result<Vec<Option<LongCommit>>, CacheError> {
        let mut results: Vec<Option<LongCommit>> = vec![None; hashes.len()];
        let mut missed: Vec<(usize, String)> = Vec::new();
        {
            let state = self.state.read().await;
            for (i, hash) in hashes.iter().enumerate() {
                match state.details.lookup(hash, include_branches) {
                    Some(found) => results[i] = Some(found),
                    None => missed.push((i, hash.clone())),
                }
            }
        }
        if missed.is_empty() {
            return Ok(results);
        }

        let missed_hashes: Vec<String> = missed.iter().map(|(_, hash)| hash.clone()).collect();
        let mut fetched = self
            .store
            .get(&missed_hashes)
            .await
            .map_err(|e| CacheError::store(&format!("get for {} commits", missed_hashes.len()), e))?;

        if include_branches {
            let heads = self
                .store
                .get_branches()
                .await
                .map_err(|e| CacheError::store("get_branches", e))?;
            let targets: Vec<(String, DateTime<Utc>)> = fetched
                .iter()
                .flatten()
                .map(|c| (c.hash.clone(), c.timestamp))
                .collect();
            let memberships = containment::resolve_many(
                &self.store,
                &targets,
                &heads,
                self.config.containment_fanout,
            )
            .await?;
            for commit in fetched.iter_mut().flatten() {
                commit.branches = Some(memberships.get(&commit.hash).cloned().unwrap_or_default());
            }
        }

        let mut state = self.state.write().await;
        for ((i, _), commit) in missed.into_iter().zip(fetched) {
            if let Some(commit) = commit {
                state.details.insert(commit.clone());
                results[i] = Some(commit);
            }
        }
        Ok(results)
    }

    /// Map a secondary-repo commit to the primary-repo commit it pins.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::NoSecondaryRepo` unless a secondary repository
    /// was attached with [`CommitCache::set_secondary_repo`].
    pub async fn resolve_commit(&self, hash: &str) -> Result<String, CacheError> {
        let secondary = self.secondary.as_ref().ok_or(CacheError::NoSecondaryRepo)?;
        Ok(secondary.resolve_commit(hash).await?)
    }

    /// Start the background change tracker for this cache.
    ///
    /// The tracker polls the store on the configured interval and calls
    /// `publish` with the recent-commit window whenever the branch head has
    /// advanced. The task keeps its own reference to the cache; the returned
    /// handle owns the task, and dropping the handle stops the tracker.
    pub fn start_tracking<F>(self: Arc<Self>, publish: F) -> TrackerHandle
    where
        F: FnMut(Vec<IndexCommit>) + Send + 'static,
    {
        tracker::spawn(self, publish)
    }

    async fn fetch_details(
        &self,
        hash: &str,
        include_branches: bool,
    ) -> Result<LongCommit, CacheError> {
        let fetched = self
            .store
            .get(&[hash.to_string()])
            .await
            .map_err(|e| CacheError::store(&format!("get for commit '{hash}'"), e))?;
        let mut commit = match fetched.into_iter().next().flatten() {
            Some(commit) => commit,
            None => return Err(CacheError::CommitNotFound(hash.to_string())),
        };

        if include_branches {
            let heads = self
                .store
                .get_branches()
                .await
                .map_err(|e| CacheError::store("get_branches", e))?;
            let membership = containment::resolve_branches(
                &self.store,
                &commit.hash,
                commit.timestamp,
                &heads,
                self.config.containment_fanout,
            )
            .await?;
            commit.branches = Some(membership);
        }
        Ok(commit)
    }

    /// Boundary scan for the half-open range `[start, end)` by timestamp.
    /// Relies on the window invariant that timestamps are non-decreasing.
    fn time_range(
        commits: &[IndexCommit],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> &[IndexCommit] {
        let lo = commits.partition_point(|c| c.timestamp < start);
        let hi = lo + commits[lo..].partition_point(|c| c.timestamp < end);
        &commits[lo..hi]
    }
}

impl fmt::Debug for CommitCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitCache")
            .field("branch", &self.branch)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
