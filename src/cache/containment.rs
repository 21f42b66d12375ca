//! cache::containment
//!
//! Branch membership resolution.
//!
//! # Design
//!
//! The commit store has no commit-to-branches lookup. The only way to decide
//! whether a branch contains a commit is to scan that branch for the
//! one-second window starting at the commit's timestamp and check the result
//! for the hash. One scan task is spawned per (commit, branch) pair; all scans
//! run concurrently, bounded by a semaphore so a repository with hundreds of
//! branches cannot stampede the backend. The first scan failure wins:
//! remaining scans are aborted and the error is returned, so a caller never
//! sees a partially resolved membership map.
//!
//! A resolved map carries an entry per containing branch (value `true`);
//! branches that do not contain the commit are simply absent.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::CacheError;
use crate::store::GitStore;
use crate::types::{BranchPointer, ALL_BRANCHES};

/// Resolve which of `branch_heads` contain the commit `hash` authored at
/// `timestamp`. The reserved all-branches entry is never scanned.
pub(crate) async fn resolve_branches(
    store: &Arc<dyn GitStore>,
    hash: &str,
    timestamp: DateTime<Utc>,
    branch_heads: &HashMap<String, BranchPointer>,
    max_fanout: usize,
) -> Result<HashMap<String, bool>, CacheError> {
    let mut all = resolve_many(
        store,
        &[(hash.to_string(), timestamp)],
        branch_heads,
        max_fanout,
    )
    .await?;
    Ok(all.remove(hash).unwrap_or_default())
}

/// Resolve branch membership for several commits in one bounded fan-out.
///
/// The scans for all (commit, branch) pairs share one concurrency budget.
/// The result maps each requested hash to its membership; a commit contained
/// in no branch maps to an empty (but present) entry.
pub(crate) async fn resolve_many(
    store: &Arc<dyn GitStore>,
    commits: &[(String, DateTime<Utc>)],
    branch_heads: &HashMap<String, BranchPointer>,
    max_fanout: usize,
) -> Result<HashMap<String, HashMap<String, bool>>, CacheError> {
    let mut membership: HashMap<String, HashMap<String, bool>> = commits
        .iter()
        .map(|(hash, _)| (hash.clone(), HashMap::new()))
        .collect();

    let semaphore = Arc::new(Semaphore::new(max_fanout.max(1)));
    let mut scans = JoinSet::new();
    for (hash, timestamp) in commits {
        for branch in branch_heads.keys() {
            if branch == ALL_BRANCHES {
                continue;
            }
            let store = Arc::clone(store);
            let semaphore = Arc::clone(&semaphore);
            let branch = branch.clone();
            let hash = hash.clone();
            let timestamp = *timestamp;
            scans.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| CacheError::Internal("containment semaphore closed".to_string()))?;
                let window = store
                    .range_by_time(timestamp, timestamp + Duration::seconds(1), &branch)
                    .await
                    .map_err(|e| {
                        CacheError::store(&format!("range_by_time on branch '{branch}'"), e)
                    })?;
                let contained = window.iter().any(|c| c.hash == hash);
                Ok::<(String, String, bool), CacheError>((hash, branch, contained))
            });
        }
    }

    while let Some(joined) = scans.join_next().await {
        match joined {
            Ok(Ok((hash, branch, contained))) => {
                if contained {
                    if let Some(branches) = membership.get_mut(&hash) {
                        branches.insert(branch, true);
                    }
                }
            }
            // Dropping the set aborts the scans still in flight.
            Ok(Err(err)) => return Err(err),
            Err(join_err) if join_err.is_cancelled() => continue,
            Err(join_err) => {
                return Err(CacheError::Internal(format!(
                    "containment scan failed: {join_err}"
                )))
            }
        }
    }
    Ok(membership)
}
