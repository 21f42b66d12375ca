//! cache::details
//!
//! Bounded in-memory map of commit details, keyed by hash.
//!
//! # Design
//!
//! Entries are held in an LRU cache so an unbounded commit history cannot
//! grow the process without limit. Lookups use `peek` rather than `get`:
//! readers only hold the shared cache lock, so a lookup cannot reorder the
//! recency list. Recency is updated on insert, which makes eviction
//! least-recently-written rather than least-recently-used. Refreshes and
//! read-through fills reinsert whatever they fetch, so hot entries still get
//! refreshed positions in practice.
//!
//! A commit whose branch membership has not been resolved is stored with
//! `branches: None`. A lookup that asks for branch membership treats such an
//! entry as a miss, forcing the caller to resolve and reinsert; inserting an
//! unresolved record over a resolved one keeps the previously resolved
//! membership.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::types::LongCommit;

/// Bounded hash-to-details map. Callers serialize access through the cache
/// lock; this type itself is not synchronized.
#[derive(Debug)]
pub(crate) struct DetailMap {
    entries: LruCache<String, LongCommit>,
}

impl DetailMap {
    /// Create with the given capacity (number of commits).
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Look up a commit without touching recency.
    ///
    /// With `include_branches` set, an entry whose membership is unresolved
    /// counts as a miss.
    pub(crate) fn lookup(&self, hash: &str, include_branches: bool) -> Option<LongCommit> {
        self.entries
            .peek(hash)
            .filter(|commit| !include_branches || commit.branches_resolved())
            .cloned()
    }

    /// Check whether a hash is present, regardless of membership resolution.
    pub(crate) fn contains(&self, hash: &str) -> bool {
        self.entries.contains(hash)
    }

    /// Insert a commit, preserving previously resolved branch membership if
    /// the new record carries none.
    pub(crate) fn insert(&mut self, mut commit: LongCommit) {
        if commit.branches.is_none() {
            if let Some(prior) = self.entries.peek(&commit.hash) {
                commit.branches = prior.branches.clone();
            }
        }
        self.entries.push(commit.hash.clone(), commit);
    }

    /// Current number of cached commits.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
