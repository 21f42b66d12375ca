//! Revcache - a branch-scoped commit history cache
//!
//! Revcache fronts a remote, append-only commit store that only answers
//! range scans (by index position or by time) and bulk point lookups. It
//! presents a synchronous, in-memory view of one branch's history: last-N
//! queries, half-open time ranges, hash-to-index lookups, read-through
//! commit details, and branch containment checks. A background change
//! tracker polls the store and publishes new-commit batches as the branch
//! head advances.
//!
//! # Architecture
//!
//! - [`types`] - Commit records, branch pointers, and branch selection
//! - [`store`] - Commit store client contract and a mock implementation
//! - [`cache`] - The commit cache, containment resolution, and the tracker
//! - [`config`] - Tuning knobs with TOML loading and validation
//! - [`secondary`] - Optional cross-repository commit resolution
//! - [`error`] - Error types
//!
//! # Concurrency Model
//!
//! The cache maintains the following invariants:
//!
//! 1. One read/write lock guards the head pointer, the index window, and
//!    the detail map as a single unit
//! 2. `refresh` holds the write lock across its fetches, so readers never
//!    observe a half-installed window
//! 3. Every other operation performs store I/O outside any lock
//! 4. Background polling is owned by an explicit handle and stops with it

pub mod cache;
pub mod config;
pub mod error;
pub mod secondary;
pub mod store;
pub mod types;
