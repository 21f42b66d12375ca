//! cache::tracker
//!
//! Background change tracker for a [`CommitCache`].
//!
//! # Design
//!
//! The tracker is a level-triggered change detector: every tick re-derives
//! the recent-commit window from the store and compares it against the
//! previous snapshot, so missed ticks (process pauses, slow backends) cost
//! nothing but latency. A tick that observes growth first refreshes the
//! cache (best-effort, errors logged) and then publishes the whole window;
//! a no-op tick publishes nothing. Store errors skip the tick and leave the
//! loop running.
//!
//! The loop is owned by the [`TrackerHandle`] returned from
//! [`CommitCache::start_tracking`]: `stop` shuts it down cleanly between
//! ticks, dropping the handle aborts it outright. Either way no background
//! task outlives its owner.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::CommitCache;
use crate::types::IndexCommit;

/// Owns the background polling task of one cache.
#[derive(Debug)]
pub struct TrackerHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl TrackerHandle {
    /// Stop the tracker and wait for the task to exit.
    ///
    /// An in-flight tick is allowed to finish; no further events are
    /// published afterwards.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Spawn the polling loop. The task holds its own reference to the cache.
pub(crate) fn spawn<F>(cache: Arc<CommitCache>, mut publish: F) -> TrackerHandle
where
    F: FnMut(Vec<IndexCommit>) + Send + 'static,
{
    let (shutdown, mut shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut interval = time::interval(cache.config().poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut prev: Vec<IndexCommit> = Vec::new();
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    tick(&cache, &mut prev, &mut publish).await;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        return;
                    }
                }
            }
        }
    });
    TrackerHandle {
        shutdown,
        task: Some(task),
    }
}

/// One poll: re-derive the recent window and publish if it grew.
async fn tick<F>(cache: &CommitCache, prev: &mut Vec<IndexCommit>, publish: &mut F)
where
    F: FnMut(Vec<IndexCommit>),
{
    let tracked = cache.branch().store_name();
    let heads = match cache.store().get_branches().await {
        Ok(heads) => heads,
        Err(err) => {
            log::warn!("tracker: fetching branches failed: {err}");
            return;
        }
    };
    let head = match heads.get(tracked) {
        Some(head) => head,
        None => {
            log::warn!("tracker: branch '{tracked}' not found in store");
            return;
        }
    };

    let window_size = cache.config().watch_window;
    let start = (head.index + 1).saturating_sub(window_size);
    // Open-ended at the top so a fast-forwarding head is caught in full.
    let window = match cache.store().range_n(start, usize::MAX, tracked).await {
        Ok(window) => window,
        Err(err) => {
            log::warn!("tracker: fetching last {window_size} commits failed: {err}");
            return;
        }
    };

    if !window_grew(prev, &window) {
        return;
    }

    // Keep the cached window in step with what subscribers are told about.
    if let Err(err) = cache.refresh(true, false).await {
        log::warn!("tracker: refresh after head advance failed: {err}");
    }

    *prev = window.clone();
    publish(window);
}

/// Did the window gain commits since the previous snapshot?
///
/// A changed length counts (more commits, or a rewritten branch), as does an
/// equal length with a higher top index (rewind then fast-forward past the
/// old head). An empty window never counts as growth.
fn window_grew(prev: &[IndexCommit], next: &[IndexCommit]) -> bool {
    match (prev.last(), next.last()) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(p), Some(n)) => next.len() != prev.len() || n.index > p.index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mock::commit_at;
    use chrono::{DateTime, Duration, Utc};

    fn window(range: std::ops::Range<usize>) -> Vec<IndexCommit> {
        let base: DateTime<Utc> = DateTime::from_timestamp(1_600_000_000, 0).unwrap();
        range
            .map(|i| commit_at(&format!("h{i}"), i, base + Duration::seconds(i as i64)).index_commit())
            .collect()
    }

    #[test]
    fn empty_to_empty_is_not_growth() {
        assert!(!window_grew(&[], &[]));
    }

    #[test]
    fn first_observation_is_growth() {
        assert!(window_grew(&[], &window(0..3)));
    }

    #[test]
    fn identical_window_is_not_growth() {
        assert!(!window_grew(&window(0..3), &window(0..3)));
    }

    #[test]
    fn head_advance_is_growth() {
        assert!(window_grew(&window(0..10), &window(0..15)));
    }

    #[test]
    fn same_length_higher_top_is_growth() {
        // Rewind then fast-forward: the window slides without changing size.
        assert!(window_grew(&window(0..5), &window(3..8)));
    }

    #[test]
    fn shrink_is_growth() {
        // Fewer commits than before means the branch was rewritten; publish
        // so subscribers can re-derive their own state.
        assert!(window_grew(&window(0..5), &window(0..3)));
    }

    #[test]
    fn emptied_window_is_not_growth() {
        assert!(!window_grew(&window(0..5), &[]));
    }
}
