//! Integration tests for the background change tracker.
//!
//! All tests run with the tokio clock paused: `recv().await` auto-advances to
//! the next poll tick, and silent ticks are provoked with an explicit
//! `advance` followed by a yield loop so the tracker task gets to run.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use revcache::cache::CommitCache;
use revcache::config::CacheConfig;
use revcache::store::mock::{commit_at, linear_history, FailOn, MockGitStore};
use revcache::store::StoreError;
use revcache::types::{BranchSelector, IndexCommit};
use tokio::sync::mpsc;

fn base() -> DateTime<Utc> {
    DateTime::from_timestamp(1_600_000_000, 0).unwrap()
}

/// Route tracker logging into the captured test output.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn tracker_config() -> CacheConfig {
    CacheConfig {
        poll_interval_secs: 10,
        watch_window: 5,
        ..Default::default()
    }
}

async fn tracked_cache(store: &MockGitStore) -> Arc<CommitCache> {
    init_logging();
    let cache = CommitCache::new(
        Arc::new(store.clone()),
        BranchSelector::Branch("main".to_string()),
        tracker_config(),
    )
    .await
    .unwrap();
    Arc::new(cache)
}

fn subscribe(cache: &Arc<CommitCache>) -> (revcache::cache::TrackerHandle, TrackerEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = Arc::clone(cache).start_tracking(move |window| {
        let _ = tx.send(window);
    });
    (handle, rx)
}

type TrackerEvents = mpsc::UnboundedReceiver<Vec<IndexCommit>>;

fn indices(window: &[IndexCommit]) -> Vec<usize> {
    window.iter().map(|c| c.index).collect()
}

/// Let the tracker task run whatever work is pending without moving the clock.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Move the clock past exactly one poll interval and let the tick finish.
async fn pass_one_interval() {
    tokio::time::advance(std::time::Duration::from_secs(11)).await;
    settle().await;
}

// =============================================================================
// Publishing
// =============================================================================

mod publishing {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_tick_publishes_the_initial_window() {
        let store = MockGitStore::with_branch("main", linear_history("h", 3, base()));
        let cache = tracked_cache(&store).await;
        let (handle, mut events) = subscribe(&cache);

        let window = events.recv().await.unwrap();
        assert_eq!(indices(&window), [0, 1, 2]);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn head_advance_publishes_the_sliding_window() {
        let store = MockGitStore::with_branch("main", linear_history("h", 10, base()));
        let cache = tracked_cache(&store).await;
        let (handle, mut events) = subscribe(&cache);

        // Ten commits, window of five: the first tick reports indices 5..=9.
        let initial = events.recv().await.unwrap();
        assert_eq!(indices(&initial), [5, 6, 7, 8, 9]);

        let extension: Vec<_> = (10..15)
            .map(|i| commit_at(&format!("h{i}"), i, base() + Duration::seconds(i as i64)))
            .collect();
        store.extend_branch("main", extension);

        // Head 9 -> 14: one event, carrying exactly the new window.
        let advanced = events.recv().await.unwrap();
        assert_eq!(indices(&advanced), [10, 11, 12, 13, 14]);
        let hashes: Vec<_> = advanced.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(hashes, ["h10", "h11", "h12", "h13", "h14"]);

        settle().await;
        assert!(events.try_recv().is_err());

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_tick_publishes_nothing() {
        let store = MockGitStore::with_branch("main", linear_history("h", 3, base()));
        let cache = tracked_cache(&store).await;
        let (handle, mut events) = subscribe(&cache);

        events.recv().await.unwrap();

        pass_one_interval().await;
        assert!(events.try_recv().is_err());

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn publishing_tick_refreshes_the_cache() {
        let store = MockGitStore::with_branch("main", linear_history("h", 3, base()));
        let cache = tracked_cache(&store).await;
        let (handle, mut events) = subscribe(&cache);

        events.recv().await.unwrap();
        store.extend_branch(
            "main",
            vec![commit_at("h3", 3, base() + Duration::seconds(3))],
        );
        events.recv().await.unwrap();

        // The cache was refreshed before the event went out, so queries agree
        // with what subscribers were told.
        assert_eq!(cache.branch_head().await.unwrap().index, 3);
        assert_eq!(cache.last_n(10).await.len(), 4);

        handle.stop().await;
    }
}

// =============================================================================
// Failure handling and lifecycle
// =============================================================================

mod lifecycle {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn store_error_skips_the_tick_and_recovers() {
        let store = MockGitStore::with_branch("main", linear_history("h", 3, base()));
        let cache = tracked_cache(&store).await;
        let (handle, mut events) = subscribe(&cache);

        events.recv().await.unwrap();

        store.set_fail_on(FailOn::GetBranches(StoreError::Unavailable("down".into())));
        pass_one_interval().await;
        assert!(events.try_recv().is_err());

        // The loop is still alive: once the store recovers, growth is seen.
        store.clear_fail_on();
        store.extend_branch(
            "main",
            vec![commit_at("h3", 3, base() + Duration::seconds(3))],
        );
        let window = events.recv().await.unwrap();
        assert_eq!(indices(&window), [0, 1, 2, 3]);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn vanished_branch_skips_the_tick() {
        let store = MockGitStore::with_branch("main", linear_history("h", 3, base()));
        let cache = tracked_cache(&store).await;
        let (handle, mut events) = subscribe(&cache);

        events.recv().await.unwrap();

        store.remove_branch("main");
        pass_one_interval().await;
        assert!(events.try_recv().is_err());

        // Cache state is untouched by the skipped tick.
        assert_eq!(cache.last_n(10).await.len(), 3);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_publishing() {
        let store = MockGitStore::with_branch("main", linear_history("h", 3, base()));
        let cache = tracked_cache(&store).await;
        let (handle, mut events) = subscribe(&cache);

        events.recv().await.unwrap();
        handle.stop().await;

        // The task is gone, so the channel closes rather than delivering more.
        store.extend_branch(
            "main",
            vec![commit_at("h3", 3, base() + Duration::seconds(3))],
        );
        assert!(events.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_aborts_the_task() {
        let store = MockGitStore::with_branch("main", linear_history("h", 3, base()));
        let cache = tracked_cache(&store).await;
        let (handle, mut events) = subscribe(&cache);

        events.recv().await.unwrap();
        drop(handle);

        assert!(events.recv().await.is_none());
    }
}
