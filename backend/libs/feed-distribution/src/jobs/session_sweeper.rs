//! Idle Session Sweeper
//!
//! Periodically evicts distribution sessions that have been idle longer than
//! `session_cleanup_idle_ms`, bounding memory independent of request traffic.
//! Each eviction holds a single map shard lock just long enough to remove one
//! entry, so concurrent `get_batch` calls are never stalled by a sweep.

use crate::session_store::SessionBatchStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

pub async fn start_session_sweeper(store: Arc<SessionBatchStore>, every: Duration) {
    tracing::info!(
        "Starting distribution session sweeper (interval={}s)",
        every.as_secs()
    );

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let cycle_start = Instant::now();
        let removed = store.sweep_idle();

        tracing::debug!(
            removed = removed,
            remaining = store.session_count(),
            duration_us = cycle_start.elapsed().as_micros() as u64,
            "Session sweep cycle completed"
        );
    }
}

/// Spawn the sweeper on the current Tokio runtime. Abort the handle on shutdown.
pub fn spawn_session_sweeper(store: Arc<SessionBatchStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(start_session_sweeper(store, every))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::DistributionConfig;
    use crate::models::CandidatePost;
    use crate::session_store::BatchParams;
    use crate::shuffle::Shuffler;
    use std::collections::HashSet;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_idle_sessions() {
        let config = DistributionConfig::default();
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(SessionBatchStore::new(
            &config,
            Arc::new(Shuffler::seeded(1)),
            clock.clone(),
        ));

        let posts = vec![CandidatePost::new("p1", "a1"), CandidatePost::new("p2", "a2")];
        store.get_batch("s1", &posts, &HashSet::new(), &BatchParams::from_config(&config));
        assert_eq!(store.session_count(), 1);

        let handle = spawn_session_sweeper(store.clone(), Duration::from_secs(600));

        clock.advance(chrono::Duration::minutes(31));
        tokio::time::sleep(Duration::from_secs(601)).await;
        tokio::task::yield_now().await;

        assert_eq!(store.session_count(), 0);
        handle.abort();
    }
}
