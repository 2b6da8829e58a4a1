//! Session batch store
//!
//! Per-session distribution state:
//! - `queued_post_ids`: fairness-ordered ids not yet served
//! - `served_post_ids`: ids already handed out in the current epoch
//! - `last_activity_at`: drives staleness rebuilds and idle eviction
//!
//! State transitions:
//! - Empty → Active: first request builds the full queue
//! - Active → Active: unseen candidates are appended, next batch served
//! - Active → Stale → Active: idle longer than the staleness window, queue
//!   and served set are discarded and rebuilt from the current candidates
//! - any → Empty: explicit `reset` or idle eviction by the sweeper
//!
//! Each session sits behind its own mutex, so requests for one session are
//! serialized while other sessions proceed untouched. The map shard lock is
//! only held long enough to look up or insert the session handle.

use crate::booster::VisibilityBooster;
use crate::clock::{Clock, SystemClock};
use crate::config::DistributionConfig;
use crate::engagement::is_low_engagement;
use crate::fairness::FairQueueBuilder;
use crate::metrics;
use crate::models::{FeedDiagnostics, FeedPost, FeedResponse, SessionOutcome};
use crate::shuffle::Shuffler;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Knobs for a single `get_batch` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchParams {
    pub batch_size: usize,
    pub fairness_chunk_size: usize,
    pub boost_fraction: f64,
    pub apply_boost: bool,
}

impl BatchParams {
    pub fn from_config(config: &DistributionConfig) -> Self {
        Self {
            batch_size: config.max_posts_per_batch,
            fairness_chunk_size: config.fairness_chunk_size,
            boost_fraction: config.boost_fraction(),
            apply_boost: true,
        }
    }

    /// Posts examined per batch: twice the batch when boosting so the
    /// booster has material to interleave.
    pub fn lookahead(&self, queued: usize) -> usize {
        if self.apply_boost {
            queued.min(self.batch_size.saturating_mul(2))
        } else {
            queued.min(self.batch_size)
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionBatchState {
    pub session_id: String,
    pub queued_post_ids: VecDeque<String>,
    pub served_post_ids: HashSet<String>,
    pub last_activity_at: DateTime<Utc>,
    /// False until the first queue build; a racing request may lock a
    /// freshly inserted session before its creator does.
    built: bool,
}

impl SessionBatchState {
    fn new(session_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.to_string(),
            queued_post_ids: VecDeque::new(),
            served_post_ids: HashSet::new(),
            last_activity_at: now,
            built: false,
        }
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_activity_at
    }

    pub fn is_stale(&self, now: DateTime<Utc>, staleness_window: Duration) -> bool {
        self.idle_for(now) > staleness_window
    }
}

type SessionHandle = Arc<Mutex<SessionBatchState>>;

pub struct SessionBatchStore {
    sessions: DashMap<String, SessionHandle>,
    queue_builder: FairQueueBuilder,
    booster: VisibilityBooster,
    clock: Arc<dyn Clock>,
    staleness_window: Duration,
    cleanup_idle: Duration,
}

impl SessionBatchStore {
    pub fn new(
        config: &DistributionConfig,
        shuffler: Arc<Shuffler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            queue_builder: FairQueueBuilder::new(Arc::clone(&shuffler)),
            booster: VisibilityBooster::new(shuffler),
            clock,
            staleness_window: config.staleness_window(),
            cleanup_idle: config.session_cleanup_idle(),
        }
    }

    /// Store with the system clock and a shuffler seeded per `config.shuffle_seed`
    pub fn from_config(config: &DistributionConfig) -> Self {
        Self::new(
            config,
            Arc::new(Shuffler::from_seed_option(config.shuffle_seed)),
            Arc::new(SystemClock),
        )
    }

    /// Serve the next batch for `session_id` out of `candidates`.
    ///
    /// `excluded` ids are never queued or served. Candidates with duplicate
    /// ids are collapsed to their first occurrence.
    pub fn get_batch<P: FeedPost + Clone>(
        &self,
        session_id: &str,
        candidates: &[P],
        excluded: &HashSet<String>,
        params: &BatchParams,
    ) -> FeedResponse<P> {
        let now = self.clock.now();

        let mut eligible: Vec<&P> = Vec::with_capacity(candidates.len());
        let mut resolvable: HashMap<&str, &P> = HashMap::with_capacity(candidates.len());
        for post in candidates {
            let id = post.post_id();
            if excluded.contains(id) || resolvable.contains_key(id) {
                continue;
            }
            resolvable.insert(id, post);
            eligible.push(post);
        }

        let mut created = false;
        let session = {
            let entry = self.sessions.entry(session_id.to_string()).or_insert_with(|| {
                created = true;
                Arc::new(Mutex::new(SessionBatchState::new(session_id, now)))
            });
            Arc::clone(entry.value())
        };
        if created {
            metrics::set_active_sessions(self.sessions.len());
        }

        let mut state = session.lock();

        let outcome = if !state.built {
            SessionOutcome::Created
        } else if state.is_stale(now, self.staleness_window) {
            SessionOutcome::Rebuilt
        } else {
            SessionOutcome::Continued
        };

        let newly_queued = match outcome {
            SessionOutcome::Created | SessionOutcome::Rebuilt => {
                if outcome == SessionOutcome::Rebuilt {
                    warn!(
                        session_id = %session_id,
                        idle_ms = state.idle_for(now).num_milliseconds(),
                        discarded_queue = state.queued_post_ids.len(),
                        discarded_served = state.served_post_ids.len(),
                        "Session queue went stale, rebuilding"
                    );
                }
                state.built = true;
                state.served_post_ids.clear();
                state.queued_post_ids = self
                    .queue_builder
                    .build_queue(&eligible, params.fairness_chunk_size)
                    .into();

                info!(
                    session_id = %session_id,
                    outcome = outcome.as_str(),
                    queued = state.queued_post_ids.len(),
                    "Built session distribution queue"
                );
                state.queued_post_ids.len()
            }
            SessionOutcome::Continued => {
                let unseen: Vec<&P> = {
                    let queued: HashSet<&str> =
                        state.queued_post_ids.iter().map(String::as_str).collect();
                    eligible
                        .iter()
                        .copied()
                        .filter(|post| {
                            let id = post.post_id();
                            !queued.contains(id) && !state.served_post_ids.contains(id)
                        })
                        .collect()
                };

                if unseen.is_empty() {
                    0
                } else {
                    let appended = self
                        .queue_builder
                        .build_queue(&unseen, params.fairness_chunk_size);
                    let count = appended.len();
                    state.queued_post_ids.extend(appended);
                    debug!(
                        session_id = %session_id,
                        appended = count,
                        "Appended new candidates to session queue"
                    );
                    count
                }
            }
        };
        metrics::record_session_event(outcome.as_str());

        // Drop ids that vanished from the candidate set or were excluded since queuing
        state
            .queued_post_ids
            .retain(|id| resolvable.contains_key(id.as_str()));

        let lookahead = params.lookahead(state.queued_post_ids.len());
        let window: Vec<&P> = state
            .queued_post_ids
            .iter()
            .take(lookahead)
            .filter_map(|id| resolvable.get(id.as_str()).copied())
            .collect();

        let selected: Vec<&P> = if params.apply_boost {
            self.booster
                .boost(&window, params.batch_size, params.boost_fraction)
        } else {
            window.into_iter().take(params.batch_size).collect()
        };

        let selected_ids: HashSet<&str> = selected.iter().map(|post| post.post_id()).collect();
        state
            .queued_post_ids
            .retain(|id| !selected_ids.contains(id.as_str()));
        state
            .served_post_ids
            .extend(selected_ids.iter().map(|id| id.to_string()));
        state.last_activity_at = now;

        let queued_count = state.queued_post_ids.len();
        drop(state);

        let low_engagement_served = selected
            .iter()
            .filter(|post| is_low_engagement(**post))
            .count();
        let distinct_authors_served = selected
            .iter()
            .map(|post| post.author_key())
            .collect::<HashSet<_>>()
            .len();
        metrics::record_batch(selected.len(), low_engagement_served);

        debug!(
            session_id = %session_id,
            served = selected.len(),
            low_engagement = low_engagement_served,
            queued = queued_count,
            "Served session batch"
        );

        FeedResponse {
            batch: selected.into_iter().cloned().collect(),
            has_more: queued_count > 0,
            queued_count,
            diagnostics: Some(FeedDiagnostics {
                smart_logic_applied: true,
                session_outcome: Some(outcome),
                candidate_count: candidates.len(),
                newly_queued,
                low_engagement_served,
                distinct_authors_served,
                lookahead,
            }),
        }
    }

    /// Queued-but-unserved count without consuming anything.
    ///
    /// Unknown sessions and sessions that will be rebuilt on their next
    /// request report 0.
    pub fn get_queued_count(&self, session_id: &str) -> usize {
        let now = self.clock.now();
        self.handle(session_id)
            .map(|session| {
                let state = session.lock();
                if state.is_stale(now, self.staleness_window) {
                    0
                } else {
                    state.queued_post_ids.len()
                }
            })
            .unwrap_or(0)
    }

    /// Forget a session so its next request starts from an empty state.
    /// Returns whether the session existed.
    pub fn reset(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            metrics::record_session_event("reset");
            metrics::set_active_sessions(self.sessions.len());
            info!(session_id = %session_id, "Session distribution state reset");
        }
        removed
    }

    /// Evict sessions idle beyond the cleanup window. Returns the number removed.
    ///
    /// Idle keys are collected under shard read locks first, then removed one
    /// at a time; a session currently being served is never evicted.
    pub fn sweep_idle(&self) -> usize {
        let now = self.clock.now();
        let cleanup_idle = self.cleanup_idle;

        let idle_sessions: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .try_lock()
                    .map(|state| state.idle_for(now) > cleanup_idle)
                    .unwrap_or(false)
            })
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for session_id in idle_sessions {
            let evicted = self.sessions.remove_if(&session_id, |_, handle| {
                handle
                    .try_lock()
                    .map(|state| state.idle_for(now) > cleanup_idle)
                    .unwrap_or(false)
            });
            if evicted.is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            metrics::record_sessions_evicted(removed);
            info!(
                removed = removed,
                remaining = self.sessions.len(),
                "Evicted idle distribution sessions"
            );
        }
        metrics::set_active_sessions(self.sessions.len());

        removed
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Copy of a session's current state (inspection and tests)
    pub fn snapshot(&self, session_id: &str) -> Option<SessionBatchState> {
        self.handle(session_id)
            .map(|session| session.lock().clone())
    }

    /// Clone the session handle out of the map; the shard guard is released
    /// before the caller locks the session.
    fn handle(&self, session_id: &str) -> Option<Arc<Mutex<SessionBatchState>>> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
    }
}
