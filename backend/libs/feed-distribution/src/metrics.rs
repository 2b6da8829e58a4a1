//! Feed Distribution Metrics
//!
//! Prometheus metrics for session batching and the idle session sweeper

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

static FEED_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_distribution_requests_total",
        "Total feed distribution requests by mode (smart/bypass/empty)",
        &["mode"]
    )
    .expect("Failed to register feed distribution requests metric")
});

static SESSION_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "feed_distribution_session_events_total",
        "Session queue lifecycle events (created/continued/rebuilt/reset)",
        &["event"]
    )
    .expect("Failed to register feed distribution session events metric")
});

static ACTIVE_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "feed_distribution_active_sessions",
        "Number of sessions currently holding a distribution queue"
    )
    .expect("Failed to register feed distribution active sessions metric")
});

static SESSIONS_EVICTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "feed_distribution_sessions_evicted_total",
        "Total idle sessions removed by the sweeper"
    )
    .expect("Failed to register feed distribution evicted sessions metric")
});

static BATCH_SIZE: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "feed_distribution_batch_size",
        "Number of posts served per smart batch",
        vec![0.0, 1.0, 5.0, 10.0, 15.0, 20.0, 30.0, 50.0, 100.0]
    )
    .expect("Failed to register feed distribution batch size metric")
});

static LOW_ENGAGEMENT_SERVED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "feed_distribution_low_engagement_served_total",
        "Total low-engagement posts served in smart batches"
    )
    .expect("Failed to register feed distribution low engagement metric")
});

/// Record which path a request took (smart/bypass/empty)
pub fn record_request(mode: &str) {
    FEED_REQUESTS_TOTAL.with_label_values(&[mode]).inc();
}

pub fn record_session_event(event: &str) {
    SESSION_EVENTS_TOTAL.with_label_values(&[event]).inc();
}

pub fn set_active_sessions(count: usize) {
    ACTIVE_SESSIONS.set(i64::try_from(count).unwrap_or(i64::MAX));
}

pub fn record_sessions_evicted(count: usize) {
    SESSIONS_EVICTED_TOTAL.inc_by(count as u64);
}

/// Record a served smart batch and how many of its posts were boosted
pub fn record_batch(served: usize, low_engagement: usize) {
    BATCH_SIZE.observe(served as f64);
    LOW_ENGAGEMENT_SERVED_TOTAL.inc_by(low_engagement as u64);
}
