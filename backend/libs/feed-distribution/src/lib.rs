//! Nova feed distribution
//!
//! Decides which slice of a large, growing candidate set a viewing session
//! sees on each refresh:
//! - Per-session pagination with a bounded batch size
//! - Author fairness: authors are round-robined, never clustered
//! - Visibility boost: a fixed share of every batch goes to low-engagement posts
//! - Staleness expiry: idle sessions rebuild their queue, long-idle ones are swept
//!
//! Ranked feeds (anything but `new`, or contexts outside the allow-list) and
//! small candidate sets bypass all of this and are paginated in caller order.
//!
//! # Example
//!
//! ```rust,no_run
//! use feed_distribution::{CandidatePost, FeedOrchestrator, FeedRequest, SortMode};
//!
//! let orchestrator = FeedOrchestrator::from_env().expect("valid distribution config");
//! let posts: Vec<CandidatePost> = Vec::new(); // fetched by the storage layer
//!
//! let request = FeedRequest::new("session-1", posts, "home", SortMode::New);
//! let response = orchestrator.get_feed(request);
//! println!("{} posts, {} more queued", response.batch.len(), response.queued_count);
//! ```
//!
//! # Concurrency
//!
//! The session store is an in-process map with one mutex per session, so two
//! tabs of the same session never receive the same post from overlapping
//! requests within this process. Nothing is shared across processes; a
//! multi-instance deployment needs sticky sessions or an external per-session
//! lock for strict no-duplicate delivery.

pub mod booster;
pub mod clock;
pub mod config;
pub mod engagement;
pub mod error;
pub mod fairness;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod session_store;
pub mod shuffle;

pub use booster::VisibilityBooster;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::DistributionConfig;
pub use engagement::is_low_engagement;
pub use error::{DistributionError, Result};
pub use fairness::FairQueueBuilder;
pub use models::{
    CandidatePost, EngagementSignal, FeedDiagnostics, FeedPost, FeedRequest, FeedResponse,
    SessionOutcome, SortMode,
};
pub use orchestrator::FeedOrchestrator;
pub use session_store::{BatchParams, SessionBatchState, SessionBatchStore};
pub use shuffle::Shuffler;
