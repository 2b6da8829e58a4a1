//! Feed orchestrator
//!
//! Public entry point. Fairness and boost ordering only apply to `new`
//! feeds in allow-listed contexts once the candidate set is large enough;
//! everything else is a plain order-preserving slice that never touches
//! session state, so ranked feeds always reflect their true rank order.

use crate::config::DistributionConfig;
use crate::error::Result;
use crate::jobs::spawn_session_sweeper;
use crate::metrics;
use crate::models::{FeedDiagnostics, FeedPost, FeedRequest, FeedResponse, SortMode};
use crate::session_store::{BatchParams, SessionBatchStore};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct FeedOrchestrator {
    config: DistributionConfig,
    store: Arc<SessionBatchStore>,
}

impl FeedOrchestrator {
    pub fn new(config: DistributionConfig) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(SessionBatchStore::from_config(&config));
        Ok(Self { config, store })
    }

    /// Use an existing store (custom clock/shuffler, or shared with a sweeper)
    pub fn with_store(config: DistributionConfig, store: Arc<SessionBatchStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, store })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(DistributionConfig::from_env()?)
    }

    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<SessionBatchStore> {
        Arc::clone(&self.store)
    }

    /// Whether fairness + boost ordering applies to this request
    pub fn uses_smart_logic<P>(&self, request: &FeedRequest<P>) -> bool {
        request.sort_mode == SortMode::New
            && self.config.is_smart_context(&request.context)
            && request.candidate_posts.len() > self.config.smart_logic_candidate_threshold
    }

    /// Effective batch size: the request limit clamped to `1..=max_posts_per_batch`
    pub fn batch_size_for<P>(&self, request: &FeedRequest<P>) -> usize {
        let max = self.config.max_posts_per_batch;
        request.limit.map(|limit| limit.clamp(1, max)).unwrap_or(max)
    }

    pub fn get_feed<P: FeedPost + Clone>(&self, request: FeedRequest<P>) -> FeedResponse<P> {
        if request.candidate_posts.is_empty() {
            metrics::record_request("empty");
            let mut response = FeedResponse::empty();
            if self.config.enable_diagnostics {
                response.diagnostics = Some(FeedDiagnostics::default());
            }
            return response;
        }

        let batch_size = self.batch_size_for(&request);

        if self.uses_smart_logic(&request) {
            metrics::record_request("smart");
            let params = BatchParams {
                batch_size,
                ..BatchParams::from_config(&self.config)
            };
            let mut response = self.store.get_batch(
                &request.session_id,
                &request.candidate_posts,
                &request.exclude_ids,
                &params,
            );
            if !self.config.enable_diagnostics {
                response.diagnostics = None;
            }
            return response;
        }

        metrics::record_request("bypass");
        debug!(
            session_id = %request.session_id,
            context = %request.context,
            sort_mode = %request.sort_mode,
            candidates = request.candidate_posts.len(),
            "Smart distribution bypassed"
        );
        self.passthrough(request, batch_size)
    }

    /// First `batch_size` distinct, non-excluded candidates in caller order
    fn passthrough<P: FeedPost>(
        &self,
        request: FeedRequest<P>,
        batch_size: usize,
    ) -> FeedResponse<P> {
        let candidate_count = request.candidate_posts.len();
        let mut seen: HashSet<String> = HashSet::with_capacity(candidate_count);
        let mut batch = Vec::with_capacity(batch_size.min(candidate_count));
        let mut remaining = 0usize;

        for post in request.candidate_posts {
            let id = post.post_id();
            if request.exclude_ids.contains(id) || !seen.insert(id.to_string()) {
                continue;
            }
            if batch.len() < batch_size {
                batch.push(post);
            } else {
                remaining += 1;
            }
        }

        let diagnostics = self.config.enable_diagnostics.then(|| FeedDiagnostics {
            smart_logic_applied: false,
            candidate_count,
            ..Default::default()
        });

        FeedResponse {
            batch,
            has_more: remaining > 0,
            queued_count: 0,
            diagnostics,
        }
    }

    /// Manual refresh: drop the session queue so the next request rebuilds it
    pub fn reset_session(&self, session_id: &str) -> bool {
        self.store.reset(session_id)
    }

    pub fn get_queued_count(&self, session_id: &str) -> usize {
        self.store.get_queued_count(session_id)
    }

    pub fn sweep_idle_sessions(&self) -> usize {
        self.store.sweep_idle()
    }

    /// Start the idle sweeper on the current Tokio runtime, ticking every
    /// `session_sweep_interval_ms`
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        spawn_session_sweeper(self.store(), self.config.session_sweep_interval())
    }
}
