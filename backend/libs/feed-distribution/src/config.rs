use crate::error::{DistributionError, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Environment prefix for every distribution setting,
/// e.g. `FEED_DISTRIBUTION_MAX_POSTS_PER_BATCH=30`.
pub const ENV_PREFIX: &str = "FEED_DISTRIBUTION_";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistributionConfig {
    /// Upper bound on posts returned per refresh
    #[serde(default = "default_max_posts_per_batch")]
    pub max_posts_per_batch: usize,

    /// Size of the round-robin chunks used while building a session queue
    #[serde(default = "default_fairness_chunk_size")]
    pub fairness_chunk_size: usize,

    /// Share of every batch reserved for low-engagement posts (0-100)
    #[serde(default = "default_low_engagement_boost_percentage")]
    pub low_engagement_boost_percentage: u32,

    /// Idle time after which a session queue is rebuilt from scratch
    #[serde(default = "default_staleness_window_ms")]
    pub staleness_window_ms: u64,

    /// Idle time after which the sweeper drops a session entirely
    #[serde(default = "default_session_cleanup_idle_ms")]
    pub session_cleanup_idle_ms: u64,

    #[serde(default = "default_session_sweep_interval_ms")]
    pub session_sweep_interval_ms: u64,

    /// Contexts eligible for fairness + boost ordering
    #[serde(default = "default_smart_logic_contexts")]
    pub smart_logic_contexts: Vec<String>,

    /// Candidate count that must be exceeded before smart logic kicks in
    #[serde(default = "default_smart_logic_candidate_threshold")]
    pub smart_logic_candidate_threshold: usize,

    /// Fixed RNG seed; unset means entropy-seeded shuffling
    #[serde(default)]
    pub shuffle_seed: Option<u64>,

    #[serde(default)]
    pub enable_diagnostics: bool,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            max_posts_per_batch: default_max_posts_per_batch(),
            fairness_chunk_size: default_fairness_chunk_size(),
            low_engagement_boost_percentage: default_low_engagement_boost_percentage(),
            staleness_window_ms: default_staleness_window_ms(),
            session_cleanup_idle_ms: default_session_cleanup_idle_ms(),
            session_sweep_interval_ms: default_session_sweep_interval_ms(),
            smart_logic_contexts: default_smart_logic_contexts(),
            smart_logic_candidate_threshold: default_smart_logic_candidate_threshold(),
            shuffle_seed: None,
            enable_diagnostics: false,
        }
    }
}

impl DistributionConfig {
    /// Load from `FEED_DISTRIBUTION_*` environment variables (and `.env` when present).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config: DistributionConfig = envy::prefixed(ENV_PREFIX).from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_posts_per_batch == 0 {
            return Err(DistributionError::InvalidConfig(
                "max_posts_per_batch must be greater than 0".to_string(),
            ));
        }
        if self.fairness_chunk_size == 0 {
            return Err(DistributionError::InvalidConfig(
                "fairness_chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.low_engagement_boost_percentage > 100 {
            return Err(DistributionError::InvalidConfig(format!(
                "low_engagement_boost_percentage must be within 0..=100, got {}",
                self.low_engagement_boost_percentage
            )));
        }
        if self.session_sweep_interval_ms == 0 {
            return Err(DistributionError::InvalidConfig(
                "session_sweep_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.session_cleanup_idle_ms < self.staleness_window_ms {
            return Err(DistributionError::InvalidConfig(format!(
                "session_cleanup_idle_ms ({}) must not be shorter than staleness_window_ms ({})",
                self.session_cleanup_idle_ms, self.staleness_window_ms
            )));
        }
        Ok(())
    }

    pub fn boost_fraction(&self) -> f64 {
        f64::from(self.low_engagement_boost_percentage.min(100)) / 100.0
    }

    pub fn staleness_window(&self) -> Duration {
        Duration::milliseconds(clamp_ms(self.staleness_window_ms))
    }

    pub fn session_cleanup_idle(&self) -> Duration {
        Duration::milliseconds(clamp_ms(self.session_cleanup_idle_ms))
    }

    pub fn session_sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.session_sweep_interval_ms)
    }

    pub fn is_smart_context(&self, context: &str) -> bool {
        self.smart_logic_contexts
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(context))
    }
}

fn clamp_ms(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

fn default_max_posts_per_batch() -> usize {
    30
}

fn default_fairness_chunk_size() -> usize {
    12
}

fn default_low_engagement_boost_percentage() -> u32 {
    20
}

fn default_staleness_window_ms() -> u64 {
    5 * 60 * 1000
}

fn default_session_cleanup_idle_ms() -> u64 {
    30 * 60 * 1000
}

fn default_session_sweep_interval_ms() -> u64 {
    10 * 60 * 1000
}

fn default_smart_logic_contexts() -> Vec<String> {
    vec!["home".to_string(), "community".to_string()]
}

fn default_smart_logic_candidate_threshold() -> usize {
    30
}
