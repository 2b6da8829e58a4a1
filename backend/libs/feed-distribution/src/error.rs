//! Feed distribution error types
//!
//! Feed operations themselves never fail: degenerate input resolves to an
//! empty or partial batch. Errors only surface while loading configuration.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DistributionError {
    #[error("Invalid distribution config: {0}")]
    InvalidConfig(String),

    #[error("Environment error: {0}")]
    Env(#[from] envy::Error),
}

pub type Result<T> = std::result::Result<T, DistributionError>;
