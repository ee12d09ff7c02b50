// mascot_sim/src/error.rs

use std::path::PathBuf;

use mascot_core::error::BeliefError;
use mascot_core::planning::PlanningError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("scenario file {0} does not exist")]
    MissingScenario(PathBuf),

    #[error("failed to load scenario: {0}")]
    Load(#[from] figment::Error),

    #[error("failed to serialize scenario: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Parsed fine but describes an impossible mission.
    #[error("invalid scenario: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("belief update failed: {0}")]
    Belief(#[from] BeliefError),

    #[error("planning failed: {0}")]
    Planning(#[from] PlanningError),

    /// The prior covariance could not be factorized even with jitter.
    #[error("could not factorize the {locations}x{locations} truth covariance")]
    TruthFactorization { locations: usize },
}
