use thiserror::Error;

use crate::model::capability::Dimension;
use crate::model::entity::{BuildId, PlayerId};

#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("invalid reference data: {0}")]
    ReferenceData(#[from] serde_json::Error),
    #[error("failed to read reference data: {0}")]
    Io(#[from] std::io::Error),
    #[error("duplicate build id `{0}`")]
    DuplicateBuild(BuildId),
    #[error("duplicate player id `{0}`")]
    DuplicatePlayer(PlayerId),
    #[error("objective weight for {dimension} must be non-negative, got {weight}")]
    NegativeWeight { dimension: Dimension, weight: f64 },
    #[error("player `{0}` has no eligible builds")]
    EmptyEligibility(PlayerId),
    #[error("player `{0}` needs a fallback build but the build list is empty")]
    NoFallbackBuild(PlayerId),
}

pub type Result<T> = std::result::Result<T, OptimizerError>;
