//! Planner error type.

use crate::artifacts::ArtifactError;
use crate::domain::DomainError;
use crate::routes::ServiceError;

use super::config::ConfigError;

/// Errors that abort a planning phase.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("route service error: {0}")]
    Service(#[from] ServiceError),

    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
