//! Scale set orchestrator error types.

use std::fmt;

use thiserror::Error;

use vmgrid_provider::ProviderError;
use vmgrid_state::StateError;

/// Provisioning stage of a replica, used to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Network,
    Storage,
    Os,
    Compute,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Network => "network",
            Stage::Storage => "storage",
            Stage::Os => "os",
            Stage::Compute => "compute",
        })
    }
}

/// Errors that can occur during scale set operations.
#[derive(Debug, Error)]
pub enum ScaleSetError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("scale set already exists: {0}")]
    AlreadyExists(String),

    #[error("scale set not found: {0}")]
    NotFound(String),

    /// The template cannot be applied in `stage`. Raised while provisioning,
    /// so anything created before the check has been rolled back.
    #[error("invalid input: replica {ordinal}: {stage} stage: {reason}")]
    InvalidTemplate {
        ordinal: u32,
        stage: Stage,
        reason: String,
    },

    /// Another request holds the scale set, or changed it underneath this one.
    #[error("scale set {0} is busy with another request")]
    Busy(String),

    #[error("replica {ordinal}: {stage} stage failed: {source}")]
    Stage {
        ordinal: u32,
        stage: Stage,
        #[source]
        source: ProviderError,
    },

    #[error("teardown failed in {stage} stage: {source}")]
    Teardown {
        stage: Stage,
        #[source]
        source: ProviderError,
    },

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

impl ScaleSetError {
    /// Stage a replica-creation failure is tagged with, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ScaleSetError::Stage { stage, .. }
            | ScaleSetError::InvalidTemplate { stage, .. }
            | ScaleSetError::Teardown { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// True for both up-front and per-stage validation failures.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            ScaleSetError::InvalidInput(_) | ScaleSetError::InvalidTemplate { .. }
        )
    }
}

pub type ScaleSetResult<T> = Result<T, ScaleSetError>;
