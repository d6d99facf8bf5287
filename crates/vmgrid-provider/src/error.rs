//! Provider error types.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by a resource provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("agent state error: {0}")]
    State(#[from] vmgrid_state::StateError),
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound { .. })
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
