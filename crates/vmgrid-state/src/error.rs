//! Error types for the vmgrid object store.

use thiserror::Error;

/// Result type alias for object store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during object store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("record {0} changed since it was read")]
    Stale(String),

    #[error("a record with {field} = {value:?} already exists")]
    Conflict { field: String, value: String },
}
