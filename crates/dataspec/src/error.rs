//! Error types for the dataspec library.

use std::path::PathBuf;
use thiserror::Error;

use crate::node::NodeId;
use crate::status::State;

/// Main error type for dataspec operations.
#[derive(Debug, Error)]
pub enum DataSpecError {
    /// A transform was applied to inputs of the wrong kind or arity.
    #[error("Contract violation in '{transform}': {message}")]
    ContractViolation { transform: String, message: String },

    /// A transform parameter is missing, unknown or malformed.
    #[error("Invalid parameter '{parameter}' for '{transform}': {message}")]
    InvalidParameter {
        transform: String,
        parameter: String,
        message: String,
    },

    /// A dependency has not reported `ready` for a required task yet.
    #[error("Node {node} is not ready for task '{task}'")]
    NotReady { node: NodeId, task: String },

    /// A dependency reported `error` for a required task.
    #[error("Upstream node {node} failed task '{task}': {reason}")]
    UpstreamFailed {
        node: NodeId,
        task: String,
        reason: String,
    },

    /// A terminal status was asked to change state outside reconciliation.
    #[error("Status of {node} for task '{task}' is already {current}")]
    StatusConflict {
        node: NodeId,
        task: String,
        current: State,
    },

    /// An attribute allocation spends more than the available budget.
    #[error("Budget exceeded: requested {dimension} {requested}, available {available}")]
    BudgetExceeded {
        dimension: &'static str,
        requested: f64,
        available: f64,
    },

    /// A wire payload is malformed or has an incompatible version.
    #[error("Decode error{}: {message}", describe_location(.offset, .version))]
    Decode {
        message: String,
        offset: Option<usize>,
        version: Option<u32>,
    },

    /// The status or node storage backend could not be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// No transform is registered under this name.
    #[error("Transform not found: {0}")]
    TransformNotFound(String),

    /// No node definition is stored under this identity.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// The source connector could not produce a source node.
    #[error("Source error: {0}")]
    Source(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error reading or writing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DataSpecError {
    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DataSpecError::NotReady { .. } | DataSpecError::StoreUnavailable(_)
        )
    }

    pub(crate) fn contract(transform: impl Into<String>, message: impl Into<String>) -> Self {
        DataSpecError::ContractViolation {
            transform: transform.into(),
            message: message.into(),
        }
    }

    pub(crate) fn parameter(
        transform: impl Into<String>,
        parameter: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        DataSpecError::InvalidParameter {
            transform: transform.into(),
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    pub(crate) fn decode(message: impl Into<String>) -> Self {
        DataSpecError::Decode {
            message: message.into(),
            offset: None,
            version: None,
        }
    }
}

impl From<rusqlite::Error> for DataSpecError {
    fn from(err: rusqlite::Error) -> Self {
        DataSpecError::StoreUnavailable(err.to_string())
    }
}

fn describe_location(offset: &Option<usize>, version: &Option<u32>) -> String {
    match (offset, version) {
        (Some(offset), Some(version)) => format!(" at byte {} (version {})", offset, version),
        (Some(offset), None) => format!(" at byte {}", offset),
        (None, Some(version)) => format!(" (version {})", version),
        (None, None) => String::new(),
    }
}

/// Result type alias for dataspec operations.
pub type Result<T> = std::result::Result<T, DataSpecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        let not_ready = DataSpecError::NotReady {
            node: NodeId::from_digest(b"a"),
            task: "compute".to_string(),
        };
        assert!(not_ready.is_retryable());
        assert!(DataSpecError::StoreUnavailable("down".into()).is_retryable());
        assert!(!DataSpecError::contract("protect", "bad input").is_retryable());
        assert!(
            !DataSpecError::BudgetExceeded {
                dimension: "epsilon",
                requested: 2.0,
                available: 1.0
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_decode_message_location() {
        let err = DataSpecError::Decode {
            message: "unexpected end".into(),
            offset: Some(12),
            version: Some(3),
        };
        assert_eq!(
            err.to_string(),
            "Decode error at byte 12 (version 3): unexpected end"
        );
        assert_eq!(
            DataSpecError::decode("bad").to_string(),
            "Decode error: bad"
        );
    }
}
