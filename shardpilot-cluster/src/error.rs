//! Error types for cluster model setup
//!
//! Setup operations return explicit errors instead of sentinel ids; name
//! lookups that can simply miss return `Option` instead.

use thiserror::Error;

/// Model errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Unknown database: {0}")]
    UnknownDatabase(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Replication factor {replication_factor} not in 1..={servers}")]
    ReplicationOutOfRange {
        replication_factor: usize,
        servers: usize,
    },

    #[error("Collection needs at least one shard")]
    EmptyCollection,

    #[error("Expected {expected} placement probabilities, got {actual}")]
    ProbabilityCount { expected: usize, actual: usize },

    #[error("Placement probabilities must have a positive sum")]
    DegenerateProbabilities,
}

pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelError::ReplicationOutOfRange {
            replication_factor: 5,
            servers: 3,
        };
        assert_eq!(err.to_string(), "Replication factor 5 not in 1..=3");
    }
}
