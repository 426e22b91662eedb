//! Error types for the batch engine

use thiserror::Error;

use crate::graph::EntityId;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Node not found: {0}")]
    NodeNotFound(u64),

    #[error("Relationship not found: {0}")]
    RelationshipNotFound(u64),

    #[error("Node {0} still has relationships")]
    NodeHasRelationships(u64),

    #[error("Reference '{0}' is not bound in this batch")]
    UnboundReference(String),

    #[error("Reference '{name}' is not a {expected}")]
    ReferenceKind { name: String, expected: &'static str },

    #[error("Unknown opcode: {0}")]
    UnknownOpcode(String),

    #[error("Invalid command #{index}: {reason}")]
    InvalidCommand { index: usize, reason: String },

    #[error("Error updating elements, {selected} selected but {provided} update-data entries")]
    CountMismatch { selected: usize, provided: usize },

    #[error("Error updating elements, more than {provided} selected but {provided} update-data entries")]
    SelectionExceedsPayload { provided: usize },

    #[error("Index error: {0}")]
    Index(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Invalid output format: {0}")]
    Format(String),

    #[error("Operation not allowed in read-only mode")]
    ReadOnlyMode,

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphError {
    /// Not-found error for either kind of entity
    pub fn not_found(entity: EntityId) -> Self {
        match entity {
            EntityId::Node(id) => GraphError::NodeNotFound(id.0),
            EntityId::Relationship(id) => GraphError::RelationshipNotFound(id.0),
        }
    }

    /// Get error code for the out-of-band error signal
    pub fn code(&self) -> &'static str {
        match self {
            GraphError::NodeNotFound(_) | GraphError::RelationshipNotFound(_) => "NOT_FOUND",
            GraphError::NodeHasRelationships(_) => "NODE_HAS_RELATIONSHIPS",
            GraphError::UnboundReference(_) | GraphError::ReferenceKind { .. } => "BAD_REFERENCE",
            GraphError::UnknownOpcode(_) => "UNKNOWN_OPCODE",
            GraphError::InvalidCommand { .. } => "INVALID_COMMAND",
            GraphError::CountMismatch { .. } | GraphError::SelectionExceedsPayload { .. } => "COUNT_MISMATCH",
            GraphError::Index(_) => "INDEX_ERROR",
            GraphError::Query(_) => "QUERY_FAILED",
            GraphError::Format(_) => "INVALID_FORMAT",
            GraphError::ReadOnlyMode => "READ_ONLY_MODE",
            GraphError::Io(_) => "IO_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(GraphError::NodeNotFound(3).code(), "NOT_FOUND");
        assert_eq!(GraphError::ReadOnlyMode.code(), "READ_ONLY_MODE");
        assert_eq!(
            GraphError::CountMismatch { selected: 3, provided: 2 }.code(),
            "COUNT_MISMATCH"
        );
        assert_eq!(GraphError::Transaction("x".into()).code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_count_mismatch_message() {
        let err = GraphError::CountMismatch { selected: 3, provided: 2 };
        assert!(err.to_string().contains("3 selected but 2 update-data entries"));

        let err = GraphError::SelectionExceedsPayload { provided: 2 };
        assert_eq!(err.code(), "COUNT_MISMATCH");
        assert!(err.to_string().contains("more than 2 selected but 2 update-data entries"));
    }
}
