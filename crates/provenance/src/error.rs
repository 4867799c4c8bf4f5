//! Provenance errors

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the provenance tracker.
///
/// `ChainLinkageViolation` and `BrokenChain` indicate a forged or
/// out-of-order history and must not be swallowed by callers.
#[derive(Debug, Error)]
pub enum ProvenanceError {
    #[error("Document {document_id} is already registered")]
    AlreadyRegistered { document_id: Uuid },

    #[error("Document {document_id} has no provenance chain")]
    UnknownDocument { document_id: Uuid },

    #[error("Chain linkage violation for document {document_id}: expected hash_before {expected}, got {actual}")]
    ChainLinkageViolation {
        document_id: Uuid,
        expected: String,
        actual: String,
    },

    #[error("Broken provenance chain for document {document_id} at record {index}: {reason}")]
    BrokenChain {
        document_id: Uuid,
        index: usize,
        reason: String,
    },

    #[error("Invalid provenance event: {reason}")]
    InvalidEvent { reason: String },

    #[error("Serialization error: {reason}")]
    Serialization { reason: String },
}

impl From<serde_json::Error> for ProvenanceError {
    fn from(err: serde_json::Error) -> Self {
        ProvenanceError::Serialization {
            reason: err.to_string(),
        }
    }
}

pub type ProvenanceResult<T> = Result<T, ProvenanceError>;
