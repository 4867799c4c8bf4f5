//! Consent errors
//!
//! A denied or expired consent is not an error; `verify_consent` returns
//! `false` for it.

use thiserror::Error;
use uuid::Uuid;

use crate::model::ConsentStatus;

#[derive(Debug, Error)]
pub enum ConsentError {
    #[error("Unknown consent {consent_id}")]
    UnknownConsent { consent_id: Uuid },

    #[error("Consent {consent_id} cannot move from {from} to {to}")]
    InvalidTransition {
        consent_id: Uuid,
        from: ConsentStatus,
        to: ConsentStatus,
    },

    #[error("Invalid consent scope: {reason}")]
    InvalidScope { reason: String },

    #[error("Invalid consent request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Break-glass access requires an attached audit logger")]
    AuditRequired,

    #[error("Serialization error: {reason}")]
    Serialization { reason: String },
}

impl From<serde_json::Error> for ConsentError {
    fn from(err: serde_json::Error) -> Self {
        ConsentError::Serialization {
            reason: err.to_string(),
        }
    }
}

pub type ConsentResult<T> = Result<T, ConsentError>;
