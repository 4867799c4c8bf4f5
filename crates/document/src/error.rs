//! Document container errors

use custodia_crypto::CryptoError;
use thiserror::Error;
use uuid::Uuid;

use crate::anchor::AnchorError;

/// Errors raised by the signed document container.
///
/// A signature that does not verify is not an error; see
/// [`SignedDocument::verify_signature`](crate::SignedDocument::verify_signature).
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Document {document_id} is already signed")]
    AlreadySigned { document_id: Uuid },

    #[error("Document {document_id} is not signed")]
    NotSigned { document_id: Uuid },

    #[error("Document {document_id} content is not encrypted")]
    NotEncrypted { document_id: Uuid },

    /// The AEAD tag did not verify: the ciphertext, nonce, tag or document id
    /// was altered, or the wrong key was supplied.
    #[error("Authentication failure decrypting document {document_id}")]
    AuthenticationFailure { document_id: Uuid },

    #[error("Malformed key: {reason}")]
    MalformedKey { reason: String },

    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Unsupported document format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u16, supported: u16 },

    #[error("Serialization error: {reason}")]
    Serialization { reason: String },

    #[error("Crypto error: {0}")]
    Crypto(CryptoError),

    #[error("Anchor error: {0}")]
    Anchor(#[from] AnchorError),
}

impl DocumentError {
    pub(crate) fn from_crypto(err: CryptoError, document_id: Uuid) -> Self {
        match err {
            // A truncated nonce or tag is tampering just like a flipped bit
            CryptoError::AuthenticationFailure | CryptoError::MalformedSealedBox { .. } => {
                DocumentError::AuthenticationFailure { document_id }
            }
            CryptoError::MalformedKey { reason } => DocumentError::MalformedKey { reason },
            other => DocumentError::Crypto(other),
        }
    }
}

impl From<serde_json::Error> for DocumentError {
    fn from(err: serde_json::Error) -> Self {
        DocumentError::Serialization {
            reason: err.to_string(),
        }
    }
}

pub type DocumentResult<T> = Result<T, DocumentError>;
