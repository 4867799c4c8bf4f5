//! Crypto error types

use thiserror::Error;

/// Errors raised by cryptographic primitives.
///
/// An invalid signature is deliberately absent: signature checks report
/// `Ok(false)` so callers can treat tampering as an expected condition.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Malformed key: {reason}")]
    MalformedKey { reason: String },

    #[error("Authentication tag mismatch: ciphertext or associated data was altered")]
    AuthenticationFailure,

    #[error("Encryption failed: {reason}")]
    Encryption { reason: String },

    #[error("Malformed sealed box: {reason}")]
    MalformedSealedBox { reason: String },
}

pub type CryptoResult<T> = Result<T, CryptoError>;
