//! Ed25519 document signing.
//!
//! Issuers sign the BLAKE3 digest of a document's canonical representation.
//! The signer never exposes its private key; verifiers only need the 32-byte
//! verifying key, and identify it by a stable fingerprint.
//!
//! # Security Model
//!
//! - Private keys are generated from the OS RNG or loaded from external key
//!   management; temporary key buffers are zeroized
//! - Signatures are deterministic for the same key and digest
//! - A malformed public key is an error, a non-matching signature is `false`

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::hash::Blake3Hash;

/// Identifier recorded in persisted signature blocks.
pub const SIGNATURE_ALGORITHM: &str = "ED25519";

/// Ed25519 signature length in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Issuer signing key with its cached fingerprint.
pub struct DocumentSigner {
    signing_key: SigningKey,
    fingerprint: String,
}

impl DocumentSigner {
    /// Creates a signer with a freshly generated key.
    ///
    /// For production use, keys should be loaded from external key management.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut secret_key_bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret_key_bytes);

        let signing_key = SigningKey::from_bytes(&secret_key_bytes);
        secret_key_bytes.zeroize();

        Self::from_signing_key(signing_key)
    }

    /// Creates a signer from an existing 32-byte private key.
    ///
    /// # Security
    /// The intermediate key copy is zeroized after use.
    pub fn from_key(key_bytes: &[u8]) -> CryptoResult<Self> {
        if key_bytes.len() != 32 {
            return Err(CryptoError::MalformedKey {
                reason: format!("Invalid key length: {} (expected 32)", key_bytes.len()),
            });
        }

        let mut key_array = [0u8; 32];
        key_array.copy_from_slice(key_bytes);
        let signing_key = SigningKey::from_bytes(&key_array);
        key_array.zeroize();

        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let fingerprint = key_fingerprint(signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            fingerprint,
        }
    }

    /// Verifying key bytes.
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Stable fingerprint of the verifying key.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Signs a BLAKE3 digest.
    pub fn sign_digest(&self, digest: &Blake3Hash) -> [u8; SIGNATURE_SIZE] {
        self.signing_key.sign(digest).to_bytes()
    }
}

impl std::fmt::Debug for DocumentSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSigner")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

/// Stable public key identifier: hex of the first 16 bytes of BLAKE3(key).
pub fn key_fingerprint(public_key: &[u8]) -> String {
    let hash = blake3::hash(public_key);
    hex::encode(&hash.as_bytes()[..16])
}

/// Parses a 32-byte Ed25519 verifying key.
pub fn parse_verifying_key(public_key: &[u8]) -> CryptoResult<VerifyingKey> {
    let bytes: [u8; 32] = public_key
        .try_into()
        .map_err(|_| CryptoError::MalformedKey {
            reason: format!("Invalid public key length: {} (expected 32)", public_key.len()),
        })?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| CryptoError::MalformedKey {
        reason: e.to_string(),
    })
}

/// Verifies a signature over a digest.
///
/// Returns `Err` only when `public_key` is not a valid Ed25519 key. A
/// signature of the wrong length or one that does not verify yields `Ok(false)`.
pub fn verify_digest(public_key: &[u8], digest: &Blake3Hash, signature: &[u8]) -> CryptoResult<bool> {
    let verifying_key = parse_verifying_key(public_key)?;

    let signature = match Signature::from_slice(signature) {
        Ok(s) => s,
        Err(_) => return Ok(false),
    };

    Ok(verifying_key.verify(digest, &signature).is_ok())
}
