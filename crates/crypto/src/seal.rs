//! ChaCha20-Poly1305 content sealing.
//!
//! Document content may be sealed under a per-document [`ContentKey`]. The
//! nonce is random per seal and stored alongside the ciphertext; the
//! authentication tag is kept detached so the persisted form carries
//! `{ciphertext, nonce, tag}` explicitly. Associated data binds the sealed box
//! to its document.

use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    ChaCha20Poly1305, Key, Nonce, Tag,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, CryptoResult};

/// Identifier recorded in persisted content blocks.
pub const AEAD_ALGORITHM: &str = "CHACHA20_POLY1305";

/// Key size for ChaCha20-Poly1305 (256 bits).
pub const KEY_SIZE: usize = 32;

/// Nonce size for ChaCha20-Poly1305 (96 bits / 12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size.
pub const TAG_SIZE: usize = 16;

/// Symmetric content key. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ContentKey([u8; KEY_SIZE]);

impl ContentKey {
    /// Generate a random key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap externally supplied key material.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::MalformedKey {
                reason: format!("Invalid content key length: {} (expected {})", bytes.len(), KEY_SIZE),
            });
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Raw key bytes, for handing to external key storage.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ContentKey(..)")
    }
}

/// Output of [`seal`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBox {
    #[serde(with = "hex")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "hex")]
    pub nonce: Vec<u8>,
    #[serde(with = "hex")]
    pub tag: Vec<u8>,
}

/// Encrypts `plaintext` under `key`, authenticating `aad` as well.
pub fn seal(key: &ContentKey, aad: &[u8], plaintext: &[u8]) -> CryptoResult<SealedBox> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(nonce, aad, &mut buffer)
        .map_err(|e| CryptoError::Encryption {
            reason: e.to_string(),
        })?;

    Ok(SealedBox {
        ciphertext: buffer,
        nonce: nonce_bytes.to_vec(),
        tag: tag.to_vec(),
    })
}

/// Decrypts a sealed box.
///
/// A wrong key, altered ciphertext, nonce, tag or associated data all surface
/// as [`CryptoError::AuthenticationFailure`].
pub fn open(key: &ContentKey, aad: &[u8], sealed: &SealedBox) -> CryptoResult<Vec<u8>> {
    if sealed.nonce.len() != NONCE_SIZE {
        return Err(CryptoError::MalformedSealedBox {
            reason: format!("nonce is {} bytes (expected {})", sealed.nonce.len(), NONCE_SIZE),
        });
    }
    if sealed.tag.len() != TAG_SIZE {
        return Err(CryptoError::MalformedSealedBox {
            reason: format!("tag is {} bytes (expected {})", sealed.tag.len(), TAG_SIZE),
        });
    }

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let nonce = Nonce::from_slice(&sealed.nonce);
    let tag = Tag::from_slice(&sealed.tag);

    let mut buffer = sealed.ciphertext.clone();
    cipher
        .decrypt_in_place_detached(nonce, aad, &mut buffer, tag)
        .map_err(|_| CryptoError::AuthenticationFailure)?;

    Ok(buffer)
}
