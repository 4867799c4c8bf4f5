//! Cryptographic primitives for Custodia.
//!
//! This crate is the leaf of the trust stack. It holds no state; every
//! function is pure apart from drawing randomness for keys and nonces.
//!
//! # Core Capabilities
//!
//! - **Hashing**: BLAKE3 digests and unambiguous multi-field digests
//! - **Digital Signatures**: Ed25519 signing of digests and key fingerprints
//! - **Authenticated Encryption**: ChaCha20-Poly1305 content sealing
//!
//! # Security Principles
//!
//! - Never roll custom cryptographic primitives
//! - A bad signature is an expected outcome (`Ok(false)`), a bad key is an error
//! - A failed AEAD tag is an error and must abort the caller
//! - Secrets must never be logged and are zeroized on drop

pub mod error;
pub mod hash;
pub mod seal;
pub mod signing;

pub use error::{CryptoError, CryptoResult};
pub use hash::{hash_bytes, hash_hex, Blake3Hash, DigestBuilder, HASH_ALGORITHM};
pub use seal::{open, seal, ContentKey, SealedBox, AEAD_ALGORITHM, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use signing::{
    key_fingerprint, parse_verifying_key, verify_digest, DocumentSigner, SIGNATURE_ALGORITHM,
    SIGNATURE_SIZE,
};
