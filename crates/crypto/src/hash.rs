//! BLAKE3 hashing.
//!
//! BLAKE3 is used exclusively for integrity: document canonical hashes,
//! content hashes used as anchor idempotency keys, and provenance seals.
//!
//! [`DigestBuilder`] length-prefixes each field so that `("ab", "c")` and
//! `("a", "bc")` never collide, and distinguishes an absent optional field
//! from an empty one.

use blake3::Hasher;

/// A BLAKE3 hash represented as a 32-byte array.
pub type Blake3Hash = [u8; 32];

/// Identifier recorded in persisted headers.
pub const HASH_ALGORITHM: &str = "BLAKE3";

/// Hash a byte slice.
pub fn hash_bytes(data: &[u8]) -> Blake3Hash {
    *blake3::hash(data).as_bytes()
}

/// Hash a byte slice and hex-encode the digest.
pub fn hash_hex(data: &[u8]) -> String {
    hex::encode(hash_bytes(data))
}

/// Incremental, domain-separated multi-field digest.
pub struct DigestBuilder {
    hasher: Hasher,
}

impl DigestBuilder {
    /// Start a digest under a domain tag, e.g. `custodia.provenance.v1`.
    pub fn new(domain: &str) -> Self {
        let mut builder = Self {
            hasher: Hasher::new(),
        };
        builder.push_bytes(domain.as_bytes());
        builder
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(&(bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    /// Append a byte field.
    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self.hasher.update(&[1u8]);
        self.push_bytes(bytes);
        self
    }

    /// Append a string field.
    pub fn str(self, value: &str) -> Self {
        self.bytes(value.as_bytes())
    }

    /// Append an integer field.
    pub fn u64(self, value: u64) -> Self {
        self.bytes(&value.to_le_bytes())
    }

    /// Append an optional string field; `None` hashes differently from `Some("")`.
    pub fn opt_str(mut self, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.str(v),
            None => {
                self.hasher.update(&[0u8]);
                self
            }
        }
    }

    pub fn finalize(self) -> Blake3Hash {
        *self.hasher.finalize().as_bytes()
    }

    pub fn finalize_hex(self) -> String {
        hex::encode(self.finalize())
    }
}
