//! Signed document container for Custodia.
//!
//! A [`SignedDocument`] binds an issuer's Ed25519 signature to a canonical
//! representation of the document's metadata and content. Content may be
//! sealed with ChaCha20-Poly1305; the content hash may be anchored to an
//! external network through [`AnchorService`].
//!
//! # Lifecycle
//!
//! 1. [`DocumentBuilder`] creates an unsigned document
//! 2. [`SignedDocument::set_content`] stores plaintext or sealed content
//! 3. [`SignedDocument::sign`] signs once; content is frozen from then on
//! 4. [`SignedDocument::anchor`] optionally records the content hash externally
//! 5. [`SignedDocument::revoke`] marks the document revoked without breaking
//!    the signature

pub mod anchor;
pub mod canonical;
pub mod document;
pub mod error;
pub mod model;

pub use anchor::{
    AnchorClient, AnchorConfirmation, AnchorError, AnchorRef, AnchorService, InMemoryAnchorClient,
};
pub use canonical::{canonical_bytes, canonical_hash, content_hash};
pub use document::{DocumentBuilder, SignedDocument};
pub use error::{DocumentError, DocumentResult};
pub use model::{
    ContentAlgorithm, DocumentContent, DocumentHeader, DocumentMetadata, DocumentType,
    HashAlgorithm, Revocation, SignatureAlgorithm, SignatureBlock, FORMAT_VERSION,
};
