//! Canonical signable representation.
//!
//! The signable bytes are the JSON serialization of [`SignablePayload`].
//! Field order is fixed by the struct declaration and no maps are involved,
//! so the encoding is deterministic. `revoked`, the signature block, the
//! anchor and the revocation record are deliberately outside it: they are
//! the only parts of a document allowed to change after signing.

use custodia_core::{EntityRef, SubjectRef};
use custodia_crypto::{hash_bytes, Blake3Hash};
use serde::Serialize;
use uuid::Uuid;

use crate::error::DocumentResult;
use crate::model::{DocumentContent, DocumentHeader, DocumentType};
use crate::SignedDocument;

/// Domain tag mixed into every canonical encoding.
const SIGNING_DOMAIN: &str = "custodia.document.v1";

#[derive(Serialize)]
struct SignablePayload<'a> {
    domain: &'static str,
    header: &'a DocumentHeader,
    document_id: &'a Uuid,
    document_type: DocumentType,
    title: &'a str,
    description: &'a str,
    issuer: &'a EntityRef,
    subject: &'a SubjectRef,
    issued_at: u64,
    expires_at: Option<u64>,
    supersedes: Option<&'a Uuid>,
    content: &'a DocumentContent,
}

/// Deterministic bytes covered by the issuer's signature.
pub fn canonical_bytes(document: &SignedDocument) -> DocumentResult<Vec<u8>> {
    let metadata = &document.metadata;
    let payload = SignablePayload {
        domain: SIGNING_DOMAIN,
        header: &document.header,
        document_id: &metadata.document_id,
        document_type: metadata.document_type,
        title: &metadata.title,
        description: &metadata.description,
        issuer: &metadata.issuer,
        subject: &metadata.subject,
        issued_at: metadata.issued_at,
        expires_at: metadata.expires_at,
        supersedes: metadata.supersedes.as_ref(),
        content: &document.content,
    };
    Ok(serde_json::to_vec(&payload)?)
}

/// BLAKE3 digest of [`canonical_bytes`]; this is what gets signed.
pub fn canonical_hash(document: &SignedDocument) -> DocumentResult<Blake3Hash> {
    Ok(hash_bytes(&canonical_bytes(document)?))
}

/// BLAKE3 digest of the content block alone (ciphertext when sealed).
///
/// Used as the anchor idempotency key and as the provenance content hash.
pub fn content_hash(content: &DocumentContent) -> DocumentResult<Blake3Hash> {
    Ok(hash_bytes(&serde_json::to_vec(content)?))
}
