//! Signed document container.

use custodia_core::{Clock, EntityRef, SubjectRef, SystemClock};
use custodia_crypto::{
    key_fingerprint, open, parse_verifying_key, seal, verify_digest, ContentKey, DocumentSigner,
    SealedBox,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::anchor::{AnchorRef, AnchorService};
use crate::canonical::{canonical_hash, content_hash};
use crate::error::{DocumentError, DocumentResult};
use crate::model::{
    ContentAlgorithm, DocumentContent, DocumentHeader, DocumentMetadata, DocumentType, Revocation,
    SignatureAlgorithm, SignatureBlock, FORMAT_VERSION,
};

/// A sensitive document: metadata, optionally sealed content, the issuer's
/// signature over the canonical form, and an optional external anchor.
///
/// A document is signed exactly once. After signing, only `revoked` (and its
/// [`Revocation`] record) and the anchor may change; any other edit makes
/// [`verify_signature`](Self::verify_signature) return `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDocument {
    pub header: DocumentHeader,
    pub metadata: DocumentMetadata,
    pub content: DocumentContent,
    pub signature: Option<SignatureBlock>,
    pub anchor: Option<AnchorRef>,
    pub revocation: Option<Revocation>,
}

impl SignedDocument {
    pub fn document_id(&self) -> Uuid {
        self.metadata.document_id
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn is_encrypted(&self) -> bool {
        self.content.is_encrypted()
    }

    fn ensure_unsigned(&self) -> DocumentResult<()> {
        if self.signature.is_some() {
            return Err(DocumentError::AlreadySigned {
                document_id: self.document_id(),
            });
        }
        Ok(())
    }

    /// Store content, sealing it under a freshly generated key when `encrypt`.
    ///
    /// Returns the generated key; the caller hands it to key management.
    pub fn set_content(&mut self, content: &[u8], encrypt: bool) -> DocumentResult<Option<ContentKey>> {
        self.ensure_unsigned()?;

        if !encrypt {
            self.content = DocumentContent::Plaintext {
                data: content.to_vec(),
            };
            return Ok(None);
        }

        let key = ContentKey::generate();
        self.set_content_with_key(content, &key)?;
        Ok(Some(key))
    }

    /// Seal content under an externally supplied key.
    ///
    /// The document id is bound as associated data, so ciphertext moved to
    /// another document fails authentication.
    pub fn set_content_with_key(&mut self, content: &[u8], key: &ContentKey) -> DocumentResult<()> {
        self.ensure_unsigned()?;

        let document_id = self.document_id();
        let SealedBox {
            ciphertext,
            nonce,
            tag,
        } = seal(key, document_id.as_bytes(), content)
            .map_err(|e| DocumentError::from_crypto(e, document_id))?;

        self.content = DocumentContent::Encrypted {
            algorithm: ContentAlgorithm::ChaCha20Poly1305,
            ciphertext,
            nonce,
            tag,
        };
        debug!(document_id = %document_id, "Document content sealed");
        Ok(())
    }

    /// Authenticated decrypt of sealed content.
    ///
    /// A tag mismatch is [`DocumentError::AuthenticationFailure`], a hard
    /// error distinct from an invalid signature.
    pub fn decrypt(&self, key: &ContentKey) -> DocumentResult<Vec<u8>> {
        let document_id = self.document_id();
        match &self.content {
            DocumentContent::Encrypted {
                ciphertext,
                nonce,
                tag,
                ..
            } => {
                let sealed = SealedBox {
                    ciphertext: ciphertext.clone(),
                    nonce: nonce.clone(),
                    tag: tag.clone(),
                };
                open(key, document_id.as_bytes(), &sealed).map_err(|e| {
                    warn!(document_id = %document_id, "Ciphertext failed authentication");
                    DocumentError::from_crypto(e, document_id)
                })
            }
            _ => Err(DocumentError::NotEncrypted { document_id }),
        }
    }

    /// Plaintext content, if the document is not sealed.
    pub fn plaintext(&self) -> Option<&[u8]> {
        match &self.content {
            DocumentContent::Plaintext { data } => Some(data),
            _ => None,
        }
    }

    /// Sign the canonical representation with the issuer's key.
    ///
    /// Fails with [`DocumentError::AlreadySigned`] if a signature exists;
    /// amendments are new documents that set `supersedes`.
    pub fn sign(&mut self, signer: &DocumentSigner) -> DocumentResult<SignatureBlock> {
        self.sign_at(signer, SystemClock.now_ms())
    }

    /// [`sign`](Self::sign) with an explicit signing time.
    pub fn sign_at(&mut self, signer: &DocumentSigner, signed_at: u64) -> DocumentResult<SignatureBlock> {
        self.ensure_unsigned()?;

        let digest = canonical_hash(self)?;
        let block = SignatureBlock {
            algorithm: SignatureAlgorithm::Ed25519,
            signature: signer.sign_digest(&digest).to_vec(),
            public_key: signer.public_key().to_vec(),
            public_key_fingerprint: signer.fingerprint().to_string(),
            signed_at,
        };

        self.signature = Some(block.clone());
        info!(
            document_id = %self.document_id(),
            issuer_id = %self.metadata.issuer.id,
            fingerprint = %block.public_key_fingerprint,
            "Document signed"
        );
        Ok(block)
    }

    /// Check the signature against a caller-supplied verifying key.
    ///
    /// Returns `Ok(false)` for an unsigned or tampered document and `Err`
    /// only when `public_key` itself is malformed.
    pub fn verify_signature(&self, public_key: &[u8]) -> DocumentResult<bool> {
        parse_verifying_key(public_key).map_err(|e| DocumentError::from_crypto(e, self.document_id()))?;

        let Some(block) = &self.signature else {
            return Ok(false);
        };

        let digest = canonical_hash(self)?;
        verify_digest(public_key, &digest, &block.signature)
            .map_err(|e| DocumentError::from_crypto(e, self.document_id()))
    }

    /// Check the signature against the key embedded in the signature block.
    ///
    /// The embedded key must also match the recorded fingerprint. This proves
    /// integrity only; binding the key to a trusted issuer is the trust
    /// registry's job.
    pub fn verify_embedded_signature(&self) -> bool {
        let Some(block) = &self.signature else {
            return false;
        };
        if key_fingerprint(&block.public_key) != block.public_key_fingerprint {
            return false;
        }
        self.verify_signature(&block.public_key).unwrap_or(false)
    }

    /// Fingerprint of the signing key, if signed.
    pub fn signer_fingerprint(&self) -> Option<&str> {
        self.signature
            .as_ref()
            .map(|block| block.public_key_fingerprint.as_str())
    }

    /// Mark the document revoked. Returns `false` if it already was.
    pub fn revoke(&mut self, reason: impl Into<String>, revoked_at: u64) -> bool {
        if self.metadata.revoked {
            return false;
        }
        let reason = reason.into();
        self.metadata.revoked = true;
        info!(document_id = %self.document_id(), reason = %reason, "Document revoked");
        self.revocation = Some(Revocation { revoked_at, reason });
        true
    }

    pub fn is_revoked(&self) -> bool {
        self.metadata.revoked
    }

    /// `true` when `now` is past `expires_at`.
    pub fn is_expired_at(&self, now: u64) -> bool {
        matches!(self.metadata.expires_at, Some(expires_at) if now > expires_at)
    }

    /// Not revoked and not expired at `now`.
    pub fn is_valid_at(&self, now: u64) -> bool {
        !self.metadata.revoked && !self.is_expired_at(now)
    }

    /// Not revoked and not expired right now.
    pub fn is_valid_now(&self) -> bool {
        self.is_valid_at(SystemClock.now_ms())
    }

    /// Hex BLAKE3 hash of the content block.
    pub fn content_hash_hex(&self) -> DocumentResult<String> {
        Ok(hex::encode(content_hash(&self.content)?))
    }

    /// Hex BLAKE3 hash of the canonical signable representation.
    pub fn canonical_hash_hex(&self) -> DocumentResult<String> {
        Ok(hex::encode(canonical_hash(self)?))
    }

    /// Submit the content hash to an anchor service.
    ///
    /// Requires a signed document. If the document already carries an anchor
    /// for its current content hash, that anchor is returned unchanged.
    /// Failure leaves the document untouched and valid.
    pub async fn anchor(&mut self, service: &AnchorService) -> DocumentResult<AnchorRef> {
        if !self.is_signed() {
            return Err(DocumentError::NotSigned {
                document_id: self.document_id(),
            });
        }

        let hash = self.content_hash_hex()?;
        if let Some(existing) = &self.anchor {
            if existing.content_hash == hash {
                return Ok(existing.clone());
            }
        }

        let anchor = service.anchor_hash(&hash).await?;
        info!(
            document_id = %self.document_id(),
            tx_id = %anchor.tx_id,
            network = %anchor.network,
            "Document anchored"
        );
        self.anchor = Some(anchor.clone());
        Ok(anchor)
    }

    /// Serialize to the persisted JSON form.
    pub fn to_json(&self) -> DocumentResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the persisted JSON form, rejecting unknown format versions.
    pub fn from_json(json: &str) -> DocumentResult<Self> {
        let document: SignedDocument = serde_json::from_str(json)?;
        if document.header.format_version != FORMAT_VERSION {
            return Err(DocumentError::UnsupportedVersion {
                found: document.header.format_version,
                supported: FORMAT_VERSION,
            });
        }
        Ok(document)
    }
}

/// Builder for new, unsigned documents.
pub struct DocumentBuilder {
    document_id: Uuid,
    document_type: DocumentType,
    title: String,
    description: String,
    issuer: EntityRef,
    subject: SubjectRef,
    issued_at: Option<u64>,
    expires_at: Option<u64>,
    supersedes: Option<Uuid>,
}

impl DocumentBuilder {
    pub fn new(document_type: DocumentType, issuer: EntityRef, subject: SubjectRef) -> Self {
        Self {
            document_id: Uuid::new_v4(),
            document_type,
            title: String::new(),
            description: String::new(),
            issuer,
            subject,
            issued_at: None,
            expires_at: None,
            supersedes: None,
        }
    }

    /// Use a fixed id instead of a random v4 UUID.
    pub fn document_id(mut self, document_id: Uuid) -> Self {
        self.document_id = document_id;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Issue time; defaults to now.
    pub fn issued_at(mut self, issued_at: u64) -> Self {
        self.issued_at = Some(issued_at);
        self
    }

    pub fn expires_at(mut self, expires_at: u64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Mark this document as an amendment of `previous`.
    pub fn supersedes(mut self, previous: Uuid) -> Self {
        self.supersedes = Some(previous);
        self
    }

    pub fn build(self) -> DocumentResult<SignedDocument> {
        if self.title.trim().is_empty() {
            return Err(invalid("title", "must not be empty"));
        }
        if self.issuer.id.trim().is_empty() {
            return Err(invalid("issuer.id", "must not be empty"));
        }
        if self.subject.id.trim().is_empty() {
            return Err(invalid("subject.id", "must not be empty"));
        }

        let issued_at = self.issued_at.unwrap_or_else(|| SystemClock.now_ms());
        if let Some(expires_at) = self.expires_at {
            if expires_at <= issued_at {
                return Err(invalid("expires_at", "must be after issued_at"));
            }
        }
        if self.supersedes == Some(self.document_id) {
            return Err(invalid("supersedes", "a document cannot supersede itself"));
        }

        Ok(SignedDocument {
            header: DocumentHeader::default(),
            metadata: DocumentMetadata {
                document_id: self.document_id,
                document_type: self.document_type,
                title: self.title,
                description: self.description,
                issuer: self.issuer,
                subject: self.subject,
                issued_at,
                expires_at: self.expires_at,
                revoked: false,
                supersedes: self.supersedes,
            },
            content: DocumentContent::Empty,
            signature: None,
            anchor: None,
            revocation: None,
        })
    }
}

fn invalid(field: &str, reason: &str) -> DocumentError {
    DocumentError::InvalidField {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUED: u64 = 1_700_000_000_000;

    fn builder() -> DocumentBuilder {
        DocumentBuilder::new(
            DocumentType::MedicalRecord,
            EntityRef::new("hosp-1", "General Hospital"),
            SubjectRef::new("pat-1", "Pat Doe"),
        )
        .title("Discharge summary")
        .issued_at(ISSUED)
    }

    fn signed(content: &[u8]) -> (SignedDocument, DocumentSigner) {
        let signer = DocumentSigner::from_key(&[3u8; 32]).unwrap();
        let mut doc = builder().build().unwrap();
        doc.set_content(content, false).unwrap();
        doc.sign_at(&signer, ISSUED).unwrap();
        (doc, signer)
    }

    #[test]
    fn test_sign_and_verify() {
        let (doc, signer) = signed(b"vitals stable");
        assert!(doc.verify_signature(&signer.public_key()).unwrap());
        assert!(doc.verify_embedded_signature());
        assert_eq!(doc.signer_fingerprint(), Some(signer.fingerprint()));
    }

    #[test]
    fn test_sign_once() {
        let (mut doc, signer) = signed(b"x");
        assert!(matches!(
            doc.sign(&signer),
            Err(DocumentError::AlreadySigned { .. })
        ));
        assert!(matches!(
            doc.set_content(b"y", false),
            Err(DocumentError::AlreadySigned { .. })
        ));
    }

    #[test]
    fn test_wrong_key_is_false() {
        let (doc, _) = signed(b"x");
        let other = DocumentSigner::from_key(&[4u8; 32]).unwrap();
        assert!(!doc.verify_signature(&other.public_key()).unwrap());
    }

    #[test]
    fn test_malformed_key_is_error() {
        let (doc, _) = signed(b"x");
        assert!(matches!(
            doc.verify_signature(&[1u8; 7]),
            Err(DocumentError::MalformedKey { .. })
        ));
    }

    #[test]
    fn test_unsigned_is_false() {
        let doc = builder().build().unwrap();
        let signer = DocumentSigner::generate();
        assert!(!doc.verify_signature(&signer.public_key()).unwrap());
        assert!(!doc.verify_embedded_signature());
    }

    #[test]
    fn test_content_tamper_detected() {
        let (mut doc, signer) = signed(b"dose: 5mg");
        doc.content = DocumentContent::Plaintext {
            data: b"dose: 50mg".to_vec(),
        };
        assert!(!doc.verify_signature(&signer.public_key()).unwrap());
    }

    #[test]
    fn test_metadata_tamper_detected() {
        let (mut doc, signer) = signed(b"x");
        doc.metadata.subject.id = "pat-2".to_string();
        assert!(!doc.verify_signature(&signer.public_key()).unwrap());
    }

    #[test]
    fn test_swapped_embedded_key_detected() {
        let (mut doc, _) = signed(b"x");
        let attacker = DocumentSigner::generate();
        if let Some(block) = doc.signature.as_mut() {
            block.public_key = attacker.public_key().to_vec();
        }
        // Fingerprint no longer matches the embedded key
        assert!(!doc.verify_embedded_signature());
    }

    #[test]
    fn test_revocation_keeps_signature_valid() {
        let (mut doc, signer) = signed(b"x");
        assert!(doc.revoke("superseded", ISSUED + 10));
        assert!(!doc.revoke("again", ISSUED + 20));

        assert!(doc.is_revoked());
        assert_eq!(doc.revocation.as_ref().unwrap().reason, "superseded");
        assert!(doc.verify_signature(&signer.public_key()).unwrap());
        assert!(!doc.is_valid_at(ISSUED + 30));
    }

    #[test]
    fn test_expiry() {
        let doc = builder().expires_at(ISSUED + 1_000).build().unwrap();
        assert!(doc.is_valid_at(ISSUED + 1_000));
        assert!(!doc.is_valid_at(ISSUED + 1_001));

        let forever = builder().build().unwrap();
        assert!(forever.is_valid_at(u64::MAX));
    }

    #[test]
    fn test_encrypted_round_trip() {
        let signer = DocumentSigner::generate();
        let mut doc = builder().build().unwrap();
        let key = doc.set_content(b"HIV: negative", true).unwrap().unwrap();
        doc.sign(&signer).unwrap();

        assert!(doc.is_encrypted());
        assert!(doc.plaintext().is_none());
        assert_eq!(doc.decrypt(&key).unwrap(), b"HIV: negative".to_vec());
        assert!(doc.verify_embedded_signature());
    }

    #[test]
    fn test_tampered_ciphertext_is_authentication_failure() {
        let mut doc = builder().build().unwrap();
        let key = doc.set_content(b"secret", true).unwrap().unwrap();
        if let DocumentContent::Encrypted { ciphertext, .. } = &mut doc.content {
            ciphertext[0] ^= 0x80;
        }
        assert!(matches!(
            doc.decrypt(&key),
            Err(DocumentError::AuthenticationFailure { .. })
        ));
    }

    #[test]
    fn test_ciphertext_bound_to_document() {
        let mut a = builder().build().unwrap();
        let mut b = builder().build().unwrap();
        let key = ContentKey::generate();
        a.set_content_with_key(b"secret", &key).unwrap();
        b.content = a.content.clone();

        assert!(matches!(
            b.decrypt(&key),
            Err(DocumentError::AuthenticationFailure { .. })
        ));
    }

    #[test]
    fn test_decrypt_plaintext_is_error() {
        let (doc, _) = signed(b"x");
        assert!(matches!(
            doc.decrypt(&ContentKey::generate()),
            Err(DocumentError::NotEncrypted { .. })
        ));
    }

    #[test]
    fn test_builder_validation() {
        assert!(builder().title("  ").build().is_err());
        assert!(builder().expires_at(ISSUED).build().is_err());

        let id = Uuid::new_v4();
        assert!(builder().document_id(id).supersedes(id).build().is_err());
    }

    #[test]
    fn test_json_round_trip_keeps_signature_valid() {
        let (mut doc, signer) = signed(b"x");
        doc.revoke("lost", ISSUED + 5);

        let json = doc.to_json().unwrap();
        let restored = SignedDocument::from_json(&json).unwrap();

        assert_eq!(restored, doc);
        assert!(restored.verify_signature(&signer.public_key()).unwrap());
    }

    #[test]
    fn test_unknown_version_rejected() {
        let (mut doc, _) = signed(b"x");
        doc.header.format_version = 99;
        let json = serde_json::to_string(&doc).unwrap();
        assert!(matches!(
            SignedDocument::from_json(&json),
            Err(DocumentError::UnsupportedVersion { found: 99, .. })
        ));
    }
}
