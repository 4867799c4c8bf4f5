//! Persisted document container types.
//!
//! The JSON form of [`SignedDocument`](crate::SignedDocument) is laid out in
//! blocks: `header`, `metadata`, `content`, `signature`, `anchor`,
//! `revocation`. Binary fields are hex encoded.

use custodia_core::{EntityRef, SubjectRef};
use custodia_crypto::{AEAD_ALGORITHM, HASH_ALGORITHM, SIGNATURE_ALGORITHM};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Current persisted format version.
pub const FORMAT_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "BLAKE3")]
    Blake3,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Blake3 => HASH_ALGORITHM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    #[serde(rename = "ED25519")]
    Ed25519,
}

impl SignatureAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Ed25519 => SIGNATURE_ALGORITHM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentAlgorithm {
    #[serde(rename = "CHACHA20_POLY1305")]
    ChaCha20Poly1305,
}

impl ContentAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentAlgorithm::ChaCha20Poly1305 => AEAD_ALGORITHM,
        }
    }
}

/// Format version and algorithm identifiers. Part of the signed bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHeader {
    pub format_version: u16,
    pub hash_algorithm: HashAlgorithm,
    pub signature_algorithm: SignatureAlgorithm,
}

impl Default for DocumentHeader {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            hash_algorithm: HashAlgorithm::Blake3,
            signature_algorithm: SignatureAlgorithm::Ed25519,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    MedicalRecord,
    LabResult,
    Prescription,
    ImmunizationRecord,
    BirthCertificate,
    DriversLicense,
    Passport,
    TaxReturn,
    Diploma,
    ProfessionalLicense,
    InsuranceCard,
    Other,
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentType::MedicalRecord => "MEDICAL_RECORD",
            DocumentType::LabResult => "LAB_RESULT",
            DocumentType::Prescription => "PRESCRIPTION",
            DocumentType::ImmunizationRecord => "IMMUNIZATION_RECORD",
            DocumentType::BirthCertificate => "BIRTH_CERTIFICATE",
            DocumentType::DriversLicense => "DRIVERS_LICENSE",
            DocumentType::Passport => "PASSPORT",
            DocumentType::TaxReturn => "TAX_RETURN",
            DocumentType::Diploma => "DIPLOMA",
            DocumentType::ProfessionalLicense => "PROFESSIONAL_LICENSE",
            DocumentType::InsuranceCard => "INSURANCE_CARD",
            DocumentType::Other => "OTHER",
        };
        f.write_str(name)
    }
}

/// Descriptive block. Everything except `revoked` is covered by the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub document_id: Uuid,
    pub document_type: DocumentType,
    pub title: String,
    pub description: String,
    pub issuer: EntityRef,
    pub subject: SubjectRef,
    /// Unix epoch milliseconds
    pub issued_at: u64,
    pub expires_at: Option<u64>,
    /// Monotonic false -> true; the only metadata field outside the signature
    pub revoked: bool,
    /// Previous version this document amends
    pub supersedes: Option<Uuid>,
}

/// Content block: absent, plaintext, or sealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentContent {
    Empty,
    Plaintext {
        #[serde(with = "hex")]
        data: Vec<u8>,
    },
    Encrypted {
        algorithm: ContentAlgorithm,
        #[serde(with = "hex")]
        ciphertext: Vec<u8>,
        #[serde(with = "hex")]
        nonce: Vec<u8>,
        #[serde(with = "hex")]
        tag: Vec<u8>,
    },
}

impl DocumentContent {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, DocumentContent::Encrypted { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DocumentContent::Empty => "EMPTY",
            DocumentContent::Plaintext { .. } => "PLAINTEXT",
            DocumentContent::Encrypted { .. } => "ENCRYPTED",
        }
    }
}

/// Signature block written by [`SignedDocument::sign`](crate::SignedDocument::sign).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBlock {
    pub algorithm: SignatureAlgorithm,
    #[serde(with = "hex")]
    pub signature: Vec<u8>,
    /// Signer's verifying key, so the document verifies on its own
    #[serde(with = "hex")]
    pub public_key: Vec<u8>,
    pub public_key_fingerprint: String,
    pub signed_at: u64,
}

/// Why and when a document was revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    pub revoked_at: u64,
    pub reason: String,
}
