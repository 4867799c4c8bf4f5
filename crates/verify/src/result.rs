//! Verification levels, checks, findings and results.

use custodia_document::{DocumentType, SignedDocument};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Increasing battery of checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationLevel {
    Basic,
    Standard,
    Comprehensive,
    Strict,
}

impl fmt::Display for VerificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VerificationLevel::Basic => "BASIC",
            VerificationLevel::Standard => "STANDARD",
            VerificationLevel::Comprehensive => "COMPREHENSIVE",
            VerificationLevel::Strict => "STRICT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Passed,
    PassedWithWarnings,
    Failed,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VerificationStatus::Passed => "PASSED",
            VerificationStatus::PassedWithWarnings => "PASSED_WITH_WARNINGS",
            VerificationStatus::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Individual check in the battery, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    SignatureValid,
    NotExpired,
    NotRevoked,
    BlockchainVerified,
    IssuerTrusted,
    ProvenanceIntact,
    ConsentSatisfied,
}

impl Check {
    /// Contribution to the 0-100 score.
    pub fn weight(&self) -> u32 {
        match self {
            Check::SignatureValid => 30,
            Check::NotExpired => 15,
            Check::NotRevoked => 15,
            Check::BlockchainVerified => 10,
            Check::IssuerTrusted => 15,
            Check::ProvenanceIntact => 5,
            Check::ConsentSatisfied => 10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Check::SignatureValid => "signature_valid",
            Check::NotExpired => "not_expired",
            Check::NotRevoked => "not_revoked",
            Check::BlockchainVerified => "blockchain_verified",
            Check::IssuerTrusted => "issuer_trusted",
            Check::ProvenanceIntact => "provenance_intact",
            Check::ConsentSatisfied => "consent_satisfied",
        }
    }
}

/// Result of one check.
///
/// `Inconclusive` checks (for example an unreachable anchor network) read as
/// `false` but are left out of the score; their warning carries the penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckState {
    Passed,
    Failed,
    Inconclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub check: Check,
    pub state: CheckState,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        self.state == CheckState::Passed
    }
}

/// Hard failure. Any error forces `FAILED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    SignatureInvalid,
    DocumentExpired,
    DocumentRevoked,
    AnchorMismatch,
    IssuerUntrusted,
    ProvenanceBroken,
    ConsentDenied,
    ConsentNotRequested,
}

/// Soft finding. Lowers the score, never gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningCode {
    ExpiresSoon,
    AnchorMissing,
    AnchorUnconfirmed,
    ProvenanceUnregistered,
    BreakGlassOverride,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding<C> {
    pub code: C,
    pub message: String,
}

pub type VerificationError = Finding<ErrorCode>;
pub type VerificationWarning = Finding<WarningCode>;

/// Document facts captured at verification time, for the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_id: Uuid,
    pub document_type: DocumentType,
    pub title: String,
    pub issuer_id: String,
    pub issuer_name: String,
    pub subject_id: String,
    pub issued_at: u64,
    pub expires_at: Option<u64>,
    pub revoked: bool,
    pub encrypted: bool,
    pub anchored: bool,
    pub signer_fingerprint: Option<String>,
}

impl DocumentSummary {
    pub fn of(document: &SignedDocument) -> Self {
        let metadata = &document.metadata;
        Self {
            document_id: metadata.document_id,
            document_type: metadata.document_type,
            title: metadata.title.clone(),
            issuer_id: metadata.issuer.id.clone(),
            issuer_name: metadata.issuer.display_name.clone(),
            subject_id: metadata.subject.id.clone(),
            issued_at: metadata.issued_at,
            expires_at: metadata.expires_at,
            revoked: metadata.revoked,
            encrypted: document.is_encrypted(),
            anchored: document.anchor.is_some(),
            signer_fingerprint: document.signer_fingerprint().map(str::to_string),
        }
    }
}

/// Outcome of one verification call. Never mutated after it is returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub level: VerificationLevel,
    pub status: VerificationStatus,
    pub score: u8,
    pub checks: Vec<CheckOutcome>,
    pub errors: Vec<VerificationError>,
    pub warnings: Vec<VerificationWarning>,
    pub document: DocumentSummary,
    pub verified_at: u64,
}

impl VerificationResult {
    pub fn is_passed(&self) -> bool {
        self.status != VerificationStatus::Failed
    }

    /// `Some(passed)` if the check ran at this level.
    pub fn check(&self, check: Check) -> Option<bool> {
        self.checks
            .iter()
            .find(|o| o.check == check)
            .map(CheckOutcome::passed)
    }

    pub fn signature_valid(&self) -> bool {
        self.check(Check::SignatureValid).unwrap_or(false)
    }

    pub fn not_expired(&self) -> bool {
        self.check(Check::NotExpired).unwrap_or(false)
    }

    pub fn not_revoked(&self) -> bool {
        self.check(Check::NotRevoked).unwrap_or(false)
    }

    pub fn blockchain_verified(&self) -> bool {
        self.check(Check::BlockchainVerified).unwrap_or(false)
    }

    pub fn issuer_trusted(&self) -> bool {
        self.check(Check::IssuerTrusted).unwrap_or(false)
    }

    pub fn consent_satisfied(&self) -> bool {
        self.check(Check::ConsentSatisfied).unwrap_or(false)
    }

    pub fn has_error(&self, code: ErrorCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    pub fn has_warning(&self, code: WarningCode) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }
}

/// Weighted pass ratio minus a penalty per warning, clamped to 0..=100.
pub fn compute_score(checks: &[CheckOutcome], warnings: usize, warning_penalty: u8) -> u8 {
    let (passed, evaluated) = checks.iter().fold((0u32, 0u32), |(passed, evaluated), o| {
        match o.state {
            CheckState::Passed => (passed + o.check.weight(), evaluated + o.check.weight()),
            CheckState::Failed => (passed, evaluated + o.check.weight()),
            CheckState::Inconclusive => (passed, evaluated),
        }
    });

    if evaluated == 0 {
        return 0;
    }

    // Round half up
    let base = (200 * passed + evaluated) / (2 * evaluated);
    let penalty = (warnings as u32).saturating_mul(u32::from(warning_penalty));
    base.saturating_sub(penalty).min(100) as u8
}
