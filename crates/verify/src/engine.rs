//! Verification engine: runs the leveled check battery over a document.

use custodia_consent::{ConsentAction, ConsentEngine, ConsentQuery, DataCategory};
use custodia_core::{
    event_types, AuditEventBuilder, AuditLogger, Clock, Entity, EventSeverity, SystemClock,
    VerificationConfig,
};
use custodia_crypto::key_fingerprint;
use custodia_document::{AnchorConfirmation, AnchorService, SignedDocument};
use custodia_provenance::{ChainVerification, ProvenanceTracker};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::registry::{InMemoryTrustRegistry, RegistryError, TrustRegistry};
use crate::report::render_report;
use crate::result::{
    compute_score, Check, CheckOutcome, CheckState, DocumentSummary, ErrorCode, Finding,
    VerificationError, VerificationLevel, VerificationResult, VerificationStatus,
    VerificationWarning, WarningCode,
};

/// The (recipient, category, action) triple evaluated at STRICT level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentCheck {
    pub recipient_id: String,
    pub category: DataCategory,
    pub action: ConsentAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub level: VerificationLevel,
    pub consent: Option<ConsentCheck>,
    /// Honour an active break-glass grant when consent is missing
    pub emergency_override: bool,
}

impl VerificationRequest {
    pub fn new(level: VerificationLevel) -> Self {
        Self {
            level,
            consent: None,
            emergency_override: false,
        }
    }

    pub fn with_consent(
        mut self,
        recipient_id: impl Into<String>,
        category: DataCategory,
        action: ConsentAction,
    ) -> Self {
        self.consent = Some(ConsentCheck {
            recipient_id: recipient_id.into(),
            category,
            action,
        });
        self
    }

    pub fn with_emergency_override(mut self) -> Self {
        self.emergency_override = true;
        self
    }
}

/// Accumulates check outcomes and findings for one verification.
#[derive(Default)]
struct Battery {
    checks: Vec<CheckOutcome>,
    errors: Vec<VerificationError>,
    warnings: Vec<VerificationWarning>,
}

impl Battery {
    fn record(&mut self, check: Check, state: CheckState) {
        self.checks.push(CheckOutcome { check, state });
    }

    fn pass(&mut self, check: Check) {
        self.record(check, CheckState::Passed);
    }

    fn fail(&mut self, check: Check, code: ErrorCode, message: impl Into<String>) {
        self.record(check, CheckState::Failed);
        self.errors.push(Finding {
            code,
            message: message.into(),
        });
    }

    fn inconclusive(&mut self, check: Check, code: WarningCode, message: impl Into<String>) {
        self.record(check, CheckState::Inconclusive);
        self.warn(code, message);
    }

    fn warn(&mut self, code: WarningCode, message: impl Into<String>) {
        self.warnings.push(Finding {
            code,
            message: message.into(),
        });
    }
}

/// Verifies documents against signatures, lifecycle state, anchors, the
/// trust registry, provenance and consent.
///
/// Every collaborator is injected. Verification never mutates the document
/// and never fails for an unreachable external service; that only lowers
/// confidence through warnings.
pub struct VerificationEngine {
    registry: Arc<dyn TrustRegistry>,
    consent: Option<Arc<ConsentEngine>>,
    provenance: Option<Arc<ProvenanceTracker>>,
    anchors: Option<Arc<AnchorService>>,
    audit: Option<Arc<dyn AuditLogger>>,
    clock: Arc<dyn Clock>,
    config: VerificationConfig,
}

impl VerificationEngine {
    /// Engine backed by an empty in-memory trust registry.
    pub fn new(config: VerificationConfig) -> Self {
        Self::with_registry(config, Arc::new(InMemoryTrustRegistry::new()))
    }

    pub fn with_registry(config: VerificationConfig, registry: Arc<dyn TrustRegistry>) -> Self {
        Self {
            registry,
            consent: None,
            provenance: None,
            anchors: None,
            audit: None,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_consent_engine(mut self, consent: Arc<ConsentEngine>) -> Self {
        self.consent = Some(consent);
        self
    }

    pub fn with_provenance_tracker(mut self, provenance: Arc<ProvenanceTracker>) -> Self {
        self.provenance = Some(provenance);
        self
    }

    pub fn with_anchor_service(mut self, anchors: Arc<AnchorService>) -> Self {
        self.anchors = Some(anchors);
        self
    }

    pub fn with_audit_logger(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    /// Register an issuer as trusted.
    ///
    /// Returns `false` when the identical entity was already registered.
    pub fn add_trusted_entity(&self, entity: Entity) -> Result<bool, RegistryError> {
        let id = entity.id.clone();
        let fingerprint = entity.public_key_fingerprint.clone();
        let added = self.registry.add(entity)?;

        if added {
            info!(entity_id = %id, fingerprint = %fingerprint, "Trusted entity added");
            if let Some(audit) = &self.audit {
                audit.log_event(
                    AuditEventBuilder::new(event_types::TRUSTED_ENTITY_ADDED, "system")
                        .action("add_trusted_entity")
                        .resource("entity", id)
                        .severity(EventSeverity::Info)
                        .timestamp(self.clock.now_ms())
                        .extra("fingerprint", fingerprint)
                        .build(),
                );
            }
        }
        Ok(added)
    }

    pub async fn verify(&self, document: &SignedDocument, level: VerificationLevel) -> VerificationResult {
        self.verify_with(document, &VerificationRequest::new(level)).await
    }

    /// Run the battery for `request.level`.
    ///
    /// BASIC: signature, expiry. STANDARD adds revocation. COMPREHENSIVE adds
    /// anchor, issuer trust and (with a tracker attached) provenance. STRICT
    /// adds consent for the requested triple.
    pub async fn verify_with(
        &self,
        document: &SignedDocument,
        request: &VerificationRequest,
    ) -> VerificationResult {
        let now = self.clock.now_ms();
        let level = request.level;
        let mut battery = Battery::default();

        self.check_signature(document, &mut battery);
        self.check_expiry(document, now, &mut battery);

        if level >= VerificationLevel::Standard {
            check_revocation(document, &mut battery);
        }

        if level >= VerificationLevel::Comprehensive {
            self.check_anchor(document, &mut battery).await;
            self.check_issuer(document, &mut battery);
            self.check_provenance(document, &mut battery);
        }

        if level >= VerificationLevel::Strict {
            self.check_consent(document, request, now, &mut battery);
        }

        let result = self.finish(document, level, now, battery);
        self.log_result(&result, request);
        result
    }

    /// Signature and expiry only. Suitable for low-latency paths, never as
    /// the sole gate for consent-sensitive access.
    pub fn verify_quick(&self, document: &SignedDocument) -> bool {
        document.verify_embedded_signature() && !document.is_expired_at(self.clock.now_ms())
    }

    pub fn generate_verification_report(&self, result: &VerificationResult) -> String {
        render_report(result)
    }

    fn check_signature(&self, document: &SignedDocument, battery: &mut Battery) {
        if !document.is_signed() {
            battery.fail(Check::SignatureValid, ErrorCode::SignatureInvalid, "Document is not signed");
        } else if document.verify_embedded_signature() {
            battery.pass(Check::SignatureValid);
        } else {
            battery.fail(
                Check::SignatureValid,
                ErrorCode::SignatureInvalid,
                "Signature does not match document contents",
            );
        }
    }

    fn check_expiry(&self, document: &SignedDocument, now: u64, battery: &mut Battery) {
        let Some(expires_at) = document.metadata.expires_at else {
            battery.pass(Check::NotExpired);
            return;
        };

        if document.is_expired_at(now) {
            battery.fail(
                Check::NotExpired,
                ErrorCode::DocumentExpired,
                format!("Document expired at {}", expires_at),
            );
            return;
        }

        battery.pass(Check::NotExpired);
        if expires_at - now <= self.config.expiry_warning_window_ms {
            battery.warn(
                WarningCode::ExpiresSoon,
                format!("Document expires at {}", expires_at),
            );
        }
    }

    async fn check_anchor(&self, document: &SignedDocument, battery: &mut Battery) {
        let Some(anchor) = &document.anchor else {
            battery.inconclusive(
                Check::BlockchainVerified,
                WarningCode::AnchorMissing,
                "Document has not been anchored",
            );
            return;
        };

        let content_matches = document
            .content_hash_hex()
            .map(|hash| hash == anchor.content_hash)
            .unwrap_or(false);
        if !content_matches {
            battery.fail(
                Check::BlockchainVerified,
                ErrorCode::AnchorMismatch,
                format!("Anchor {} records a different content hash", anchor.tx_id),
            );
            return;
        }

        let Some(anchors) = &self.anchors else {
            battery.inconclusive(
                Check::BlockchainVerified,
                WarningCode::AnchorUnconfirmed,
                "No anchor service available to confirm the anchor",
            );
            return;
        };

        match anchors.confirm(anchor).await {
            AnchorConfirmation::Confirmed { block_number } => {
                if anchor.block_number.map_or(true, |recorded| recorded == block_number) {
                    battery.pass(Check::BlockchainVerified);
                } else {
                    battery.fail(
                        Check::BlockchainVerified,
                        ErrorCode::AnchorMismatch,
                        format!(
                            "Anchor {} confirmed in block {}, document records {:?}",
                            anchor.tx_id, block_number, anchor.block_number
                        ),
                    );
                }
            }
            AnchorConfirmation::Unconfirmed => battery.inconclusive(
                Check::BlockchainVerified,
                WarningCode::AnchorUnconfirmed,
                format!("Anchor {} is not yet confirmed", anchor.tx_id),
            ),
            AnchorConfirmation::Unavailable { reason } => {
                warn!(tx_id = %anchor.tx_id, reason = %reason, "Anchor network unavailable");
                battery.inconclusive(
                    Check::BlockchainVerified,
                    WarningCode::AnchorUnconfirmed,
                    format!("Anchor {} could not be confirmed: {}", anchor.tx_id, reason),
                );
            }
        }
    }

    fn check_issuer(&self, document: &SignedDocument, battery: &mut Battery) {
        let issuer_id = &document.metadata.issuer.id;
        let Some(entity) = self.registry.lookup(issuer_id) else {
            battery.fail(
                Check::IssuerTrusted,
                ErrorCode::IssuerUntrusted,
                format!("Issuer {} is not in the trust registry", issuer_id),
            );
            return;
        };

        // The registered fingerprint must name the key that actually signed
        let bound = document.signature.as_ref().is_some_and(|signature| {
            signature.public_key_fingerprint == entity.public_key_fingerprint
                && key_fingerprint(&signature.public_key) == signature.public_key_fingerprint
        });

        if bound {
            battery.pass(Check::IssuerTrusted);
        } else {
            battery.fail(
                Check::IssuerTrusted,
                ErrorCode::IssuerUntrusted,
                format!("Signing key is not registered for issuer {}", issuer_id),
            );
        }
    }

    fn check_provenance(&self, document: &SignedDocument, battery: &mut Battery) {
        let Some(tracker) = &self.provenance else {
            return;
        };

        match tracker.check_chain(document.document_id()) {
            None => battery.inconclusive(
                Check::ProvenanceIntact,
                WarningCode::ProvenanceUnregistered,
                "Document has no provenance chain",
            ),
            Some(ChainVerification::Intact) => battery.pass(Check::ProvenanceIntact),
            Some(broken) => battery.fail(
                Check::ProvenanceIntact,
                ErrorCode::ProvenanceBroken,
                format!("Provenance chain {}", broken),
            ),
        }
    }

    fn check_consent(
        &self,
        document: &SignedDocument,
        request: &VerificationRequest,
        now: u64,
        battery: &mut Battery,
    ) {
        let Some(wanted) = &request.consent else {
            battery.fail(
                Check::ConsentSatisfied,
                ErrorCode::ConsentNotRequested,
                "STRICT verification needs a recipient, category and action",
            );
            return;
        };

        let Some(engine) = &self.consent else {
            battery.fail(
                Check::ConsentSatisfied,
                ErrorCode::ConsentDenied,
                "No consent engine available",
            );
            return;
        };

        let subject_id = &document.metadata.subject.id;
        let query = ConsentQuery::new(
            subject_id.as_str(),
            wanted.recipient_id.as_str(),
            wanted.category,
            wanted.action,
        )
        .for_document(document.document_id(), document.metadata.issued_at);

        if engine.verify_consent_query(&query) {
            battery.pass(Check::ConsentSatisfied);
            return;
        }

        if request.emergency_override {
            if let Some(access) = engine
                .active_break_glass(subject_id, &wanted.recipient_id)
                .filter(|access| access.is_active_at(now))
            {
                warn!(
                    access_id = %access.access_id,
                    subject_id = %subject_id,
                    recipient_id = %wanted.recipient_id,
                    "Consent satisfied by break-glass override"
                );
                battery.pass(Check::ConsentSatisfied);
                battery.warn(
                    WarningCode::BreakGlassOverride,
                    format!(
                        "Emergency access {} used: {}",
                        access.access_id, access.justification
                    ),
                );
                return;
            }
        }

        battery.fail(
            Check::ConsentSatisfied,
            ErrorCode::ConsentDenied,
            format!(
                "No active consent from {} for {} to {} {}",
                subject_id, wanted.recipient_id, wanted.action, wanted.category
            ),
        );
    }

    fn finish(
        &self,
        document: &SignedDocument,
        level: VerificationLevel,
        now: u64,
        battery: Battery,
    ) -> VerificationResult {
        let score = compute_score(
            &battery.checks,
            battery.warnings.len(),
            self.config.warning_penalty,
        );
        let status = if !battery.errors.is_empty() {
            VerificationStatus::Failed
        } else if !battery.warnings.is_empty() {
            VerificationStatus::PassedWithWarnings
        } else {
            VerificationStatus::Passed
        };

        VerificationResult {
            level,
            status,
            score,
            checks: battery.checks,
            errors: battery.errors,
            warnings: battery.warnings,
            document: DocumentSummary::of(document),
            verified_at: now,
        }
    }

    fn log_result(&self, result: &VerificationResult, request: &VerificationRequest) {
        let document_id = result.document.document_id;
        let error_codes: Vec<String> = result.errors.iter().map(|e| format!("{:?}", e.code)).collect();

        if result.is_passed() {
            debug!(
                document_id = %document_id,
                level = %result.level,
                score = result.score,
                warnings = result.warnings.len(),
                "Document verified"
            );
        } else {
            warn!(
                document_id = %document_id,
                level = %result.level,
                score = result.score,
                errors = ?error_codes,
                "Document failed verification"
            );
        }

        let Some(audit) = &self.audit else {
            return;
        };
        let (event_type, severity) = if result.is_passed() {
            (event_types::VERIFICATION_PASSED, EventSeverity::Info)
        } else {
            (event_types::VERIFICATION_FAILED, EventSeverity::Warning)
        };
        let user_id = request
            .consent
            .as_ref()
            .map(|c| c.recipient_id.clone())
            .unwrap_or_else(|| "system".to_string());

        audit.log_event(
            AuditEventBuilder::new(event_type, user_id)
                .action(format!("verify_{}", result.level.to_string().to_lowercase()))
                .resource("document", document_id.to_string())
                .severity(severity)
                .timestamp(result.verified_at)
                .extra("status", result.status.to_string())
                .extra("score", result.score)
                .extra("errors", error_codes)
                .build(),
        );
    }
}

fn check_revocation(document: &SignedDocument, battery: &mut Battery) {
    if document.is_revoked() {
        let reason = document
            .revocation
            .as_ref()
            .map(|r| r.reason.as_str())
            .unwrap_or("no reason recorded");
        battery.fail(
            Check::NotRevoked,
            ErrorCode::DocumentRevoked,
            format!("Document was revoked: {}", reason),
        );
    } else {
        battery.pass(Check::NotRevoked);
    }
}
