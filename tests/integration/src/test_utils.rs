//! Test utilities for end-to-end integration tests

use custodia_consent::ConsentEngine;
use custodia_core::{
    Config, Entity, EntityType, ManualClock, RecordingAuditLogger, SubjectRef,
};
use custodia_crypto::DocumentSigner;
use custodia_document::{AnchorService, DocumentBuilder, DocumentType, InMemoryAnchorClient, SignedDocument};
use custodia_provenance::ProvenanceTracker;
use custodia_verify::VerificationEngine;
use std::sync::Arc;

/// 2023-11-14T22:13:20Z
pub const EPOCH: u64 = 1_700_000_000_000;

/// Install a test-friendly subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Every service wired once and shared, the way a host process would.
pub struct Deployment {
    pub clock: Arc<ManualClock>,
    pub audit: Arc<RecordingAuditLogger>,
    pub anchor_client: Arc<InMemoryAnchorClient>,
    pub anchors: Arc<AnchorService>,
    pub provenance: Arc<ProvenanceTracker>,
    pub consent: Arc<ConsentEngine>,
    pub verifier: VerificationEngine,
}

impl Deployment {
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    pub fn from_config(config: &Config) -> Self {
        init_tracing();

        let clock = Arc::new(ManualClock::new(EPOCH));
        let audit = Arc::new(RecordingAuditLogger::new());
        let anchor_client = Arc::new(InMemoryAnchorClient::new(config.anchor.network.clone()));
        let anchors = Arc::new(AnchorService::new(anchor_client.clone(), config.anchor.clone()));
        let provenance = Arc::new(
            ProvenanceTracker::with_clock(clock.clone()).with_audit_logger(audit.clone()),
        );
        let consent = Arc::new(
            ConsentEngine::with_clock(config.consent.clone(), clock.clone())
                .with_audit_logger(audit.clone()),
        );
        let verifier = VerificationEngine::new(config.verification.clone())
            .with_clock(clock.clone())
            .with_anchor_service(anchors.clone())
            .with_provenance_tracker(provenance.clone())
            .with_consent_engine(consent.clone())
            .with_audit_logger(audit.clone());

        Self {
            clock,
            audit,
            anchor_client,
            anchors,
            provenance,
            consent,
            verifier,
        }
    }
}

/// An issuing organisation with its signing key.
pub struct TestIssuer {
    pub entity: Entity,
    pub signer: DocumentSigner,
}

impl TestIssuer {
    pub fn new(id: &str, name: &str, entity_type: EntityType) -> Self {
        let signer = DocumentSigner::generate();
        let entity = Entity::new(id, name, entity_type, "US-CA", signer.fingerprint());
        Self { entity, signer }
    }

    /// Build, fill and sign a document at `issued_at`.
    pub fn issue(
        &self,
        subject: SubjectRef,
        document_type: DocumentType,
        title: &str,
        content: &[u8],
        issued_at: u64,
        encrypt: bool,
    ) -> SignedDocument {
        let mut doc = DocumentBuilder::new(document_type, self.entity.to_ref(), subject)
            .title(title)
            .issued_at(issued_at)
            .build()
            .unwrap();
        doc.set_content(content, encrypt).unwrap();
        doc.sign_at(&self.signer, issued_at).unwrap();
        doc
    }
}
