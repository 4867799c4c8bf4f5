//! Tampering with persisted documents and provenance chains.

use crate::test_utils::{Deployment, TestIssuer, EPOCH};
use custodia_core::{EntityType, SubjectRef};
use custodia_document::{DocumentContent, DocumentError, DocumentType, SignedDocument};
use custodia_provenance::{ProvenanceAction, ProvenanceError, ProvenanceEvent, ProvenanceTracker};
use custodia_verify::{ErrorCode, VerificationLevel, VerificationStatus};
use serde_json::Value;

fn issue(encrypt: bool) -> (TestIssuer, SignedDocument) {
    let clinic = TestIssuer::new("clinic-7", "Harbor Clinic", EntityType::Clinic);
    let doc = clinic.issue(
        SubjectRef::new("patient-q", "Patient Q"),
        DocumentType::Prescription,
        "Amoxicillin 500mg",
        b"take one capsule three times daily",
        EPOCH,
        encrypt,
    );
    (clinic, doc)
}

fn edit_json(doc: &SignedDocument, edit: impl FnOnce(&mut Value)) -> SignedDocument {
    let mut value: Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
    edit(&mut value);
    SignedDocument::from_json(&value.to_string()).unwrap()
}

#[tokio::test]
async fn test_persisted_document_round_trips_and_verifies() {
    let deployment = Deployment::new();
    let (_, doc) = issue(true);

    let restored = SignedDocument::from_json(&doc.to_json().unwrap()).unwrap();
    assert_eq!(restored, doc);
    let result = deployment.verifier.verify(&restored, VerificationLevel::Standard).await;
    assert_eq!(result.status, VerificationStatus::Passed);
}

#[tokio::test]
async fn test_edited_metadata_fails_signature() {
    let deployment = Deployment::new();
    let (_, doc) = issue(false);

    let forged = edit_json(&doc, |v| {
        v["metadata"]["title"] = Value::String("Oxycodone 80mg".to_string());
    });
    let result = deployment.verifier.verify(&forged, VerificationLevel::Basic).await;
    assert_eq!(result.status, VerificationStatus::Failed);
    assert!(result.has_error(ErrorCode::SignatureInvalid));
}

#[tokio::test]
async fn test_revocation_flag_does_not_break_signature() {
    let deployment = Deployment::new();
    let (_, doc) = issue(false);

    let revoked = edit_json(&doc, |v| {
        v["metadata"]["revoked"] = Value::Bool(true);
    });
    let result = deployment.verifier.verify(&revoked, VerificationLevel::Standard).await;
    assert!(result.signature_valid());
    assert!(result.has_error(ErrorCode::DocumentRevoked));
}

#[test]
fn test_altered_ciphertext_aborts_decryption() {
    let clinic = TestIssuer::new("clinic-7", "Harbor Clinic", EntityType::Clinic);
    let mut doc = custodia_document::DocumentBuilder::new(
        DocumentType::Prescription,
        clinic.entity.to_ref(),
        SubjectRef::new("patient-q", "Patient Q"),
    )
    .title("Amoxicillin 500mg")
    .issued_at(EPOCH)
    .build()
    .unwrap();
    let key = doc
        .set_content(b"take one capsule three times daily", true)
        .unwrap()
        .unwrap();
    doc.sign_at(&clinic.signer, EPOCH).unwrap();
    assert_eq!(doc.decrypt(&key).unwrap(), b"take one capsule three times daily");

    let mut tampered = doc.clone();
    if let DocumentContent::Encrypted { ciphertext, .. } = &mut tampered.content {
        ciphertext[0] ^= 0x01;
    }
    assert!(matches!(
        tampered.decrypt(&key),
        Err(DocumentError::AuthenticationFailure { .. })
    ));
    assert!(!tampered.verify_embedded_signature());
}

#[test]
fn test_signed_document_is_frozen() {
    let (clinic, mut doc) = issue(false);
    assert!(matches!(
        doc.sign(&clinic.signer),
        Err(DocumentError::AlreadySigned { .. })
    ));
    assert!(matches!(
        doc.set_content(b"changed", false),
        Err(DocumentError::AlreadySigned { .. })
    ));
}

#[test]
fn test_edited_provenance_export_is_rejected() {
    let deployment = Deployment::new();
    let (_, doc) = issue(false);
    let id = doc.document_id();
    let hash = doc.content_hash_hex().unwrap();

    deployment
        .provenance
        .register_document(id, "clinic-7", "emr", &hash)
        .unwrap();
    deployment
        .provenance
        .track_document_copy(id, "clinic-7", "emr", "pharmacy")
        .unwrap();
    deployment
        .provenance
        .track_document_access(id, "pharmacist", "pharmacy")
        .unwrap();

    let export = deployment.provenance.export_chain(id).unwrap();

    let clean = ProvenanceTracker::new();
    assert_eq!(clean.import_chain(&export).unwrap(), id);
    assert!(clean.verify_chain_integrity(id));

    let mut records: Value = serde_json::from_str(&export).unwrap();
    records[1]["hash_after"] = Value::String("ff".repeat(32));
    let tampered = ProvenanceTracker::new();
    assert!(matches!(
        tampered.import_chain(&records.to_string()),
        Err(ProvenanceError::BrokenChain { .. })
    ));
    assert!(!tampered.is_registered(id));
    assert_eq!(tampered.metrics().chain_breaks_detected_total, 1);
}

#[test]
fn test_stale_append_is_a_linkage_violation() {
    let deployment = Deployment::new();
    let (_, doc) = issue(false);
    let id = doc.document_id();
    let hash = doc.content_hash_hex().unwrap();
    let provenance = &deployment.provenance;

    provenance.register_document(id, "clinic-7", "emr", &hash).unwrap();
    provenance
        .track_document_modification(id, "clinic-7", "emr", &"ab".repeat(32))
        .unwrap();

    let stale = ProvenanceEvent::new(ProvenanceAction::Copied, "clinic-7", "emr")
        .destination("backup")
        .expect_hash_before(hash.as_str());
    assert!(matches!(
        provenance.track_event(id, stale),
        Err(ProvenanceError::ChainLinkageViolation { .. })
    ));
    assert_eq!(provenance.get_document_history(id).unwrap().len(), 2);
}
