//! A patient's record from issue through consent-gated access.

use crate::test_utils::{Deployment, TestIssuer, EPOCH};
use custodia_consent::{
    ConsentAction, ConsentRequest, ConsentScope, ConsentStatus, ConsentType, DataCategory,
};
use custodia_core::{event_types, EntityType, SubjectRef, MILLIS_PER_DAY};
use custodia_document::DocumentType;
use custodia_provenance::ProvenanceAction;
use custodia_verify::{
    Check, ErrorCode, VerificationLevel, VerificationRequest, VerificationStatus, WarningCode,
};

fn patient() -> SubjectRef {
    SubjectRef::new("patient-p", "Patient P")
}

fn view_records() -> VerificationRequest {
    VerificationRequest::new(VerificationLevel::Strict).with_consent(
        "dr-s",
        DataCategory::MedicalRecords,
        ConsentAction::View,
    )
}

#[tokio::test]
async fn test_standard_verification_of_consented_record() {
    let deployment = Deployment::new();
    let hospital = TestIssuer::new("hosp-1", "General Hospital", EntityType::Hospital);

    let consent = deployment
        .consent
        .grant_consent(
            ConsentRequest::new(
                "patient-p",
                "dr-s",
                ConsentType::Treatment,
                ConsentScope::new([DataCategory::MedicalRecords]),
            )
            .duration_days(365)
            .purpose("ongoing care"),
        )
        .unwrap();
    assert_eq!(consent.status, ConsentStatus::Active);
    assert_eq!(consent.expiration, Some(EPOCH + 365 * MILLIS_PER_DAY));

    let doc = hospital.issue(
        patient(),
        DocumentType::MedicalRecord,
        "Annual physical",
        b"BP 118/76, HR 62",
        EPOCH,
        true,
    );

    let result = deployment.verifier.verify(&doc, VerificationLevel::Standard).await;
    assert_eq!(result.status, VerificationStatus::Passed);
    assert_eq!(result.score, 100);

    let mut revoked = doc.clone();
    revoked.revoke("entered on wrong chart", EPOCH + 1);
    let result = deployment
        .verifier
        .verify(&revoked, VerificationLevel::Standard)
        .await;
    assert_eq!(result.status, VerificationStatus::Failed);
    assert!(result.has_error(ErrorCode::DocumentRevoked));
}

#[tokio::test]
async fn test_full_lifecycle_at_strict_level() {
    let deployment = Deployment::new();
    let hospital = TestIssuer::new("hosp-1", "General Hospital", EntityType::Hospital);
    deployment
        .verifier
        .add_trusted_entity(hospital.entity.clone())
        .unwrap();

    tracing::info!("Step 1: issue, anchor and register the document");
    let mut doc = hospital.issue(
        patient(),
        DocumentType::MedicalRecord,
        "Cardiology consult",
        b"echo normal, EF 60%",
        EPOCH,
        true,
    );
    let anchor = doc.anchor(&deployment.anchors).await.unwrap();
    assert_eq!(anchor.content_hash, doc.content_hash_hex().unwrap());

    let hash = doc.content_hash_hex().unwrap();
    deployment
        .provenance
        .register_document(doc.document_id(), "hosp-1", "ehr-primary", &hash)
        .unwrap();
    deployment
        .provenance
        .track_document_share(doc.document_id(), "patient-p", "ehr-primary", "dr-s-tablet")
        .unwrap();

    tracing::info!("Step 2: without consent STRICT fails even though every other check passes");
    let denied = deployment.verifier.verify_with(&doc, &view_records()).await;
    assert_eq!(denied.status, VerificationStatus::Failed);
    assert!(denied.has_error(ErrorCode::ConsentDenied));
    assert!(denied.signature_valid());
    assert!(denied.issuer_trusted());
    assert!(denied.blockchain_verified());
    assert_eq!(denied.check(Check::ProvenanceIntact), Some(true));

    tracing::info!("Step 3: the patient grants consent");
    let consent = deployment
        .consent
        .grant_consent(
            ConsentRequest::new(
                "patient-p",
                "dr-s",
                ConsentType::Treatment,
                ConsentScope::new([DataCategory::MedicalRecords]),
            )
            .duration_days(30),
        )
        .unwrap();

    let granted = deployment.verifier.verify_with(&doc, &view_records()).await;
    assert_eq!(granted.status, VerificationStatus::Passed, "{:?}", granted.warnings);
    assert_eq!(granted.score, 100);

    deployment
        .provenance
        .track_document_access(doc.document_id(), "dr-s", "dr-s-tablet")
        .unwrap();

    tracing::info!("Step 4: the consent lapses and STRICT fails again");
    deployment.clock.advance(31 * MILLIS_PER_DAY);
    let lapsed = deployment.verifier.verify_with(&doc, &view_records()).await;
    assert!(lapsed.has_error(ErrorCode::ConsentDenied));
    assert_eq!(
        deployment.consent.get_consent(consent.consent_id).unwrap().status,
        ConsentStatus::Expired
    );

    let history = deployment
        .provenance
        .get_document_history(doc.document_id())
        .unwrap();
    let actions: Vec<_> = history.iter().map(|r| r.action).collect();
    assert_eq!(
        actions,
        vec![
            ProvenanceAction::Created,
            ProvenanceAction::Shared,
            ProvenanceAction::Accessed
        ]
    );

    assert_eq!(
        deployment
            .audit
            .events_of_type(event_types::VERIFICATION_FAILED)
            .len(),
        2
    );
    assert_eq!(
        deployment
            .audit
            .events_of_type(event_types::CONSENT_EXPIRED)
            .len(),
        1
    );
}

#[tokio::test]
async fn test_revocation_stops_strict_access() {
    let deployment = Deployment::new();
    let hospital = TestIssuer::new("hosp-1", "General Hospital", EntityType::Hospital);
    deployment
        .verifier
        .add_trusted_entity(hospital.entity.clone())
        .unwrap();
    let doc = hospital.issue(
        patient(),
        DocumentType::MedicalRecord,
        "Imaging follow-up",
        b"no change",
        EPOCH,
        false,
    );

    let consent = deployment
        .consent
        .grant_consent(ConsentRequest::new(
            "patient-p",
            "dr-s",
            ConsentType::Treatment,
            ConsentScope::new([DataCategory::MedicalRecords]),
        ))
        .unwrap();
    assert!(deployment
        .verifier
        .verify_with(&doc, &view_records())
        .await
        .consent_satisfied());

    assert!(deployment
        .consent
        .revoke_consent(consent.consent_id, "patient-p", "changed provider")
        .unwrap());
    assert!(!deployment
        .consent
        .revoke_consent(consent.consent_id, "patient-p", "again")
        .unwrap());

    let result = deployment.verifier.verify_with(&doc, &view_records()).await;
    assert!(result.has_error(ErrorCode::ConsentDenied));

    let summary = deployment.consent.get_consent_summary("patient-p");
    assert_eq!(summary.by_status.get(&ConsentStatus::Revoked), Some(&1));
    assert!(summary.active_recipients.is_empty());
}

#[tokio::test]
async fn test_emergency_access_is_audited_and_reported() {
    let deployment = Deployment::new();
    let hospital = TestIssuer::new("hosp-1", "General Hospital", EntityType::Hospital);
    deployment
        .verifier
        .add_trusted_entity(hospital.entity.clone())
        .unwrap();
    let doc = hospital.issue(
        patient(),
        DocumentType::MedicalRecord,
        "Allergy list",
        b"penicillin",
        EPOCH,
        true,
    );

    deployment
        .consent
        .invoke_break_glass("patient-p", "er-doc", "patient unconscious, allergy check")
        .unwrap();
    assert_eq!(
        deployment
            .audit
            .events_of_type(event_types::BREAK_GLASS_INVOKED)
            .len(),
        1
    );

    let request = VerificationRequest::new(VerificationLevel::Strict)
        .with_consent("er-doc", DataCategory::MedicalRecords, ConsentAction::View)
        .with_emergency_override();
    let result = deployment.verifier.verify_with(&doc, &request).await;
    assert!(result.is_passed());
    assert!(result.has_warning(WarningCode::BreakGlassOverride));

    let report = deployment.verifier.generate_verification_report(&result);
    assert!(report.contains("BreakGlassOverride"));
    assert!(report.contains("PASSED_WITH_WARNINGS"));

    // Break-glass never satisfies an ordinary consent check
    assert!(!deployment.consent.verify_consent(
        "patient-p",
        "er-doc",
        DataCategory::MedicalRecords,
        ConsentAction::View
    ));
}

#[tokio::test]
async fn test_transfer_and_deletion_update_locations() {
    let deployment = Deployment::new();
    let lab = TestIssuer::new("lab-1", "Acme Labs", EntityType::Laboratory);
    let doc = lab.issue(
        patient(),
        DocumentType::LabResult,
        "Lipid panel",
        b"LDL 96",
        EPOCH,
        false,
    );
    let id = doc.document_id();
    let hash = doc.content_hash_hex().unwrap();
    let provenance = &deployment.provenance;

    provenance.register_document(id, "lab-1", "lims", &hash).unwrap();
    provenance.track_document_copy(id, "lab-1", "lims", "portal").unwrap();
    provenance.track_document_transfer(id, "lab-1", "lims", "archive").unwrap();
    provenance.track_document_deletion(id, "patient-p", "portal").unwrap();

    let devices: Vec<_> = provenance
        .get_document_locations(id)
        .unwrap()
        .into_iter()
        .map(|l| l.device_id)
        .collect();
    assert_eq!(devices, vec!["archive".to_string()]);
    assert!(provenance.verify_chain_integrity(id));
    assert_eq!(provenance.metrics().records_appended_total, 3);
}
