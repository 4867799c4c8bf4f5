//! Services built from a TOML configuration.

use crate::test_utils::{Deployment, TestIssuer, EPOCH};
use custodia_core::{Config, EntityType, SubjectRef, MILLIS_PER_DAY};
use custodia_document::{DocumentBuilder, DocumentType};
use custodia_verify::{VerificationLevel, VerificationStatus, WarningCode};

const CONFIG: &str = r#"
[anchor]
network = "sepolia-test"
submit_timeout_ms = 2000
confirm_timeout_ms = 500

[anchor.retry]
max_retries = 2
initial_delay_ms = 1
max_delay_ms = 4

[consent]
break_glass_duration_ms = 3600000

[verification]
warning_penalty = 20
expiry_warning_window_ms = 604800000
"#;

#[tokio::test]
async fn test_configured_penalty_and_window() {
    let config = Config::from_toml_str(CONFIG).unwrap();
    let deployment = Deployment::from_config(&config);
    let lab = TestIssuer::new("lab-1", "Acme Labs", EntityType::Laboratory);

    let mut doc = DocumentBuilder::new(
        DocumentType::LabResult,
        lab.entity.to_ref(),
        SubjectRef::new("patient-r", "Patient R"),
    )
    .title("Strep screen")
    .issued_at(EPOCH)
    .expires_at(EPOCH + 5 * MILLIS_PER_DAY)
    .build()
    .unwrap();
    doc.set_content(b"negative", false).unwrap();
    doc.sign_at(&lab.signer, EPOCH).unwrap();

    let result = deployment.verifier.verify(&doc, VerificationLevel::Basic).await;
    assert_eq!(result.status, VerificationStatus::PassedWithWarnings);
    assert!(result.has_warning(WarningCode::ExpiresSoon));
    assert_eq!(result.score, 80);
}

#[tokio::test]
async fn test_anchor_retries_on_configured_network() {
    let config = Config::from_toml_str(CONFIG).unwrap();
    let deployment = Deployment::from_config(&config);
    let lab = TestIssuer::new("lab-1", "Acme Labs", EntityType::Laboratory);
    let mut doc = lab.issue(
        SubjectRef::new("patient-r", "Patient R"),
        DocumentType::LabResult,
        "A1C",
        b"5.4%",
        EPOCH,
        false,
    );

    deployment.anchor_client.fail_next(2);
    let anchor = doc.anchor(&deployment.anchors).await.unwrap();
    assert_eq!(anchor.network, "sepolia-test");
    assert_eq!(deployment.anchor_client.submit_calls(), 3);

    let again = doc.anchor(&deployment.anchors).await.unwrap();
    assert_eq!(again, anchor);
    assert_eq!(deployment.anchor_client.anchored_count(), 1);
}

#[tokio::test]
async fn test_exhausted_retries_leave_document_valid() {
    let config = Config::from_toml_str(CONFIG).unwrap();
    let deployment = Deployment::from_config(&config);
    let lab = TestIssuer::new("lab-1", "Acme Labs", EntityType::Laboratory);
    let mut doc = lab.issue(
        SubjectRef::new("patient-r", "Patient R"),
        DocumentType::LabResult,
        "TSH",
        b"2.1",
        EPOCH,
        false,
    );

    deployment.anchor_client.fail_next(10);
    assert!(doc.anchor(&deployment.anchors).await.is_err());
    assert!(doc.anchor.is_none());

    let result = deployment.verifier.verify(&doc, VerificationLevel::Standard).await;
    assert_eq!(result.status, VerificationStatus::Passed);
}

#[test]
fn test_invalid_config_is_rejected() {
    let bad = CONFIG.replace("warning_penalty = 20", "warning_penalty = 200");
    assert!(Config::from_toml_str(&bad).is_err());

    let partial = Config::from_toml_str("[verification]\nwarning_penalty = 10\n").unwrap();
    assert_eq!(partial.verification.warning_penalty, 10);
    assert_eq!(partial.anchor, Config::default().anchor);
}
