//! Plain-text verification reports.
//!
//! Rendering is a pure function of the [`VerificationResult`]; the same
//! result always produces the same text.

use std::fmt::Write;

use crate::result::{CheckState, VerificationResult};

const RULE: &str = "==================================================";

pub fn render_report(result: &VerificationResult) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_report(&mut out, result);
    out
}

fn write_report(out: &mut String, result: &VerificationResult) -> std::fmt::Result {
    let doc = &result.document;

    writeln!(out, "{}", RULE)?;
    writeln!(out, "DOCUMENT VERIFICATION REPORT")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "Status: {}", result.status)?;
    writeln!(out, "Score: {}/100", result.score)?;
    writeln!(out, "Level: {}", result.level)?;
    writeln!(out, "Verified At: {}", result.verified_at)?;

    writeln!(out)?;
    writeln!(out, "Checks:")?;
    for outcome in &result.checks {
        let tag = match outcome.state {
            CheckState::Passed => "PASS",
            CheckState::Failed => "FAIL",
            CheckState::Inconclusive => "SKIP",
        };
        writeln!(out, "  [{}] {} (weight {})", tag, outcome.check.as_str(), outcome.check.weight())?;
    }

    writeln!(out)?;
    writeln!(out, "Errors:")?;
    if result.errors.is_empty() {
        writeln!(out, "  (none)")?;
    }
    for error in &result.errors {
        writeln!(out, "  - {:?}: {}", error.code, error.message)?;
    }

    writeln!(out)?;
    writeln!(out, "Warnings:")?;
    if result.warnings.is_empty() {
        writeln!(out, "  (none)")?;
    }
    for warning in &result.warnings {
        writeln!(out, "  - {:?}: {}", warning.code, warning.message)?;
    }

    writeln!(out)?;
    writeln!(out, "Document Details:")?;
    writeln!(out, "  Document ID: {}", doc.document_id)?;
    writeln!(out, "  Type: {}", doc.document_type)?;
    writeln!(out, "  Title: {}", doc.title)?;
    writeln!(out, "  Issuer: {} ({})", doc.issuer_name, doc.issuer_id)?;
    writeln!(out, "  Subject: {}", doc.subject_id)?;
    writeln!(out, "  Issued At: {}", doc.issued_at)?;
    match doc.expires_at {
        Some(at) => writeln!(out, "  Expires At: {}", at)?,
        None => writeln!(out, "  Expires At: never")?,
    }
    writeln!(out, "  Revoked: {}", yes_no(doc.revoked))?;
    writeln!(out, "  Encrypted: {}", yes_no(doc.encrypted))?;
    writeln!(out, "  Anchored: {}", yes_no(doc.anchored))?;
    writeln!(
        out,
        "  Signer Fingerprint: {}",
        doc.signer_fingerprint.as_deref().unwrap_or("unsigned")
    )?;
    write!(out, "{}", RULE)
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{
        Check, CheckOutcome, DocumentSummary, ErrorCode, Finding, VerificationLevel,
        VerificationStatus,
    };
    use custodia_document::DocumentType;
    use uuid::Uuid;

    fn result() -> VerificationResult {
        VerificationResult {
            level: VerificationLevel::Standard,
            status: VerificationStatus::Failed,
            score: 70,
            checks: vec![
                CheckOutcome {
                    check: Check::SignatureValid,
                    state: CheckState::Passed,
                },
                CheckOutcome {
                    check: Check::NotRevoked,
                    state: CheckState::Failed,
                },
            ],
            errors: vec![Finding {
                code: ErrorCode::DocumentRevoked,
                message: "Document was revoked: superseded".to_string(),
            }],
            warnings: vec![],
            document: DocumentSummary {
                document_id: Uuid::nil(),
                document_type: DocumentType::Prescription,
                title: "Amoxicillin".to_string(),
                issuer_id: "clinic-7".to_string(),
                issuer_name: "Harbor Clinic".to_string(),
                subject_id: "patient-3".to_string(),
                issued_at: 1_000,
                expires_at: None,
                revoked: true,
                encrypted: false,
                anchored: false,
                signer_fingerprint: Some("00ff".to_string()),
            },
            verified_at: 2_000,
        }
    }

    #[test]
    fn test_report_sections() {
        let report = render_report(&result());
        for section in ["Status: FAILED", "Score: 70/100", "Checks:", "Errors:", "Warnings:", "Document Details:"] {
            assert!(report.contains(section), "missing {}", section);
        }
        assert!(report.contains("[FAIL] not_revoked"));
        assert!(report.contains("- DocumentRevoked: Document was revoked: superseded"));
        assert!(report.contains("Issuer: Harbor Clinic (clinic-7)"));
        assert!(report.contains("Expires At: never"));
    }

    #[test]
    fn test_report_is_deterministic() {
        let result = result();
        assert_eq!(render_report(&result), render_report(&result.clone()));
    }
}
