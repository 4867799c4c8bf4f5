//! Document verification for Custodia.
//!
//! [`VerificationEngine`] applies an increasing battery of checks selected
//! by [`VerificationLevel`]:
//!
//! | Level         | Checks                                               |
//! |---------------|------------------------------------------------------|
//! | BASIC         | signature, expiry                                    |
//! | STANDARD      | + revocation                                         |
//! | COMPREHENSIVE | + anchor, issuer trust, provenance (when attached)   |
//! | STRICT        | + consent for a (recipient, category, action) triple |
//!
//! Errors gate the result to `FAILED`; warnings only lower the score.

pub mod engine;
pub mod registry;
pub mod report;
pub mod result;

pub use engine::{ConsentCheck, VerificationEngine, VerificationRequest};
pub use registry::{InMemoryTrustRegistry, RegistryError, TrustRegistry};
pub use report::render_report;
pub use result::{
    compute_score, Check, CheckOutcome, CheckState, DocumentSummary, ErrorCode, Finding,
    VerificationError, VerificationLevel, VerificationResult, VerificationStatus,
    VerificationWarning, WarningCode,
};
