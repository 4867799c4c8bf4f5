//! Consent engine for Custodia.
//!
//! Subjects authorize recipients to act on categories of their data. A
//! consent moves `PENDING → ACTIVE → {EXPIRED | REVOKED}` or
//! `PENDING → DENIED`; terminal states are never left, a new grant must be
//! issued instead.
//!
//! # Evaluation rules
//!
//! - Only `ACTIVE` consents count
//! - Expiry is enforced lazily on read and is visible as `EXPIRED` afterwards
//! - Exclusion always wins over inclusion
//! - Denial is a `false` result, never an error
//!
//! Break-glass emergency access is recorded separately and never satisfies
//! [`ConsentEngine::verify_consent`] by itself.

pub mod engine;
pub mod error;
pub mod model;

pub use engine::ConsentEngine;
pub use error::{ConsentError, ConsentResult};
pub use model::{
    ConsentAction, ConsentQuery, ConsentRecord, ConsentRequest, ConsentScope, ConsentStatus,
    ConsentSummary, ConsentType, DataCategory, DateRange, EmergencyAccess, Permissions,
};
