//! Core functionality for the Custodia document trust engine.
//!
//! This crate provides the fundamental types, traits, and utilities shared
//! by the document, provenance, consent and verification crates:
//!
//! - **Identities**: issuer/recipient [`Entity`] records and document [`Subject`]s
//! - **Audit events**: the [`AuditEvent`] schema and the [`AuditLogger`] sink trait
//! - **Time**: an injectable [`Clock`] so expiry decisions are testable
//! - **Configuration**: TOML-backed [`Config`] for every service
//! - **Logging**: `tracing` subscriber initialization

pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod time;
pub mod types;

pub use config::{
    AnchorConfig, Config, ConsentConfig, LoggingConfig, RetryConfig, VerificationConfig,
};
pub use error::{CoreError, Result};
pub use event::{
    event_types, AuditEvent, AuditEventBuilder, AuditLogger, EventMetadata, EventSeverity,
    RecordingAuditLogger, TracingAuditLogger,
};
pub use time::{Clock, ManualClock, SystemClock, MILLIS_PER_DAY, MILLIS_PER_HOUR};
pub use types::{Entity, EntityRef, EntityType, Subject, SubjectRef};
