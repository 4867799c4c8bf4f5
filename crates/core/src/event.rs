//! Audit event schema for Custodia.
//!
//! Every security-relevant transition (document signed, chain appended,
//! consent revoked, break-glass invoked, verification outcome) can be emitted
//! as an [`AuditEvent`] to an [`AuditLogger`]. The audit sink itself is an
//! external collaborator; this crate only defines the shape and two in-process
//! loggers.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::time::{Clock, SystemClock};

/// Severity level for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSeverity {
    /// Informational event
    Info,
    /// Warning condition
    Warning,
    /// Error condition
    Error,
    /// Critical security event
    Critical,
}

/// Audit record handed to the audit sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event identifier
    pub event_id: String,
    /// Timestamp (Unix epoch milliseconds)
    pub timestamp: u64,
    /// Event type, see [`event_types`]
    pub event_type: String,
    /// Identity that caused the event
    pub user_id: String,
    /// Human-readable action
    pub action: String,
    /// Kind of resource touched (`document`, `consent`, ...)
    pub resource_type: String,
    /// Identifier of the touched resource
    pub resource_id: String,
    /// Event severity
    pub severity: EventSeverity,
    /// Structured metadata
    pub extra: EventMetadata,
}

/// Structured metadata for events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EventMetadata {
    /// Key-value pairs for additional context
    #[serde(flatten)]
    pub data: std::collections::BTreeMap<String, serde_json::Value>,
}

impl EventMetadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key-value pair.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }
}

/// Builder for creating audit events.
pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    /// Create a new builder for the given event type and acting identity.
    pub fn new(event_type: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            event: AuditEvent {
                event_id: uuid::Uuid::new_v4().to_string(),
                timestamp: SystemClock.now_ms(),
                event_type: event_type.into(),
                user_id: user_id.into(),
                action: String::new(),
                resource_type: String::new(),
                resource_id: String::new(),
                severity: EventSeverity::Info,
                extra: EventMetadata::new(),
            },
        }
    }

    /// Set the action description.
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.event.action = action.into();
        self
    }

    /// Set the resource the event refers to.
    pub fn resource(mut self, resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        self.event.resource_type = resource_type.into();
        self.event.resource_id = resource_id.into();
        self
    }

    /// Set the severity.
    pub fn severity(mut self, severity: EventSeverity) -> Self {
        self.event.severity = severity;
        self
    }

    /// Override the timestamp.
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.event.timestamp = timestamp;
        self
    }

    /// Add metadata.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.event.extra.insert(key, value);
        self
    }

    /// Build the event.
    pub fn build(self) -> AuditEvent {
        self.event
    }
}

/// Sink for audit events.
///
/// Implementations must not block for long; the core calls this inline.
pub trait AuditLogger: Send + Sync {
    fn log_event(&self, event: AuditEvent);
}

/// Audit logger that forwards events to `tracing` under the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLogger;

impl AuditLogger for TracingAuditLogger {
    fn log_event(&self, event: AuditEvent) {
        let extra = serde_json::to_string(&event.extra).unwrap_or_default();
        match event.severity {
            EventSeverity::Info => tracing::info!(
                target: "audit",
                event_id = %event.event_id,
                event_type = %event.event_type,
                user_id = %event.user_id,
                resource_type = %event.resource_type,
                resource_id = %event.resource_id,
                extra = %extra,
                "{}", event.action
            ),
            EventSeverity::Warning => tracing::warn!(
                target: "audit",
                event_id = %event.event_id,
                event_type = %event.event_type,
                user_id = %event.user_id,
                resource_type = %event.resource_type,
                resource_id = %event.resource_id,
                extra = %extra,
                "{}", event.action
            ),
            EventSeverity::Error | EventSeverity::Critical => tracing::error!(
                target: "audit",
                event_id = %event.event_id,
                event_type = %event.event_type,
                user_id = %event.user_id,
                resource_type = %event.resource_type,
                resource_id = %event.resource_id,
                severity = ?event.severity,
                extra = %extra,
                "{}", event.action
            ),
        }
    }
}

/// Audit logger that keeps events in memory, for tests and local tooling.
#[derive(Debug, Default)]
pub struct RecordingAuditLogger {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events in arrival order.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Recorded events of one type.
    pub fn events_of_type(&self, event_type: &str) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

impl AuditLogger for RecordingAuditLogger {
    fn log_event(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

/// Standard event types for common operations.
pub mod event_types {
    // Document events
    pub const DOCUMENT_SIGNED: &str = "document.signed";

    // Provenance events
    pub const PROVENANCE_REGISTERED: &str = "provenance.registered";
    pub const PROVENANCE_APPENDED: &str = "provenance.appended";
    pub const PROVENANCE_CHAIN_BROKEN: &str = "provenance.chain_broken";

    // Consent events
    pub const CONSENT_REQUESTED: &str = "consent.requested";
    pub const CONSENT_GRANTED: &str = "consent.granted";
    pub const CONSENT_DENIED: &str = "consent.denied";
    pub const CONSENT_REVOKED: &str = "consent.revoked";
    pub const CONSENT_EXPIRED: &str = "consent.expired";
    pub const BREAK_GLASS_INVOKED: &str = "consent.break_glass";

    // Verification events
    pub const VERIFICATION_PASSED: &str = "verification.passed";
    pub const VERIFICATION_FAILED: &str = "verification.failed";
    pub const TRUSTED_ENTITY_ADDED: &str = "verification.trusted_entity_added";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder() {
        let event = AuditEventBuilder::new(event_types::CONSENT_REVOKED, "pat-1")
            .action("Consent revoked")
            .resource("consent", "c-1")
            .severity(EventSeverity::Warning)
            .timestamp(1_700_000_000_000)
            .extra("reason", "moved providers")
            .build();

        assert_eq!(event.event_type, "consent.revoked");
        assert_eq!(event.user_id, "pat-1");
        assert_eq!(event.resource_type, "consent");
        assert_eq!(event.resource_id, "c-1");
        assert_eq!(event.severity, EventSeverity::Warning);
        assert_eq!(event.timestamp, 1_700_000_000_000);
        assert_eq!(
            event.extra.get("reason").and_then(|v| v.as_str()),
            Some("moved providers")
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = AuditEventBuilder::new(event_types::DOCUMENT_SIGNED, "hosp-1")
            .severity(EventSeverity::Critical)
            .build();

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"CRITICAL\""));
        let deserialized: AuditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(EventSeverity::Critical > EventSeverity::Info);
        assert!(EventSeverity::Warning < EventSeverity::Error);
    }

    #[test]
    fn test_recording_logger() {
        let logger = RecordingAuditLogger::new();
        logger.log_event(AuditEventBuilder::new(event_types::CONSENT_GRANTED, "a").build());
        logger.log_event(AuditEventBuilder::new(event_types::CONSENT_REVOKED, "b").build());
        logger.log_event(AuditEventBuilder::new(event_types::CONSENT_GRANTED, "c").build());

        assert_eq!(logger.events().len(), 3);
        assert_eq!(logger.events_of_type(event_types::CONSENT_GRANTED).len(), 2);
    }

    #[test]
    fn test_tracing_logger_doesnt_panic() {
        TracingAuditLogger.log_event(
            AuditEventBuilder::new(event_types::BREAK_GLASS_INVOKED, "dr-s")
                .severity(EventSeverity::Critical)
                .build(),
        );
    }
}
