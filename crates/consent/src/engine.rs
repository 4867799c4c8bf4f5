//! Consent engine.
//!
//! Records are sharded per subject: every mutation (grant, approve, deny,
//! revoke, lazy expiry, break-glass) takes only that subject's lock. Two
//! indexes map consent ids and recipients back to subjects. A shard lock is
//! never held while an index lock is acquired.

use custodia_core::{
    event_types, AuditEventBuilder, AuditLogger, Clock, ConsentConfig, EventSeverity, SystemClock,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{ConsentError, ConsentResult};
use crate::model::{
    ConsentAction, ConsentQuery, ConsentRecord, ConsentRequest, ConsentStatus, ConsentSummary,
    DataCategory, EmergencyAccess,
};

#[derive(Default)]
struct SubjectConsents {
    records: Vec<ConsentRecord>,
    emergency: Vec<EmergencyAccess>,
}

type Shard = Arc<Mutex<SubjectConsents>>;

#[derive(Default)]
struct Indexes {
    subject_of: HashMap<Uuid, String>,
    by_recipient: HashMap<String, Vec<Uuid>>,
}

/// Per-subject authorization store and evaluator.
pub struct ConsentEngine {
    subjects: RwLock<HashMap<String, Shard>>,
    indexes: RwLock<Indexes>,
    clock: Arc<dyn Clock>,
    config: ConsentConfig,
    audit: Option<Arc<dyn AuditLogger>>,
}

impl ConsentEngine {
    pub fn new(config: ConsentConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ConsentConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            subjects: RwLock::new(HashMap::new()),
            indexes: RwLock::new(Indexes::default()),
            clock,
            config,
            audit: None,
        }
    }

    pub fn with_audit_logger(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn config(&self) -> &ConsentConfig {
        &self.config
    }

    /// Grant a consent that is `ACTIVE` immediately.
    ///
    /// `expiration = now + duration` when a duration is given, otherwise the
    /// consent is indefinite.
    pub fn grant_consent(&self, request: ConsentRequest) -> ConsentResult<ConsentRecord> {
        let now = self.clock.now_ms();
        let mut record = new_record(request, now)?;
        record.status = ConsentStatus::Active;
        record.granted_at = Some(now);
        record.expiration = record.duration_ms.map(|d| now.saturating_add(d));

        self.insert(record.clone());
        info!(
            consent_id = %record.consent_id,
            subject_id = %record.subject_id,
            recipient_id = %record.recipient_id,
            expiration = ?record.expiration,
            "Consent granted"
        );
        self.audit(event_types::CONSENT_GRANTED, &record, EventSeverity::Info);
        Ok(record)
    }

    /// Record a consent request awaiting the subject's decision.
    pub fn request_consent(&self, request: ConsentRequest) -> ConsentResult<ConsentRecord> {
        let record = new_record(request, self.clock.now_ms())?;

        self.insert(record.clone());
        info!(
            consent_id = %record.consent_id,
            subject_id = %record.subject_id,
            recipient_id = %record.recipient_id,
            "Consent requested"
        );
        self.audit(event_types::CONSENT_REQUESTED, &record, EventSeverity::Info);
        Ok(record)
    }

    /// `PENDING → ACTIVE`. The requested duration starts now.
    pub fn approve_consent(&self, consent_id: Uuid) -> ConsentResult<ConsentRecord> {
        let now = self.clock.now_ms();
        let record = self.transition(consent_id, ConsentStatus::Active, |record| {
            record.status = ConsentStatus::Active;
            record.granted_at = Some(now);
            record.expiration = record.duration_ms.map(|d| now.saturating_add(d));
        })?;

        info!(consent_id = %consent_id, subject_id = %record.subject_id, "Consent approved");
        self.audit(event_types::CONSENT_GRANTED, &record, EventSeverity::Info);
        Ok(record)
    }

    /// `PENDING → DENIED`.
    pub fn deny_consent(&self, consent_id: Uuid, reason: &str) -> ConsentResult<ConsentRecord> {
        let record = self.transition(consent_id, ConsentStatus::Denied, |record| {
            record.status = ConsentStatus::Denied;
            record.revocation_reason = Some(reason.to_string());
        })?;

        info!(consent_id = %consent_id, subject_id = %record.subject_id, "Consent denied");
        self.audit(event_types::CONSENT_DENIED, &record, EventSeverity::Info);
        Ok(record)
    }

    fn transition<F>(
        &self,
        consent_id: Uuid,
        to: ConsentStatus,
        apply: F,
    ) -> ConsentResult<ConsentRecord>
    where
        F: FnOnce(&mut ConsentRecord),
    {
        let shard = self.shard_of(consent_id)?;
        let mut consents = lock(&shard);
        let record = consents
            .records
            .iter_mut()
            .find(|r| r.consent_id == consent_id)
            .ok_or(ConsentError::UnknownConsent { consent_id })?;

        if record.status != ConsentStatus::Pending {
            return Err(ConsentError::InvalidTransition {
                consent_id,
                from: record.status,
                to,
            });
        }
        apply(record);
        Ok(record.clone())
    }

    /// Does `recipient` hold an active consent for `category` and `action`?
    pub fn verify_consent(
        &self,
        subject_id: &str,
        recipient_id: &str,
        category: DataCategory,
        action: ConsentAction,
    ) -> bool {
        self.verify_consent_query(&ConsentQuery::new(subject_id, recipient_id, category, action))
    }

    /// Evaluate a consent query.
    ///
    /// Active records past their expiration are moved to `EXPIRED` as a side
    /// effect and skipped. Returns `true` on the first record whose scope
    /// covers the query and whose permissions allow the action.
    pub fn verify_consent_query(&self, query: &ConsentQuery) -> bool {
        let Some(shard) = self.shard(&query.subject_id) else {
            return false;
        };

        let now = self.clock.now_ms();
        let mut expired = Vec::new();
        let mut granted = false;
        {
            let mut consents = lock(&shard);
            for record in consents
                .records
                .iter_mut()
                .filter(|r| r.recipient_id == query.recipient_id)
            {
                if record.status != ConsentStatus::Active {
                    continue;
                }
                if record.is_due_to_expire(now) {
                    record.status = ConsentStatus::Expired;
                    expired.push(record.clone());
                    continue;
                }
                if record.scope.covers(query) && record.permissions.allows(query.action) {
                    granted = true;
                    break;
                }
            }
        }

        for record in &expired {
            info!(
                consent_id = %record.consent_id,
                subject_id = %record.subject_id,
                "Consent expired"
            );
            self.audit(event_types::CONSENT_EXPIRED, record, EventSeverity::Info);
        }

        if !granted {
            warn!(
                subject_id = %query.subject_id,
                recipient_id = %query.recipient_id,
                category = %query.category,
                action = %query.action,
                "Consent not satisfied"
            );
        }
        granted
    }

    /// `ACTIVE → REVOKED`. Returns `false` without error when the consent is
    /// not active, including one that has just expired.
    pub fn revoke_consent(
        &self,
        consent_id: Uuid,
        revoked_by: &str,
        reason: &str,
    ) -> ConsentResult<bool> {
        let shard = self.shard_of(consent_id)?;
        let now = self.clock.now_ms();

        let mut consents = lock(&shard);
        let record = consents
            .records
            .iter_mut()
            .find(|r| r.consent_id == consent_id)
            .ok_or(ConsentError::UnknownConsent { consent_id })?;

        if record.is_due_to_expire(now) {
            record.status = ConsentStatus::Expired;
            let expired = record.clone();
            drop(consents);
            self.audit(event_types::CONSENT_EXPIRED, &expired, EventSeverity::Info);
            return Ok(false);
        }
        if record.status != ConsentStatus::Active {
            return Ok(false);
        }

        record.status = ConsentStatus::Revoked;
        record.revoked_at = Some(now);
        record.revoked_by = Some(revoked_by.to_string());
        record.revocation_reason = Some(reason.to_string());
        let record = record.clone();
        drop(consents);

        info!(
            consent_id = %consent_id,
            subject_id = %record.subject_id,
            revoked_by = %revoked_by,
            "Consent revoked"
        );
        self.audit(event_types::CONSENT_REVOKED, &record, EventSeverity::Warning);
        Ok(true)
    }

    /// Move every active consent past its expiration to `EXPIRED` and drop
    /// lapsed break-glass grants.
    pub fn expire_due_consents(&self) -> usize {
        let now = self.clock.now_ms();
        let shards: Vec<Shard> = self
            .subjects
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .cloned()
            .collect();

        let mut expired = Vec::new();
        for shard in shards {
            let mut consents = lock(&shard);
            for record in consents.records.iter_mut() {
                if record.is_due_to_expire(now) {
                    record.status = ConsentStatus::Expired;
                    expired.push(record.clone());
                }
            }
            consents.emergency.retain(|access| access.is_active_at(now));
        }

        for record in &expired {
            self.audit(event_types::CONSENT_EXPIRED, record, EventSeverity::Info);
        }
        expired.len()
    }

    /// Counts by effective status and type. Does not mutate any record.
    pub fn get_consent_summary(&self, subject_id: &str) -> ConsentSummary {
        let now = self.clock.now_ms();
        let mut summary = ConsentSummary {
            subject_id: subject_id.to_string(),
            total: 0,
            by_status: BTreeMap::new(),
            by_type: BTreeMap::new(),
            active_recipients: BTreeSet::new(),
        };

        let Some(shard) = self.shard(subject_id) else {
            return summary;
        };
        let consents = lock(&shard);
        for record in &consents.records {
            let status = record.effective_status(now);
            summary.total += 1;
            *summary.by_status.entry(status).or_insert(0) += 1;
            *summary.by_type.entry(record.consent_type).or_insert(0) += 1;
            if status == ConsentStatus::Active {
                summary.active_recipients.insert(record.recipient_id.clone());
            }
        }
        summary
    }

    pub fn get_consent(&self, consent_id: Uuid) -> Option<ConsentRecord> {
        let shard = self.shard_of(consent_id).ok()?;
        let consents = lock(&shard);
        consents
            .records
            .iter()
            .find(|r| r.consent_id == consent_id)
            .cloned()
    }

    pub fn consents_for_subject(&self, subject_id: &str) -> Vec<ConsentRecord> {
        match self.shard(subject_id) {
            Some(shard) => lock(&shard).records.clone(),
            None => Vec::new(),
        }
    }

    pub fn consents_for_recipient(&self, recipient_id: &str) -> Vec<ConsentRecord> {
        let ids: Vec<Uuid> = self
            .indexes
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .by_recipient
            .get(recipient_id)
            .cloned()
            .unwrap_or_default();

        ids.into_iter().filter_map(|id| self.get_consent(id)).collect()
    }

    /// Grant emergency access that bypasses consent for a limited time.
    ///
    /// Requires a justification and, unless disabled in config, an attached
    /// audit logger. The grant is only honoured by STRICT verification when
    /// the caller asks for an emergency override, and is always reported.
    pub fn invoke_break_glass(
        &self,
        subject_id: &str,
        recipient_id: &str,
        justification: &str,
    ) -> ConsentResult<EmergencyAccess> {
        if justification.trim().is_empty() {
            return Err(ConsentError::InvalidRequest {
                reason: "break-glass access requires a justification".to_string(),
            });
        }
        if self.config.require_audit_for_break_glass && self.audit.is_none() {
            return Err(ConsentError::AuditRequired);
        }

        let now = self.clock.now_ms();
        let access = EmergencyAccess {
            access_id: Uuid::new_v4(),
            subject_id: subject_id.to_string(),
            recipient_id: recipient_id.to_string(),
            justification: justification.to_string(),
            invoked_at: now,
            expires_at: now.saturating_add(self.config.break_glass_duration_ms),
        };

        let shard = self.shard_or_create(subject_id);
        lock(&shard).emergency.push(access.clone());

        error!(
            subject_id = %subject_id,
            recipient_id = %recipient_id,
            access_id = %access.access_id,
            expires_at = access.expires_at,
            "Break-glass access invoked"
        );
        if let Some(audit) = &self.audit {
            audit.log_event(
                AuditEventBuilder::new(event_types::BREAK_GLASS_INVOKED, recipient_id)
                    .action("break_glass")
                    .resource("subject", subject_id)
                    .severity(EventSeverity::Critical)
                    .timestamp(now)
                    .extra("access_id", access.access_id.to_string())
                    .extra("justification", justification)
                    .extra("expires_at", access.expires_at)
                    .build(),
            );
        }
        Ok(access)
    }

    /// Unexpired break-glass grant for this pair, if any.
    pub fn active_break_glass(&self, subject_id: &str, recipient_id: &str) -> Option<EmergencyAccess> {
        let shard = self.shard(subject_id)?;
        let now = self.clock.now_ms();
        let consents = lock(&shard);
        consents
            .emergency
            .iter()
            .rev()
            .find(|a| a.recipient_id == recipient_id && a.is_active_at(now))
            .cloned()
    }

    fn insert(&self, record: ConsentRecord) {
        let consent_id = record.consent_id;
        let subject_id = record.subject_id.clone();
        let recipient_id = record.recipient_id.clone();

        let shard = self.shard_or_create(&subject_id);
        lock(&shard).records.push(record);

        let mut indexes = self.indexes.write().unwrap_or_else(|p| p.into_inner());
        indexes.subject_of.insert(consent_id, subject_id);
        indexes
            .by_recipient
            .entry(recipient_id)
            .or_default()
            .push(consent_id);
    }

    fn shard(&self, subject_id: &str) -> Option<Shard> {
        self.subjects
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(subject_id)
            .cloned()
    }

    fn shard_or_create(&self, subject_id: &str) -> Shard {
        if let Some(shard) = self.shard(subject_id) {
            return shard;
        }
        self.subjects
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .entry(subject_id.to_string())
            .or_default()
            .clone()
    }

    fn shard_of(&self, consent_id: Uuid) -> ConsentResult<Shard> {
        let subject_id = self
            .indexes
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .subject_of
            .get(&consent_id)
            .cloned()
            .ok_or(ConsentError::UnknownConsent { consent_id })?;
        self.shard(&subject_id)
            .ok_or(ConsentError::UnknownConsent { consent_id })
    }

    fn audit(&self, event_type: &str, record: &ConsentRecord, severity: EventSeverity) {
        let Some(audit) = &self.audit else {
            return;
        };
        audit.log_event(
            AuditEventBuilder::new(event_type, record.recipient_id.clone())
                .action(record.status.to_string())
                .resource("consent", record.consent_id.to_string())
                .severity(severity)
                .timestamp(self.clock.now_ms())
                .extra("subject_id", record.subject_id.clone())
                .extra("recipient_id", record.recipient_id.clone())
                .build(),
        );
    }
}

fn new_record(request: ConsentRequest, now: u64) -> ConsentResult<ConsentRecord> {
    request.scope.validate()?;
    if request.subject_id.trim().is_empty() || request.recipient_id.trim().is_empty() {
        return Err(ConsentError::InvalidRequest {
            reason: "subject and recipient ids must not be empty".to_string(),
        });
    }
    if request.permissions.is_empty() {
        return Err(ConsentError::InvalidRequest {
            reason: "a consent must grant at least one permission".to_string(),
        });
    }

    Ok(ConsentRecord {
        consent_id: Uuid::new_v4(),
        subject_id: request.subject_id,
        recipient_id: request.recipient_id,
        consent_type: request.consent_type,
        scope: request.scope,
        permissions: request.permissions,
        status: ConsentStatus::Pending,
        purpose: request.purpose,
        requested_at: now,
        granted_at: None,
        duration_ms: request
            .duration
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        expiration: None,
        revoked_at: None,
        revoked_by: None,
        revocation_reason: None,
    })
}

fn lock(shard: &Shard) -> MutexGuard<'_, SubjectConsents> {
    shard.lock().unwrap_or_else(|p| p.into_inner())
}
