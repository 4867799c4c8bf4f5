//! Consent records, scopes and permissions.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{ConsentError, ConsentResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentType {
    Treatment,
    Payment,
    Operations,
    Research,
    DataSharing,
    Emergency,
    Legal,
}

/// Category of data a consent can cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataCategory {
    MedicalRecords,
    LabResults,
    Prescriptions,
    Imaging,
    MentalHealth,
    SubstanceAbuse,
    Genetic,
    Billing,
    Demographics,
    Immunizations,
    Insurance,
    Credentials,
}

impl DataCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataCategory::MedicalRecords => "MEDICAL_RECORDS",
            DataCategory::LabResults => "LAB_RESULTS",
            DataCategory::Prescriptions => "PRESCRIPTIONS",
            DataCategory::Imaging => "IMAGING",
            DataCategory::MentalHealth => "MENTAL_HEALTH",
            DataCategory::SubstanceAbuse => "SUBSTANCE_ABUSE",
            DataCategory::Genetic => "GENETIC",
            DataCategory::Billing => "BILLING",
            DataCategory::Demographics => "DEMOGRAPHICS",
            DataCategory::Immunizations => "IMMUNIZATIONS",
            DataCategory::Insurance => "INSURANCE",
            DataCategory::Credentials => "CREDENTIALS",
        }
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state. `EXPIRED`, `REVOKED` and `DENIED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentStatus {
    Pending,
    Active,
    Expired,
    Revoked,
    Denied,
}

impl ConsentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConsentStatus::Expired | ConsentStatus::Revoked | ConsentStatus::Denied
        )
    }
}

impl fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsentStatus::Pending => "PENDING",
            ConsentStatus::Active => "ACTIVE",
            ConsentStatus::Expired => "EXPIRED",
            ConsentStatus::Revoked => "REVOKED",
            ConsentStatus::Denied => "DENIED",
        };
        f.write_str(name)
    }
}

/// Operation a recipient wants to perform on the subject's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentAction {
    View,
    Copy,
    Print,
    Export,
    Share,
}

impl fmt::Display for ConsentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsentAction::View => "view",
            ConsentAction::Copy => "copy",
            ConsentAction::Print => "print",
            ConsentAction::Export => "export",
            ConsentAction::Share => "share",
        };
        f.write_str(name)
    }
}

/// Permission bits granted by a consent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub view: bool,
    pub copy: bool,
    pub print: bool,
    pub export: bool,
    pub share: bool,
}

impl Permissions {
    pub fn view_only() -> Self {
        Self {
            view: true,
            ..Self::default()
        }
    }

    pub fn all() -> Self {
        Self {
            view: true,
            copy: true,
            print: true,
            export: true,
            share: true,
        }
    }

    pub fn allows(&self, action: ConsentAction) -> bool {
        match action {
            ConsentAction::View => self.view,
            ConsentAction::Copy => self.copy,
            ConsentAction::Print => self.print,
            ConsentAction::Export => self.export,
            ConsentAction::Share => self.share,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.view || self.copy || self.print || self.export || self.share)
    }
}

/// Inclusive range of document issue dates, Unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: u64,
    pub end: u64,
}

impl DateRange {
    pub fn contains(&self, at: u64) -> bool {
        self.start <= at && at <= self.end
    }
}

/// What a consent covers.
///
/// Exclusion always wins: a category that is both included and excluded is
/// not covered. When `document_ids` or `date_range` is set, a request must
/// name a matching document id or issue date to be covered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentScope {
    pub included: BTreeSet<DataCategory>,
    #[serde(default)]
    pub excluded: BTreeSet<DataCategory>,
    #[serde(default)]
    pub document_ids: Option<BTreeSet<Uuid>>,
    #[serde(default)]
    pub date_range: Option<DateRange>,
}

impl ConsentScope {
    pub fn new(included: impl IntoIterator<Item = DataCategory>) -> Self {
        Self {
            included: included.into_iter().collect(),
            excluded: BTreeSet::new(),
            document_ids: None,
            date_range: None,
        }
    }

    pub fn exclude(mut self, category: DataCategory) -> Self {
        self.excluded.insert(category);
        self
    }

    pub fn documents(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.document_ids = Some(ids.into_iter().collect());
        self
    }

    pub fn date_range(mut self, start: u64, end: u64) -> Self {
        self.date_range = Some(DateRange { start, end });
        self
    }

    pub fn validate(&self) -> ConsentResult<()> {
        if self.included.is_empty() {
            return Err(ConsentError::InvalidScope {
                reason: "at least one data category must be included".to_string(),
            });
        }
        if let Some(range) = &self.date_range {
            if range.start > range.end {
                return Err(ConsentError::InvalidScope {
                    reason: "date range start is after end".to_string(),
                });
            }
        }
        if matches!(&self.document_ids, Some(ids) if ids.is_empty()) {
            return Err(ConsentError::InvalidScope {
                reason: "document id restriction is empty".to_string(),
            });
        }
        Ok(())
    }

    /// Category check only; exclusion wins over inclusion.
    pub fn covers_category(&self, category: DataCategory) -> bool {
        self.included.contains(&category) && !self.excluded.contains(&category)
    }

    pub fn covers(&self, query: &ConsentQuery) -> bool {
        if !self.covers_category(query.category) {
            return false;
        }
        if let Some(ids) = &self.document_ids {
            match query.document_id {
                Some(id) if ids.contains(&id) => {}
                _ => return false,
            }
        }
        if let Some(range) = &self.date_range {
            match query.document_issued_at {
                Some(at) if range.contains(at) => {}
                _ => return false,
            }
        }
        true
    }
}

/// A subject's authorization for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub consent_id: Uuid,
    pub subject_id: String,
    pub recipient_id: String,
    pub consent_type: ConsentType,
    pub scope: ConsentScope,
    pub permissions: Permissions,
    pub status: ConsentStatus,
    pub purpose: Option<String>,
    pub requested_at: u64,
    pub granted_at: Option<u64>,
    /// Requested lifetime, applied from approval
    pub duration_ms: Option<u64>,
    /// `None` means indefinite
    pub expiration: Option<u64>,
    pub revoked_at: Option<u64>,
    pub revoked_by: Option<String>,
    pub revocation_reason: Option<String>,
}

impl ConsentRecord {
    /// `true` if `ACTIVE` and past its expiration at `now`.
    pub fn is_due_to_expire(&self, now: u64) -> bool {
        self.status == ConsentStatus::Active
            && matches!(self.expiration, Some(expiration) if now > expiration)
    }

    /// Status as of `now`, without mutating the record.
    pub fn effective_status(&self, now: u64) -> ConsentStatus {
        if self.is_due_to_expire(now) {
            ConsentStatus::Expired
        } else {
            self.status
        }
    }

    pub fn is_active_at(&self, now: u64) -> bool {
        self.effective_status(now) == ConsentStatus::Active
    }

    pub fn to_json(&self) -> ConsentResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> ConsentResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Parameters for a new consent, used by both grant and request.
#[derive(Debug, Clone)]
pub struct ConsentRequest {
    pub subject_id: String,
    pub recipient_id: String,
    pub consent_type: ConsentType,
    pub scope: ConsentScope,
    pub permissions: Permissions,
    pub duration: Option<Duration>,
    pub purpose: Option<String>,
}

impl ConsentRequest {
    pub fn new(
        subject_id: impl Into<String>,
        recipient_id: impl Into<String>,
        consent_type: ConsentType,
        scope: ConsentScope,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            recipient_id: recipient_id.into(),
            consent_type,
            scope,
            permissions: Permissions::view_only(),
            duration: None,
            purpose: None,
        }
    }

    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Lifetime from the moment the consent becomes active.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn duration_days(self, days: u64) -> Self {
        self.duration(Duration::from_secs(days.saturating_mul(86_400)))
    }

    pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }
}

/// One access question put to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentQuery {
    pub subject_id: String,
    pub recipient_id: String,
    pub category: DataCategory,
    pub action: ConsentAction,
    pub document_id: Option<Uuid>,
    pub document_issued_at: Option<u64>,
}

impl ConsentQuery {
    pub fn new(
        subject_id: impl Into<String>,
        recipient_id: impl Into<String>,
        category: DataCategory,
        action: ConsentAction,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            recipient_id: recipient_id.into(),
            category,
            action,
            document_id: None,
            document_issued_at: None,
        }
    }

    /// Scope the query to a specific document.
    pub fn for_document(mut self, document_id: Uuid, issued_at: u64) -> Self {
        self.document_id = Some(document_id);
        self.document_issued_at = Some(issued_at);
        self
    }
}

/// Per-subject aggregate, computed at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentSummary {
    pub subject_id: String,
    pub total: usize,
    pub by_status: BTreeMap<ConsentStatus, usize>,
    pub by_type: BTreeMap<ConsentType, usize>,
    pub active_recipients: BTreeSet<String>,
}

/// Time-limited emergency access that bypasses normal consent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyAccess {
    pub access_id: Uuid,
    pub subject_id: String,
    pub recipient_id: String,
    pub justification: String,
    pub invoked_at: u64,
    pub expires_at: u64,
}

impl EmergencyAccess {
    pub fn is_active_at(&self, now: u64) -> bool {
        now <= self.expires_at
    }
}
