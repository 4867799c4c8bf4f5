//! Provenance records and their seals.
//!
//! Every record carries a `signature`: the BLAKE3 seal over all of its other
//! fields, each length-prefixed. A record whose fields were edited after
//! sealing no longer matches its seal, and because each record also commits
//! to its parent's `record_id` and `hash_after`, an edit anywhere in a chain
//! is detected when the chain is walked.

use custodia_crypto::DigestBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::ProvenanceResult;

const SEAL_DOMAIN: &str = "custodia.provenance.v1";

/// Lifecycle action recorded in a provenance chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvenanceAction {
    Created,
    Accessed,
    Modified,
    Copied,
    Transferred,
    Shared,
    Printed,
    Exported,
    Deleted,
    Archived,
}

impl ProvenanceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvenanceAction::Created => "CREATED",
            ProvenanceAction::Accessed => "ACCESSED",
            ProvenanceAction::Modified => "MODIFIED",
            ProvenanceAction::Copied => "COPIED",
            ProvenanceAction::Transferred => "TRANSFERRED",
            ProvenanceAction::Shared => "SHARED",
            ProvenanceAction::Printed => "PRINTED",
            ProvenanceAction::Exported => "EXPORTED",
            ProvenanceAction::Deleted => "DELETED",
            ProvenanceAction::Archived => "ARCHIVED",
        }
    }

    /// Actions that deliver the document to `destination_device`.
    pub fn requires_destination(&self) -> bool {
        matches!(
            self,
            ProvenanceAction::Copied | ProvenanceAction::Shared | ProvenanceAction::Transferred
        )
    }
}

impl fmt::Display for ProvenanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in a document's provenance chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub record_id: Uuid,
    pub document_id: Uuid,
    /// Unix epoch milliseconds
    pub timestamp: u64,
    pub action: ProvenanceAction,
    pub actor_id: String,
    pub source_device: String,
    pub destination_device: Option<String>,
    /// Parent's `hash_after`; `None` only for the genesis record
    pub hash_before: Option<String>,
    /// Hex content hash after this event
    pub hash_after: String,
    /// `None` only for the genesis record
    pub parent_record_id: Option<Uuid>,
    /// Hex BLAKE3 seal over every other field
    pub signature: String,
}

impl ProvenanceRecord {
    pub fn is_genesis(&self) -> bool {
        self.parent_record_id.is_none()
    }

    /// Recompute the seal from the record's current fields.
    pub fn compute_seal(&self) -> String {
        let record_id = self.record_id.to_string();
        let document_id = self.document_id.to_string();
        let parent = self.parent_record_id.map(|id| id.to_string());

        DigestBuilder::new(SEAL_DOMAIN)
            .str(&record_id)
            .str(&document_id)
            .u64(self.timestamp)
            .str(self.action.as_str())
            .str(&self.actor_id)
            .str(&self.source_device)
            .opt_str(self.destination_device.as_deref())
            .opt_str(self.hash_before.as_deref())
            .str(&self.hash_after)
            .opt_str(parent.as_deref())
            .finalize_hex()
    }

    pub(crate) fn seal(mut self) -> Self {
        self.signature = self.compute_seal();
        self
    }

    pub fn seal_is_valid(&self) -> bool {
        self.signature == self.compute_seal()
    }

    pub fn to_json(&self) -> ProvenanceResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> ProvenanceResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Input to [`ProvenanceTracker::track_event`](crate::ProvenanceTracker::track_event).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceEvent {
    pub action: ProvenanceAction,
    pub actor_id: String,
    pub source_device: String,
    pub destination_device: Option<String>,
    /// Chain tip hash the caller believes is current; checked when present
    pub expected_hash_before: Option<String>,
    /// New content hash; only `MODIFIED` may change it
    pub hash_after: Option<String>,
}

impl ProvenanceEvent {
    pub fn new(
        action: ProvenanceAction,
        actor_id: impl Into<String>,
        source_device: impl Into<String>,
    ) -> Self {
        Self {
            action,
            actor_id: actor_id.into(),
            source_device: source_device.into(),
            destination_device: None,
            expected_hash_before: None,
            hash_after: None,
        }
    }

    pub fn destination(mut self, device: impl Into<String>) -> Self {
        self.destination_device = Some(device.into());
        self
    }

    pub fn expect_hash_before(mut self, hash: impl Into<String>) -> Self {
        self.expected_hash_before = Some(hash.into());
        self
    }

    pub fn hash_after(mut self, hash: impl Into<String>) -> Self {
        self.hash_after = Some(hash.into());
        self
    }
}

/// A device currently holding a copy of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub device_id: String,
    /// Action that placed the document on this device
    pub via: ProvenanceAction,
    pub since: u64,
    pub record_id: Uuid,
}
