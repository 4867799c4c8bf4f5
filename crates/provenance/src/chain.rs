//! Chain verification, reconstruction and derived views.
//!
//! A valid chain is a single linear list starting at a `CREATED` genesis
//! record. For every later record:
//!
//! - `parent_record_id` is the previous record's `record_id`
//! - `hash_before` is the previous record's `hash_after`
//! - the seal matches the record's fields
//!
//! Verification is fail-fast: the first mismatch ends the walk.

use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::error::{ProvenanceError, ProvenanceResult};
use crate::record::{Location, ProvenanceAction, ProvenanceRecord};

/// Outcome of walking a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainVerification {
    Intact,
    Broken { index: usize, reason: String },
}

impl ChainVerification {
    pub fn is_intact(&self) -> bool {
        matches!(self, ChainVerification::Intact)
    }
}

impl fmt::Display for ChainVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainVerification::Intact => write!(f, "intact"),
            ChainVerification::Broken { index, reason } => {
                write!(f, "broken at record {}: {}", index, reason)
            }
        }
    }
}

fn broken(index: usize, reason: impl Into<String>) -> ChainVerification {
    ChainVerification::Broken {
        index,
        reason: reason.into(),
    }
}

/// Verify an ordered chain of records, stopping at the first mismatch.
pub fn verify_records(records: &[ProvenanceRecord]) -> ChainVerification {
    let Some(genesis) = records.first() else {
        return broken(0, "empty chain");
    };

    if genesis.action != ProvenanceAction::Created
        || genesis.hash_before.is_some()
        || genesis.parent_record_id.is_some()
    {
        return broken(0, "invalid genesis record");
    }

    for (i, record) in records.iter().enumerate() {
        if record.document_id != genesis.document_id {
            return broken(i, "record belongs to another document");
        }

        if !record.seal_is_valid() {
            return broken(i, "seal mismatch");
        }

        if i == 0 {
            continue;
        }

        let parent = &records[i - 1];
        if record.action == ProvenanceAction::Created {
            return broken(i, "second CREATED record");
        }
        if record.parent_record_id != Some(parent.record_id) {
            return broken(i, "parent_record_id does not match previous record");
        }
        if record.hash_before.as_deref() != Some(parent.hash_after.as_str()) {
            return broken(i, "hash_before does not match parent hash_after");
        }
    }

    ChainVerification::Intact
}

/// Rebuild chain order from records in arbitrary storage order.
///
/// Order is recovered purely from `parent_record_id` links. Records of other
/// documents are ignored. Fails if there is not exactly one genesis record,
/// if the chain branches, or if records are unreachable from genesis.
pub fn reconstruct_chain(
    document_id: Uuid,
    records: &[ProvenanceRecord],
) -> ProvenanceResult<Vec<ProvenanceRecord>> {
    let mine: Vec<&ProvenanceRecord> = records
        .iter()
        .filter(|r| r.document_id == document_id)
        .collect();

    let mut genesis = None;
    let mut children: HashMap<Uuid, &ProvenanceRecord> = HashMap::with_capacity(mine.len());

    for record in &mine {
        match record.parent_record_id {
            None => {
                if genesis.replace(*record).is_some() {
                    return Err(break_at(document_id, 0, "multiple genesis records"));
                }
            }
            Some(parent) => {
                if children.insert(parent, *record).is_some() {
                    return Err(break_at(
                        document_id,
                        0,
                        format!("chain branches after record {}", parent),
                    ));
                }
            }
        }
    }

    let Some(genesis) = genesis else {
        return Err(ProvenanceError::UnknownDocument { document_id });
    };

    let mut ordered = Vec::with_capacity(mine.len());
    let mut current = genesis;
    loop {
        ordered.push(current.clone());
        match children.get(&current.record_id) {
            Some(next) => current = *next,
            None => break,
        }
        if ordered.len() > mine.len() {
            return Err(break_at(document_id, ordered.len(), "cycle in parent links"));
        }
    }

    if ordered.len() != mine.len() {
        return Err(break_at(
            document_id,
            ordered.len(),
            format!("{} records unreachable from genesis", mine.len() - ordered.len()),
        ));
    }

    Ok(ordered)
}

fn break_at(document_id: Uuid, index: usize, reason: impl Into<String>) -> ProvenanceError {
    ProvenanceError::BrokenChain {
        document_id,
        index,
        reason: reason.into(),
    }
}

/// Devices currently holding the document, in order of arrival.
///
/// `CREATED` places it on `source_device`; `COPIED`, `SHARED` and
/// `TRANSFERRED` place it on `destination_device`. `TRANSFERRED` and
/// `DELETED` remove it from `source_device`.
pub fn derive_locations(records: &[ProvenanceRecord]) -> Vec<Location> {
    let mut locations: Vec<Location> = Vec::new();

    fn place(locations: &mut Vec<Location>, device: &str, record: &ProvenanceRecord) {
        if locations.iter().any(|l| l.device_id == device) {
            return;
        }
        locations.push(Location {
            device_id: device.to_string(),
            via: record.action,
            since: record.timestamp,
            record_id: record.record_id,
        });
    }

    for record in records {
        match record.action {
            ProvenanceAction::Created => place(&mut locations, &record.source_device, record),
            ProvenanceAction::Copied | ProvenanceAction::Shared => {
                if let Some(dest) = &record.destination_device {
                    place(&mut locations, dest, record);
                }
            }
            ProvenanceAction::Transferred => {
                locations.retain(|l| l.device_id != record.source_device);
                if let Some(dest) = &record.destination_device {
                    place(&mut locations, dest, record);
                }
            }
            ProvenanceAction::Deleted => {
                locations.retain(|l| l.device_id != record.source_device);
            }
            _ => {}
        }
    }

    locations
}
