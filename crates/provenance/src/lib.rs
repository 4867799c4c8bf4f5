//! Provenance chain tracker for Custodia.
//!
//! Every lifecycle event of a document (creation, copies, accesses, shares,
//! transfers, deletions) is appended to a per-document, hash-linked chain.
//! Records are sealed with BLAKE3 over all of their fields, so any edit made
//! outside the tracker is detected by [`ProvenanceTracker::verify_chain_integrity`].
//!
//! The tracker never sees document content, only content hashes and the
//! devices the document moved between.

pub mod chain;
pub mod error;
pub mod record;
pub mod tracker;

pub use chain::{derive_locations, reconstruct_chain, verify_records, ChainVerification};
pub use error::{ProvenanceError, ProvenanceResult};
pub use record::{Location, ProvenanceAction, ProvenanceEvent, ProvenanceRecord};
pub use tracker::{ProvenanceMetrics, ProvenanceTracker};
