//! End-to-end tests across the Custodia crates
//!
//! This suite validates:
//! - Issue, sign, anchor and verify a document at every level
//! - Consent-gated STRICT verification, including break-glass
//! - Tamper detection across serialized documents and provenance chains
//! - Configuration-driven wiring of all services

pub mod test_utils;

#[cfg(test)]
mod patient_journey_tests;

#[cfg(test)]
mod tamper_detection_tests;

#[cfg(test)]
mod config_wiring_tests;
