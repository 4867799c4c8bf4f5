//! Identity types shared by documents, consents and the trust registry.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Kind of party that issues or receives documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Hospital,
    Clinic,
    Physician,
    Laboratory,
    Pharmacy,
    Insurer,
    GovernmentAgency,
    EducationalInstitution,
    Employer,
    Individual,
}

/// An issuer or recipient identity.
///
/// Entities are immutable once registered in a trust registry; a key rotation
/// is a new registration under a new id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub display_name: String,
    pub entity_type: EntityType,
    /// ISO 3166 region code, e.g. `US-CA`
    pub jurisdiction: String,
    /// Hex fingerprint of the entity's Ed25519 verifying key
    pub public_key_fingerprint: String,
}

impl Entity {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        entity_type: EntityType,
        jurisdiction: impl Into<String>,
        public_key_fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            entity_type,
            jurisdiction: jurisdiction.into(),
            public_key_fingerprint: public_key_fingerprint.into(),
        }
    }

    /// Validates that the identity is usable as a registry entry.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.trim().is_empty() {
            return Err(CoreError::InvalidEntity {
                id: self.id.clone(),
                reason: "id must not be empty".to_string(),
            });
        }
        if self.public_key_fingerprint.is_empty()
            || !self
                .public_key_fingerprint
                .chars()
                .all(|c| c.is_ascii_hexdigit())
        {
            return Err(CoreError::InvalidEntity {
                id: self.id.clone(),
                reason: "public key fingerprint must be non-empty hex".to_string(),
            });
        }
        Ok(())
    }

    /// Lightweight reference for embedding in documents.
    pub fn to_ref(&self) -> EntityRef {
        EntityRef {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Reference to an [`Entity`] as stored inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    pub display_name: String,
}

impl EntityRef {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// The person a document is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub display_name: String,
}

impl Subject {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    pub fn to_ref(&self) -> SubjectRef {
        SubjectRef {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Reference to a [`Subject`]; documents and consents never own subjects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRef {
    pub id: String,
    pub display_name: String,
}

impl SubjectRef {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}
