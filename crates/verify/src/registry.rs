//! Trusted issuer registry.

use custodia_core::{CoreError, Entity};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Entities are immutable once registered
    #[error("Entity {id} is already registered with different attributes")]
    ConflictingEntity { id: String },

    #[error(transparent)]
    InvalidEntity(#[from] CoreError),
}

/// Lookup of trusted issuers by id.
pub trait TrustRegistry: Send + Sync {
    fn lookup(&self, issuer_id: &str) -> Option<Entity>;

    /// Register an entity. Returns `false` if the identical entity is
    /// already present.
    fn add(&self, entity: Entity) -> Result<bool, RegistryError>;
}

/// Process-local trust registry.
#[derive(Debug, Default)]
pub struct InMemoryTrustRegistry {
    entities: RwLock<HashMap<String, Entity>>,
}

impl InMemoryTrustRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TrustRegistry for InMemoryTrustRegistry {
    fn lookup(&self, issuer_id: &str) -> Option<Entity> {
        self.entities
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(issuer_id)
            .cloned()
    }

    fn add(&self, entity: Entity) -> Result<bool, RegistryError> {
        entity.validate()?;

        let mut entities = self.entities.write().unwrap_or_else(|p| p.into_inner());
        match entities.get(&entity.id) {
            Some(existing) if *existing == entity => Ok(false),
            Some(_) => Err(RegistryError::ConflictingEntity { id: entity.id }),
            None => {
                entities.insert(entity.id.clone(), entity);
                Ok(true)
            }
        }
    }
}
