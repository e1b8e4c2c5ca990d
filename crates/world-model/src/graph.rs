//! The flat entity/relation graph snapshot served by the backend.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entity::{Entity, Relation};

/// World graph payload: every entity ever created plus explicit relations.
///
/// Entities are never deleted; lifecycle is expressed through tags and
/// filtered at view time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldGraph {
    #[serde(default)]
    pub entities: HashMap<String, Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl WorldGraph {
    /// Builds a graph from a flat entity list (the `latest_entities` shape).
    pub fn from_entities<I: IntoIterator<Item = Entity>>(entities: I) -> Self {
        Self {
            entities: entities.into_iter().map(|e| (e.id.clone(), e)).collect(),
            relations: Vec::new(),
        }
    }

    /// Looks up an entity by id.
    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Inserts an entity; fixture and test helper.
    pub fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.id.clone(), entity);
    }

    /// Children of a parent entity, unordered.
    pub fn children_of<'a>(&'a self, parent_id: &'a str) -> impl Iterator<Item = &'a Entity> {
        self.entities
            .values()
            .filter(move |e| e.parent_id.as_deref() == Some(parent_id))
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True when the graph holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
