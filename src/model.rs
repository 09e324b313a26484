//! Core data model: entities, documents and the bipartite link between them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub type EntityId = String;
pub type DocumentId = String;

/// A real-world thing (person, account, address) with a stable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub entity_type: String,
    pub attributes: BTreeMap<String, String>,
    pub linked_documents: BTreeSet<DocumentId>,
}

impl Entity {
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Entity {
            id: id.into(),
            entity_type: entity_type.into(),
            attributes: BTreeMap::new(),
            linked_documents: BTreeSet::new(),
        }
    }

    /// Merge `other` into `self` per the last-write-wins/union rule, failing
    /// if the two entities disagree on type.
    pub fn merge(&mut self, other: Entity) -> Result<(), crate::error::MeshlinkError> {
        if self.entity_type != other.entity_type {
            return Err(crate::error::MeshlinkError::ConflictingType {
                id: self.id.clone(),
                existing: self.entity_type.clone(),
                new: other.entity_type,
            });
        }
        self.attributes.extend(other.attributes);
        self.linked_documents.extend(other.linked_documents);
        Ok(())
    }
}

/// A record that mentions one or more entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub document_type: String,
    pub attributes: BTreeMap<String, String>,
    pub linked_entities: BTreeSet<EntityId>,
}

impl Document {
    pub fn new(id: impl Into<String>, document_type: impl Into<String>) -> Self {
        Document {
            id: id.into(),
            document_type: document_type.into(),
            attributes: BTreeMap::new(),
            linked_entities: BTreeSet::new(),
        }
    }

    pub fn merge(&mut self, other: Document) -> Result<(), crate::error::MeshlinkError> {
        if self.document_type != other.document_type {
            return Err(crate::error::MeshlinkError::ConflictingType {
                id: self.id.clone(),
                existing: self.document_type.clone(),
                new: other.document_type,
            });
        }
        self.attributes.extend(other.attributes);
        self.linked_entities.extend(other.linked_entities);
        Ok(())
    }
}

/// A single `{entityId, documentId}` link. Adding one is symmetric: it must
/// update both adjacency sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub entity_id: EntityId,
    pub document_id: DocumentId,
}
