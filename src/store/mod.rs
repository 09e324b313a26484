//! Bipartite (entity↔document) and unipartite (entity↔entity) store
//! contracts, each with an in-process and a persistent (`sled`) backend.
//!
//! Callers depend only on the trait — never on which backend is behind it.
//! Both A and B are written only during ingest/projection; afterwards they
//! must be safe for concurrent reads.

mod memory;
mod sled_store;

pub use memory::{MemoryBipartiteStore, MemoryUnipartiteStore};
pub use sled_store::{SledBipartiteStore, SledUnipartiteStore};

use crate::error::MeshlinkError;
use crate::model::{Document, DocumentId, Entity, EntityId};

/// Entities, documents and the links between them (§4.A).
pub trait BipartiteStore: Send + Sync {
    fn add_entity(&self, entity: Entity) -> Result<(), MeshlinkError>;
    fn add_document(&self, document: Document) -> Result<(), MeshlinkError>;
    /// Links both adjacency sides atomically. Fails if either endpoint is absent.
    fn add_link(&self, entity_id: &str, document_id: &str) -> Result<(), MeshlinkError>;

    fn get_entity(&self, id: &str) -> Result<Option<Entity>, MeshlinkError>;
    fn get_document(&self, id: &str) -> Result<Option<Document>, MeshlinkError>;
    fn has_entity(&self, id: &str) -> Result<bool, MeshlinkError>;
    fn has_document(&self, id: &str) -> Result<bool, MeshlinkError>;

    /// Snapshot of all entity ids. Iteration order is unspecified.
    fn entity_ids(&self) -> Result<Vec<EntityId>, MeshlinkError>;
    /// Snapshot of all document ids. Iteration order is unspecified.
    fn document_ids(&self) -> Result<Vec<DocumentId>, MeshlinkError>;

    fn number_of_entities(&self) -> Result<usize, MeshlinkError>;
    fn number_of_documents(&self) -> Result<usize, MeshlinkError>;
    /// Count of entities with at least one linked document.
    fn number_of_linked_entities(&self) -> Result<usize, MeshlinkError>;
    /// Count of documents with at least one linked entity.
    fn number_of_linked_documents(&self) -> Result<usize, MeshlinkError>;

    /// Deep, order-independent equality against another store.
    fn equal(&self, other: &dyn BipartiteStore) -> Result<bool, MeshlinkError> {
        if self.number_of_entities()? != other.number_of_entities()?
            || self.number_of_documents()? != other.number_of_documents()?
        {
            return Ok(false);
        }
        for id in self.entity_ids()? {
            if self.get_entity(&id)? != other.get_entity(&id)? {
                return Ok(false);
            }
        }
        for id in self.document_ids()? {
            if self.get_document(&id)? != other.get_document(&id)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Release backing resources. Idempotent after the first successful call.
    fn destroy(&self) -> Result<(), MeshlinkError>;
}

/// Undirected entity↔entity adjacency derived from [`BipartiteStore`] (§4.B).
pub trait UnipartiteStore: Send + Sync {
    /// No-op if `u == v`; idempotent.
    fn add_undirected(&self, u: &str, v: &str) -> Result<(), MeshlinkError>;
    fn neighbors(&self, u: &str) -> Result<std::collections::BTreeSet<EntityId>, MeshlinkError>;
    fn has_entity(&self, u: &str) -> Result<bool, MeshlinkError>;
    fn entity_ids(&self) -> Result<Vec<EntityId>, MeshlinkError>;
    fn number_of_entities(&self) -> Result<usize, MeshlinkError>;
    fn destroy(&self) -> Result<(), MeshlinkError>;
}
