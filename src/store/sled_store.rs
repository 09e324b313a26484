use std::collections::BTreeSet;
use std::path::Path;

use parking_lot::Mutex;

use crate::error::MeshlinkError;
use crate::model::{Document, DocumentId, Entity, EntityId};

use super::{BipartiteStore, UnipartiteStore};

/// Ordered on-disk key-value store (the Rust analog to an embedded "pebble"
/// backend). Keys are lexicographically ordered by `sled` itself, which
/// satisfies the prefix-scan stability the design requires without a custom
/// key scheme.
pub struct SledBipartiteStore {
    db: sled::Db,
    entities: sled::Tree,
    documents: sled::Tree,
    // A single writer per store, serialized across worker file-grain, is
    // sufficient per the concurrency model; sled's own tree operations are
    // atomic per-key but AddLink touches two keys at once.
    write_lock: Mutex<()>,
}

impl SledBipartiteStore {
    pub fn open(folder: impl AsRef<Path>) -> Result<Self, MeshlinkError> {
        let db = sled::open(folder)?;
        let entities = db.open_tree("entities")?;
        let documents = db.open_tree("documents")?;
        Ok(SledBipartiteStore {
            db,
            entities,
            documents,
            write_lock: Mutex::new(()),
        })
    }

    fn read_entity(tree: &sled::Tree, id: &str) -> Result<Option<Entity>, MeshlinkError> {
        match tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn read_document(tree: &sled::Tree, id: &str) -> Result<Option<Document>, MeshlinkError> {
        match tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl BipartiteStore for SledBipartiteStore {
    fn add_entity(&self, entity: Entity) -> Result<(), MeshlinkError> {
        let _guard = self.write_lock.lock();
        let merged = match Self::read_entity(&self.entities, &entity.id)? {
            Some(mut existing) => {
                existing.merge(entity)?;
                existing
            }
            None => entity,
        };
        self.entities
            .insert(merged.id.as_bytes(), serde_json::to_vec(&merged)?)?;
        Ok(())
    }

    fn add_document(&self, document: Document) -> Result<(), MeshlinkError> {
        let _guard = self.write_lock.lock();
        let merged = match Self::read_document(&self.documents, &document.id)? {
            Some(mut existing) => {
                existing.merge(document)?;
                existing
            }
            None => document,
        };
        self.documents
            .insert(merged.id.as_bytes(), serde_json::to_vec(&merged)?)?;
        Ok(())
    }

    fn add_link(&self, entity_id: &str, document_id: &str) -> Result<(), MeshlinkError> {
        let _guard = self.write_lock.lock();
        let mut entity = Self::read_entity(&self.entities, entity_id)?
            .ok_or_else(|| MeshlinkError::EntityNotFound(entity_id.to_string()))?;
        let mut document = Self::read_document(&self.documents, document_id)?
            .ok_or_else(|| MeshlinkError::DocumentNotFound(document_id.to_string()))?;
        entity.linked_documents.insert(document_id.to_string());
        document.linked_entities.insert(entity_id.to_string());
        self.entities
            .insert(entity_id.as_bytes(), serde_json::to_vec(&entity)?)?;
        self.documents
            .insert(document_id.as_bytes(), serde_json::to_vec(&document)?)?;
        Ok(())
    }

    fn get_entity(&self, id: &str) -> Result<Option<Entity>, MeshlinkError> {
        Self::read_entity(&self.entities, id)
    }

    fn get_document(&self, id: &str) -> Result<Option<Document>, MeshlinkError> {
        Self::read_document(&self.documents, id)
    }

    fn has_entity(&self, id: &str) -> Result<bool, MeshlinkError> {
        Ok(self.entities.contains_key(id.as_bytes())?)
    }

    fn has_document(&self, id: &str) -> Result<bool, MeshlinkError> {
        Ok(self.documents.contains_key(id.as_bytes())?)
    }

    fn entity_ids(&self) -> Result<Vec<EntityId>, MeshlinkError> {
        self.entities
            .iter()
            .keys()
            .map(|k| Ok(String::from_utf8_lossy(&k?).into_owned()))
            .collect()
    }

    fn document_ids(&self) -> Result<Vec<DocumentId>, MeshlinkError> {
        self.documents
            .iter()
            .keys()
            .map(|k| Ok(String::from_utf8_lossy(&k?).into_owned()))
            .collect()
    }

    fn number_of_entities(&self) -> Result<usize, MeshlinkError> {
        Ok(self.entities.len())
    }

    fn number_of_documents(&self) -> Result<usize, MeshlinkError> {
        Ok(self.documents.len())
    }

    fn number_of_linked_entities(&self) -> Result<usize, MeshlinkError> {
        let mut count = 0;
        for kv in self.entities.iter() {
            let (_, bytes) = kv?;
            let entity: Entity = serde_json::from_slice(&bytes)?;
            if !entity.linked_documents.is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }

    fn number_of_linked_documents(&self) -> Result<usize, MeshlinkError> {
        let mut count = 0;
        for kv in self.documents.iter() {
            let (_, bytes) = kv?;
            let document: Document = serde_json::from_slice(&bytes)?;
            if !document.linked_entities.is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }

    fn destroy(&self) -> Result<(), MeshlinkError> {
        self.entities.clear()?;
        self.documents.clear()?;
        self.db.flush()?;
        Ok(())
    }
}

/// Persistent undirected adjacency: one key per entity, value is the sorted
/// JSON-encoded neighbor set.
pub struct SledUnipartiteStore {
    db: sled::Db,
    neighbors: sled::Tree,
    write_lock: Mutex<()>,
}

impl SledUnipartiteStore {
    pub fn open(folder: impl AsRef<Path>) -> Result<Self, MeshlinkError> {
        let db = sled::open(folder)?;
        let neighbors = db.open_tree("neighbors")?;
        Ok(SledUnipartiteStore {
            db,
            neighbors,
            write_lock: Mutex::new(()),
        })
    }

    fn read_set(&self, id: &str) -> Result<Option<BTreeSet<EntityId>>, MeshlinkError> {
        match self.neighbors.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write_set(&self, id: &str, set: &BTreeSet<EntityId>) -> Result<(), MeshlinkError> {
        self.neighbors
            .insert(id.as_bytes(), serde_json::to_vec(set)?)?;
        Ok(())
    }
}

impl UnipartiteStore for SledUnipartiteStore {
    fn add_undirected(&self, u: &str, v: &str) -> Result<(), MeshlinkError> {
        if u == v {
            return Ok(());
        }
        let _guard = self.write_lock.lock();
        let mut u_set = self.read_set(u)?.unwrap_or_default();
        u_set.insert(v.to_string());
        self.write_set(u, &u_set)?;

        let mut v_set = self.read_set(v)?.unwrap_or_default();
        v_set.insert(u.to_string());
        self.write_set(v, &v_set)?;
        Ok(())
    }

    fn neighbors(&self, u: &str) -> Result<BTreeSet<EntityId>, MeshlinkError> {
        self.read_set(u)?
            .ok_or_else(|| MeshlinkError::EntityNotFound(u.to_string()))
    }

    fn has_entity(&self, u: &str) -> Result<bool, MeshlinkError> {
        Ok(self.neighbors.contains_key(u.as_bytes())?)
    }

    fn entity_ids(&self) -> Result<Vec<EntityId>, MeshlinkError> {
        self.neighbors
            .iter()
            .keys()
            .map(|k| Ok(String::from_utf8_lossy(&k?).into_owned()))
            .collect()
    }

    fn number_of_entities(&self) -> Result<usize, MeshlinkError> {
        Ok(self.neighbors.len())
    }

    fn destroy(&self) -> Result<(), MeshlinkError> {
        self.neighbors.clear()?;
        self.db.flush()?;
        Ok(())
    }
}
