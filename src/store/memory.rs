use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;
use petgraph::graph::{NodeIndex, UnGraph};

use crate::error::MeshlinkError;
use crate::model::{Document, DocumentId, Entity, EntityId};

use super::{BipartiteStore, UnipartiteStore};

/// All state in process; insertion order is irrelevant to every operation.
#[derive(Default)]
pub struct MemoryBipartiteStore {
    entities: RwLock<BTreeMap<EntityId, Entity>>,
    documents: RwLock<BTreeMap<DocumentId, Document>>,
}

impl MemoryBipartiteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BipartiteStore for MemoryBipartiteStore {
    fn add_entity(&self, entity: Entity) -> Result<(), MeshlinkError> {
        let mut entities = self.entities.write();
        match entities.get_mut(&entity.id) {
            Some(existing) => existing.merge(entity),
            None => {
                entities.insert(entity.id.clone(), entity);
                Ok(())
            }
        }
    }

    fn add_document(&self, document: Document) -> Result<(), MeshlinkError> {
        let mut documents = self.documents.write();
        match documents.get_mut(&document.id) {
            Some(existing) => existing.merge(document),
            None => {
                documents.insert(document.id.clone(), document);
                Ok(())
            }
        }
    }

    fn add_link(&self, entity_id: &str, document_id: &str) -> Result<(), MeshlinkError> {
        let mut entities = self.entities.write();
        let mut documents = self.documents.write();
        if !entities.contains_key(entity_id) {
            return Err(MeshlinkError::EntityNotFound(entity_id.to_string()));
        }
        if !documents.contains_key(document_id) {
            return Err(MeshlinkError::DocumentNotFound(document_id.to_string()));
        }
        entities
            .get_mut(entity_id)
            .unwrap()
            .linked_documents
            .insert(document_id.to_string());
        documents
            .get_mut(document_id)
            .unwrap()
            .linked_entities
            .insert(entity_id.to_string());
        Ok(())
    }

    fn get_entity(&self, id: &str) -> Result<Option<Entity>, MeshlinkError> {
        Ok(self.entities.read().get(id).cloned())
    }

    fn get_document(&self, id: &str) -> Result<Option<Document>, MeshlinkError> {
        Ok(self.documents.read().get(id).cloned())
    }

    fn has_entity(&self, id: &str) -> Result<bool, MeshlinkError> {
        Ok(self.entities.read().contains_key(id))
    }

    fn has_document(&self, id: &str) -> Result<bool, MeshlinkError> {
        Ok(self.documents.read().contains_key(id))
    }

    fn entity_ids(&self) -> Result<Vec<EntityId>, MeshlinkError> {
        Ok(self.entities.read().keys().cloned().collect())
    }

    fn document_ids(&self) -> Result<Vec<DocumentId>, MeshlinkError> {
        Ok(self.documents.read().keys().cloned().collect())
    }

    fn number_of_entities(&self) -> Result<usize, MeshlinkError> {
        Ok(self.entities.read().len())
    }

    fn number_of_documents(&self) -> Result<usize, MeshlinkError> {
        Ok(self.documents.read().len())
    }

    fn number_of_linked_entities(&self) -> Result<usize, MeshlinkError> {
        Ok(self
            .entities
            .read()
            .values()
            .filter(|e| !e.linked_documents.is_empty())
            .count())
    }

    fn number_of_linked_documents(&self) -> Result<usize, MeshlinkError> {
        Ok(self
            .documents
            .read()
            .values()
            .filter(|d| !d.linked_entities.is_empty())
            .count())
    }

    fn destroy(&self) -> Result<(), MeshlinkError> {
        self.entities.write().clear();
        self.documents.write().clear();
        Ok(())
    }
}

/// Undirected `petgraph` graph with a `BTreeMap` symbol table, since entity
/// ids are `String`s and `petgraph::graphmap::GraphMap` requires `Copy`
/// node weights.
#[derive(Default)]
pub struct MemoryUnipartiteStore {
    inner: RwLock<UnipartiteInner>,
}

#[derive(Default)]
struct UnipartiteInner {
    graph: UnGraph<EntityId, ()>,
    index: BTreeMap<EntityId, NodeIndex>,
}

impl UnipartiteInner {
    fn node_index(&mut self, id: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(id) {
            return *idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.index.insert(id.to_string(), idx);
        idx
    }
}

impl MemoryUnipartiteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UnipartiteStore for MemoryUnipartiteStore {
    fn add_undirected(&self, u: &str, v: &str) -> Result<(), MeshlinkError> {
        if u == v {
            return Ok(());
        }
        let mut inner = self.inner.write();
        let ui = inner.node_index(u);
        let vi = inner.node_index(v);
        if inner.graph.find_edge(ui, vi).is_none() {
            inner.graph.add_edge(ui, vi, ());
        }
        Ok(())
    }

    fn neighbors(&self, u: &str) -> Result<BTreeSet<EntityId>, MeshlinkError> {
        let inner = self.inner.read();
        let idx = inner
            .index
            .get(u)
            .ok_or_else(|| MeshlinkError::EntityNotFound(u.to_string()))?;
        Ok(inner
            .graph
            .neighbors(*idx)
            .map(|n| inner.graph[n].clone())
            .collect())
    }

    fn has_entity(&self, u: &str) -> Result<bool, MeshlinkError> {
        Ok(self.inner.read().index.contains_key(u))
    }

    fn entity_ids(&self) -> Result<Vec<EntityId>, MeshlinkError> {
        Ok(self.inner.read().index.keys().cloned().collect())
    }

    fn number_of_entities(&self) -> Result<usize, MeshlinkError> {
        Ok(self.inner.read().index.len())
    }

    fn destroy(&self) -> Result<(), MeshlinkError> {
        let mut inner = self.inner.write();
        inner.graph = UnGraph::default();
        inner.index.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_entity_merges_on_collision() {
        let store = MemoryBipartiteStore::new();
        let mut first = Entity::new("e1", "person");
        first.attributes.insert("name".to_string(), "Alice".to_string());
        store.add_entity(first).unwrap();

        let mut second = Entity::new("e1", "person");
        second.attributes.insert("age".to_string(), "30".to_string());
        store.add_entity(second).unwrap();

        let merged = store.get_entity("e1").unwrap().unwrap();
        assert_eq!(merged.attributes.get("name").unwrap(), "Alice");
        assert_eq!(merged.attributes.get("age").unwrap(), "30");
        assert_eq!(store.number_of_entities().unwrap(), 1);
    }

    #[test]
    fn add_link_rejects_unknown_entity_or_document() {
        let store = MemoryBipartiteStore::new();
        store.add_document(Document::new("d1", "article")).unwrap();
        let err = store.add_link("missing", "d1").unwrap_err();
        assert!(matches!(err, MeshlinkError::EntityNotFound(_)));

        store.add_entity(Entity::new("e1", "person")).unwrap();
        let err = store.add_link("e1", "missing").unwrap_err();
        assert!(matches!(err, MeshlinkError::DocumentNotFound(_)));
    }

    #[test]
    fn add_link_updates_both_sides() {
        let store = MemoryBipartiteStore::new();
        store.add_entity(Entity::new("e1", "person")).unwrap();
        store.add_document(Document::new("d1", "article")).unwrap();
        store.add_link("e1", "d1").unwrap();

        let entity = store.get_entity("e1").unwrap().unwrap();
        let document = store.get_document("d1").unwrap().unwrap();
        assert!(entity.linked_documents.contains("d1"));
        assert!(document.linked_entities.contains("e1"));
        assert_eq!(store.number_of_linked_entities().unwrap(), 1);
        assert_eq!(store.number_of_linked_documents().unwrap(), 1);
    }

    #[test]
    fn bipartite_destroy_clears_all_state() {
        let store = MemoryBipartiteStore::new();
        store.add_entity(Entity::new("e1", "person")).unwrap();
        store.add_document(Document::new("d1", "article")).unwrap();
        store.destroy().unwrap();
        assert_eq!(store.number_of_entities().unwrap(), 0);
        assert_eq!(store.number_of_documents().unwrap(), 0);
    }

    #[test]
    fn unipartite_add_undirected_is_symmetric_and_idempotent() {
        let store = MemoryUnipartiteStore::new();
        store.add_undirected("e1", "e2").unwrap();
        store.add_undirected("e1", "e2").unwrap();
        assert_eq!(store.neighbors("e1").unwrap(), ["e2".to_string()].into_iter().collect());
        assert_eq!(store.neighbors("e2").unwrap(), ["e1".to_string()].into_iter().collect());
        assert_eq!(store.number_of_entities().unwrap(), 2);
    }

    #[test]
    fn unipartite_self_loop_is_ignored() {
        let store = MemoryUnipartiteStore::new();
        store.add_undirected("e1", "e1").unwrap();
        assert_eq!(store.number_of_entities().unwrap(), 0);
    }

    #[test]
    fn unipartite_neighbors_of_unknown_entity_is_error() {
        let store = MemoryUnipartiteStore::new();
        let err = store.neighbors("missing").unwrap_err();
        assert!(matches!(err, MeshlinkError::EntityNotFound(_)));
    }

    #[test]
    fn unipartite_destroy_clears_graph() {
        let store = MemoryUnipartiteStore::new();
        store.add_undirected("e1", "e2").unwrap();
        store.destroy().unwrap();
        assert_eq!(store.number_of_entities().unwrap(), 0);
        assert!(!store.has_entity("e1").unwrap());
    }
}
