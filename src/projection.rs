//! Projection of the bipartite store A into the unipartite store B (§4.E).
//!
//! Single pass over all documents: for each, drop `Skip` members from the
//! linked-entity set and add every remaining unordered pair as an edge.
//! Only one document's edge set is held in memory at a time.

use std::collections::BTreeSet;

use crate::error::MeshlinkError;
use crate::store::{BipartiteStore, UnipartiteStore};

pub fn project(
    bipartite: &dyn BipartiteStore,
    unipartite: &dyn UnipartiteStore,
    skip: &BTreeSet<String>,
) -> Result<(), MeshlinkError> {
    for document_id in bipartite.document_ids()? {
        let Some(document) = bipartite.get_document(&document_id)? else {
            continue;
        };
        let members: Vec<&String> = document
            .linked_entities
            .iter()
            .filter(|id| !skip.contains(*id))
            .collect();
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                unipartite.add_undirected(members[i], members[j])?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, Entity};
    use crate::store::{MemoryBipartiteStore, MemoryUnipartiteStore};

    fn seed(docs: &[(&str, &[&str])]) -> MemoryBipartiteStore {
        let store = MemoryBipartiteStore::new();
        let mut seen_entities = BTreeSet::new();
        for (doc_id, entities) in docs {
            store.add_document(Document::new(*doc_id, "doc")).unwrap();
            for e in *entities {
                if seen_entities.insert(e.to_string()) {
                    store.add_entity(Entity::new(*e, "person")).unwrap();
                }
                store.add_link(e, doc_id).unwrap();
            }
        }
        store
    }

    #[test]
    fn projects_pairs_with_and_without_skip() {
        let bipartite = seed(&[
            ("d1", &["e1", "e2"]),
            ("d2", &["e1", "e2"]),
            ("d3", &["e1", "e3"]),
            ("d4", &["e3", "e4"]),
        ]);

        let unipartite = MemoryUnipartiteStore::new();
        project(&bipartite, &unipartite, &BTreeSet::new()).unwrap();
        assert_eq!(unipartite.neighbors("e1").unwrap(), set(&["e2", "e3"]));
        assert_eq!(unipartite.neighbors("e2").unwrap(), set(&["e1"]));
        assert_eq!(unipartite.neighbors("e3").unwrap(), set(&["e1", "e4"]));
        assert_eq!(unipartite.neighbors("e4").unwrap(), set(&["e3"]));

        let unipartite_skip = MemoryUnipartiteStore::new();
        let mut skip = BTreeSet::new();
        skip.insert("e1".to_string());
        project(&bipartite, &unipartite_skip, &skip).unwrap();
        assert!(!unipartite_skip.has_entity("e1").unwrap());
        assert_eq!(unipartite_skip.neighbors("e3").unwrap(), set(&["e4"]));
        assert_eq!(unipartite_skip.neighbors("e4").unwrap(), set(&["e3"]));
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }
}
