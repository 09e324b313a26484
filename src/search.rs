//! Presence lookup and entity-detail composition from A+B (§4.K).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::MeshlinkError;
use crate::model::{DocumentId, Entity, EntityId};
use crate::store::{BipartiteStore, UnipartiteStore};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Presence {
    pub in_bipartite: bool,
    pub in_unipartite: bool,
}

/// Per-id presence flags.
pub fn search(
    bipartite: &dyn BipartiteStore,
    unipartite: &dyn UnipartiteStore,
    ids: &[String],
) -> Result<BTreeMap<EntityId, Presence>, MeshlinkError> {
    let mut out = BTreeMap::new();
    for id in ids {
        out.insert(
            id.clone(),
            Presence {
                in_bipartite: bipartite.has_entity(id)?,
                in_unipartite: unipartite.has_entity(id)?,
            },
        );
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDetail {
    pub presence: Presence,
    pub attributes: BTreeMap<String, String>,
    pub documents: Vec<DocumentId>,
    pub linked_entities: Vec<EntityId>,
}

/// Composite lookup: presence in both stores, A-side attributes/documents,
/// and the linked-entity set (B-neighbors ∪ document-co-occurring entities),
/// robust to per-document errors — a document that can't be read is skipped,
/// not propagated.
pub fn get_entity(
    bipartite: &dyn BipartiteStore,
    unipartite: &dyn UnipartiteStore,
    id: &str,
) -> Result<EntityDetail, MeshlinkError> {
    let in_unipartite = unipartite.has_entity(id)?;
    let entity: Option<Entity> = bipartite.get_entity(id)?;
    let in_bipartite = entity.is_some();

    let mut linked_entities: BTreeSet<EntityId> = BTreeSet::new();
    if in_unipartite {
        if let Ok(neighbors) = unipartite.neighbors(id) {
            linked_entities.extend(neighbors);
        }
    }

    let (attributes, documents) = match &entity {
        Some(e) => {
            for doc_id in &e.linked_documents {
                let Ok(Some(document)) = bipartite.get_document(doc_id) else {
                    continue;
                };
                for other in &document.linked_entities {
                    if other != id {
                        linked_entities.insert(other.clone());
                    }
                }
            }
            (
                e.attributes.clone(),
                e.linked_documents.iter().cloned().collect(),
            )
        }
        None => (BTreeMap::new(), Vec::new()),
    };

    Ok(EntityDetail {
        presence: Presence {
            in_bipartite,
            in_unipartite,
        },
        attributes,
        documents,
        linked_entities: linked_entities.into_iter().collect(),
    })
}
