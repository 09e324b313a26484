//! Top-level bootstrap (§2, §9): the builder that opens the bipartite and
//! unipartite store backends named by a [`MeshlinkConfig`], runs the
//! signature gate, and performs ingest+projection when required.
//!
//! Per the design notes, the builder is the only party authorized to
//! `destroy` the stores it returns — callers elsewhere only ever borrow them.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::Utc;

use crate::config::{resolve_folder, GraphStoreConfig, MeshlinkConfig};
use crate::error::MeshlinkError;
use crate::ingest::{self, IngestOptions};
use crate::projection;
use crate::signature;
use crate::store::{
    BipartiteStore, MemoryBipartiteStore, MemoryUnipartiteStore, SledBipartiteStore,
    SledUnipartiteStore, UnipartiteStore,
};

/// The two graph stores query components borrow against. Owns both; safe to
/// call [`GraphHandles::destroy`] more than once.
pub struct GraphHandles {
    pub bipartite: Arc<dyn BipartiteStore>,
    pub unipartite: Arc<dyn UnipartiteStore>,
}

impl GraphHandles {
    pub fn destroy(&self) -> Result<(), MeshlinkError> {
        self.bipartite.destroy()?;
        self.unipartite.destroy()?;
        Ok(())
    }
}

/// Resolves a persistent store's folder, wiping it first if `rebuild` and the
/// config asked to delete stale files. Ephemeral configs need no folder.
fn prepare_folder(cfg: &GraphStoreConfig, rebuild: bool) -> Result<Option<PathBuf>, MeshlinkError> {
    if cfg.is_ephemeral() {
        return Ok(None);
    }
    let folder = resolve_folder(cfg)?;
    if rebuild && cfg.delete_files_in_folder {
        let _ = fs::remove_dir_all(&folder);
    }
    fs::create_dir_all(&folder)?;
    Ok(Some(folder))
}

fn open_bipartite(cfg: &GraphStoreConfig, rebuild: bool) -> Result<Arc<dyn BipartiteStore>, MeshlinkError> {
    match prepare_folder(cfg, rebuild)? {
        None => Ok(Arc::new(MemoryBipartiteStore::new())),
        Some(folder) => Ok(Arc::new(SledBipartiteStore::open(folder)?)),
    }
}

fn open_unipartite(cfg: &GraphStoreConfig, rebuild: bool) -> Result<Arc<dyn UnipartiteStore>, MeshlinkError> {
    match prepare_folder(cfg, rebuild)? {
        None => Ok(Arc::new(MemoryUnipartiteStore::new())),
        Some(folder) => Ok(Arc::new(SledUnipartiteStore::open(folder)?)),
    }
}

/// Builds (or, per the signature gate, reuses) the bipartite and unipartite
/// stores named by `config`: check the gate, ingest into A if required, then
/// project A into B (§2's data flow). `cancel` lets a caller (the CLI's
/// ctrlc handler) abort ingest cooperatively.
pub async fn build(
    config: &MeshlinkConfig,
    options: IngestOptions,
    cancel: Arc<AtomicBool>,
) -> Result<GraphHandles, MeshlinkError> {
    let current_signature = signature::compute_signature(config)?;
    let rebuild = signature::is_rebuild_required(config, &current_signature)?;

    let bipartite = open_bipartite(&config.bipartite_graph_config, rebuild)?;
    let unipartite = open_unipartite(&config.unipartite_graph_config, rebuild)?;

    if rebuild {
        tracing::info!("inputs changed (or store is ephemeral); rebuilding graph stores");
        ingest::ingest(config, bipartite.clone(), options, cancel).await?;
        let skip = ingest::load_skip_entities(config)?;
        projection::project(bipartite.as_ref(), unipartite.as_ref(), &skip)?;
        if !config.bipartite_graph_config.is_ephemeral() {
            signature::write_signature(config, current_signature, Utc::now())?;
        }
    } else {
        tracing::info!("inputs unchanged; skipping ingest");
    }

    Ok(GraphHandles { bipartite, unipartite })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DocumentsFileConfig, EntitiesFileConfig, GraphDataConfig, LinksFileConfig, StoreKind,
    };
    use std::collections::BTreeMap;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn memory_config(dir: &tempfile::TempDir) -> MeshlinkConfig {
        let entities_path = write_file(dir, "entities.csv", "id,kind\ne1,person\ne2,person\ne3,person\ne4,person\n");
        let documents_path = write_file(
            dir,
            "documents.csv",
            "id,kind\nd1,doc\nd2,doc\nd3,doc\nd4,doc\n",
        );
        let links_path = write_file(
            dir,
            "links.csv",
            "entity,document\ne1,d1\ne2,d1\ne1,d2\ne2,d2\ne1,d3\ne3,d3\ne3,d4\ne4,d4\n",
        );
        MeshlinkConfig {
            graph_data: GraphDataConfig {
                entities_files: vec![EntitiesFileConfig {
                    path: entities_path,
                    entity_type: "person".to_string(),
                    delimiter: ",".to_string(),
                    entity_id_field: "id".to_string(),
                    field_to_attribute: BTreeMap::new(),
                }],
                documents_files: vec![DocumentsFileConfig {
                    path: documents_path,
                    document_type: "doc".to_string(),
                    delimiter: ",".to_string(),
                    document_id_field: "id".to_string(),
                    field_to_attribute: BTreeMap::new(),
                }],
                links_files: vec![LinksFileConfig {
                    path: links_path,
                    entity_id_field: "entity".to_string(),
                    document_id_field: "document".to_string(),
                    delimiter: ",".to_string(),
                }],
                skip_entities_file: None,
            },
            bipartite_graph_config: GraphStoreConfig {
                kind: StoreKind::Memory,
                folder: "<TEMP>".to_string(),
                delete_files_in_folder: false,
            },
            unipartite_graph_config: GraphStoreConfig {
                kind: StoreKind::Memory,
                folder: "<TEMP>".to_string(),
                delete_files_in_folder: false,
            },
            ignore_invalid_links: false,
            signature_file: dir.path().join("sig.json").to_string_lossy().into_owned(),
        }
    }

    #[tokio::test]
    async fn builds_unipartite_projection_from_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let config = memory_config(&dir);
        let handles = build(
            &config,
            IngestOptions::default(),
            Arc::new(AtomicBool::new(false)),
        )
        .await
        .unwrap();
        assert_eq!(handles.bipartite.number_of_entities().unwrap(), 4);
        assert_eq!(
            handles.unipartite.neighbors("e1").unwrap(),
            ["e2", "e3"].into_iter().map(String::from).collect()
        );
        handles.destroy().unwrap();
    }

    #[tokio::test]
    async fn ephemeral_store_always_rebuilds_even_with_prior_signature() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = memory_config(&dir);
        let signatures = signature::compute_signature(&config).unwrap();
        signature::write_signature(&config, signatures, Utc::now()).unwrap();

        // Ephemeral configs bypass the gate unconditionally.
        config.bipartite_graph_config.delete_files_in_folder = false;
        let handles = build(
            &config,
            IngestOptions::default(),
            Arc::new(AtomicBool::new(false)),
        )
        .await
        .unwrap();
        assert_eq!(handles.bipartite.number_of_entities().unwrap(), 4);
    }
}
