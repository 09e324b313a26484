//! Parallel CSV ingest pipeline (§4.D): phase 1 loads entities and documents
//! concurrently via bounded worker pools; phase 2, gated on phase 1
//! succeeding, loads links.
//!
//! Cancellation is a plain `Arc<AtomicBool>` flag polled between files,
//! mirroring the CLI's own Ctrl-C shutdown flag rather than introducing a
//! dedicated cancellation-token type.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{DocumentsFileConfig, EntitiesFileConfig, LinksFileConfig, MeshlinkConfig};
use crate::csv_readers::{read_skip_entities, DocumentCsvReader, EntityCsvReader, LinkCsvReader};
use crate::error::MeshlinkError;
use crate::store::BipartiteStore;

/// Number of workers per file category. Matches the teacher's pattern of a
/// small, fixed-but-configurable pool size rather than one worker per file.
const DEFAULT_WORKER_COUNT: usize = 4;

pub struct IngestOptions {
    pub worker_count: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions {
            worker_count: DEFAULT_WORKER_COUNT,
        }
    }
}

/// Runs a bounded worker pool over `files`, applying `process` to each file
/// path. The cancellation flag is polled between files; the first error any
/// worker produces aborts the whole pool (other workers drain-and-exit).
async fn run_pool<T, F>(
    files: Vec<T>,
    worker_count: usize,
    cancelled: Arc<AtomicBool>,
    process: F,
) -> Result<(), MeshlinkError>
where
    T: Send + 'static,
    F: Fn(T) -> Result<(), MeshlinkError> + Send + Sync + 'static,
{
    if files.is_empty() {
        return Ok(());
    }
    let worker_count = worker_count.max(1).min(files.len());
    // Pre-filled, closed work queue: the whole file list is queued up front
    // and workers drain it to empty rather than blocking for more input.
    let queue = Arc::new(Mutex::new(VecDeque::from(files)));
    let process = Arc::new(process);
    let (err_tx, mut err_rx) = tokio::sync::mpsc::channel::<MeshlinkError>(worker_count);

    let mut handles = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let queue = queue.clone();
        let process = process.clone();
        let cancelled = cancelled.clone();
        let err_tx = err_tx.clone();
        handles.push(tokio::task::spawn_blocking(move || loop {
            let file = match queue.lock().pop_front() {
                Some(file) => file,
                None => return,
            };
            if cancelled.load(Ordering::SeqCst) {
                return;
            }
            if let Err(e) = process(file) {
                cancelled.store(true, Ordering::SeqCst);
                let _ = err_tx.try_send(e);
                return;
            }
        }));
    }
    drop(err_tx);

    for handle in handles {
        let _ = handle.await;
    }

    if let Some(err) = err_rx.recv().await {
        return Err(err);
    }
    Ok(())
}

/// Runs phase 1 (entities + documents, concurrently) then, if it succeeded,
/// phase 2 (links).
///
/// `cancel` is shared with the caller (the CLI wires its ctrlc handler to the
/// same flag) so an external shutdown request is observed between files just
/// like a worker-triggered one.
pub async fn ingest(
    config: &MeshlinkConfig,
    store: Arc<dyn BipartiteStore>,
    options: IngestOptions,
    cancel: Arc<AtomicBool>,
) -> Result<(), MeshlinkError> {
    let cancelled = cancel;

    let entities_store = store.clone();
    let entities_files = config.graph_data.entities_files.clone();
    let entities_cancelled = cancelled.clone();
    let worker_count = options.worker_count;
    let entities_fut = run_pool(
        entities_files,
        worker_count,
        entities_cancelled,
        move |cfg: EntitiesFileConfig| ingest_entities_file(&entities_store, &cfg),
    );

    let documents_store = store.clone();
    let documents_files = config.graph_data.documents_files.clone();
    let documents_cancelled = cancelled.clone();
    let documents_fut = run_pool(
        documents_files,
        worker_count,
        documents_cancelled,
        move |cfg: DocumentsFileConfig| ingest_documents_file(&documents_store, &cfg),
    );

    let (entities_result, documents_result) = tokio::join!(entities_fut, documents_fut);
    entities_result?;
    documents_result?;

    let links_store = store.clone();
    let links_files = config.graph_data.links_files.clone();
    let ignore_invalid_links = config.ignore_invalid_links;
    run_pool(
        links_files,
        worker_count,
        cancelled,
        move |cfg: LinksFileConfig| {
            ingest_links_file(&links_store, &cfg, ignore_invalid_links)
        },
    )
    .await?;

    Ok(())
}

fn ingest_entities_file(
    store: &Arc<dyn BipartiteStore>,
    cfg: &EntitiesFileConfig,
) -> Result<(), MeshlinkError> {
    let reader = EntityCsvReader::open(&cfg.path, cfg)?;
    for entity in reader {
        store.add_entity(entity)?;
    }
    Ok(())
}

fn ingest_documents_file(
    store: &Arc<dyn BipartiteStore>,
    cfg: &DocumentsFileConfig,
) -> Result<(), MeshlinkError> {
    let reader = DocumentCsvReader::open(&cfg.path, cfg)?;
    for document in reader {
        store.add_document(document)?;
    }
    Ok(())
}

fn ingest_links_file(
    store: &Arc<dyn BipartiteStore>,
    cfg: &LinksFileConfig,
    ignore_invalid_links: bool,
) -> Result<(), MeshlinkError> {
    let reader = LinkCsvReader::open(&cfg.path, cfg)?;
    for link in reader {
        match store.add_link(&link.entity_id, &link.document_id) {
            Ok(()) => {}
            Err(e @ (MeshlinkError::EntityNotFound(_) | MeshlinkError::DocumentNotFound(_)))
                if ignore_invalid_links =>
            {
                tracing::warn!("ignoring invalid link {:?}: {e}", link);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Reads the skip-entities file named in the config, if any.
pub fn load_skip_entities(
    config: &MeshlinkConfig,
) -> Result<std::collections::BTreeSet<String>, MeshlinkError> {
    match &config.graph_data.skip_entities_file {
        Some(path) => read_skip_entities(path),
        None => Ok(std::collections::BTreeSet::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GraphDataConfig, GraphStoreConfig, StoreKind};
    use crate::store::MemoryBipartiteStore;
    use std::collections::BTreeMap;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn base_config(dir: &tempfile::TempDir, ignore_invalid_links: bool) -> MeshlinkConfig {
        let entities_path = write_file(dir, "entities.csv", "id,kind\ne1,person\ne2,person\n");
        let documents_path = write_file(dir, "documents.csv", "id,kind\nd1,doc\n");
        let links_path = write_file(
            dir,
            "links.csv",
            "entity,document\ne1,d1\ne2,d1\ne9,d1\n",
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
            ignore_invalid_links: ignore_invalid_links,
            signature_file: dir.path().join("sig.json").to_string_lossy().into_owned(),
        }
    }

    #[tokio::test]
    async fn ignores_invalid_links_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let config = base_config(&dir, true);
        let store: Arc<dyn BipartiteStore> = Arc::new(MemoryBipartiteStore::new());
        ingest(
            &config,
            store.clone(),
            IngestOptions::default(),
            Arc::new(AtomicBool::new(false)),
        )
        .await
        .unwrap();
        assert_eq!(store.number_of_entities().unwrap(), 2);
        assert_eq!(store.number_of_documents().unwrap(), 1);
        let d1 = store.get_document("d1").unwrap().unwrap();
        assert_eq!(d1.linked_entities.len(), 2);
    }

    #[tokio::test]
    async fn aborts_on_invalid_link_when_not_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config = base_config(&dir, false);
        let store: Arc<dyn BipartiteStore> = Arc::new(MemoryBipartiteStore::new());
        let err = ingest(
            &config,
            store.clone(),
            IngestOptions::default(),
            Arc::new(AtomicBool::new(false)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MeshlinkError::EntityNotFound(_)));
    }

    #[tokio::test]
    async fn pre_tripped_external_cancel_is_swallowed_not_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let config = base_config(&dir, false);
        let store: Arc<dyn BipartiteStore> = Arc::new(MemoryBipartiteStore::new());
        let cancel = Arc::new(AtomicBool::new(true));
        ingest(&config, store.clone(), IngestOptions::default(), cancel)
            .await
            .unwrap();
        assert_eq!(store.number_of_entities().unwrap(), 0);
    }
}
