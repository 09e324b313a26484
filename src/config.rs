//! Top-level JSON configuration (§6) plus the signature file shape it is
//! checked against (§4.F).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MeshlinkError;

/// Sentinel `folder` value requesting a fresh temporary directory.
pub const TEMP_FOLDER_SENTINEL: &str = "<TEMP>";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitiesFileConfig {
    pub path: String,
    #[serde(rename = "entityType")]
    pub entity_type: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(rename = "entityIdField")]
    pub entity_id_field: String,
    #[serde(rename = "fieldToAttribute", default)]
    pub field_to_attribute: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsFileConfig {
    pub path: String,
    #[serde(rename = "documentType")]
    pub document_type: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(rename = "documentIdField")]
    pub document_id_field: String,
    #[serde(rename = "fieldToAttribute", default)]
    pub field_to_attribute: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksFileConfig {
    pub path: String,
    #[serde(rename = "entityIdField")]
    pub entity_id_field: String,
    #[serde(rename = "documentIdField")]
    pub document_id_field: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_delimiter() -> String {
    ",".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDataConfig {
    #[serde(rename = "entitiesFiles")]
    pub entities_files: Vec<EntitiesFileConfig>,
    #[serde(rename = "documentsFiles")]
    pub documents_files: Vec<DocumentsFileConfig>,
    #[serde(rename = "linksFiles")]
    pub links_files: Vec<LinksFileConfig>,
    #[serde(rename = "skipEntitiesFile")]
    pub skip_entities_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Pebble,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStoreConfig {
    #[serde(rename = "type")]
    pub kind: StoreKind,
    pub folder: String,
    #[serde(rename = "deleteFilesInFolder", default)]
    pub delete_files_in_folder: bool,
}

impl GraphStoreConfig {
    pub fn is_ephemeral(&self) -> bool {
        self.kind == StoreKind::Memory
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshlinkConfig {
    #[serde(rename = "graphData")]
    pub graph_data: GraphDataConfig,
    #[serde(rename = "bipartiteGraphConfig")]
    pub bipartite_graph_config: GraphStoreConfig,
    #[serde(rename = "unipartiteGraphConfig")]
    pub unipartite_graph_config: GraphStoreConfig,
    #[serde(rename = "ignoreInvalidLinks", default)]
    pub ignore_invalid_links: bool,
    #[serde(rename = "signatureFile")]
    pub signature_file: String,
}

impl MeshlinkConfig {
    /// Loads the config and resolves every relative file path against
    /// `<config dir>/data/`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MeshlinkError> {
        let path = path.as_ref();
        tracing::debug!("loading config from {:?}", path);
        let content = fs::read_to_string(path)?;
        let mut config: MeshlinkConfig = serde_json::from_str(&content)
            .map_err(|e| MeshlinkError::ConfigInvalid(format!("{e}")))?;

        let base = path
            .parent()
            .map(|p| p.join("data"))
            .unwrap_or_else(|| PathBuf::from("data"));
        let resolve = |p: &str| -> String {
            let candidate = Path::new(p);
            if candidate.is_absolute() {
                p.to_string()
            } else {
                base.join(candidate).to_string_lossy().into_owned()
            }
        };

        for f in &mut config.graph_data.entities_files {
            f.path = resolve(&f.path);
        }
        for f in &mut config.graph_data.documents_files {
            f.path = resolve(&f.path);
        }
        for f in &mut config.graph_data.links_files {
            f.path = resolve(&f.path);
        }
        if let Some(skip) = &config.graph_data.skip_entities_file {
            config.graph_data.skip_entities_file = Some(resolve(skip));
        }
        config.signature_file = resolve(&config.signature_file);

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), MeshlinkError> {
        for f in &self.graph_data.entities_files {
            if f.delimiter.chars().count() != 1 {
                return Err(MeshlinkError::InvalidDelimiter(f.delimiter.clone()));
            }
        }
        for f in &self.graph_data.documents_files {
            if f.delimiter.chars().count() != 1 {
                return Err(MeshlinkError::InvalidDelimiter(f.delimiter.clone()));
            }
        }
        for f in &self.graph_data.links_files {
            if f.delimiter.chars().count() != 1 {
                return Err(MeshlinkError::InvalidDelimiter(f.delimiter.clone()));
            }
        }
        Ok(())
    }
}

/// Resolves a `GraphStoreConfig`'s `folder`, materializing `<TEMP>` into a
/// fresh temporary directory. Memory-backed stores ignore the folder.
pub fn resolve_folder(cfg: &GraphStoreConfig) -> Result<PathBuf, MeshlinkError> {
    if cfg.folder == TEMP_FOLDER_SENTINEL {
        let dir = tempfile::Builder::new()
            .prefix("meshlink-")
            .tempdir()
            .map_err(MeshlinkError::from)?;
        // The store must outlive this function call for the rest of the
        // process, so we leak the handle rather than let it clean up on drop.
        Ok(dir.keep())
    } else {
        Ok(PathBuf::from(&cfg.folder))
    }
}

pub fn get_content<P: AsRef<Path>>(path: P) -> Result<String, MeshlinkError> {
    tracing::debug!("reading {:?}", path.as_ref());
    Ok(fs::read_to_string(path)?)
}
