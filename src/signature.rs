//! Content-hash rebuild gate (§4.F): decides whether a persistent store's
//! ingest+projection must run, by comparing a SHA-256 signature of every
//! configured input file against the previously written signature file.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::MeshlinkConfig;
use crate::error::MeshlinkError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub signatures: BTreeMap<String, String>,
    #[serde(rename = "dateCreated")]
    pub date_created: DateTime<Utc>,
}

fn hash_file(path: &Path) -> Result<String, MeshlinkError> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Computes the signature of every configured input file, keyed by file name.
pub fn compute_signature(config: &MeshlinkConfig) -> Result<BTreeMap<String, String>, MeshlinkError> {
    let mut signatures = BTreeMap::new();
    for f in &config.graph_data.entities_files {
        signatures.insert(file_name(&f.path), hash_file(Path::new(&f.path))?);
    }
    for f in &config.graph_data.documents_files {
        signatures.insert(file_name(&f.path), hash_file(Path::new(&f.path))?);
    }
    for f in &config.graph_data.links_files {
        signatures.insert(file_name(&f.path), hash_file(Path::new(&f.path))?);
    }
    if let Some(skip) = &config.graph_data.skip_entities_file {
        signatures.insert(file_name(skip), hash_file(Path::new(skip))?);
    }
    Ok(signatures)
}

fn read_previous(path: &str) -> Result<Option<Signature>, MeshlinkError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Whether ingest+projection must run. Ephemeral backends always rebuild.
pub fn is_rebuild_required(
    config: &MeshlinkConfig,
    current: &BTreeMap<String, String>,
) -> Result<bool, MeshlinkError> {
    if config.bipartite_graph_config.is_ephemeral() || config.unipartite_graph_config.is_ephemeral() {
        return Ok(true);
    }
    match read_previous(&config.signature_file)? {
        None => Ok(true),
        Some(previous) => Ok(previous.signatures != *current),
    }
}

/// Writes the new signature file after a successful ingest.
pub fn write_signature(
    config: &MeshlinkConfig,
    signatures: BTreeMap<String, String>,
    date_created: DateTime<Utc>,
) -> Result<(), MeshlinkError> {
    let signature = Signature {
        signatures,
        date_created,
    };
    let json = serde_json::to_string_pretty(&signature)?;
    fs::write(&config.signature_file, json)?;
    Ok(())
}
