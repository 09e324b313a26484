use std::io;

use http::status::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error taxonomy shared by the bipartite/unipartite stores, ingest pipeline,
/// path-finder, job runner and HTTP facade.
#[derive(Debug, Clone, Error)]
pub enum MeshlinkError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("malformed row: {0}")]
    ParseMalformed(String),
    #[error("missing field: {0}")]
    MissingField(String),
    #[error("invalid delimiter: {0}")]
    InvalidDelimiter(String),
    #[error("entity not found: {0}")]
    EntityNotFound(String),
    #[error("document not found: {0}")]
    DocumentNotFound(String),
    #[error("conflicting type for id {id}: existing {existing}, got {new}")]
    ConflictingType {
        id: String,
        existing: String,
        new: String,
    },
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error("ingest cancelled")]
    Cancelled,
}

impl MeshlinkError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MeshlinkError::ConfigInvalid(_) => StatusCode::BAD_REQUEST,
            MeshlinkError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MeshlinkError::ParseMalformed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MeshlinkError::MissingField(_) => StatusCode::BAD_REQUEST,
            MeshlinkError::InvalidDelimiter(_) => StatusCode::BAD_REQUEST,
            MeshlinkError::EntityNotFound(_) => StatusCode::NOT_FOUND,
            MeshlinkError::DocumentNotFound(_) => StatusCode::NOT_FOUND,
            MeshlinkError::ConflictingType { .. } => StatusCode::BAD_REQUEST,
            MeshlinkError::JobNotFound(_) => StatusCode::NOT_FOUND,
            MeshlinkError::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<io::Error> for MeshlinkError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => MeshlinkError::Io(format!("not found: {x}")),
            _ => MeshlinkError::Io(format!("{x}")),
        }
    }
}

impl From<serde_json::Error> for MeshlinkError {
    fn from(src: serde_json::Error) -> Self {
        MeshlinkError::ConfigInvalid(format!("JSON error: {src}"))
    }
}

impl From<csv::Error> for MeshlinkError {
    fn from(src: csv::Error) -> Self {
        MeshlinkError::ParseMalformed(format!("{src}"))
    }
}

impl From<sled::Error> for MeshlinkError {
    fn from(src: sled::Error) -> Self {
        MeshlinkError::Io(format!("sled error: {src}"))
    }
}

impl From<rust_xlsxwriter::XlsxError> for MeshlinkError {
    fn from(src: rust_xlsxwriter::XlsxError) -> Self {
        MeshlinkError::Io(format!("xlsx write error: {src}"))
    }
}

/// Serializable projection of [`MeshlinkError`] for embedding in a job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub message: String,
}

impl From<&MeshlinkError> for ErrorReport {
    fn from(err: &MeshlinkError) -> Self {
        ErrorReport {
            message: err.to_string(),
        }
    }
}
