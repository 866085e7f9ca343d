pub mod config;
pub use config::{Config, ExportConfig, FilterConfig, PagingConfig, ProbeConfig};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("engine error: {0}")]
    Engine(String),
    #[error("schema probe failed: {0}")]
    SchemaProbe(String),
    #[error("data load failed: {0}")]
    DataLoad(String),
    #[error("metadata probe failed for column '{column}': {message}")]
    MetadataProbe { column: String, message: String },
    #[error("invalid filter on column '{column}': {reason}")]
    Filter { column: String, reason: String },
    #[error("export failed: {0}")]
    Export(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, GridError>;
