use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Indexing error: {0}")]
    Indexer(#[from] indexer::IndexerError),

    #[error("Upload error: {0}")]
    Upload(#[from] documents::UploadError),

    #[error("Query error: {0}")]
    Query(#[from] query::QueryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod documents;
pub mod embeddings;
pub mod extraction;
pub mod index;
pub mod indexer;
pub mod query;
pub mod server;
