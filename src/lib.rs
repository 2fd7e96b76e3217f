use thiserror::Error;

pub type Result<T> = std::result::Result<T, VaultError>;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Malformed identifier: {0:?}")]
    MalformedIdentifier(String),

    #[error("{resource} unavailable: {message}")]
    Unavailable {
        resource: &'static str,
        message: String,
    },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Path {path} is not inside corpus root {root}")]
    OutsideCorpus { path: String, root: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl VaultError {
    /// True when the error comes from a resource that failed to initialize,
    /// as opposed to a failure of this particular call.
    #[inline]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

pub mod commands;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod identity;
pub mod indexer;
pub mod lazy;
pub mod search;
pub mod service;
pub mod store;

#[cfg(test)]
mod test_support;

pub use indexer::{EmbedOutcome, Indexer, SyncFailure, SyncReport};
pub use search::{SearchEngine, SearchResult};
pub use service::VaultIndex;
