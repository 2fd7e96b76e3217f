// Service module
// Owns the shared store and model and hands out the engines that use them


use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::indexer::Indexer;
use crate::search::SearchEngine;
use crate::store::VectorStore;

/// Entry point to the index of one vault.
///
/// Construction does no I/O; the store and model are initialized by the first
/// operation that needs them and shared by every indexer and search engine
/// handed out afterwards.
pub struct VaultIndex {
    config: Config,
    store: Arc<VectorStore>,
    embeddings: Arc<EmbeddingProvider>,
}

impl VaultIndex {
    /// Index backed by LanceDB under the config's data directory and the configured Ollama model
    #[inline]
    pub fn from_config(config: Config) -> Self {
        let store = Arc::new(VectorStore::from_config(&config));
        let embeddings = Arc::new(EmbeddingProvider::ollama(&config));
        Self::new(config, store, embeddings)
    }

    #[inline]
    pub fn new(
        config: Config,
        store: Arc<VectorStore>,
        embeddings: Arc<EmbeddingProvider>,
    ) -> Self {
        debug!(
            "Vault index at {} using {}",
            store.db_path().display(),
            config.ollama.model
        );
        Self {
            config,
            store,
            embeddings,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    #[inline]
    pub fn embeddings(&self) -> &Arc<EmbeddingProvider> {
        &self.embeddings
    }

    /// Indexer over the local filesystem
    #[inline]
    pub fn indexer(&self) -> Indexer {
        Indexer::from_parts(
            &self.config,
            Arc::clone(&self.store),
            Arc::clone(&self.embeddings),
        )
    }

    #[inline]
    pub fn search(&self) -> SearchEngine {
        SearchEngine::new(Arc::clone(&self.store), Arc::clone(&self.embeddings))
    }

    /// Neither the store nor the model has failed to initialize
    #[inline]
    pub fn is_available(&self) -> bool {
        self.store.is_available() && self.embeddings.is_available()
    }
}
