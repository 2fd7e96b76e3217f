// Indexer module
// Keeps the vector store in step with the documents of a corpus


use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::corpus::{Corpus, DocumentFilter, FsCorpus, enumerate};
use crate::embeddings::EmbeddingProvider;
use crate::identity::{absolute_path, fingerprint, identify, relative_path};
use crate::store::{VectorRecord, VectorStore};
use crate::{Result, VaultError};

/// What [`Indexer::embed_document`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedOutcome {
    /// The content was embedded and the record written
    Embedded,
    /// The stored fingerprint matched; nothing was written
    Unchanged,
}

/// A document that could not be indexed during a sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a full-corpus sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Documents whose record is current after the sync, embedded or unchanged
    pub indexed: usize,
    /// Documents that actually had to be embedded
    pub embedded: usize,
    /// Stale records deleted
    pub removed: usize,
    /// Documents skipped because reading or embedding them failed
    pub failed: Vec<SyncFailure>,
}

impl SyncReport {
    #[inline]
    pub fn summary(&self) -> String {
        format!(
            "{} indexed ({} embedded, {} unchanged), {} removed, {} failed",
            self.indexed,
            self.embedded,
            self.indexed - self.embedded,
            self.removed,
            self.failed.len()
        )
    }
}

/// Writes embeddings for corpus documents into the vector store
pub struct Indexer {
    store: Arc<VectorStore>,
    embeddings: Arc<EmbeddingProvider>,
    corpus: Arc<dyn Corpus>,
    filter: DocumentFilter,
}

impl Indexer {
    #[inline]
    pub fn new(
        store: Arc<VectorStore>,
        embeddings: Arc<EmbeddingProvider>,
        corpus: Arc<dyn Corpus>,
        filter: DocumentFilter,
    ) -> Self {
        Self {
            store,
            embeddings,
            corpus,
            filter,
        }
    }

    /// Indexer over the local filesystem with the document filter from `config`
    #[inline]
    pub fn from_parts(
        config: &Config,
        store: Arc<VectorStore>,
        embeddings: Arc<EmbeddingProvider>,
    ) -> Self {
        Self::new(
            store,
            embeddings,
            Arc::new(FsCorpus),
            DocumentFilter::new(&config.corpus),
        )
    }

    /// Embed `content` as the document at `path`, unless it is already stored with the same fingerprint
    #[inline]
    pub async fn embed_document(
        &self,
        path: &Path,
        content: &str,
        corpus_root: &Path,
    ) -> Result<EmbedOutcome> {
        let relative = relative_path(path, corpus_root)?;
        let id = identify(&relative);
        let content_hash = fingerprint(content.as_bytes());

        if let Some(existing) = self.store.find(id.as_str()).await? {
            if existing.content_hash == content_hash.as_str() {
                debug!("Skipping unchanged document {}", relative);
                return Ok(EmbedOutcome::Unchanged);
            }
        }

        let vector = self.embeddings.embed(content).await?;
        let record = VectorRecord {
            id: id.to_string(),
            vector,
            path: relative,
            content_hash: content_hash.to_string(),
            last_updated: Utc::now().timestamp_millis(),
        };
        self.store.upsert(&record).await?;

        debug!("Embedded document {}", record.path);
        Ok(EmbedOutcome::Embedded)
    }

    /// Remove the record for the document at `path`; a document that was never indexed is fine
    #[inline]
    pub async fn remove_document(&self, path: &Path, corpus_root: &Path) -> Result<()> {
        let relative = relative_path(path, corpus_root)?;
        let id = identify(&relative);
        self.store.delete_by_id(id.as_str()).await?;

        debug!("Removed document {}", relative);
        Ok(())
    }

    /// Reconcile the store with every document under `corpus_root`.
    ///
    /// Records of documents that no longer exist are deleted, then each
    /// document is embedded if its content changed. Unreadable documents are
    /// reported in [`SyncReport::failed`] and keep their previous record.
    #[inline]
    pub async fn sync_corpus(&self, corpus_root: &Path) -> Result<SyncReport> {
        info!("Syncing corpus at {}", corpus_root.display());

        // Fail the whole sync up front when a shared resource is unusable
        self.store.table().await?;
        self.embeddings.model().await?;

        let enumeration = enumerate(self.corpus.as_ref(), corpus_root, &self.filter).await?;

        let current_ids: HashSet<String> = enumeration
            .documents
            .iter()
            .filter_map(|doc| relative_path(doc, corpus_root).ok())
            .map(|relative| identify(&relative).to_string())
            .collect();

        let mut report = SyncReport::default();

        for record in self.store.all_records().await? {
            if current_ids.contains(&record.id) {
                continue;
            }
            if enumeration.is_under_unreadable(&absolute_path(&record.path, corpus_root)) {
                debug!("Keeping {} under an unreadable directory", record.path);
                continue;
            }

            match self.store.delete_by_id(&record.id).await {
                Ok(()) => {
                    info!("Removed stale record for {}", record.path);
                    report.removed += 1;
                }
                Err(e @ VaultError::MalformedIdentifier(_)) => {
                    warn!("Skipping stale record with bad id for {}: {}", record.path, e);
                }
                Err(e) => return Err(e),
            }
        }

        for document in &enumeration.documents {
            match self.index_file(document, corpus_root).await {
                Ok(outcome) => {
                    report.indexed += 1;
                    if outcome == EmbedOutcome::Embedded {
                        report.embedded += 1;
                    }
                }
                Err(e) => {
                    warn!("Failed to index {}: {}", document.display(), e);
                    report.failed.push(SyncFailure {
                        path: document.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!("Sync of {} complete: {}", corpus_root.display(), report.summary());
        Ok(report)
    }

    async fn index_file(&self, path: &Path, corpus_root: &Path) -> Result<EmbedOutcome> {
        let bytes = self.corpus.read_document(path).await?;
        let content = String::from_utf8(bytes).map_err(|e| {
            VaultError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        self.embed_document(path, &content, corpus_root).await
    }
}
