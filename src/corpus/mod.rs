// Corpus filesystem access
// Enumerates the documents under a corpus root and reads their contents


use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::CorpusConfig;
use crate::{Result, VaultError};

/// A directory entry as reported by [`Corpus::list_directory`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Result of walking a corpus root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enumeration {
    /// Absolute paths of every eligible document
    pub documents: Vec<PathBuf>,
    /// Subdirectories that could not be listed; their documents are unknown, not absent
    pub unreadable_dirs: Vec<PathBuf>,
}

impl Enumeration {
    /// Whether `path` lies under a directory that could not be listed
    #[inline]
    pub fn is_under_unreadable(&self, path: &Path) -> bool {
        self.unreadable_dirs.iter().any(|dir| path.starts_with(dir))
    }
}

/// Read access to the documents of a corpus
#[async_trait]
pub trait Corpus: Send + Sync {
    /// Direct children of `dir`
    async fn list_directory(&self, dir: &Path) -> Result<Vec<DirEntry>>;

    /// Raw bytes of the document at `path`
    async fn read_document(&self, path: &Path) -> Result<Vec<u8>>;
}

/// Filter deciding which entries of a corpus are documents
#[derive(Debug, Clone)]
pub struct DocumentFilter {
    extensions: Vec<String>,
    hidden_prefix: String,
}

impl DocumentFilter {
    #[inline]
    pub fn new(config: &CorpusConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            hidden_prefix: config.hidden_prefix.clone(),
        }
    }

    #[inline]
    pub fn is_hidden(&self, name: &str) -> bool {
        name.starts_with(&self.hidden_prefix)
    }

    /// Extension match is ASCII case-insensitive: `Note.MD` is a document
    #[inline]
    pub fn is_document(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

impl Default for DocumentFilter {
    fn default() -> Self {
        Self::new(&CorpusConfig::default())
    }
}

/// Recursively collect the documents below `root`.
///
/// Hidden entries are skipped along with everything beneath them. A
/// subdirectory that cannot be listed is recorded in
/// [`Enumeration::unreadable_dirs`] and the walk continues; failing to list
/// `root` itself is an error.
#[inline]
pub async fn enumerate(
    corpus: &dyn Corpus,
    root: &Path,
    filter: &DocumentFilter,
) -> Result<Enumeration> {
    let mut enumeration = Enumeration::default();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match corpus.list_directory(&dir).await {
            Ok(entries) => entries,
            Err(e) if dir.as_path() != root => {
                warn!("Failed to read directory {}: {}", dir.display(), e);
                enumeration.unreadable_dirs.push(dir);
                continue;
            }
            Err(e) => return Err(e),
        };

        for entry in entries {
            if filter.is_hidden(&entry.name) {
                continue;
            }
            if entry.is_dir {
                pending.push(entry.path);
            } else if filter.is_document(&entry.name) {
                enumeration.documents.push(entry.path);
            }
        }
    }

    enumeration.documents.sort();
    debug!(
        "Enumerated {} documents under {} ({} unreadable directories)",
        enumeration.documents.len(),
        root.display(),
        enumeration.unreadable_dirs.len()
    );
    Ok(enumeration)
}

/// [`Corpus`] backed by the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsCorpus;

#[async_trait]
impl Corpus for FsCorpus {
    async fn list_directory(&self, dir: &Path) -> Result<Vec<DirEntry>> {
        let mut read_dir = tokio::fs::read_dir(dir).await?;
        let mut entries = Vec::new();

        while let Some(entry) = read_dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            // Symlinks and special files are neither followed nor indexed
            #[expect(clippy::filetype_is_file, reason = "anything else is skipped")]
            let indexable = file_type.is_dir() || file_type.is_file();
            if !indexable {
                continue;
            }
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
                is_dir: file_type.is_dir(),
            });
        }

        Ok(entries)
    }

    async fn read_document(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path).await.map_err(VaultError::from)
    }
}
