// Shared fixtures for unit tests

use async_trait::async_trait;
use sha2::{Digest as _, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

use crate::Result;
use crate::config::Config;
use crate::embeddings::{EmbeddingModel, EmbeddingProvider};
use crate::store::VectorStore;

pub const TEST_DIMENSION: usize = 64;

/// Deterministic bag-of-words embedder that counts its calls
#[derive(Debug, Default)]
pub struct CountingModel {
    calls: AtomicUsize,
}

impl CountingModel {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingModel for CountingModel {
    fn name(&self) -> &str {
        "counting"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(bag_of_words(text))
    }
}

/// Hash each lowercase word into one of `TEST_DIMENSION` buckets
pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; TEST_DIMENSION];
    for word in text.split_whitespace() {
        let digest = Sha256::digest(word.to_lowercase().as_bytes());
        vector[usize::from(digest[0]) % TEST_DIMENSION] += 1.0;
    }
    // Keep empty documents embeddable
    vector[TEST_DIMENSION - 1] += 0.01;
    vector
}

pub struct Fixture {
    pub temp_dir: TempDir,
    pub root: PathBuf,
    pub model: Arc<CountingModel>,
    pub store: Arc<VectorStore>,
    pub embeddings: Arc<EmbeddingProvider>,
}

impl Fixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let root = temp_dir.path().join("vault");
        fs::create_dir_all(&root).expect("should create vault dir");

        let model = Arc::new(CountingModel::default());
        let store = Arc::new(VectorStore::new(
            temp_dir.path().join("lancedb"),
            "notes",
            TEST_DIMENSION,
        ));
        let embeddings = Arc::new(EmbeddingProvider::from_model(
            TEST_DIMENSION,
            Arc::clone(&model) as Arc<dyn EmbeddingModel>,
        ));

        Self {
            temp_dir,
            root,
            model,
            store,
            embeddings,
        }
    }

    pub fn config(&self) -> Config {
        let mut config = Config {
            base_dir: self.temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        config.ollama.embedding_dimension = TEST_DIMENSION as u32;
        config
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        write_file(&self.root, relative, content.as_bytes())
    }

    pub fn write_bytes(&self, relative: &str, content: &[u8]) -> PathBuf {
        write_file(&self.root, relative, content)
    }
}

fn write_file(root: &Path, relative: &str, content: &[u8]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("should create parent dirs");
    }
    fs::write(&path, content).expect("should write file");
    path
}

/// Provider whose model never loads
pub fn failing_provider() -> EmbeddingProvider {
    EmbeddingProvider::new(TEST_DIMENSION, || async {
        Err(crate::VaultError::Embedding(
            "model weights not found".to_string(),
        ))
    })
}
