// Embeddings module
// Text -> fixed-width unit vector, behind a lazily-initialized model handle


pub mod ollama;

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::lazy::Lazy;
use crate::{Result, VaultError};

pub use ollama::{OllamaClient, OllamaModel};

/// Dimensionality of the default embedding model (all-MiniLM-L6-v2)
pub const EMBEDDING_DIMENSION: usize = 384;

/// A loaded text embedding model.
///
/// Implementations return mean-pooled token embeddings; the provider takes
/// care of normalization and dimension checks.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Model name for logs and status output
    fn name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

type ModelLoader = Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn EmbeddingModel>>> + Send + Sync>;

/// Process-wide handle to the embedding model.
///
/// The model is loaded on the first call that needs it. Concurrent first
/// calls share a single load, and a failed load is remembered so later calls
/// fail fast with [`VaultError::Unavailable`] instead of loading again.
pub struct EmbeddingProvider {
    dimension: usize,
    loader: ModelLoader,
    model: Lazy<Arc<dyn EmbeddingModel>>,
}

impl EmbeddingProvider {
    /// Provider whose model is produced by `loader` on first use
    #[inline]
    pub fn new<F, Fut>(dimension: usize, loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn EmbeddingModel>>> + Send + 'static,
    {
        Self {
            dimension,
            loader: Box::new(move || Box::pin(loader())),
            model: Lazy::new("embedding model"),
        }
    }

    /// Provider backed by the Ollama server described in `config`
    #[inline]
    pub fn ollama(config: &Config) -> Self {
        let ollama = config.ollama.clone();
        let dimension = config.embedding_dimension();

        Self::new(dimension, move || {
            let ollama = ollama.clone();
            async move {
                let model = OllamaModel::connect(&ollama, dimension).await?;
                Ok(Arc::new(model) as Arc<dyn EmbeddingModel>)
            }
        })
    }

    /// Provider around an already-loaded model
    #[inline]
    pub fn from_model(dimension: usize, model: Arc<dyn EmbeddingModel>) -> Self {
        Self {
            dimension,
            loader: Box::new(|| {
                Box::pin(async {
                    Err(VaultError::Embedding(
                        "preloaded provider has no loader".to_string(),
                    ))
                })
            }),
            model: Lazy::ready("embedding model", model),
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// False once loading the model has failed
    #[inline]
    pub fn is_available(&self) -> bool {
        self.model.is_available()
    }

    /// The shared model handle, loading it if necessary
    #[inline]
    pub async fn model(&self) -> Result<Arc<dyn EmbeddingModel>> {
        self.model.get_or_init(|| (self.loader)()).await
    }

    /// Embed `text` into a unit vector of exactly [`Self::dimension`] components
    #[inline]
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model().await?;
        let mut vector = model.embed(text).await?;

        if vector.len() != self.dimension {
            return Err(VaultError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        normalize(&mut vector)?;
        debug!(
            "Embedded {} bytes with {} into {} dimensions",
            text.len(),
            model.name(),
            vector.len()
        );
        Ok(vector)
    }
}

impl fmt::Debug for EmbeddingProvider {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingProvider")
            .field("dimension", &self.dimension)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Scale `vector` to unit L2 length in place
#[inline]
pub fn normalize(vector: &mut [f32]) -> Result<()> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();

    if !norm.is_finite() || norm == 0.0 {
        return Err(VaultError::Embedding(format!(
            "cannot normalize embedding with norm {}",
            norm
        )));
    }

    for value in vector.iter_mut() {
        *value /= norm;
    }
    Ok(())
}
