// Search module
// Similarity queries over the vector store with per-path deduplication


use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};

use crate::Result;
use crate::embeddings::EmbeddingProvider;
use crate::identity::absolute_path;
use crate::store::{Neighbor, VectorStore};

/// Largest squared L2 distance between two unit vectors
pub const MAX_L2_DISTANCE: f32 = 4.0;

/// A matching document; lower `score` is more similar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub path: PathBuf,
    pub score: f32,
}

impl SearchResult {
    /// Score mapped onto 0..=100, higher is more relevant
    #[inline]
    pub fn relevance(&self) -> u8 {
        if self.score.is_nan() {
            return 0;
        }
        let distance = self.score.clamp(0.0, MAX_L2_DISTANCE);
        // Within 0..=100 after the clamp
        ((1.0 - distance / MAX_L2_DISTANCE) * 100.0).round() as u8
    }
}

pub struct SearchEngine {
    store: Arc<VectorStore>,
    embeddings: Arc<EmbeddingProvider>,
}

impl SearchEngine {
    #[inline]
    pub fn new(store: Arc<VectorStore>, embeddings: Arc<EmbeddingProvider>) -> Self {
        Self { store, embeddings }
    }

    /// Both the model and the store are usable, or have not been tried yet
    #[inline]
    pub fn is_available(&self) -> bool {
        self.store.is_available() && self.embeddings.is_available()
    }

    /// Up to `limit` documents closest to `query`, one result per path.
    ///
    /// A blank query or a zero limit returns nothing without loading the model.
    #[inline]
    pub async fn try_search(
        &self,
        query: &str,
        corpus_root: &Path,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embeddings.embed(query).await?;
        let neighbors = self.store.nearest_neighbors(&vector, limit).await?;

        let results: Vec<SearchResult> = dedup_by_path(neighbors)
            .into_iter()
            .map(|neighbor| SearchResult {
                path: absolute_path(&neighbor.record.path, corpus_root),
                score: neighbor.distance,
            })
            .collect();

        debug!("Search for {:?} returned {} results", query, results.len());
        Ok(results)
    }

    /// Like [`Self::try_search`], but any failure is logged and yields no results
    #[inline]
    pub async fn search(&self, query: &str, corpus_root: &Path, limit: usize) -> Vec<SearchResult> {
        match self.try_search(query, corpus_root, limit).await {
            Ok(results) => results,
            Err(e) => {
                error!("Search failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// Order by ascending distance and keep the first neighbor of each path
fn dedup_by_path(mut neighbors: Vec<Neighbor>) -> Vec<Neighbor> {
    neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    let mut seen = HashSet::new();
    neighbors.retain(|neighbor| seen.insert(neighbor.record.path.clone()));
    neighbors
}
