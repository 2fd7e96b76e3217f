// LanceDB vector store module
// One table of note embeddings keyed by path-derived identifier


pub mod vector_store;

use arrow::datatypes::{DataType, Field, Schema};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::identity::Digest;
use crate::{Result, VaultError};

pub use vector_store::VectorStore;

/// Identifier of the placeholder row used to fix the table schema on creation
pub const SCHEMA_SENTINEL_ID: &str = "__schema__";

/// One embedded document as persisted in LanceDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// `identify(path)`, 64 hex chars
    pub id: String,
    /// Unit-length embedding of the document content
    pub vector: Vec<f32>,
    /// Corpus-relative path with `/` separators
    pub path: String,
    /// Fingerprint of the content that produced `vector`
    pub content_hash: String,
    /// Epoch milliseconds of the write
    pub last_updated: i64,
}

/// A nearest-neighbor hit; lower distance is more similar
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub record: VectorRecord,
    pub distance: f32,
}

/// Arrow list size for `dimension`, which must fit in an `i32`
#[inline]
pub fn list_size(dimension: usize) -> Result<i32> {
    i32::try_from(dimension).map_err(|_| {
        VaultError::Database(format!("Vector dimension {} is too large", dimension))
    })
}

/// Arrow schema of the notes table for vectors of `dimension` components
#[inline]
pub fn record_schema(dimension: usize) -> Result<Arc<Schema>> {
    Ok(Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                list_size(dimension)?,
            ),
            false,
        ),
        Field::new("path", DataType::Utf8, false),
        Field::new("content_hash", DataType::Utf8, false),
        Field::new("last_updated", DataType::Int64, false),
    ])))
}

/// Equality predicate on the id column.
///
/// Only a validated [`Digest`] can be interpolated, so the literal is always
/// 64 hex characters.
#[inline]
pub fn id_predicate(id: &Digest) -> String {
    format!("id = '{}'", id)
}
