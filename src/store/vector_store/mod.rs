#[cfg(test)]
mod tests;

use super::{
    Neighbor, SCHEMA_SENTINEL_ID, VectorRecord, id_predicate, list_size, record_schema,
};
use crate::config::Config;
use crate::identity::Digest;
use crate::lazy::Lazy;
use crate::{Result, VaultError};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatchIterator, StringArray,
};
use arrow::datatypes::{DataType, Field};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Vector database store using LanceDB for similarity search.
///
/// Construction is cheap; the connection and table are opened on first use
/// and shared by every caller afterwards.
#[derive(Debug)]
pub struct VectorStore {
    db_path: PathBuf,
    table_name: String,
    dimension: usize,
    table: Lazy<Table>,
}

fn db_error(context: &'static str) -> impl Fn(lancedb::Error) -> VaultError {
    move |e| VaultError::Database(format!("{}: {}", context, e))
}

impl VectorStore {
    #[inline]
    pub fn new(db_path: impl Into<PathBuf>, table_name: impl Into<String>, dimension: usize) -> Self {
        Self {
            db_path: db_path.into(),
            table_name: table_name.into(),
            dimension,
            table: Lazy::new("vector store"),
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.vector_database_path(),
            config.store.table_name.clone(),
            config.embedding_dimension(),
        )
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// False once opening the store has failed
    #[inline]
    pub fn is_available(&self) -> bool {
        self.table.is_available()
    }

    /// The shared table handle, opening or creating the table if necessary
    #[inline]
    pub async fn table(&self) -> Result<Table> {
        self.table.get_or_init(|| self.open_table()).await
    }

    async fn open_table(&self) -> Result<Table> {
        debug!("Opening LanceDB at path: {:?}", self.db_path);
        list_size(self.dimension)?;

        tokio::fs::create_dir_all(&self.db_path).await.map_err(|e| {
            VaultError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = self.db_path.to_string_lossy();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(db_error("Failed to connect to LanceDB"))?;

        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(db_error("Failed to list tables"))?;

        let table = if table_names.contains(&self.table_name) {
            let table = connection
                .open_table(&self.table_name)
                .execute()
                .await
                .map_err(db_error("Failed to open table"))?;
            self.check_dimension(&table).await?;
            table
        } else {
            self.ensure_schema(&connection).await?
        };

        info!(
            "Vector store ready: table {} with {} dimensions",
            self.table_name, self.dimension
        );
        Ok(table)
    }

    /// Create the table with its schema fixed by a placeholder row, then drop the row
    async fn ensure_schema(&self, connection: &Connection) -> Result<Table> {
        info!(
            "Creating table {} with {} dimensions",
            self.table_name, self.dimension
        );

        let placeholder = VectorRecord {
            id: SCHEMA_SENTINEL_ID.to_string(),
            vector: vec![0.0; self.dimension],
            path: String::new(),
            content_hash: String::new(),
            last_updated: 0,
        };
        let batch = self.record_batch(std::slice::from_ref(&placeholder))?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        let table = match connection
            .create_table(&self.table_name, reader)
            .execute()
            .await
        {
            Ok(table) => table,
            Err(create_err) => {
                // Another process may have created it between listing and creating
                warn!(
                    "Failed to create table {}: {}, trying to open it",
                    self.table_name, create_err
                );
                let table = connection
                    .open_table(&self.table_name)
                    .execute()
                    .await
                    .map_err(|_| {
                        VaultError::Database(format!("Failed to create table: {}", create_err))
                    })?;
                self.check_dimension(&table).await?;
                return Ok(table);
            }
        };

        table
            .delete(&format!("id = '{}'", SCHEMA_SENTINEL_ID))
            .await
            .map_err(db_error("Failed to remove schema placeholder"))?;

        Ok(table)
    }

    async fn check_dimension(&self, table: &Table) -> Result<()> {
        let schema = table
            .schema()
            .await
            .map_err(db_error("Failed to get table schema"))?;

        let found = schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                VaultError::Database("Could not find vector column or determine dimension".into())
            })?;

        if found == self.dimension {
            Ok(())
        } else {
            Err(VaultError::DimensionMismatch {
                expected: self.dimension,
                actual: found,
            })
        }
    }

    /// Look up a record by identifier
    #[inline]
    pub async fn find(&self, id: &str) -> Result<Option<VectorRecord>> {
        let id = Digest::parse(id)?;
        let table = self.table().await?;

        let stream = table
            .query()
            .only_if(id_predicate(&id))
            .limit(1)
            .execute()
            .await
            .map_err(db_error("Failed to query by id"))?;

        let records = Self::collect_records(stream).await?;
        Ok(records.into_iter().next().map(|(record, _)| record))
    }

    /// Replace the record with `record.id`, or insert it if there is none
    #[inline]
    pub async fn upsert(&self, record: &VectorRecord) -> Result<()> {
        let id = Digest::parse(&record.id)?;
        Digest::parse(&record.content_hash)?;

        // Build the batch before touching the table so nothing can fail between delete and insert
        let batch = self.record_batch(std::slice::from_ref(record))?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        let table = self.table().await?;
        table
            .delete(&id_predicate(&id))
            .await
            .map_err(db_error("Failed to delete previous record"))?;
        table
            .add(reader)
            .execute()
            .await
            .map_err(db_error("Failed to insert record"))?;

        debug!("Upserted record {} for {}", id, record.path);
        Ok(())
    }

    /// Delete the record with `id`; deleting a missing record is not an error
    #[inline]
    pub async fn delete_by_id(&self, id: &str) -> Result<()> {
        let id = Digest::parse(id)?;
        let table = self.table().await?;

        table
            .delete(&id_predicate(&id))
            .await
            .map_err(db_error("Failed to delete record"))?;

        debug!("Deleted record {}", id);
        Ok(())
    }

    /// Up to `limit` records ordered by ascending L2 distance to `query`
    #[inline]
    pub async fn nearest_neighbors(&self, query: &[f32], limit: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(VaultError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let table = self.table().await?;
        let stream = table
            .vector_search(query)
            .map_err(db_error("Failed to create vector search"))?
            .column("vector")
            .distance_type(DistanceType::L2)
            .limit(limit)
            .execute()
            .await
            .map_err(db_error("Failed to execute search"))?;

        let mut neighbors: Vec<Neighbor> = Self::collect_records(stream)
            .await?
            .into_iter()
            .map(|(record, distance)| Neighbor {
                record,
                distance: distance.unwrap_or(f32::MAX),
            })
            .collect();
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(limit);

        debug!("Found {} neighbors", neighbors.len());
        Ok(neighbors)
    }

    /// Every record in the table, in no particular order
    #[inline]
    pub async fn all_records(&self) -> Result<Vec<VectorRecord>> {
        let table = self.table().await?;
        let rows = table
            .count_rows(None)
            .await
            .map_err(db_error("Failed to count rows"))?;
        if rows == 0 {
            return Ok(Vec::new());
        }

        // Plain queries are capped at a default top-k unless a limit is given
        let stream = table
            .query()
            .limit(rows)
            .execute()
            .await
            .map_err(db_error("Failed to scan table"))?;

        let records = Self::collect_records(stream).await?;
        Ok(records.into_iter().map(|(record, _)| record).collect())
    }

    /// Number of stored records
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        let table = self.table().await?;
        table
            .count_rows(None)
            .await
            .map_err(db_error("Failed to count rows"))
    }

    /// Compact fragments left behind by delete-then-insert updates
    #[inline]
    pub async fn optimize(&self) -> Result<()> {
        let table = self.table().await?;
        table
            .optimize(lancedb::table::OptimizeAction::All)
            .await
            .map_err(db_error("Failed to optimize table"))?;

        info!("Vector database optimization completed");
        Ok(())
    }

    fn record_batch(&self, records: &[VectorRecord]) -> Result<RecordBatch> {
        let size = list_size(self.dimension)?;
        let len = records.len();
        let mut flat_values = Vec::with_capacity(len * self.dimension);

        for record in records {
            if record.vector.len() != self.dimension {
                return Err(VaultError::DimensionMismatch {
                    expected: self.dimension,
                    actual: record.vector.len(),
                });
            }
            flat_values.extend_from_slice(&record.vector);
        }

        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::try_new(
            field,
            size,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| VaultError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.id.as_str()),
            )),
            Arc::new(vector_array),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.path.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.content_hash.as_str()),
            )),
            Arc::new(Int64Array::from_iter_values(
                records.iter().map(|r| r.last_updated),
            )),
        ];

        RecordBatch::try_new(record_schema(self.dimension)?, arrays)
            .map_err(|e| VaultError::Database(format!("Failed to create record batch: {}", e)))
    }

    async fn collect_records(
        mut stream: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<(VectorRecord, Option<f32>)>> {
        let mut records = Vec::new();

        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(db_error("Failed to read result stream"))?
        {
            records.extend(parse_batch(&batch)?);
        }

        Ok(records)
    }
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| VaultError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| VaultError::Database(format!("Invalid {} column type", name)))
}

/// Decode rows of a query result, with `_distance` when the query was a vector search
fn parse_batch(batch: &RecordBatch) -> Result<Vec<(VectorRecord, Option<f32>)>> {
    let ids = column::<StringArray>(batch, "id")?;
    let vectors = column::<FixedSizeListArray>(batch, "vector")?;
    let paths = column::<StringArray>(batch, "path")?;
    let hashes = column::<StringArray>(batch, "content_hash")?;
    let timestamps = column::<Int64Array>(batch, "last_updated")?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut rows = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let values = vectors.value(row);
        let vector = values
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| VaultError::Database("Invalid vector item type".to_string()))?
            .values()
            .to_vec();

        let distance = distances.and_then(|d| (!d.is_null(row)).then(|| d.value(row)));

        rows.push((
            VectorRecord {
                id: ids.value(row).to_string(),
                vector,
                path: paths.value(row).to_string(),
                content_hash: hashes.value(row).to_string(),
                last_updated: timestamps.value(row),
            },
            distance,
        ));
    }

    Ok(rows)
}
