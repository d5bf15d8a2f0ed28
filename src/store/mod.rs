//! Partitioned store abstraction.
//!
//! The pipeline only depends on the overwrite-by-partition contract: the
//! writer replaces existing data for the date partitions present in the
//! batch and leaves every other partition untouched. That contract, not
//! locking, is what makes re-running a period idempotent.

mod s3_parquet;

use async_trait::async_trait;
pub use s3_parquet::S3ParquetStore;
use thiserror::Error;

use crate::pipeline::normalize::CostTable;

/// Trait for partitioned table stores.
///
/// Implementations must be `Send + Sync` to support async contexts.
#[async_trait]
pub trait PartitionedStore: Send + Sync {
    /// Persist the normalized table, overwriting only the date partitions
    /// present in it.
    ///
    /// Returns the number of rows written.
    async fn write_partitions(&self, table: &CostTable) -> Result<usize, StoreError>;

    /// Get the store name for logging/debugging.
    fn name(&self) -> &'static str;
}

/// Errors from partitioned store writes.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to encode partition {partition}: {message}")]
    Encode { partition: String, message: String },

    #[error("S3 error for bucket '{bucket}': {message}")]
    S3 { bucket: String, message: String },

    #[error("Glue catalog error for table '{database}.{table}': {message}")]
    Catalog {
        database: String,
        table: String,
        message: String,
    },
}
