//! Tag-partitioned cloud cost extraction.
//!
//! One invocation extracts cost-and-usage data for a reporting window,
//! partitions it by the values of a single cost-allocation tag (plus an
//! "uncategorized" bucket for untagged spend), normalizes the result into a
//! typed table, and lands it in a date-partitioned parquet dataset with a
//! Glue catalog entry.
//!
//! The pipeline is strictly sequential: period resolution → tag-value
//! enumeration → per-filter cost retrieval → row flattening → schema
//! normalization → partition-overwrite write. Re-running the same period is
//! idempotent because the store writer only overwrites the date partitions
//! present in the batch.

pub mod billing;
pub mod config;
pub mod observability;
pub mod pipeline;
pub mod store;

#[cfg(test)]
mod tests;
