//! Target store configuration: where the parquet dataset lives in S3 and
//! which Glue catalog entry describes it.

use serde::{Deserialize, Serialize};

/// Partitioned store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// S3 bucket holding the dataset.
    pub bucket: String,

    /// Key prefix under the bucket, e.g. `"datasets/cost-by-tag"`.
    /// Leading and trailing slashes are tolerated.
    pub path: String,

    /// Glue catalog database name.
    pub database: String,

    /// Glue catalog table name.
    pub table: String,

    /// Name of the date column used as the partition key.
    #[serde(default = "default_date_column")]
    pub date_column: String,

    /// Value written to the tag column for cost with no value for the
    /// monitored tag. Must never collide with a real tag value.
    #[serde(default = "default_uncategorized_label")]
    pub uncategorized_label: String,

    /// AWS region override. If not specified, the default provider chain
    /// (environment, profile, IMDS) decides.
    #[serde(default)]
    pub region: Option<String>,
}

fn default_date_column() -> String {
    "usage_date".to_string()
}

fn default_uncategorized_label() -> String {
    "uncategorized".to_string()
}

impl StoreConfig {
    /// Validate the store configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.bucket.is_empty() {
            return Err("store.bucket cannot be empty".to_string());
        }
        if self.bucket.starts_with("s3://") || self.path.starts_with("s3://") {
            return Err(
                "store.bucket and store.path take bare names, not s3:// URIs".to_string(),
            );
        }
        if self.database.is_empty() || self.table.is_empty() {
            return Err("store.database and store.table cannot be empty".to_string());
        }
        if self.date_column.trim().is_empty() || self.date_column.contains('/') {
            return Err("store.date_column must be a plain column name".to_string());
        }
        if self.uncategorized_label.trim().is_empty() {
            return Err("store.uncategorized_label cannot be empty".to_string());
        }
        Ok(())
    }

    /// Dataset key prefix with a single trailing slash (empty if the dataset
    /// sits at the bucket root).
    pub fn key_prefix(&self) -> String {
        let trimmed = self.path.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("{}/", trimmed)
        }
    }

    /// S3 key prefix for one date partition, hive-style:
    /// `{path}/{date_column}={date}/`.
    pub fn partition_prefix(&self, date: &str) -> String {
        format!("{}{}={}/", self.key_prefix(), self.date_column, date)
    }

    /// Full `s3://` location of the dataset root.
    pub fn table_location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key_prefix())
    }

    /// Full `s3://` location of one date partition.
    pub fn partition_location(&self, date: &str) -> String {
        format!("s3://{}/{}", self.bucket, self.partition_prefix(date))
    }
}
