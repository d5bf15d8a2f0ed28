//! S3 parquet dataset with a Glue catalog entry.
//!
//! Each date partition is written as one snappy-compressed parquet object
//! under a hive-style prefix (`{path}/{date_column}={date}/`). Overwrite
//! semantics: objects under the prefixes present in the batch are deleted
//! and replaced; other partitions are untouched. The partition column
//! itself is carried in the object key, not in the file data, following
//! hive layout.
//!
//! The catalog side mirrors what the original dataset writer did: the
//! table is created if absent (parquet serde, date column as partition
//! key) and written partitions are registered, tolerating ones already
//! known from earlier runs.

use std::{collections::BTreeSet, sync::Arc};

use arrow_array::{ArrayRef, Float64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use aws_sdk_glue::types::{Column, PartitionInput, SerDeInfo, StorageDescriptor, TableInput};
use aws_sdk_s3::{
    primitives::ByteStream,
    types::{Delete, ObjectIdentifier},
};
use aws_smithy_types::error::display::DisplayErrorContext;
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use tracing::{debug, info};
use uuid::Uuid;

use super::{PartitionedStore, StoreError};
use crate::config::StoreConfig;
use crate::pipeline::normalize::{ColumnDef, ColumnKind, CostRow, CostTable, TableSchema};

const PARQUET_INPUT_FORMAT: &str = "org.apache.hadoop.hive.ql.io.parquet.MapredParquetInputFormat";
const PARQUET_OUTPUT_FORMAT: &str =
    "org.apache.hadoop.hive.ql.io.parquet.MapredParquetOutputFormat";
const PARQUET_SERDE: &str = "org.apache.hadoop.hive.ql.io.parquet.serde.ParquetHiveSerDe";

/// Maximum partitions per BatchCreatePartition call.
const PARTITION_BATCH_SIZE: usize = 100;

/// Maximum keys per DeleteObjects call.
const DELETE_BATCH_SIZE: usize = 1000;

/// Partitioned store backed by S3 parquet objects and a Glue table.
pub struct S3ParquetStore {
    config: StoreConfig,
    s3: aws_sdk_s3::Client,
    glue: aws_sdk_glue::Client,
}

impl S3ParquetStore {
    /// Create the store from a shared SDK configuration.
    pub fn new(sdk_config: &aws_config::SdkConfig, config: StoreConfig) -> Self {
        Self {
            config,
            s3: aws_sdk_s3::Client::new(sdk_config),
            glue: aws_sdk_glue::Client::new(sdk_config),
        }
    }

    fn s3_error(&self, message: String) -> StoreError {
        StoreError::S3 {
            bucket: self.config.bucket.clone(),
            message,
        }
    }

    fn catalog_error(&self, message: String) -> StoreError {
        StoreError::Catalog {
            database: self.config.database.clone(),
            table: self.config.table.clone(),
            message,
        }
    }

    /// Delete every object under one partition prefix.
    async fn clear_partition(&self, prefix: &str) -> Result<(), StoreError> {
        let mut pages = self
            .s3
            .list_objects_v2()
            .bucket(&self.config.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys: Vec<String> = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| self.s3_error(DisplayErrorContext(&e).to_string()))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );
        }

        if keys.is_empty() {
            return Ok(());
        }
        debug!(prefix, count = keys.len(), "clearing existing partition objects");

        for chunk in keys.chunks(DELETE_BATCH_SIZE) {
            let objects = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| self.s3_error(e.to_string()))?;
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .build()
                .map_err(|e| self.s3_error(e.to_string()))?;

            self.s3
                .delete_objects()
                .bucket(&self.config.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| self.s3_error(DisplayErrorContext(&e).to_string()))?;
        }

        Ok(())
    }

    async fn put_partition_object(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.s3
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| self.s3_error(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    /// Create the catalog table if it does not exist yet.
    async fn ensure_table(&self, schema: &TableSchema) -> Result<(), StoreError> {
        let existing = self
            .glue
            .get_table()
            .database_name(&self.config.database)
            .name(&self.config.table)
            .send()
            .await;

        match existing {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_entity_not_found_exception()) =>
            {
                info!(
                    database = %self.config.database,
                    table = %self.config.table,
                    "catalog table missing, creating it"
                );
                self.create_table(schema).await
            }
            Err(err) => Err(self.catalog_error(DisplayErrorContext(&err).to_string())),
        }
    }

    async fn create_table(&self, schema: &TableSchema) -> Result<(), StoreError> {
        let partition_key = Column::builder()
            .name(&self.config.date_column)
            .r#type("string")
            .build()
            .map_err(|e| self.catalog_error(e.to_string()))?;

        let table_input = TableInput::builder()
            .name(&self.config.table)
            .table_type("EXTERNAL_TABLE")
            .parameters("classification", "parquet")
            .storage_descriptor(self.storage_descriptor(schema, self.config.table_location())?)
            .partition_keys(partition_key)
            .build()
            .map_err(|e| self.catalog_error(e.to_string()))?;

        self.glue
            .create_table()
            .database_name(&self.config.database)
            .table_input(table_input)
            .send()
            .await
            .map_err(|e| self.catalog_error(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }

    fn storage_descriptor(
        &self,
        schema: &TableSchema,
        location: String,
    ) -> Result<StorageDescriptor, StoreError> {
        let columns = data_columns(schema)
            .into_iter()
            .map(|col| {
                Column::builder()
                    .name(col.name)
                    .r#type(glue_type(col.kind))
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.catalog_error(e.to_string()))?;

        Ok(StorageDescriptor::builder()
            .set_columns(Some(columns))
            .location(location)
            .input_format(PARQUET_INPUT_FORMAT)
            .output_format(PARQUET_OUTPUT_FORMAT)
            .serde_info(
                SerDeInfo::builder()
                    .serialization_library(PARQUET_SERDE)
                    .build(),
            )
            .build())
    }

    /// Register the written partitions, tolerating already-registered ones.
    async fn register_partitions(
        &self,
        schema: &TableSchema,
        dates: &BTreeSet<String>,
    ) -> Result<(), StoreError> {
        let mut inputs = Vec::with_capacity(dates.len());
        for date in dates {
            inputs.push(
                PartitionInput::builder()
                    .values(date)
                    .storage_descriptor(
                        self.storage_descriptor(schema, self.config.partition_location(date))?,
                    )
                    .build(),
            );
        }

        for chunk in inputs.chunks(PARTITION_BATCH_SIZE) {
            let response = self
                .glue
                .batch_create_partition()
                .database_name(&self.config.database)
                .table_name(&self.config.table)
                .set_partition_input_list(Some(chunk.to_vec()))
                .send()
                .await
                .map_err(|e| self.catalog_error(DisplayErrorContext(&e).to_string()))?;

            for error in response.errors() {
                let code = error.error_detail().and_then(|d| d.error_code());
                if code == Some("AlreadyExistsException") {
                    continue;
                }
                return Err(self.catalog_error(format!(
                    "partition registration failed for {:?}: {}",
                    error.partition_values(),
                    error
                        .error_detail()
                        .and_then(|d| d.error_message())
                        .unwrap_or("unknown error"),
                )));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl PartitionedStore for S3ParquetStore {
    async fn write_partitions(&self, table: &CostTable) -> Result<usize, StoreError> {
        let schema = &table.schema;
        let arrow_schema = arrow_schema(schema);
        let dates = table.partition_dates();
        info!(
            rows = table.len(),
            partitions = dates.len(),
            bucket = %self.config.bucket,
            "writing cost table"
        );

        self.ensure_table(schema).await?;

        for date in &dates {
            let rows: Vec<&CostRow> = table
                .rows
                .iter()
                .filter(|row| &row.partition_date == date)
                .collect();
            let bytes = encode_partition(schema, &arrow_schema, date, &rows)?;

            let prefix = self.config.partition_prefix(date);
            self.clear_partition(&prefix).await?;
            let key = format!("{}{}.snappy.parquet", prefix, Uuid::new_v4());
            self.put_partition_object(&key, bytes).await?;
            debug!(%date, %key, rows = rows.len(), "partition written");
        }

        self.register_partitions(schema, &dates).await?;

        Ok(table.len())
    }

    fn name(&self) -> &'static str {
        "s3-parquet"
    }
}

/// The columns stored in the parquet files: everything except the
/// partition date column, which lives in the object key.
fn data_columns(schema: &TableSchema) -> Vec<ColumnDef> {
    schema
        .columns()
        .into_iter()
        .filter(|col| col.name != schema.date_column)
        .collect()
}

fn glue_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Utf8 => "string",
        ColumnKind::Float64 => "double",
    }
}

fn arrow_schema(schema: &TableSchema) -> Arc<Schema> {
    let fields: Vec<Field> = data_columns(schema)
        .iter()
        .map(|col| {
            let data_type = match col.kind {
                ColumnKind::Utf8 => DataType::Utf8,
                ColumnKind::Float64 => DataType::Float64,
            };
            Field::new(col.name.as_str(), data_type, false)
        })
        .collect();
    Arc::new(Schema::new(fields))
}

/// Encode one partition's rows as a snappy-compressed parquet file.
fn encode_partition(
    schema: &TableSchema,
    arrow_schema: &Arc<Schema>,
    date: &str,
    rows: &[&CostRow],
) -> Result<Vec<u8>, StoreError> {
    let encode_error = |message: String| StoreError::Encode {
        partition: date.to_string(),
        message,
    };

    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(arrow_schema.fields().len());
    arrays.push(Arc::new(StringArray::from_iter_values(
        rows.iter().map(|row| row.start_date.as_str()),
    )));
    arrays.push(Arc::new(StringArray::from_iter_values(
        rows.iter().map(|row| row.end_date.as_str()),
    )));
    arrays.push(Arc::new(StringArray::from_iter_values(
        rows.iter().map(|row| row.tag_value.as_str()),
    )));
    arrays.push(Arc::new(StringArray::from_iter_values(
        rows.iter().map(|row| row.service_name.as_str()),
    )));
    for index in 0..schema.metrics.len() {
        arrays.push(Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|row| row.metrics[index].amount),
        )));
        arrays.push(Arc::new(StringArray::from_iter_values(
            rows.iter().map(|row| row.metrics[index].unit.as_str()),
        )));
    }
    for index in 0..schema.metrics.len() {
        arrays.push(Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|row| row.totals[index].amount),
        )));
        arrays.push(Arc::new(StringArray::from_iter_values(
            rows.iter().map(|row| row.totals[index].unit.as_str()),
        )));
    }

    let batch = RecordBatch::try_new(arrow_schema.clone(), arrays)
        .map_err(|e| encode_error(e.to_string()))?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, arrow_schema.clone(), Some(props))
        .map_err(|e| encode_error(e.to_string()))?;
    writer.write(&batch).map_err(|e| encode_error(e.to_string()))?;
    writer.close().map_err(|e| encode_error(e.to_string()))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use arrow_array::cast::AsArray;
    use arrow_array::types::Float64Type;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    use super::*;
    use crate::pipeline::normalize::NormalizedMetric;

    fn schema() -> TableSchema {
        TableSchema::new("usage_date", "Team", vec!["AmortizedCost".to_string()])
    }

    fn row(date: &str, service: &str, amount: f64) -> CostRow {
        CostRow {
            partition_date: date.to_string(),
            start_date: date.to_string(),
            end_date: "2026-08-03".to_string(),
            tag_value: "platform".to_string(),
            service_name: service.to_string(),
            metrics: vec![NormalizedMetric {
                amount,
                unit: "USD".to_string(),
            }],
            totals: vec![NormalizedMetric {
                amount,
                unit: "USD".to_string(),
            }],
        }
    }

    #[test]
    fn test_data_columns_exclude_partition_column() {
        let names: Vec<String> = data_columns(&schema())
            .into_iter()
            .map(|col| col.name)
            .collect();
        assert!(!names.contains(&"usage_date".to_string()));
        assert_eq!(names[0], "startDate");
    }

    #[test]
    fn test_glue_type_mapping() {
        assert_eq!(glue_type(ColumnKind::Utf8), "string");
        assert_eq!(glue_type(ColumnKind::Float64), "double");
    }

    #[test]
    fn test_encode_partition_roundtrip() {
        let schema = schema();
        let arrow = arrow_schema(&schema);
        let rows = [
            row("2026-08-02", "Amazon EC2", 10.5),
            row("2026-08-02", "Amazon S3", 2.25),
        ];
        let row_refs: Vec<&CostRow> = rows.iter().collect();

        let bytes = encode_partition(&schema, &arrow, "2026-08-02", &row_refs).unwrap();

        let reader = ParquetRecordBatchReaderBuilder::try_new(bytes::Bytes::from(bytes))
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 1);

        let batch = &batches[0];
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().fields().len(), 8);
        assert!(batch.column_by_name("usage_date").is_none());

        let amounts = batch
            .column_by_name("AmortizedCost")
            .unwrap()
            .as_primitive::<Float64Type>();
        assert_eq!(amounts.value(0), 10.5);
        assert_eq!(amounts.value(1), 2.25);

        let services = batch.column_by_name("serviceName").unwrap().as_string::<i32>();
        assert_eq!(services.value(0), "Amazon EC2");
        assert_eq!(services.value(1), "Amazon S3");
    }

    #[test]
    fn test_encode_empty_partition() {
        let schema = schema();
        let arrow = arrow_schema(&schema);

        let bytes = encode_partition(&schema, &arrow, "2026-08-02", &[]).unwrap();
        assert!(!bytes.is_empty());
    }
}
