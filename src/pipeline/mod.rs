//! The extraction pipeline.
//!
//! One run resolves the reporting period, enumerates the monitored tag's
//! values, retrieves daily service-grouped cost for each value plus the
//! untagged remainder, flattens and normalizes the result, and hands the
//! table to the partitioned store, short-circuiting with an empty outcome
//! when nothing was extracted.
//!
//! The per-value retrievals and the final absent-filter retrieval
//! partition all cost in the period with no overlap and no gap, so per
//! (day, service) the written rows sum to the unfiltered total.

pub mod costs;
pub mod normalize;
pub mod period;
pub mod rows;
pub mod tags;

use serde::Serialize;
use tracing::info;

use crate::billing::{BillingApi, BillingError, CostFilter};
use crate::config::ExporterConfig;
use crate::pipeline::{
    costs::retrieve_daily_costs,
    normalize::{CostTable, TableSchema},
    period::{Period, PeriodError, PeriodOverride},
    rows::flatten_daily_costs,
    tags::enumerate_tag_values,
};
use crate::store::{PartitionedStore, StoreError};

/// The invocation input: which tag to partition by, and an optional
/// explicit reporting period.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub monitored_tag: String,
    pub period_override: Option<PeriodOverride>,
}

/// The terminal state of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The normalized table was written to the store.
    Written { period: Period, rows_written: usize },
    /// Normalization yielded zero rows; the store was not invoked. This is
    /// a valid outcome (e.g. no billed activity in the period), not an
    /// error.
    Empty { period: Period },
}

impl RunOutcome {
    /// Render the outcome as the invocation output contract.
    pub fn report(&self) -> ExecutionReport {
        match self {
            RunOutcome::Written {
                period,
                rows_written,
            } => ExecutionReport {
                status_code: 200,
                execution_log: ExecutionLog {
                    message: None,
                    period_extracted: PeriodExtracted::from(period),
                    number_of_rows_written_into_s3: Some(*rows_written),
                },
            },
            RunOutcome::Empty { period } => ExecutionReport {
                status_code: 404,
                execution_log: ExecutionLog {
                    message: Some("The normalized cost table is empty".to_string()),
                    period_extracted: PeriodExtracted::from(period),
                    number_of_rows_written_into_s3: None,
                },
            },
        }
    }
}

/// Invocation output: `200` for a successful write, `404` for the
/// empty-result case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub status_code: u16,
    pub execution_log: ExecutionLog,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLog {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub period_extracted: PeriodExtracted,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_rows_written_into_s3: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodExtracted {
    pub start_date: String,
    pub end_date: String,
}

impl From<&Period> for PeriodExtracted {
    fn from(period: &Period) -> Self {
        Self {
            start_date: period.start_string(),
            end_date: period.end_string(),
        }
    }
}

/// Pipeline errors. Pagination exhaustion is not represented here;
/// consuming a multi-page result set is normal operation.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("monitored tag key must not be empty")]
    MissingMonitoredTag,

    #[error(transparent)]
    Period(#[from] PeriodError),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Run the extraction pipeline once.
///
/// Retrievals are strictly sequential: one cost query per enumerated tag
/// value, then exactly one absent-filter query for the uncategorized
/// bucket. Upstream API errors propagate without local retry; re-running
/// the same period is idempotent through the store's overwrite-by-partition
/// contract.
pub async fn run(
    config: &ExporterConfig,
    api: &dyn BillingApi,
    store: &dyn PartitionedStore,
    request: &ExtractionRequest,
) -> Result<RunOutcome, ExportError> {
    let tag_key = request.monitored_tag.trim();
    if tag_key.is_empty() {
        return Err(ExportError::MissingMonitoredTag);
    }

    let period = Period::resolve(request.period_override.as_ref(), config.extract.timezone)?;
    info!(%period, tag_key, "resolved reporting period");

    let tag_values = enumerate_tag_values(api, &period, tag_key).await?;
    info!(count = tag_values.len(), "enumerated tag values");

    let metrics = &config.extract.metrics;
    let mut raw_rows = Vec::new();

    for value in &tag_values {
        let filter = CostFilter::equals(tag_key, value);
        let days = retrieve_daily_costs(api, &period, &filter, metrics).await?;
        raw_rows.extend(flatten_daily_costs(days, value));
    }

    let absent = CostFilter::absent(tag_key);
    let days = retrieve_daily_costs(api, &period, &absent, metrics).await?;
    raw_rows.extend(flatten_daily_costs(days, &config.store.uncategorized_label));

    let schema = TableSchema::new(&config.store.date_column, tag_key, metrics.clone());
    let table = CostTable::from_raw(schema, raw_rows);

    if table.is_empty() {
        info!(%period, "no cost rows extracted, skipping store write");
        return Ok(RunOutcome::Empty { period });
    }

    let rows_written = store.write_partitions(&table).await?;
    info!(
        rows = rows_written,
        partitions = table.partition_dates().len(),
        store = store.name(),
        "cost table written"
    );

    Ok(RunOutcome::Written {
        period,
        rows_written,
    })
}

#[cfg(test)]
mod report_tests {
    use super::*;

    fn period() -> Period {
        Period::parse("2026-08-01", "2026-08-02").unwrap()
    }

    #[test]
    fn test_written_report_shape() {
        let report = RunOutcome::Written {
            period: period(),
            rows_written: 42,
        }
        .report();

        assert_eq!(report.status_code, 200);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["statusCode"], 200);
        assert_eq!(
            json["executionLog"]["periodExtracted"]["startDate"],
            "2026-08-01"
        );
        assert_eq!(
            json["executionLog"]["periodExtracted"]["endDate"],
            "2026-08-02"
        );
        assert_eq!(json["executionLog"]["numberOfRowsWrittenIntoS3"], 42);
        assert!(json["executionLog"].get("message").is_none());
    }

    #[test]
    fn test_empty_report_shape() {
        let report = RunOutcome::Empty { period: period() }.report();

        assert_eq!(report.status_code, 404);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["statusCode"], 404);
        assert!(
            json["executionLog"]
                .get("numberOfRowsWrittenIntoS3")
                .is_none()
        );
        assert_eq!(
            json["executionLog"]["message"],
            "The normalized cost table is empty"
        );
    }
}
