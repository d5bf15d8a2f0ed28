//! Schema normalization: raw rows into a typed table.
//!
//! The configured metric list statically determines the row shape: per
//! metric, one numeric amount column and one string unit column, for both
//! the per-service values and the daily totals. Amount cells that are
//! missing, the literal `"N/A"` marker, or unparseable coerce to `0.0`;
//! unit cells that are missing coerce to `"N/A"`. Malformed upstream data
//! therefore never aborts a run.

use std::collections::BTreeSet;

use crate::billing::MetricCell;
use crate::pipeline::rows::RawRow;

/// Marker the billing API reports for unavailable values, and the fill
/// value for missing unit cells.
pub const NOT_AVAILABLE: &str = "N/A";

/// The fixed column layout of the normalized table.
///
/// Column order: the partition date column, `startDate`, `endDate`, the tag
/// column (monitored tag key, lower-cased), `serviceName`; then per
/// configured metric `M` the group-level `M` / `MUnit` pair; then the
/// day-level `totalM` / `totalMUnit` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub date_column: String,
    pub tag_column: String,
    pub metrics: Vec<String>,
}

/// Column data types the store has to represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Utf8,
    Float64,
}

/// One column of the normalized table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
}

impl TableSchema {
    pub fn new(date_column: &str, tag_key: &str, metrics: Vec<String>) -> Self {
        Self {
            date_column: date_column.to_string(),
            tag_column: tag_key.to_lowercase(),
            metrics,
        }
    }

    /// The full ordered column set.
    pub fn columns(&self) -> Vec<ColumnDef> {
        let utf8 = |name: &str| ColumnDef {
            name: name.to_string(),
            kind: ColumnKind::Utf8,
        };
        let float64 = |name: String| ColumnDef {
            name,
            kind: ColumnKind::Float64,
        };

        let mut columns = vec![
            utf8(&self.date_column),
            utf8("startDate"),
            utf8("endDate"),
            utf8(&self.tag_column),
            utf8("serviceName"),
        ];
        for metric in &self.metrics {
            columns.push(float64(metric.clone()));
            columns.push(utf8(&format!("{}Unit", metric)));
        }
        for metric in &self.metrics {
            columns.push(float64(format!("total{}", metric)));
            columns.push(utf8(&format!("total{}Unit", metric)));
        }
        columns
    }
}

/// One normalized metric value: amount coerced to a number, unit to a
/// string.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMetric {
    pub amount: f64,
    pub unit: String,
}

/// One normalized row. `metrics` and `totals` are positionally aligned
/// with the schema's metric list.
#[derive(Debug, Clone, PartialEq)]
pub struct CostRow {
    pub partition_date: String,
    pub start_date: String,
    pub end_date: String,
    pub tag_value: String,
    pub service_name: String,
    pub metrics: Vec<NormalizedMetric>,
    pub totals: Vec<NormalizedMetric>,
}

/// The normalized tabular dataset handed to the store writer.
#[derive(Debug, Clone, PartialEq)]
pub struct CostTable {
    pub schema: TableSchema,
    pub rows: Vec<CostRow>,
}

impl CostTable {
    /// Normalize raw rows against the schema's metric list.
    pub fn from_raw(schema: TableSchema, raw_rows: Vec<RawRow>) -> Self {
        let rows = raw_rows
            .into_iter()
            .map(|row| {
                let metrics = schema
                    .metrics
                    .iter()
                    .map(|metric| normalize_cell(row.metrics.get(metric)))
                    .collect();
                let totals = schema
                    .metrics
                    .iter()
                    .map(|metric| normalize_cell(row.totals.get(metric)))
                    .collect();
                CostRow {
                    partition_date: row.partition_date,
                    start_date: row.start_date,
                    end_date: row.end_date,
                    tag_value: row.tag_value,
                    service_name: row.service_name,
                    metrics,
                    totals,
                }
            })
            .collect();

        Self { schema, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct partition dates present in the batch.
    pub fn partition_dates(&self) -> BTreeSet<String> {
        self.rows
            .iter()
            .map(|row| row.partition_date.clone())
            .collect()
    }
}

fn normalize_cell(cell: Option<&MetricCell>) -> NormalizedMetric {
    NormalizedMetric {
        amount: normalize_amount(cell.and_then(|c| c.amount.as_deref())),
        unit: normalize_unit(cell.and_then(|c| c.unit.as_deref())),
    }
}

/// Coerce an amount cell to a number: missing values and the `"N/A"`
/// marker fill with `"0"`, then parse; parse failures coerce to `0.0`.
pub fn normalize_amount(raw: Option<&str>) -> f64 {
    let filled = match raw {
        None | Some(NOT_AVAILABLE) => "0",
        Some(value) => value,
    };
    filled.parse().unwrap_or(0.0)
}

/// Coerce a unit cell to a string, filling missing values with `"N/A"`.
pub fn normalize_unit(raw: Option<&str>) -> String {
    raw.unwrap_or(NOT_AVAILABLE).to_string()
}
