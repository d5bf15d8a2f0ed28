//! Row aggregation: flattening day/service cost blocks into flat records.

use crate::billing::{DailyCosts, MetricBundle};

/// One flattened (day, tag value, service) record, pre-normalization.
///
/// The day's start date doubles as the partition key. Metric values are
/// carried exactly as reported; type coercion happens in the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub partition_date: String,
    pub start_date: String,
    pub end_date: String,
    /// The monitored tag's value, or the uncategorized sentinel.
    pub tag_value: String,
    pub service_name: String,
    /// Day-level totals across all services matched by the filter.
    pub totals: MetricBundle,
    /// This service group's metric values.
    pub metrics: MetricBundle,
}

/// Flatten retrieved day blocks into rows, attaching `tag_value` (a real
/// value, or the uncategorized sentinel for the absent-filter retrieval).
///
/// One row per service group; day blocks with no groups contribute
/// nothing. Emission order follows input order and is not otherwise
/// sorted; consumers must not rely on row order.
pub fn flatten_daily_costs(days: Vec<DailyCosts>, tag_value: &str) -> Vec<RawRow> {
    let mut rows = Vec::new();

    for day in days {
        for group in day.groups {
            rows.push(RawRow {
                partition_date: day.start.clone(),
                start_date: day.start.clone(),
                end_date: day.end.clone(),
                tag_value: tag_value.to_string(),
                service_name: group.service,
                totals: day.totals.clone(),
                metrics: group.metrics,
            });
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::fake::{bundle, day, group};

    #[test]
    fn test_one_row_per_day_service_pair() {
        let days = vec![
            day(
                "2026-08-01",
                "2026-08-02",
                bundle(&[("AmortizedCost", "14.5", "USD")]),
                vec![
                    group("Amazon EC2", bundle(&[("AmortizedCost", "10.0", "USD")])),
                    group("Amazon S3", bundle(&[("AmortizedCost", "4.5", "USD")])),
                ],
            ),
            day(
                "2026-08-02",
                "2026-08-03",
                bundle(&[("AmortizedCost", "3.0", "USD")]),
                vec![group("Amazon EC2", bundle(&[("AmortizedCost", "3.0", "USD")]))],
            ),
        ];

        let rows = flatten_daily_costs(days, "platform");

        assert_eq!(rows.len(), 3);

        let first = &rows[0];
        assert_eq!(first.partition_date, "2026-08-01");
        assert_eq!(first.start_date, "2026-08-01");
        assert_eq!(first.end_date, "2026-08-02");
        assert_eq!(first.tag_value, "platform");
        assert_eq!(first.service_name, "Amazon EC2");
        assert_eq!(
            first.totals.get("AmortizedCost").unwrap().amount.as_deref(),
            Some("14.5")
        );
        assert_eq!(
            first.metrics.get("AmortizedCost").unwrap().amount.as_deref(),
            Some("10.0")
        );

        assert_eq!(rows[1].service_name, "Amazon S3");
        assert_eq!(rows[2].partition_date, "2026-08-02");
    }

    #[test]
    fn test_day_without_groups_emits_nothing() {
        let days = vec![day("2026-08-01", "2026-08-02", bundle(&[]), vec![])];

        assert!(flatten_daily_costs(days, "platform").is_empty());
    }

    #[test]
    fn test_sentinel_carried_into_tag_column() {
        let days = vec![day(
            "2026-08-01",
            "2026-08-02",
            bundle(&[]),
            vec![group("AWS Lambda", bundle(&[("AmortizedCost", "1.0", "USD")]))],
        )];

        let rows = flatten_daily_costs(days, "uncategorized");

        assert_eq!(rows[0].tag_value, "uncategorized");
    }
}
