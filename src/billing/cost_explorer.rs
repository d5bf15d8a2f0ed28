//! AWS Cost Explorer implementation of the billing API.
//!
//! Issues `GetTags` for tag-value enumeration and `GetCostAndUsage` for
//! daily, service-grouped cost retrieval, mapping `NextPageToken`
//! continuation into the page types consumed by the pipeline.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_costexplorer::{
    Client,
    types::{
        DateInterval, Expression, Granularity, GroupDefinition, GroupDefinitionType, MatchOption,
        MetricValue, ResultByTime, TagValues,
    },
};
use aws_smithy_types::error::display::DisplayErrorContext;
use tracing::debug;

use super::{
    BillingApi, BillingError, CostFilter, CostPage, DailyCosts, MetricBundle, MetricCell,
    ServiceGroup, TagValuesPage,
};
use crate::pipeline::period::Period;

/// Billing API backed by AWS Cost Explorer.
pub struct CostExplorerApi {
    client: Client,
}

impl CostExplorerApi {
    /// Create a client from a shared SDK configuration (default credential
    /// chain; region per configuration).
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }

    fn date_interval(period: &Period) -> Result<DateInterval, String> {
        DateInterval::builder()
            .start(period.start_string())
            .end(period.end_string())
            .build()
            .map_err(|e| e.to_string())
    }

    /// Build the Cost Explorer tag expression for a filter.
    ///
    /// `Equals` pins one value with `EQUALS` match; `Absent` selects cost
    /// carrying no value for the key with `ABSENT` match.
    fn expression(filter: &CostFilter) -> Expression {
        let tag_values = match filter {
            CostFilter::Equals { key, value } => TagValues::builder()
                .key(key)
                .values(value)
                .match_options(MatchOption::Equals)
                .build(),
            CostFilter::Absent { key } => TagValues::builder()
                .key(key)
                .match_options(MatchOption::Absent)
                .build(),
        };
        Expression::builder().tags(tag_values).build()
    }
}

#[async_trait]
impl BillingApi for CostExplorerApi {
    async fn tag_values_page(
        &self,
        period: &Period,
        tag_key: &str,
        page_token: Option<String>,
    ) -> Result<TagValuesPage, BillingError> {
        let enumeration_error = |message: String| BillingError::TagEnumeration {
            tag_key: tag_key.to_string(),
            period: *period,
            message,
        };

        if let Some(token) = &page_token {
            debug!(%period, tag_key, %token, "following tag enumeration continuation token");
        }

        let response = self
            .client
            .get_tags()
            .time_period(Self::date_interval(period).map_err(&enumeration_error)?)
            .tag_key(tag_key)
            .set_next_page_token(page_token)
            .send()
            .await
            .map_err(|e| enumeration_error(DisplayErrorContext(&e).to_string()))?;

        Ok(TagValuesPage {
            values: response.tags().to_vec(),
            next_token: response.next_page_token().map(str::to_string),
        })
    }

    async fn cost_and_usage_page(
        &self,
        period: &Period,
        filter: &CostFilter,
        metrics: &[String],
        page_token: Option<String>,
    ) -> Result<CostPage, BillingError> {
        let retrieval_error = |message: String| BillingError::CostRetrieval {
            filter: filter.clone(),
            period: *period,
            message,
        };

        if let Some(token) = &page_token {
            debug!(%period, %filter, %token, "following cost retrieval continuation token");
        }

        let response = self
            .client
            .get_cost_and_usage()
            .time_period(Self::date_interval(period).map_err(&retrieval_error)?)
            .granularity(Granularity::Daily)
            .filter(Self::expression(filter))
            .set_metrics(Some(metrics.to_vec()))
            .group_by(
                GroupDefinition::builder()
                    .r#type(GroupDefinitionType::Dimension)
                    .key("SERVICE")
                    .build(),
            )
            .set_next_page_token(page_token)
            .send()
            .await
            .map_err(|e| retrieval_error(DisplayErrorContext(&e).to_string()))?;

        Ok(CostPage {
            days: response.results_by_time().iter().map(map_day).collect(),
            next_token: response.next_page_token().map(str::to_string),
        })
    }
}

fn map_day(result: &ResultByTime) -> DailyCosts {
    let (start, end) = match result.time_period() {
        Some(interval) => (interval.start().to_string(), interval.end().to_string()),
        None => (String::new(), String::new()),
    };

    let groups = result
        .groups()
        .iter()
        .map(|group| ServiceGroup {
            service: group.keys().first().cloned().unwrap_or_default(),
            metrics: group.metrics().map(map_bundle).unwrap_or_default(),
        })
        .collect();

    DailyCosts {
        start,
        end,
        totals: result.total().map(map_bundle).unwrap_or_default(),
        groups,
    }
}

fn map_bundle(metrics: &HashMap<String, MetricValue>) -> MetricBundle {
    metrics
        .iter()
        .map(|(name, value)| {
            (
                name.clone(),
                MetricCell {
                    amount: value.amount().map(str::to_string),
                    unit: value.unit().map(str::to_string),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use aws_sdk_costexplorer::types::Group;

    use super::*;

    #[test]
    fn test_equals_expression() {
        let expression = CostExplorerApi::expression(&CostFilter::equals("Team", "alpha"));

        let tags = expression.tags().unwrap();
        assert_eq!(tags.key(), Some("Team"));
        assert_eq!(tags.values().to_vec(), vec!["alpha".to_string()]);
        assert_eq!(tags.match_options().to_vec(), vec![MatchOption::Equals]);
    }

    #[test]
    fn test_absent_expression() {
        let expression = CostExplorerApi::expression(&CostFilter::absent("Team"));

        let tags = expression.tags().unwrap();
        assert_eq!(tags.key(), Some("Team"));
        assert!(tags.values().is_empty());
        assert_eq!(tags.match_options().to_vec(), vec![MatchOption::Absent]);
    }

    #[test]
    fn test_date_interval_from_period() {
        let period = Period::parse("2026-08-01", "2026-08-03").unwrap();

        let interval = CostExplorerApi::date_interval(&period).unwrap();

        assert_eq!(interval.start(), "2026-08-01");
        assert_eq!(interval.end(), "2026-08-03");
    }

    #[test]
    fn test_map_day_flattens_groups_and_totals() {
        let metric = |amount: &str| {
            MetricValue::builder()
                .amount(amount)
                .unit("USD")
                .build()
        };
        let result = ResultByTime::builder()
            .time_period(
                DateInterval::builder()
                    .start("2026-08-01")
                    .end("2026-08-02")
                    .build()
                    .unwrap(),
            )
            .total("AmortizedCost", metric("11.5"))
            .groups(
                Group::builder()
                    .keys("Amazon EC2")
                    .metrics("AmortizedCost", metric("11.5"))
                    .build(),
            )
            .build();

        let day = map_day(&result);

        assert_eq!(day.start, "2026-08-01");
        assert_eq!(day.end, "2026-08-02");
        assert_eq!(
            day.totals.get("AmortizedCost").unwrap().amount.as_deref(),
            Some("11.5")
        );
        assert_eq!(day.groups.len(), 1);
        assert_eq!(day.groups[0].service, "Amazon EC2");
        assert_eq!(
            day.groups[0].metrics.get("AmortizedCost").unwrap().unit.as_deref(),
            Some("USD")
        );
    }

    #[test]
    fn test_map_day_without_time_period_or_groups() {
        let day = map_day(&ResultByTime::builder().build());

        assert!(day.start.is_empty());
        assert!(day.groups.is_empty());
        assert!(day.totals.is_empty());
    }
}
