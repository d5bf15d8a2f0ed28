//! Billing API abstraction.
//!
//! This module provides a trait-based seam over the upstream billing API so
//! the pipeline can be exercised against an in-memory fake. The production
//! implementation wraps the AWS Cost Explorer client.
//!
//! Both queries the pipeline issues are token-paginated; the
//! [`paginate`] helper turns a page-fetching closure into a finite,
//! non-restartable stream of pages so callers can fuse page consumption
//! with aggregation instead of double-buffering a full result set.

mod cost_explorer;
#[cfg(test)]
pub(crate) mod fake;

use std::{collections::BTreeMap, fmt, future::Future};

use async_trait::async_trait;
pub use cost_explorer::CostExplorerApi;
use futures::Stream;

use crate::pipeline::period::Period;

/// A mapping from metric name (e.g. `AmortizedCost`) to its reported value.
pub type MetricBundle = BTreeMap<String, MetricCell>;

/// One reported metric value, exactly as returned by the API.
///
/// Amounts may be absent or the literal marker `"N/A"`; both are resolved
/// during normalization, never here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetricCell {
    pub amount: Option<String>,
    pub unit: Option<String>,
}

/// One page of enumerated tag values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagValuesPage {
    pub values: Vec<String>,
    pub next_token: Option<String>,
}

/// One page of daily cost-and-usage results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CostPage {
    pub days: Vec<DailyCosts>,
    pub next_token: Option<String>,
}

/// Cost-and-usage results for one day of the reporting window.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DailyCosts {
    /// Day start, `YYYY-MM-DD`.
    pub start: String,
    /// Day end (exclusive), `YYYY-MM-DD`.
    pub end: String,
    /// Day-level totals across all matched services.
    pub totals: MetricBundle,
    /// Per-service cost groups; may be empty for a day with no matched spend.
    pub groups: Vec<ServiceGroup>,
}

/// Cost attributed to one service within a day.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceGroup {
    pub service: String,
    pub metrics: MetricBundle,
}

/// Selector over the monitored tag key.
///
/// The two variants partition all cost in the period for a given key with
/// no overlap and no gap: every dollar either carries some value for the
/// key (`Equals` for one of the enumerated values) or carries none
/// (`Absent`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CostFilter {
    /// Cost attributed to one specific value of the tag key.
    Equals { key: String, value: String },
    /// Cost with no value for the tag key.
    Absent { key: String },
}

impl CostFilter {
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn absent(key: impl Into<String>) -> Self {
        Self::Absent { key: key.into() }
    }

    /// The tag key this filter selects over.
    pub fn key(&self) -> &str {
        match self {
            Self::Equals { key, .. } | Self::Absent { key } => key,
        }
    }
}

impl fmt::Display for CostFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals { key, value } => write!(f, "tag '{}' = '{}'", key, value),
            Self::Absent { key } => write!(f, "tag '{}' absent", key),
        }
    }
}

/// Trait for the upstream billing API.
///
/// One method per paginated query. Implementations must be `Send + Sync`
/// to support async contexts.
#[async_trait]
pub trait BillingApi: Send + Sync {
    /// Fetch one page of distinct values observed for `tag_key` during the
    /// period. `page_token` is `None` for the first page.
    async fn tag_values_page(
        &self,
        period: &Period,
        tag_key: &str,
        page_token: Option<String>,
    ) -> Result<TagValuesPage, BillingError>;

    /// Fetch one page of daily cost-and-usage results for the period,
    /// restricted by `filter`, grouped by service, requesting `metrics`.
    async fn cost_and_usage_page(
        &self,
        period: &Period,
        filter: &CostFilter,
        metrics: &[String],
        page_token: Option<String>,
    ) -> Result<CostPage, BillingError>;
}

/// Errors from the billing API, carrying enough context to diagnose
/// without replaying (period, tag key, query stage).
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("tag value enumeration failed for key '{tag_key}' over {period}: {message}")]
    TagEnumeration {
        tag_key: String,
        period: Period,
        message: String,
    },

    #[error("cost retrieval failed for {filter} over {period}: {message}")]
    CostRetrieval {
        filter: CostFilter,
        period: Period,
        message: String,
    },
}

enum PageToken {
    First,
    Next(String),
    Exhausted,
}

/// Turn a page-fetching closure into a lazy stream of pages.
///
/// `fetch` receives the continuation token (`None` for the first page) and
/// returns the page plus the next token. The stream ends after the first
/// page with no token; it is finite and non-restartable.
pub(crate) fn paginate<P, F, Fut>(fetch: F) -> impl Stream<Item = Result<P, BillingError>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<(P, Option<String>), BillingError>>,
{
    futures::stream::try_unfold((fetch, PageToken::First), |(mut fetch, token)| async move {
        let request_token = match token {
            PageToken::First => None,
            PageToken::Next(token) => Some(token),
            PageToken::Exhausted => return Ok(None),
        };

        let (page, next_token) = fetch(request_token).await?;
        let next_state = match next_token {
            Some(token) => PageToken::Next(token),
            None => PageToken::Exhausted,
        };

        Ok(Some((page, (fetch, next_state))))
    })
}
