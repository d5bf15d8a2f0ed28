//! In-memory billing API serving pre-canned pages, for tests.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;

use super::{
    BillingApi, BillingError, CostFilter, CostPage, DailyCosts, MetricBundle, MetricCell,
    ServiceGroup, TagValuesPage,
};
use crate::pipeline::period::Period;

/// Fake [`BillingApi`] with configurable paginated responses.
///
/// Pages are keyed positionally; continuation tokens are `page-{n}`.
/// Cost pages are keyed by the filter's display form, so tests configure
/// one response sequence per (tag value or absent) query.
#[derive(Default)]
pub(crate) struct FakeBillingApi {
    tag_pages: Vec<Vec<String>>,
    cost_pages: HashMap<String, Vec<Vec<DailyCosts>>>,
    cost_queries: Mutex<Vec<String>>,
}

impl FakeBillingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag_pages(mut self, pages: &[&[&str]]) -> Self {
        self.tag_pages = pages
            .iter()
            .map(|page| page.iter().map(|v| v.to_string()).collect())
            .collect();
        self
    }

    pub fn with_cost_pages(mut self, filter: &CostFilter, pages: Vec<Vec<DailyCosts>>) -> Self {
        self.cost_pages.insert(filter.to_string(), pages);
        self
    }

    /// Single-page convenience for [`with_cost_pages`].
    pub fn with_costs(self, filter: &CostFilter, days: Vec<DailyCosts>) -> Self {
        self.with_cost_pages(filter, vec![days])
    }

    /// Cost queries issued so far (first page of each, in call order), as
    /// filter display strings.
    pub fn cost_queries(&self) -> Vec<String> {
        self.cost_queries.lock().unwrap().clone()
    }
}

fn page_index(token: Option<&str>) -> usize {
    match token {
        None => 0,
        Some(token) => token
            .strip_prefix("page-")
            .and_then(|n| n.parse().ok())
            .expect("fake continuation token"),
    }
}

fn next_token(index: usize, total: usize) -> Option<String> {
    (index + 1 < total).then(|| format!("page-{}", index + 1))
}

#[async_trait]
impl BillingApi for FakeBillingApi {
    async fn tag_values_page(
        &self,
        _period: &Period,
        _tag_key: &str,
        page_token: Option<String>,
    ) -> Result<TagValuesPage, BillingError> {
        let index = page_index(page_token.as_deref());
        Ok(TagValuesPage {
            values: self.tag_pages.get(index).cloned().unwrap_or_default(),
            next_token: next_token(index, self.tag_pages.len()),
        })
    }

    async fn cost_and_usage_page(
        &self,
        _period: &Period,
        filter: &CostFilter,
        _metrics: &[String],
        page_token: Option<String>,
    ) -> Result<CostPage, BillingError> {
        if page_token.is_none() {
            self.cost_queries.lock().unwrap().push(filter.to_string());
        }
        let index = page_index(page_token.as_deref());
        let pages = self.cost_pages.get(&filter.to_string());
        Ok(CostPage {
            days: pages
                .and_then(|pages| pages.get(index))
                .cloned()
                .unwrap_or_default(),
            next_token: next_token(index, pages.map(Vec::len).unwrap_or(0)),
        })
    }
}

/// Build a metric cell; `"-"` for either field means "not reported".
pub(crate) fn cell(amount: &str, unit: &str) -> MetricCell {
    MetricCell {
        amount: (amount != "-").then(|| amount.to_string()),
        unit: (unit != "-").then(|| unit.to_string()),
    }
}

/// Build a metric bundle from `(metric, amount, unit)` triples.
pub(crate) fn bundle(entries: &[(&str, &str, &str)]) -> MetricBundle {
    entries
        .iter()
        .map(|(metric, amount, unit)| (metric.to_string(), cell(amount, unit)))
        .collect()
}

pub(crate) fn group(service: &str, metrics: MetricBundle) -> ServiceGroup {
    ServiceGroup {
        service: service.to_string(),
        metrics,
    }
}

pub(crate) fn day(
    start: &str,
    end: &str,
    totals: MetricBundle,
    groups: Vec<ServiceGroup>,
) -> DailyCosts {
    DailyCosts {
        start: start.to_string(),
        end: end.to_string(),
        totals,
        groups,
    }
}
