//! Daily cost retrieval for one filter.

use std::pin::pin;

use futures::{Stream, TryStreamExt};

use crate::billing::{BillingApi, BillingError, CostFilter, CostPage, DailyCosts, paginate};
use crate::pipeline::period::Period;

/// Lazy stream of cost-and-usage pages for one filter over the period.
pub fn cost_pages<'a>(
    api: &'a dyn BillingApi,
    period: &'a Period,
    filter: &'a CostFilter,
    metrics: &'a [String],
) -> impl Stream<Item = Result<CostPage, BillingError>> + 'a {
    paginate(move |token| async move {
        let page = api.cost_and_usage_page(period, filter, metrics, token).await?;
        let next = page.next_token.clone();
        Ok((page, next))
    })
}

/// Retrieve all daily result blocks for one filter, in page order.
///
/// Consumes the page stream to exhaustion; pagination is result-set
/// consumption, not retry. Errors propagate unchanged.
pub async fn retrieve_daily_costs(
    api: &dyn BillingApi,
    period: &Period,
    filter: &CostFilter,
    metrics: &[String],
) -> Result<Vec<DailyCosts>, BillingError> {
    let mut pages = pin!(cost_pages(api, period, filter, metrics));
    let mut days = Vec::new();

    while let Some(page) = pages.try_next().await? {
        days.extend(page.days);
    }

    Ok(days)
}
