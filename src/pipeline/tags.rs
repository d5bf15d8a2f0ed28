//! Tag value enumeration.

use std::{collections::BTreeSet, pin::pin};

use futures::{Stream, TryStreamExt};

use crate::billing::{BillingApi, BillingError, TagValuesPage, paginate};
use crate::pipeline::period::Period;

/// Lazy stream of tag-value pages for `tag_key` over the period.
pub fn tag_value_pages<'a>(
    api: &'a dyn BillingApi,
    period: &'a Period,
    tag_key: &'a str,
) -> impl Stream<Item = Result<TagValuesPage, BillingError>> + 'a {
    paginate(move |token| async move {
        let page = api.tag_values_page(period, tag_key, token).await?;
        let next = page.next_token.clone();
        Ok((page, next))
    })
}

/// Enumerate the distinct values the monitored tag took during the period.
///
/// All pages are merged; duplicates collapse; the empty string (reported by
/// the API for resources carrying the key with no value) is discarded.
/// The first page error aborts enumeration and propagates unchanged.
pub async fn enumerate_tag_values(
    api: &dyn BillingApi,
    period: &Period,
    tag_key: &str,
) -> Result<BTreeSet<String>, BillingError> {
    let mut pages = pin!(tag_value_pages(api, period, tag_key));
    let mut values = BTreeSet::new();

    while let Some(page) = pages.try_next().await? {
        for value in page.values {
            if !value.is_empty() {
                values.insert(value);
            }
        }
    }

    Ok(values)
}
