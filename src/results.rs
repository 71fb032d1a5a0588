//! Results view: filtered, paginated listing over every record

use crate::cursor::ClassificationCursor;
use crate::error::{ClassifierError, Result};
use crate::store::{Collection, Pagination, Store, PAGINATION_KEY};
use star_classifier_common::{ItemRecord, Label, LabelFilter};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsPage {
    pub items: Vec<ItemRecord>,
    pub total_filtered: usize,
    /// 1-based page actually served
    pub page: usize,
    pub page_count: usize,
}

/// One page of records matching `filter`
///
/// Page 0 is served as page 1. A page past the end is empty but still
/// reports the filtered total.
pub fn list(
    store: &Store,
    filter: LabelFilter,
    page: usize,
    page_size: usize,
) -> Result<ResultsPage> {
    if page_size == 0 {
        return Err(ClassifierError::InvalidArgument(
            "page size must be positive".into(),
        ));
    }
    let page = page.max(1);

    let records: Vec<ItemRecord> = store.get_all(Collection::Stars)?;
    let filtered: Vec<ItemRecord> = records.into_iter().filter(|r| filter.matches(r)).collect();
    let total_filtered = filtered.len();

    let items = filtered
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();

    Ok(ResultsPage {
        items,
        total_filtered,
        page,
        page_count: total_filtered.div_ceil(page_size),
    })
}

/// Edit one record's label in place
///
/// Rebuilds `cursor` when the edit moves the record into or out of the
/// unlabeled set.
pub async fn set_label(
    store: &mut Store,
    cursor: &mut ClassificationCursor,
    file_name: &str,
    label: Option<Label>,
) -> Result<()> {
    let record = store
        .get::<ItemRecord>(Collection::Stars, file_name)?
        .ok_or_else(|| ClassifierError::RecordNotFound(file_name.to_string()))?;

    let crossed = record.is_labeled() != label.is_some();
    store
        .put(Collection::Stars, file_name, &record.with_label(label))
        .await?;

    if crossed {
        *cursor = ClassificationCursor::rebuild(store)?;
    }
    debug!(file = %file_name, ?label, rebuilt = crossed, "label edited");
    Ok(())
}

/// Persisted page size, or `default` when none was chosen yet
pub fn rows_per_page(store: &Store, default: usize) -> Result<usize> {
    Ok(store
        .get::<Pagination>(Collection::AppState, PAGINATION_KEY)?
        .map(|p| p.rows_per_page)
        .filter(|n| *n > 0)
        .unwrap_or(default))
}

pub async fn set_rows_per_page(store: &mut Store, rows_per_page: usize) -> Result<()> {
    if rows_per_page == 0 {
        return Err(ClassifierError::InvalidArgument(
            "rows per page must be positive".into(),
        ));
    }
    store
        .put(Collection::AppState, PAGINATION_KEY, &Pagination { rows_per_page })
        .await
}
