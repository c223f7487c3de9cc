//! Page-count driven collection of the full fork list.

use std::collections::HashSet;

use hubsync_core::Fork;

use crate::error::SourceError;
use crate::ForkSource;

/// Number of pages needed for `total` records at `page_size` per page.
pub fn page_count(total: u64, page_size: u32) -> u32 {
    let size = u64::from(page_size.max(1));
    u32::try_from(total.div_ceil(size)).unwrap_or(u32::MAX)
}

/// Fetch pages `1..=page_count(total, page_size)` in order, stopping early at
/// the first empty page. N records therefore cost exactly ⌈N/P⌉ requests.
pub fn paginate<T, E>(
    total: u64,
    page_size: u32,
    mut fetch_page: impl FnMut(u32) -> Result<Vec<T>, E>,
) -> Result<Vec<T>, E> {
    let pages = page_count(total, page_size);
    let mut out = Vec::new();
    for page in 1..=pages {
        let items = fetch_page(page)?;
        if items.is_empty() {
            tracing::debug!(page, "empty page, stopping early");
            break;
        }
        out.extend(items);
    }
    Ok(out)
}

/// Collect every fork of `repository`. Forks that reappear on a later page
/// (the list shifted while paging) are kept only at their first position.
pub fn collect_forks(
    source: &dyn ForkSource,
    repository: &str,
    page_size: u32,
) -> Result<Vec<Fork>, SourceError> {
    let total = source.forks_count(repository)?;
    tracing::info!(repository, total, "collecting forks");
    let forks = paginate(total, page_size, |page| {
        let batch = source.forks_page(repository, page, page_size)?;
        tracing::debug!(page, count = batch.len(), "fork page fetched");
        Ok(batch)
    })?;

    let mut seen = HashSet::new();
    Ok(forks
        .into_iter()
        .filter(|f| seen.insert(f.full_name.0.to_ascii_lowercase()))
        .collect())
}
