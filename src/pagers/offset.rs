//! Offset/page-number pagination strategy.

use std::future::Future;
use std::ops::RangeInclusive;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{broadcast, watch};

use crate::changes::ItemChange;
use crate::core::{
    ItemBuffer, Page, PageFetcher, PageRequest, Pager, PagerConfig, PagerError, Result,
};
use crate::pagers::engine::PagerEngine;

type FetchFn<T> = Arc<dyn Fn(PageRequest) -> BoxFuture<'static, Result<Page<T>>> + Send + Sync>;

/// Pager over a backend that serves fixed-size pages addressed by number.
///
/// A requested window is covered by the minimal contiguous range of
/// `page_size`-item pages; each missing page is fetched exactly once. The
/// last page may come back short.
///
/// Ordering caveat: pages of one query are assumed to be stable between
/// fetches. A backend that reorders or renumbers rows between two page fetches
/// can produce a stitched buffer mixing both orderings; detecting that is the
/// API client's concern, not the pager's.
pub struct OffsetPager<T> {
    engine: Arc<PagerEngine<T>>,
    fetch: FetchFn<T>,
}

impl<T> OffsetPager<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(fetcher: Arc<dyn PageFetcher<T>>, config: PagerConfig) -> Result<Self> {
        let fetch: FetchFn<T> = Arc::new(move |request| {
            let fetcher = Arc::clone(&fetcher);
            Box::pin(async move { fetcher.fetch_page(request).await })
        });
        Ok(Self {
            engine: PagerEngine::new(config)?,
            fetch,
        })
    }

    /// Build from a plain async closure.
    pub fn from_fn<F, Fut>(fetch: F, config: PagerConfig) -> Result<Self>
    where
        F: Fn(PageRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Page<T>>> + Send + 'static,
    {
        let fetch: FetchFn<T> = Arc::new(move |request| Box::pin(fetch(request)));
        Ok(Self {
            engine: PagerEngine::new(config)?,
            fetch,
        })
    }

    pub fn config(&self) -> &PagerConfig {
        self.engine.config()
    }

    /// Minimal contiguous range of page numbers covering the window, clamped
    /// by the best-known total and `max_size`. `None` when the window lies
    /// entirely beyond the collection.
    fn page_range(&self, index: usize, length: usize) -> Option<RangeInclusive<usize>> {
        let page_size = self.config().page_size;
        let mut end = index + length.saturating_sub(1);
        let bound = match (self.engine.total(), self.config().max_size) {
            (Some(total), Some(max)) => Some(total.min(max)),
            (Some(total), None) => Some(total),
            (None, Some(max)) => Some(max),
            (None, None) => None,
        };
        if let Some(bound) = bound {
            if index >= bound {
                return None;
            }
            end = end.min(bound - 1);
        }
        Some(index / page_size..=end / page_size)
    }
}

impl<T> Pager<T> for OffsetPager<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn observe_items(&self) -> watch::Receiver<ItemBuffer<T>> {
        self.engine.observe_items()
    }

    fn observe_size(&self) -> watch::Receiver<usize> {
        self.engine.observe_size()
    }

    fn observe_busy(&self) -> watch::Receiver<bool> {
        self.engine.observe_busy()
    }

    fn observe_error(&self) -> broadcast::Receiver<PagerError> {
        self.engine.observe_error()
    }

    fn observe_additions(&self) -> broadcast::Receiver<Vec<T>> {
        self.engine.observe_additions()
    }

    fn fetch_at(&self, index: usize, length: usize) {
        let Some(pages) = self.page_range(index, length) else {
            return;
        };
        let page_size = self.config().page_size;
        let max_size = self.config().max_size;
        for page in pages {
            let offset = page * page_size;
            let limit = match max_size {
                Some(max) if max > offset => page_size.min(max - offset),
                Some(_) => continue,
                None => page_size,
            };
            let request = PageRequest { page, offset, limit };
            let fetch = Arc::clone(&self.fetch);
            Arc::clone(&self.engine).request_page(page, offset, move || (fetch)(request));
        }
    }

    fn disconnect(&self) {
        self.engine.disconnect();
    }

    fn max_size(&self) -> Option<usize> {
        self.config().max_size
    }

    fn total(&self) -> Option<usize> {
        self.engine.total()
    }

    fn is_connected(&self) -> bool {
        self.engine.is_connected()
    }

    fn apply_changes(&self, changes: &[ItemChange<T>]) {
        self.engine.apply_changes(changes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pager(page_size: usize, max_size: Option<usize>) -> OffsetPager<usize> {
        let mut config = PagerConfig::new(page_size);
        if let Some(max) = max_size {
            config = config.max_size(max);
        }
        OffsetPager::from_fn(
            |request| async move { Ok(Page::new(vec![request.offset], None)) },
            config,
        )
        .unwrap()
    }

    #[test]
    fn window_maps_to_covering_pages() {
        let pager = pager(50, None);
        assert_eq!(pager.page_range(0, 1), Some(0..=0));
        assert_eq!(pager.page_range(120, 10), Some(2..=2));
        assert_eq!(pager.page_range(120, 40), Some(2..=3));
        assert_eq!(pager.page_range(49, 2), Some(0..=1));
    }

    #[test]
    fn zero_length_means_ensure_index_resident() {
        let pager = pager(50, None);
        assert_eq!(pager.page_range(0, 0), Some(0..=0));
        assert_eq!(pager.page_range(99, 0), Some(1..=1));
    }

    #[test]
    fn range_is_clamped_by_max_size() {
        let pager = pager(50, Some(120));
        assert_eq!(pager.page_range(100, 200), Some(2..=2));
        assert_eq!(pager.page_range(120, 10), None);
        assert_eq!(pager.page_range(500, 0), None);
    }

    #[test]
    fn rejects_zero_page_size() {
        let result = OffsetPager::<usize>::from_fn(
            |_| async move { Ok(Page::new(vec![], None)) },
            PagerConfig::new(0),
        );
        assert!(matches!(result, Err(PagerError::Config(_))));
    }
}
