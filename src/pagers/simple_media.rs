//! Lazily-discovered pager contents.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{OnceCell, broadcast, watch};

use crate::changes::ItemChange;
use crate::core::{ItemBuffer, Page, Pager, PagerConfig, PagerError, Result};
use crate::pagers::engine::PagerEngine;

type DiscoverFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<T>>> + Send + Sync>;

/// Pager whose contents come from a lazy asynchronous discovery thunk.
///
/// The thunk is invoked on the first `fetch_at` and memoized in a
/// compute-once cell, so concurrent first accesses coalesce and the discovery
/// round-trip is paid once, only if the parent is actually expanded. Used
/// where finding out whether a sub-collection exists at all requires a
/// network call (e.g. "does this artist have any music videos?").
pub struct SimpleMediaPager<T> {
    engine: Arc<PagerEngine<T>>,
    discover: DiscoverFn<T>,
    cell: Arc<OnceCell<Vec<T>>>,
}

impl<T> SimpleMediaPager<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(discover: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
    {
        Self {
            engine: PagerEngine::new_unchecked(PagerConfig::default()),
            discover: Arc::new(move || Box::pin(discover())),
            cell: Arc::new(OnceCell::new()),
        }
    }

    pub fn config(&self) -> &PagerConfig {
        self.engine.config()
    }
}

impl<T> Pager<T> for SimpleMediaPager<T>
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

    fn fetch_at(&self, _index: usize, _length: usize) {
        let discover = Arc::clone(&self.discover);
        let cell = Arc::clone(&self.cell);
        Arc::clone(&self.engine).request_page(0, 0, move || async move {
            let items = cell.get_or_try_init(|| (discover)()).await?;
            Ok(Page::complete(items.clone()))
        });
    }

    fn disconnect(&self) {
        self.engine.disconnect();
    }

    fn max_size(&self) -> Option<usize> {
        self.engine.config().max_size
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
