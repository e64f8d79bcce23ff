//! Zero-latency pager over an already-known item list.

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};

use crate::changes::ItemChange;
use crate::core::{ItemBuffer, Pager, PagerConfig, PagerError};
use crate::pagers::engine::PagerEngine;

/// Pager wrapping a finite, fully-known, already-ordered list.
///
/// The total is known at construction; the first `fetch_at` publishes the
/// items synchronously and later calls are no-ops. There is no fetch function
/// and the busy flag never flips. Used for synthetic entries (a "go up one
/// folder" row, a static grouping) and as the leaf case inside
/// [`WrappedPager`](crate::pagers::WrappedPager) compositions.
pub struct SimplePager<T> {
    engine: Arc<PagerEngine<T>>,
    pending: Mutex<Option<Vec<T>>>,
}

impl<T> SimplePager<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(items: Vec<T>) -> Self {
        // Static lists need no enhancement pass.
        let config = PagerConfig::new(items.len().max(1)).lookup(true);
        let engine = PagerEngine::new_unchecked(config);
        engine.preset_total(items.len());
        Self {
            engine,
            pending: Mutex::new(Some(items)),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn config(&self) -> &PagerConfig {
        self.engine.config()
    }
}

impl<T> Pager<T> for SimplePager<T>
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
        let items = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(items) = items {
            self.engine.fulfil(items);
        }
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
