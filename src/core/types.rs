use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use crate::changes::ItemChange;
use crate::core::{PagerError, Result};

/// Default chunk size requested from a backend when the caller does not
/// specify one. Matches the preferred container size of remote catalogs.
pub const DEFAULT_PAGE_SIZE: usize = 200;

/// One backend-delivered batch of items plus an optional total-count hint.
///
/// `total` may be revised between fetches; some backends only learn the
/// collection size after the first request. A decrease is treated as a
/// truncation of the collection.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: Option<usize>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: Option<usize>) -> Self {
        Self { items, total }
    }

    /// A page that is the whole collection.
    pub fn complete(items: Vec<T>) -> Self {
        let total = items.len();
        Self {
            items,
            total: Some(total),
        }
    }
}

/// What a fetch function receives for one page.
///
/// `limit` is pre-clamped against the pager's `max_size`, so a fetch function
/// is never asked for items beyond the configured cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 0-based page number.
    pub page: usize,
    /// Absolute index of the first item of this page.
    pub offset: usize,
    /// Maximum number of items to return.
    pub limit: usize,
}

/// Pager configuration.
///
/// Built with chainable methods:
///
/// ```
/// use mediapager::PagerConfig;
///
/// let config = PagerConfig::new(50).max_size(500);
/// assert_eq!(config.page_size, 50);
/// ```
#[derive(Debug, Clone)]
pub struct PagerConfig {
    /// Backend-preferred chunk size. Must be positive.
    pub page_size: usize,

    /// Optional cap on the number of items ever exposed. Useful as an upper
    /// bound for lazily-unbounded backends.
    pub max_size: Option<usize>,

    /// Results are already enhanced/normalized; enhancement pipelines should
    /// skip this pager.
    pub lookup: bool,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_size: None,
            lookup: false,
        }
    }
}

impl PagerConfig {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    /// Cap the number of items ever exposed by the pager.
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Mark results as already enhanced.
    pub fn lookup(mut self, lookup: bool) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(PagerError::Config("page_size must be positive".into()));
        }
        if self.max_size == Some(0) {
            return Err(PagerError::Config("max_size must be positive".into()));
        }
        Ok(())
    }
}

/// Immutable snapshot of a pager's item buffer.
///
/// The buffer is a sparse-to-dense arena indexed by absolute position:
/// positions covered by resolved pages hold items, positions not yet fetched
/// are vacant. Snapshots are cheap to clone and share.
#[derive(Debug)]
pub struct ItemBuffer<T> {
    slots: Arc<Vec<Option<T>>>,
}

impl<T> Clone for ItemBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<T> Default for ItemBuffer<T> {
    fn default() -> Self {
        Self {
            slots: Arc::new(Vec::new()),
        }
    }
}

impl<T> ItemBuffer<T> {
    pub(crate) fn from_slots(slots: Vec<Option<T>>) -> Self {
        Self {
            slots: Arc::new(slots),
        }
    }

    /// Buffer length, counting vacant slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Item at `index`, or `None` if the slot is vacant or out of range.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// All slots in order, vacant ones included.
    pub fn iter(&self) -> impl Iterator<Item = Option<&T>> {
        self.slots.iter().map(Option::as_ref)
    }

    /// Resident items in index order, skipping vacant slots.
    pub fn resident(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().flatten()
    }

    /// Number of resident items.
    pub fn resident_len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Asynchronous page source supplied by a backend collaborator.
///
/// Expected to be idempotent for an identical request; the pager deduplicates
/// page keys, so each page is requested at most once per pager instance.
#[async_trait]
pub trait PageFetcher<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    async fn fetch_page(&self, request: PageRequest) -> Result<Page<T>>;
}

/// The uniform contract every pager kind implements.
///
/// A pager presents one continuous index space over a remote collection:
/// callers request that a window `[index, index + length)` become resident via
/// [`fetch_at`](Pager::fetch_at) and observe the buffer, its size, the busy
/// flag and fetch errors through the channels below.
///
/// Channel semantics:
/// - `observe_items` / `observe_size` / `observe_busy` are watch channels:
///   late subscribers see the latest value immediately, then every change.
/// - `observe_error` / `observe_additions` are broadcast channels: future
///   events only, nothing is replayed.
///
/// A pager is exclusively owned by one browsing context and torn down with
/// [`disconnect`](Pager::disconnect) when that context goes away.
pub trait Pager<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Current full buffer snapshot, re-emitted on every mutation.
    ///
    /// Clone the snapshot out of the watch borrow instead of calling back
    /// into the pager while holding it; emissions happen under the pager's
    /// state lock.
    fn observe_items(&self) -> watch::Receiver<ItemBuffer<T>>;

    /// Best-known total, or the buffer length while the total is unknown.
    /// Deduplicated against the previous value.
    fn observe_size(&self) -> watch::Receiver<usize>;

    /// `true` while at least one fetch is in flight.
    fn observe_busy(&self) -> watch::Receiver<bool>;

    /// One event per fetch failure. The stream does not terminate on error;
    /// the pager remains usable for other windows.
    fn observe_error(&self) -> broadcast::Receiver<PagerError>;

    /// Exactly the newly-resident items each time the buffer grows, never
    /// previously-seen ones. Hook for enhancement pipelines.
    fn observe_additions(&self) -> broadcast::Receiver<Vec<T>>;

    /// Request that `[index, index + length)` become resident. `length == 0`
    /// means "ensure at least `index + 1` items are available". Idempotent
    /// for already-resident windows; never errors synchronously.
    fn fetch_at(&self, index: usize, length: usize);

    /// Release all underlying subscriptions and mark the pager terminal.
    /// Safe to call multiple times.
    fn disconnect(&self);

    /// Configured cap on the number of items ever exposed, if any.
    fn max_size(&self) -> Option<usize>;

    /// Best-known total, `None` until the backend has reported one.
    fn total(&self) -> Option<usize>;

    fn is_connected(&self) -> bool;

    /// Patch matching resident items in place and republish the buffer.
    /// Positions, size and page identity are unchanged. Used by enhancement
    /// pipelines via [`crate::changes`].
    fn apply_changes(&self, changes: &[ItemChange<T>]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_rejects_zero_page_size() {
        assert!(PagerConfig::new(0).validate().is_err());
        assert!(PagerConfig::new(1).validate().is_ok());
    }

    #[test]
    fn config_rejects_zero_max_size() {
        assert!(PagerConfig::new(10).max_size(0).validate().is_err());
        assert!(PagerConfig::new(10).max_size(10).validate().is_ok());
    }

    #[test]
    fn item_buffer_skips_vacant_slots() {
        let buffer = ItemBuffer::from_slots(vec![Some(1), None, Some(3)]);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.resident_len(), 2);
        assert_eq!(buffer.get(0), Some(&1));
        assert_eq!(buffer.get(1), None);
        assert_eq!(buffer.resident().copied().collect::<Vec<_>>(), vec![1, 3]);
    }
}
