//! Shared pagination engine.
//!
//! Every concrete pager kind is built on [`PagerEngine`]: it owns the item
//! buffer, the fetched-page dedup set, busy accounting and the observable
//! channels. Concrete kinds only decide which page keys a requested window
//! needs and how to produce the fetch future for a key.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};
use tokio::sync::{broadcast, watch};

use crate::changes::ItemChange;
use crate::core::{ItemBuffer, Page, PagerConfig, PagerError, Result};

const ERROR_CHANNEL_CAPACITY: usize = 16;
const ADDITIONS_CHANNEL_CAPACITY: usize = 32;

struct EngineState<T> {
    /// Sparse-to-dense arena indexed by absolute position.
    items: Vec<Option<T>>,
    /// Best-known collection size.
    total: Option<usize>,
    /// Page keys already requested. A key stays here after a failed fetch so
    /// a permanently-broken page is not hammered.
    fetched_pages: HashSet<usize>,
    in_flight: usize,
    connected: bool,
}

/// Reactive state and fetch-deduplication shared by all pager kinds.
///
/// Building block for custom pager kinds; most callers use [`OffsetPager`],
/// [`SimplePager`], [`SimpleMediaPager`] or [`WrappedPager`] instead.
///
/// [`OffsetPager`]: crate::pagers::OffsetPager
/// [`SimplePager`]: crate::pagers::SimplePager
/// [`SimpleMediaPager`]: crate::pagers::SimpleMediaPager
/// [`WrappedPager`]: crate::pagers::WrappedPager
pub struct PagerEngine<T> {
    config: PagerConfig,
    state: Mutex<EngineState<T>>,
    items_tx: watch::Sender<ItemBuffer<T>>,
    size_tx: watch::Sender<usize>,
    busy_tx: watch::Sender<bool>,
    error_tx: broadcast::Sender<PagerError>,
    additions_tx: broadcast::Sender<Vec<T>>,
}

impl<T> PagerEngine<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(config: PagerConfig) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Self::new_unchecked(config))
    }

    pub(crate) fn new_unchecked(config: PagerConfig) -> Arc<Self> {
        let (items_tx, _) = watch::channel(ItemBuffer::default());
        let (size_tx, _) = watch::channel(0);
        let (busy_tx, _) = watch::channel(false);
        let (error_tx, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        let (additions_tx, _) = broadcast::channel(ADDITIONS_CHANNEL_CAPACITY);
        Arc::new(Self {
            config,
            state: Mutex::new(EngineState {
                items: Vec::new(),
                total: None,
                fetched_pages: HashSet::new(),
                in_flight: 0,
                connected: true,
            }),
            items_tx,
            size_tx,
            busy_tx,
            error_tx,
            additions_tx,
        })
    }

    pub fn config(&self) -> &PagerConfig {
        &self.config
    }

    pub fn observe_items(&self) -> watch::Receiver<ItemBuffer<T>> {
        self.items_tx.subscribe()
    }

    pub fn observe_size(&self) -> watch::Receiver<usize> {
        self.size_tx.subscribe()
    }

    pub fn observe_busy(&self) -> watch::Receiver<bool> {
        self.busy_tx.subscribe()
    }

    pub fn observe_error(&self) -> broadcast::Receiver<PagerError> {
        self.error_tx.subscribe()
    }

    pub fn observe_additions(&self) -> broadcast::Receiver<Vec<T>> {
        self.additions_tx.subscribe()
    }

    pub fn total(&self) -> Option<usize> {
        self.lock_state().total
    }

    pub fn is_connected(&self) -> bool {
        self.lock_state().connected
    }

    /// Request one page unless it was already requested or the pager is
    /// disconnected. `make_fetch` is only invoked when the page is actually
    /// needed; the resulting future runs on a spawned task and is merged at
    /// `offset` when it settles.
    pub fn request_page<F, Fut>(self: Arc<Self>, key: usize, offset: usize, make_fetch: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Page<T>>> + Send + 'static,
    {
        {
            let mut state = self.lock_state();
            if !state.connected || state.fetched_pages.contains(&key) {
                return;
            }
            if let Some(total) = state.total
                && offset >= total
            {
                return;
            }
            if let Some(max_size) = self.config.max_size
                && offset >= max_size
            {
                return;
            }
            // Mark before the fetch runs so overlapping windows coalesce on
            // the pending request instead of re-issuing it.
            state.fetched_pages.insert(key);
            state.in_flight += 1;
        }
        self.set_busy(true);
        debug!("requesting page {key} (offset {offset})");

        let fetch = make_fetch();
        tokio::spawn(async move {
            let result = fetch.await;
            self.settle(key, offset, result);
        });
    }

    /// Synchronous merge path for pagers whose contents are known up front.
    /// No fetch is spawned and the busy flag never flips.
    pub fn fulfil(&self, items: Vec<T>) {
        let mut state = self.lock_state();
        if !state.connected || state.fetched_pages.contains(&0) {
            return;
        }
        state.fetched_pages.insert(0);
        let page = Page::complete(items);
        self.merge(&mut state, 0, page);
    }

    /// Record that the collection size is already known, without publishing
    /// any items.
    pub(crate) fn preset_total(&self, total: usize) {
        let mut state = self.lock_state();
        if !state.connected {
            return;
        }
        state.total = Some(total);
        self.size_tx.send_if_modified(|size| {
            if *size == total {
                false
            } else {
                *size = total;
                true
            }
        });
    }

    /// Patch matching resident items in place and republish the buffer.
    /// Size, positions and the dedup set are untouched.
    pub fn apply_changes(&self, changes: &[ItemChange<T>]) {
        let mut state = self.lock_state();
        if !state.connected {
            return;
        }
        let mut modified = false;
        for slot in state.items.iter_mut() {
            if let Some(item) = slot {
                for change in changes {
                    if change.matches(item) {
                        change.apply(item);
                        modified = true;
                    }
                }
            }
        }
        if modified {
            // send_replace stores the snapshot even while nobody subscribes,
            // so a later subscriber still replays the patched buffer.
            self.items_tx
                .send_replace(ItemBuffer::from_slots(state.items.clone()));
        }
    }

    /// Mark the pager terminal. In-flight fetches run to completion but their
    /// results are discarded. Idempotent.
    pub fn disconnect(&self) {
        let mut state = self.lock_state();
        if !state.connected {
            return;
        }
        state.connected = false;
        state.in_flight = 0;
        drop(state);
        debug!("pager disconnected");
        self.set_busy(false);
    }

    fn settle(&self, key: usize, offset: usize, result: Result<Page<T>>) {
        let mut state = self.lock_state();
        if !state.connected {
            debug!("discarding page {key}: pager disconnected while in flight");
            return;
        }
        state.in_flight = state.in_flight.saturating_sub(1);
        let idle = state.in_flight == 0;
        match result {
            Ok(page) => {
                debug!("page {key} resolved with {} items", page.items.len());
                self.merge(&mut state, offset, page);
            }
            Err(err) => {
                warn!("page {key} failed: {err}");
                let _ = self.error_tx.send(err);
            }
        }
        drop(state);
        if idle {
            self.set_busy(false);
        }
    }

    /// Write a page at its canonical offset, revise the total and publish.
    /// Emissions happen under the state lock so snapshots are strictly
    /// ordered by fetch completion.
    fn merge(&self, state: &mut EngineState<T>, offset: usize, page: Page<T>) {
        let mut total = page.total.or(state.total);
        if let Some(max_size) = self.config.max_size {
            total = total.map(|t| t.min(max_size));
        }

        // A smaller total than already-buffered positions imply is a
        // truncation: clamp the buffer and invalidate dedup keys that now
        // start out of range, so the region can be re-resolved later.
        if let Some(t) = total
            && state.items.len() > t
        {
            state.items.truncate(t);
            let page_size = self.config.page_size;
            state.fetched_pages.retain(|&k| k * page_size < t);
        }
        state.total = total;

        let cap = match (total, self.config.max_size) {
            (Some(t), Some(max)) => Some(t.min(max)),
            (Some(t), None) => Some(t),
            (None, Some(max)) => Some(max),
            (None, None) => None,
        };

        let mut additions = Vec::new();
        for (i, item) in page.items.into_iter().enumerate() {
            let position = offset + i;
            if let Some(cap) = cap
                && position >= cap
            {
                break;
            }
            if position >= state.items.len() {
                state.items.resize_with(position + 1, || None);
            }
            if state.items[position].is_none() {
                additions.push(item.clone());
            }
            state.items[position] = Some(item);
        }

        let size = total.unwrap_or(state.items.len());
        // send_replace stores the snapshot even while nobody subscribes, so a
        // later subscriber still replays the latest buffer.
        self.items_tx
            .send_replace(ItemBuffer::from_slots(state.items.clone()));
        self.size_tx.send_if_modified(|current| {
            if *current == size {
                false
            } else {
                *current = size;
                true
            }
        });
        if !additions.is_empty() {
            let _ = self.additions_tx.send(additions);
        }
    }

    fn set_busy(&self, busy: bool) {
        // Only announce a transition; a second fetch starting while one is
        // already in flight must not re-emit `true`.
        if busy {
            self.busy_tx.send_if_modified(|current| {
                if *current {
                    false
                } else {
                    *current = true;
                    true
                }
            });
        } else {
            let still_busy = self.lock_state().in_flight > 0;
            self.busy_tx.send_if_modified(|current| {
                if *current && !still_busy {
                    *current = false;
                    true
                } else {
                    false
                }
            });
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState<T>> {
        // A poisoned lock means a fetch task panicked mid-merge; the last
        // consistent buffer is still the best answer we have.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
