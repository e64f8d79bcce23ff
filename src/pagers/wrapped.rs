//! Composition of several pagers into one index space.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::changes::ItemChange;
use crate::core::{ItemBuffer, Pager, PagerError};

const ERROR_CHANNEL_CAPACITY: usize = 16;
const ADDITIONS_CHANNEL_CAPACITY: usize = 32;

struct WrappedState<T> {
    /// Last window requested by the caller, re-dispatched whenever a child's
    /// total becomes known and shifts sibling offsets.
    last_window: Option<(usize, usize)>,
    /// Last published composite snapshot. Rebuilds that change nothing are
    /// suppressed so subscribers never see a spurious emission.
    previous: ItemBuffer<T>,
}

struct WrappedShared<T>
where
    T: Clone + Send + Sync + 'static,
{
    children: Vec<Arc<dyn Pager<T>>>,
    state: Mutex<WrappedState<T>>,
    items_tx: watch::Sender<ItemBuffer<T>>,
    size_tx: watch::Sender<usize>,
    busy_tx: watch::Sender<bool>,
    error_tx: broadcast::Sender<PagerError>,
    additions_tx: broadcast::Sender<Vec<T>>,
    connected: AtomicBool,
}

/// Pager whose index space is the concatenation of an ordered sequence of
/// child pagers, in constructor-supplied order.
///
/// Child offsets are derived lazily from [`Pager::total`]: a child whose
/// total is still unknown blocks addressing of all later children, so
/// `fetch_at` first forces that child's total to resolve (a 0-length fetch)
/// and re-dispatches the window once the size arrives. The composite total is
/// the sum of child totals once all are known.
///
/// Children are owned by the composition; `disconnect` (and drop) cascades
/// to all of them.
pub struct WrappedPager<T>
where
    T: Clone + Send + Sync + 'static,
{
    shared: Arc<WrappedShared<T>>,
    watchers: Mutex<Vec<JoinHandle<()>>>,
}

impl<T> WrappedPager<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Must be called within a tokio runtime; one watcher task is spawned per
    /// child to merge its streams into the composite channels.
    pub fn new(children: Vec<Arc<dyn Pager<T>>>) -> Self {
        let (items_tx, _) = watch::channel(ItemBuffer::default());
        let (size_tx, _) = watch::channel(0);
        let (busy_tx, _) = watch::channel(false);
        let (error_tx, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        let (additions_tx, _) = broadcast::channel(ADDITIONS_CHANNEL_CAPACITY);
        let shared = Arc::new(WrappedShared {
            children,
            state: Mutex::new(WrappedState {
                last_window: None,
                previous: ItemBuffer::default(),
            }),
            items_tx,
            size_tx,
            busy_tx,
            error_tx,
            additions_tx,
            connected: AtomicBool::new(true),
        });
        let watchers = (0..shared.children.len())
            .map(|child_index| {
                let shared = Arc::clone(&shared);
                tokio::spawn(watch_child(shared, child_index))
            })
            .collect();
        // Children with immediately-known totals (SimplePager) contribute to
        // the composite size right away.
        shared.recompute(false);
        Self {
            shared,
            watchers: Mutex::new(watchers),
        }
    }

    /// Convenience for the common two-part composition (e.g. a synthetic
    /// "back" entry in front of a folder listing).
    pub fn pair(first: Arc<dyn Pager<T>>, second: Arc<dyn Pager<T>>) -> Self {
        Self::new(vec![first, second])
    }
}

impl<T> Pager<T> for WrappedPager<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn observe_items(&self) -> watch::Receiver<ItemBuffer<T>> {
        self.shared.items_tx.subscribe()
    }

    fn observe_size(&self) -> watch::Receiver<usize> {
        self.shared.size_tx.subscribe()
    }

    fn observe_busy(&self) -> watch::Receiver<bool> {
        self.shared.busy_tx.subscribe()
    }

    fn observe_error(&self) -> broadcast::Receiver<PagerError> {
        self.shared.error_tx.subscribe()
    }

    fn observe_additions(&self) -> broadcast::Receiver<Vec<T>> {
        self.shared.additions_tx.subscribe()
    }

    fn fetch_at(&self, index: usize, length: usize) {
        if !self.shared.connected.load(Ordering::SeqCst) {
            return;
        }
        self.shared.lock_state().last_window = Some((index, length));
        self.shared.dispatch(index, length);
    }

    fn disconnect(&self) {
        if self.shared.connected.swap(false, Ordering::SeqCst) {
            debug!("wrapped pager disconnected");
            for child in &self.shared.children {
                child.disconnect();
            }
            let watchers = std::mem::take(
                &mut *self
                    .watchers
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
            );
            for watcher in watchers {
                watcher.abort();
            }
            self.shared.busy_tx.send_if_modified(|busy| {
                if *busy {
                    *busy = false;
                    true
                } else {
                    false
                }
            });
        }
    }

    fn max_size(&self) -> Option<usize> {
        None
    }

    fn total(&self) -> Option<usize> {
        self.shared
            .children
            .iter()
            .map(|child| child.total())
            .sum()
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn apply_changes(&self, changes: &[ItemChange<T>]) {
        // The children own the records; composite snapshots rebuild from
        // their buffers.
        for child in &self.shared.children {
            child.apply_changes(changes);
        }
    }
}

impl<T> Drop for WrappedPager<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        // Watcher tasks hold the shared state alive; a dropped composition
        // must not keep polling its children.
        self.disconnect();
    }
}

impl<T> WrappedShared<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Rebuild the composite buffer from the children's current snapshots
    /// and publish items and size. A rebuild whose residency layout matches
    /// the last published snapshot is not re-emitted unless `force` is set
    /// (a child patched items in place, so contents changed without the
    /// layout changing).
    fn recompute(&self, force: bool) {
        if !self.connected.load(Ordering::SeqCst) {
            return;
        }
        let mut slots: Vec<Option<T>> = Vec::new();
        let mut offset = 0;
        let mut all_known = true;
        for child in &self.children {
            let snapshot = child.observe_items().borrow().clone();
            for i in 0..snapshot.len() {
                let position = offset + i;
                if position >= slots.len() {
                    slots.resize_with(position + 1, || None);
                }
                slots[position] = snapshot.get(i).cloned();
            }
            match child.total() {
                Some(total) => offset += total,
                None => {
                    // Later children cannot be addressed until this child's
                    // total resolves.
                    all_known = false;
                    break;
                }
            }
        }
        let total = all_known.then_some(offset);
        let buffer = ItemBuffer::from_slots(slots);
        let size = total.unwrap_or(buffer.len());

        let mut state = self.lock_state();
        self.size_tx.send_if_modified(|current| {
            if *current == size {
                false
            } else {
                *current = size;
                true
            }
        });
        let changed = buffer.len() != state.previous.len()
            || buffer
                .iter()
                .zip(state.previous.iter())
                .any(|(now, before)| now.is_some() != before.is_some());
        if changed || force {
            state.previous = buffer.clone();
            self.items_tx.send_replace(buffer);
        }
    }

    fn recompute_busy(&self) {
        if !self.connected.load(Ordering::SeqCst) {
            return;
        }
        let busy = self
            .children
            .iter()
            .any(|child| *child.observe_busy().borrow());
        self.busy_tx.send_if_modified(|current| {
            if *current == busy {
                false
            } else {
                *current = busy;
                true
            }
        });
    }

    /// Resolve the window against currently-known child offsets, preserving
    /// strict left-to-right ordering: the first child with an unknown total
    /// gets a forcing 0-length fetch and dispatch stops there until its size
    /// arrives.
    fn dispatch(&self, index: usize, length: usize) {
        let end = index + length.saturating_sub(1);
        let mut offset = 0;
        for child in &self.children {
            let Some(total) = child.total() else {
                debug!("forcing total of child at offset {offset}");
                child.fetch_at(0, 0);
                return;
            };
            let child_end = offset + total;
            if total > 0 && child_end > index && offset <= end {
                let local_start = index.saturating_sub(offset);
                let local_end = end.min(child_end - 1) - offset;
                child.fetch_at(local_start, local_end - local_start + 1);
            }
            offset = child_end;
            if offset > end {
                return;
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, WrappedState<T>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Merge one child's streams into the composite channels.
async fn watch_child<T>(shared: Arc<WrappedShared<T>>, child_index: usize)
where
    T: Clone + Send + Sync + 'static,
{
    let child = Arc::clone(&shared.children[child_index]);
    let mut items_rx = child.observe_items();
    let mut size_rx = child.observe_size();
    let mut busy_rx = child.observe_busy();
    let mut error_rx = child.observe_error();
    let mut additions_rx = child.observe_additions();
    // Catch up with anything the child published between construction and
    // this task's first poll; the receivers only report later changes.
    shared.recompute(false);
    shared.recompute_busy();
    loop {
        tokio::select! {
            changed = items_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                shared.recompute(true);
            }
            changed = size_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                // A newly-known total shifts the offsets of all later
                // children; recompute and retry the caller's window.
                shared.recompute(false);
                let window = shared.lock_state().last_window;
                if let Some((index, length)) = window {
                    shared.dispatch(index, length);
                }
            }
            changed = busy_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                shared.recompute_busy();
            }
            received = error_rx.recv() => {
                match received {
                    // Relay without suppressing the other children.
                    Ok(err) => {
                        let _ = shared.error_tx.send(err);
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            received = additions_rx.recv() => {
                match received {
                    // Newly-resident items come straight from the child that
                    // fetched them: composite positions may shift when an
                    // earlier sibling's total is revised, but identities do
                    // not, so nothing is ever re-announced.
                    Ok(batch) => {
                        let _ = shared.additions_tx.send(batch);
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}
