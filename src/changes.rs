//! Enhancement side channel.
//!
//! Backends often learn more about items after the page that delivered them
//! has already been published (a follow-up metadata fetch driven by
//! [`Pager::observe_additions`]). The corrected records are republished in
//! place through this module: an [`ItemChange`] pairs an identity predicate
//! with an in-place patch, and a [`ChangeDispatcher`] fans batches of changes
//! out to every attached pager. Items never move and the size never changes;
//! only field values do.
//!
//! Pagers created with `lookup: true` are already enhanced and should not be
//! attached.

use std::fmt;
use std::sync::Arc;

use log::warn;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::core::Pager;

/// An identity-matched, in-place update to already-delivered items.
pub struct ItemChange<T> {
    matcher: Arc<dyn Fn(&T) -> bool + Send + Sync>,
    patch: Arc<dyn Fn(&mut T) + Send + Sync>,
}

impl<T> Clone for ItemChange<T> {
    fn clone(&self) -> Self {
        Self {
            matcher: Arc::clone(&self.matcher),
            patch: Arc::clone(&self.patch),
        }
    }
}

impl<T> fmt::Debug for ItemChange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ItemChange")
    }
}

impl<T> ItemChange<T> {
    /// `matcher` selects the records to update (typically by source id);
    /// `patch` mutates a matching record in place.
    pub fn new(
        matcher: impl Fn(&T) -> bool + Send + Sync + 'static,
        patch: impl Fn(&mut T) + Send + Sync + 'static,
    ) -> Self {
        Self {
            matcher: Arc::new(matcher),
            patch: Arc::new(patch),
        }
    }

    pub fn matches(&self, item: &T) -> bool {
        (self.matcher)(item)
    }

    pub fn apply(&self, item: &mut T) {
        (self.patch)(item)
    }
}

/// Cloneable hub distributing change batches to attached pagers.
pub struct ChangeDispatcher<T> {
    tx: broadcast::Sender<Vec<ItemChange<T>>>,
}

impl<T> Clone for ChangeDispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for ChangeDispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> ChangeDispatcher<T> {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(32);
        Self { tx }
    }

    /// Fan a batch of changes out to every attached pager. Returns the number
    /// of subscribers that received the batch.
    pub fn dispatch(&self, changes: Vec<ItemChange<T>>) -> usize {
        self.tx.send(changes).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<ItemChange<T>>> {
        self.tx.subscribe()
    }
}

/// Subscribe a pager to a dispatcher.
///
/// The spawned task applies incoming change batches through
/// [`Pager::apply_changes`] until the pager disconnects or the dispatcher is
/// dropped.
pub fn attach<T>(dispatcher: &ChangeDispatcher<T>, pager: Arc<dyn Pager<T>>) -> JoinHandle<()>
where
    T: Clone + Send + Sync + 'static,
{
    let mut rx = dispatcher.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(changes) => {
                    if !pager.is_connected() {
                        break;
                    }
                    pager.apply_changes(&changes);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("change dispatcher lagged, {skipped} batches dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
