//! One-shot "peek" access to a pager's first page.

use std::time::Duration;

use crate::core::{Pager, PagerError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for [`fetch_first_page`].
#[derive(Debug, Clone)]
pub struct FetchFirstPageOptions {
    /// How long to wait for the first page before giving up. The timer races
    /// the fetch; the underlying request is not cancelled.
    pub timeout: Duration,
    /// Leave the pager connected after the call settles.
    pub keep_alive: bool,
}

impl Default for FetchFirstPageOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            keep_alive: false,
        }
    }
}

impl FetchFirstPageOptions {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }
}

/// Fetch a pager's first page and return its resident items.
///
/// Races the first items emission against the first fetch error and a timer,
/// then disconnects the pager (unless `keep_alive` is set) so a pager nobody
/// will read again does not leak subscriptions or in-flight fetches. Used for
/// existence checks, lookups and metadata enrichment where only "peek" access
/// is needed.
pub async fn fetch_first_page<T>(
    pager: &dyn Pager<T>,
    options: FetchFirstPageOptions,
) -> Result<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let mut items_rx = pager.observe_items();
    let mut error_rx = pager.observe_error();

    // Replay-of-latest: a pager that already has its first page resident (or
    // is known to be empty) resolves without another fetch.
    let known_empty = pager.total() == Some(0);
    let resident: Option<Vec<T>> = {
        let current = items_rx.borrow_and_update();
        if current.get(0).is_some() || known_empty {
            Some(current.resident().cloned().collect())
        } else {
            None
        }
    };
    let result = match resident {
        Some(items) => Ok(items),
        None => {
            pager.fetch_at(0, 0);
            tokio::select! {
                changed = items_rx.changed() => match changed {
                    Ok(()) => Ok(items_rx.borrow_and_update().resident().cloned().collect()),
                    Err(_) => Err(PagerError::Disconnected),
                },
                received = error_rx.recv() => match received {
                    Ok(err) => Err(err),
                    Err(_) => Err(PagerError::Disconnected),
                },
                () = tokio::time::sleep(options.timeout) => {
                    Err(PagerError::Timeout(options.timeout))
                }
            }
        }
    };

    if !options.keep_alive {
        pager.disconnect();
    }
    result
}
