use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by pagers.
///
/// Fetch failures are non-fatal: they are emitted on the error channel and the
/// pager stays usable for other windows. Configuration errors are raised at
/// construction and are fatal to that pager instance.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PagerError {
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Invalid pager configuration: {0}")]
    Config(String),

    #[error("Timed out after {0:?} waiting for the first page")]
    Timeout(Duration),

    #[error("Pager disconnected")]
    Disconnected,
}

impl PagerError {
    /// Wrap an arbitrary backend failure as a fetch error.
    pub fn fetch(err: impl ToString) -> Self {
        Self::Fetch(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PagerError>;
