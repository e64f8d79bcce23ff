// ============================================================================
// MediaPager Library
// ============================================================================
//
// A reactive pagination engine for browsing large, remotely-hosted media
// catalogs. Every browsing surface (library views, search results, playlists,
// folder trees) talks to one uniform contract: "make window
// [index, index + length) resident" plus live items/size/busy/error signals.
// Concrete pager kinds reconcile backend-imposed page sizes, compose multiple
// sources into one continuous index space and keep behavior safe under the
// overlapping fetch requests of a fast-scrolling virtualized caller.

//! # MediaPager
//!
//! Composable, UI-agnostic pagers over asynchronous page sources.
//!
//! - [`OffsetPager`] — offset/page-number backends with fixed-size pages.
//! - [`SimplePager`] — a fully-known finite list as a zero-latency pager.
//! - [`SimpleMediaPager`] — contents discovered lazily by a memoized thunk.
//! - [`WrappedPager`] — an ordered sequence of child pagers stitched into one
//!   index space.
//! - [`fetch_first_page`] — one-shot "peek" access with a timeout race.
//! - [`changes`] — side channel for enhancing already-delivered items in
//!   place.
//!
//! Pagers spawn their fetches on tokio tasks, so they must be created and
//! driven inside a tokio runtime.
//!
//! ```
//! use mediapager::{FetchFirstPageOptions, SimplePager, fetch_first_page};
//!
//! tokio_test::block_on(async {
//!     let pager = SimplePager::new(vec!["Back", "Albums", "Singles"]);
//!     let items = fetch_first_page(&pager, FetchFirstPageOptions::default())
//!         .await
//!         .unwrap();
//!     assert_eq!(items, vec!["Back", "Albums", "Singles"]);
//! });
//! ```

pub mod changes;
pub mod core;
pub mod pagers;

// Re-export main types for convenience
pub use crate::core::{
    DEFAULT_PAGE_SIZE, ItemBuffer, Page, PageFetcher, PageRequest, Pager, PagerConfig, PagerError,
    Result,
};
pub use changes::{ChangeDispatcher, ItemChange};
pub use pagers::{
    FetchFirstPageOptions, OffsetPager, PagerEngine, SimpleMediaPager, SimplePager, WrappedPager,
    fetch_first_page,
};
