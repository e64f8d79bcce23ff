pub mod error;
pub mod types;

pub use error::{PagerError, Result};
pub use types::{
    DEFAULT_PAGE_SIZE, ItemBuffer, Page, PageFetcher, PageRequest, Pager, PagerConfig,
};
