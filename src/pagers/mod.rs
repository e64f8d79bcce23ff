pub mod engine;
pub mod first_page;
pub mod offset;
pub mod simple;
pub mod simple_media;
pub mod wrapped;

pub use engine::PagerEngine;
pub use first_page::{FetchFirstPageOptions, fetch_first_page};
pub use offset::OffsetPager;
pub use simple::SimplePager;
pub use simple_media::SimpleMediaPager;
pub use wrapped::WrappedPager;
