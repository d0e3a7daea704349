//! Rendered page cache.
//!
//! A single in-process LRU of full responses, keyed by route prefix, path
//! and query. Entries expire after a fixed TTL and the whole store can be
//! cleared on demand.

mod clock;
mod config;
pub mod keys;
mod lock;
mod middleware;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, DEFAULT_TTL_SECONDS};
pub use keys::{INDEX_PAGE_PREFIX, PageKey};
pub use middleware::{CachePageState, cache_page};
pub use store::{
    CachedResponse, METRIC_PAGE_CACHE_CLEAR, METRIC_PAGE_CACHE_HIT, METRIC_PAGE_CACHE_MISS,
    PageCache,
};
