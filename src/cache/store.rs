//! Rendered page storage.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::config::CacheConfig;
use super::keys::PageKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub const METRIC_PAGE_CACHE_HIT: &str = "inkpost_page_cache_hit_total";
pub const METRIC_PAGE_CACHE_MISS: &str = "inkpost_page_cache_miss_total";
pub const METRIC_PAGE_CACHE_CLEAR: &str = "inkpost_page_cache_clear_total";

/// A response captured for replay.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

struct Entry {
    response: CachedResponse,
    stored_at: Instant,
}

/// Time-bounded LRU store of rendered pages.
///
/// An entry is served until its TTL lapses or [`PageCache::clear`] runs,
/// whichever comes first.
pub struct PageCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<LruCache<PageKey, Entry>>,
}

impl PageCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: config.ttl(),
            clock,
            entries: RwLock::new(LruCache::new(config.max_entries_non_zero())),
        }
    }

    pub fn get(&self, key: &PageKey) -> Option<CachedResponse> {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");

        let expired = match entries.get(key) {
            Some(entry) if now.duration_since(entry.stored_at) < self.ttl => {
                counter!(METRIC_PAGE_CACHE_HIT).increment(1);
                return Some(entry.response.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
            debug!(prefix = key.prefix, path = %key.path, "expired page evicted");
        }
        counter!(METRIC_PAGE_CACHE_MISS).increment(1);
        None
    }

    pub fn put(&self, key: PageKey, response: CachedResponse) {
        let stored_at = self.clock.now();
        rw_write(&self.entries, SOURCE, "put").put(
            key,
            Entry {
                response,
                stored_at,
            },
        );
    }

    /// Drops every stored page.
    pub fn clear(&self) {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        let dropped = entries.len();
        entries.clear();
        counter!(METRIC_PAGE_CACHE_CLEAR).increment(1);
        debug!(dropped, "page cache cleared");
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
