//! Page cache keys.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Prefix under which the home feed is stored.
pub const INDEX_PAGE_PREFIX: &str = "index_page";

/// One stored page: a route prefix plus the request path and query.
///
/// Keys carry no viewer identity; every visitor shares the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub prefix: &'static str,
    pub path: String,
    pub query_hash: u64,
}

impl PageKey {
    pub fn new(prefix: &'static str, path: &str, query: Option<&str>) -> Self {
        Self {
            prefix,
            path: path.to_string(),
            query_hash: hash_query(query.unwrap_or("")),
        }
    }
}

pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

pub fn hash_query(query: &str) -> u64 {
    hash_value(&query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_distinguish_page_numbers() {
        let first = PageKey::new(INDEX_PAGE_PREFIX, "/", None);
        let second = PageKey::new(INDEX_PAGE_PREFIX, "/", Some("page=2"));
        assert_ne!(first, second);
        assert_eq!(first, PageKey::new(INDEX_PAGE_PREFIX, "/", Some("")));
    }

    #[test]
    fn keys_distinguish_prefixes() {
        let index = PageKey::new(INDEX_PAGE_PREFIX, "/", None);
        let other = PageKey::new("group_page", "/", None);
        assert_ne!(index, other);
    }
}
