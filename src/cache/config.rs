//! Cache configuration.
//!
//! TTLs for the read caches, resolved from the `[cache]` settings section.

use std::time::Duration;

const DEFAULT_LIST_TTL_SECS: u64 = 600;
const DEFAULT_PAGE_TTL_SECS: u64 = 60;
const DEFAULT_DETAIL_TTL_SECS: u64 = 60;
const DEFAULT_INDEX_PER_PAGE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Search listings keyed by page and page size.
    pub list_ttl: Duration,
    /// Published-post index pages.
    pub page_ttl: Duration,
    /// Single post detail entries.
    pub detail_ttl: Duration,
    /// Page size of the published-post index.
    pub index_per_page: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            list_ttl: Duration::from_secs(DEFAULT_LIST_TTL_SECS),
            page_ttl: Duration::from_secs(DEFAULT_PAGE_TTL_SECS),
            detail_ttl: Duration::from_secs(DEFAULT_DETAIL_TTL_SECS),
            index_per_page: DEFAULT_INDEX_PER_PAGE,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            list_ttl: settings.list_ttl,
            page_ttl: settings.page_ttl,
            detail_ttl: settings.detail_ttl,
            index_per_page: settings.per_page.get(),
        }
    }
}
