use std::time::Duration;

use crate::util::time::parse_delay_str;

const DEFAULT_FILTER_DELAY_MS: u64 = 500;
const DEFAULT_PAGE_DELAY_MS: u64 = 500;
const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
const DEFAULT_PAGE_LIMIT: u32 = 20;
const DEFAULT_CACHE_KEYS: usize = crate::cache::DEFAULT_CAPACITY;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedConfig {
    /// How long live filters must hold still before they are committed.
    pub filter_delay: Duration,
    /// Debounce applied to sentinel-triggered page requests.
    pub page_delay: Duration,
    pub poll_interval: Duration,
    pub page_limit: u32,
    pub base_url: Option<String>,
    /// Render an end-of-feed marker once the last page is in.
    pub show_end_of_feed: bool,
    /// Filter sets whose pages stay cached.
    pub cache_keys: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            filter_delay: Duration::from_millis(DEFAULT_FILTER_DELAY_MS),
            page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            page_limit: DEFAULT_PAGE_LIMIT,
            base_url: None,
            show_end_of_feed: false,
            cache_keys: DEFAULT_CACHE_KEYS,
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`FeedConfig::from_env`] over an arbitrary lookup. Unparseable
    /// values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(d) = lookup("SCROLLFEED_FILTER_DELAY_MS").as_deref().and_then(parse_delay_str) {
            cfg.filter_delay = d;
        }
        if let Some(d) = lookup("SCROLLFEED_PAGE_DELAY_MS").as_deref().and_then(parse_delay_str) {
            cfg.page_delay = d;
        }
        if let Some(d) = lookup("SCROLLFEED_POLL_INTERVAL_MS").as_deref().and_then(parse_delay_str) {
            cfg.poll_interval = d;
        }
        if let Some(limit) = lookup("SCROLLFEED_PAGE_LIMIT").and_then(|v| v.parse::<u32>().ok()) {
            if limit > 0 {
                cfg.page_limit = limit;
            }
        }
        if let Some(url) = lookup("SCROLLFEED_BASE_URL").filter(|v| !v.trim().is_empty()) {
            cfg.base_url = Some(url);
        }
        if let Some(v) = lookup("SCROLLFEED_SHOW_EOF") {
            cfg.show_end_of_feed = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(n) = lookup("SCROLLFEED_CACHE_KEYS").and_then(|v| v.parse::<usize>().ok()) {
            if n > 0 {
                cfg.cache_keys = n;
            }
        }
        cfg
    }
}
