use serde::Serialize;

use crate::error::FetchError;
use crate::item::{Item, ItemId};

/// What the render surface should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Display {
    /// Spinner: nothing to show yet.
    Loading,
    /// "No results found".
    Empty,
    Items {
        /// Loading overlay over the stale items.
        overlay: bool,
        /// Whether the next-page sentinel exists at all.
        sentinel: bool,
        end_of_feed: bool,
    },
}

/// Snapshot of the feed for one render.
#[derive(Debug, Clone, Serialize)]
pub struct FeedView {
    pub items: Vec<Item>,
    pub pages: usize,
    pub is_loading: bool,
    pub is_fetching: bool,
    pub is_refetching: bool,
    pub has_next_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The recorded error is worth another pagination trigger.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
    pub pending_ids: Vec<ItemId>,
    /// End-of-feed marker allowed for these filters.
    pub show_end_of_feed: bool,
}

impl FeedView {
    pub fn set_error(&mut self, error: Option<&FetchError>) {
        self.error = error.map(ToString::to_string);
        self.retryable = error.is_some_and(FetchError::is_retryable);
    }

    /// The sentinel is only rendered when another page exists and nothing
    /// is loading over the current items.
    pub fn sentinel(&self) -> bool {
        self.has_next_page && !self.is_loading && !self.is_refetching
    }

    pub fn display(&self) -> Display {
        if self.is_loading {
            return Display::Loading;
        }
        if self.items.is_empty() {
            return Display::Empty;
        }
        Display::Items {
            overlay: self.is_refetching,
            sentinel: self.sentinel(),
            end_of_feed: !self.has_next_page && self.show_end_of_feed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::IngestionStatus;

    fn view(items: usize) -> FeedView {
        FeedView {
            items: (0..items as i64).map(|i| Item::new(i, IngestionStatus::Scanned)).collect(),
            pages: 1,
            is_loading: false,
            is_fetching: false,
            is_refetching: false,
            has_next_page: true,
            error: None,
            retryable: false,
            pending_ids: Vec::new(),
            show_end_of_feed: true,
        }
    }

    #[test]
    fn loading_wins_over_everything() {
        let mut v = view(0);
        v.is_loading = true;
        assert_eq!(v.display(), Display::Loading);
        v.is_loading = false;
        assert_eq!(v.display(), Display::Empty);
    }

    #[test]
    fn refetch_hides_sentinel_and_shows_overlay() {
        let mut v = view(3);
        assert_eq!(v.display(), Display::Items { overlay: false, sentinel: true, end_of_feed: false });
        v.is_refetching = true;
        assert_eq!(v.display(), Display::Items { overlay: true, sentinel: false, end_of_feed: false });
    }

    #[test]
    fn end_of_feed_only_without_next_page() {
        let mut v = view(3);
        v.has_next_page = false;
        assert_eq!(v.display(), Display::Items { overlay: false, sentinel: false, end_of_feed: true });
        v.show_end_of_feed = false;
        assert_eq!(v.display(), Display::Items { overlay: false, sentinel: false, end_of_feed: false });
    }

    #[test]
    fn error_carries_retry_hint() {
        let mut v = view(3);
        v.set_error(Some(&FetchError::Status { status: 503, body: "busy".into() }));
        assert!(v.retryable);
        assert!(v.error.as_deref().is_some_and(|e| e.contains("503")));
        v.set_error(Some(&FetchError::Decode("eof".into())));
        assert!(!v.retryable);
        v.set_error(None);
        assert!(v.error.is_none() && !v.retryable);
    }
}
