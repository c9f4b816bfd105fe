use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::FetchError;
use crate::filter::{FilterSet, normalize};
use crate::item::{Cursor, FeedPage};

use super::DataSource;

/// Canned feeds read from a JSON file:
///
/// ```json
/// { "feeds": [ { "filters": {"period": "Month"}, "pages": [ {"items": [], "nextCursor": "c1"} ] } ] }
/// ```
///
/// A feed without `filters` answers any filter set that no other feed
/// matches exactly.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureSource {
    feeds: Vec<FixtureFeed>,
}

#[derive(Debug, Clone, Deserialize)]
struct FixtureFeed {
    #[serde(default)]
    filters: Option<FilterSet>,
    pages: Vec<FeedPage>,
}

impl FixtureSource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FetchError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| FetchError::Fixture(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, FetchError> {
        serde_json::from_str(raw).map_err(|e| FetchError::Fixture(e.to_string()))
    }

    fn feed_for(&self, filters: &FilterSet) -> Option<&FixtureFeed> {
        let wanted = filters.normalized();
        let empty = FilterSet::new();
        self.feeds
            .iter()
            .find(|f| f.filters.as_ref().is_some_and(|fs| normalize(&empty, fs) == wanted))
            .or_else(|| self.feeds.iter().find(|f| f.filters.is_none()))
    }
}

#[async_trait]
impl DataSource for FixtureSource {
    async fn fetch_page(&self, filters: &FilterSet, cursor: Option<&Cursor>) -> Result<FeedPage, FetchError> {
        let feed = self
            .feed_for(filters)
            .ok_or_else(|| FetchError::Fixture(format!("no feed for filters {filters}")))?;
        let index = match cursor {
            None => 0,
            Some(c) => {
                let prev = feed
                    .pages
                    .iter()
                    .position(|p| p.next_cursor.as_ref() == Some(c))
                    .ok_or_else(|| FetchError::Fixture(format!("unknown cursor {c}")))?;
                prev + 1
            }
        };
        feed.pages
            .get(index)
            .cloned()
            .ok_or_else(|| FetchError::Fixture(format!("page {index} missing")))
    }
}
