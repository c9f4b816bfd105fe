use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fallback edge length for items the upstream did not measure.
pub const DEFAULT_DIMENSION: u32 = 450;
/// Tallest a single item may render in a masonry column.
pub const MAX_ITEM_HEIGHT: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ingestion/processing state of an uploaded item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IngestionStatus {
    #[default]
    Pending,
    Processing,
    #[serde(alias = "Ready", alias = "ready")]
    Scanned,
    Error,
    Blocked,
    NotFound,
}

impl IngestionStatus {
    /// Settled items render normally and are never polled again.
    pub fn is_settled(self) -> bool {
        matches!(self, IngestionStatus::Scanned)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(default)]
    pub ingestion: IngestionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Everything else the upstream sent along; opaque to the feed.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Item {
    pub fn new(id: i64, ingestion: IngestionStatus) -> Self {
        Self { id: ItemId(id), ingestion, width: None, height: None, payload: Map::new() }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (
            self.width.unwrap_or(DEFAULT_DIMENSION),
            self.height.unwrap_or(DEFAULT_DIMENSION),
        )
    }

    /// Height of the item when scaled into a column of `column_width`,
    /// capped at [`MAX_ITEM_HEIGHT`].
    pub fn display_height(&self, column_width: u32) -> u32 {
        let (w, h) = self.dimensions();
        if w == 0 {
            return MAX_ITEM_HEIGHT.min(h);
        }
        let scaled = (u64::from(h) * u64::from(column_width)) / u64::from(w);
        scaled.min(u64::from(MAX_ITEM_HEIGHT)) as u32
    }
}

/// Opaque continuation token handed back by the data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(pub String);

impl Cursor {
    pub fn new(s: impl Into<String>) -> Self {
        Cursor(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

impl FeedPage {
    pub fn new(items: Vec<Item>, next_cursor: Option<Cursor>) -> Self {
        Self { items, next_cursor }
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub id: ItemId,
    #[serde(alias = "status")]
    pub ingestion: IngestionStatus,
}
