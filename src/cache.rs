//! Paginated results keyed by committed filters.
//!
//! The cache never performs I/O. It hands out [`FetchRequest`]s and takes
//! their results back through [`FeedCache::resolve`]; the ticket on each
//! request lets it recognise responses that no longer matter.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::error::{FeedError, FetchError};
use crate::filter::FilterSet;
use crate::item::{Cursor, FeedPage, IngestionStatus, Item, ItemId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Ticket(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchKind {
    /// First page for a key that has nothing loaded.
    Initial,
    /// Subsequent page, continuing from the last cursor.
    NextPage,
    /// First page again for a key that is already displayed.
    Refetch,
}

impl FetchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchKind::Initial => "initial",
            FetchKind::NextPage => "next_page",
            FetchKind::Refetch => "refetch",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub ticket: Ticket,
    pub kind: FetchKind,
    pub filters: FilterSet,
    pub cursor: Option<Cursor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Result stored under the current key.
    Applied { kind: FetchKind, items: usize, has_next_page: bool },
    /// Fetch failed; error recorded on the current key.
    Failed { kind: FetchKind, error: FetchError },
    /// The key is no longer committed; result dropped.
    Stale,
    /// Ticket does not match the pending fetch for its key.
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchState {
    pub is_loading: bool,
    pub is_fetching: bool,
    pub is_refetching: bool,
    pub has_next_page: bool,
}

#[derive(Debug, Default)]
struct Entry {
    pages: Vec<FeedPage>,
    pending: Option<(Ticket, FetchKind)>,
    error: Option<FetchError>,
}

impl Entry {
    fn has_data(&self) -> bool {
        !self.pages.is_empty()
    }

    fn next_cursor(&self) -> Option<&Cursor> {
        self.pages.last().and_then(|p| p.next_cursor.as_ref())
    }
}

/// Filter sets kept cached when no capacity is given.
pub const DEFAULT_CAPACITY: usize = 16;

#[derive(Debug)]
pub struct FeedCache {
    entries: HashMap<FilterSet, Entry>,
    /// Keys from least to most recently queried.
    recent: VecDeque<FilterSet>,
    capacity: usize,
    current: Option<FilterSet>,
    /// Key whose data stays on screen until `current` has its first page.
    previous: Option<FilterSet>,
    next_ticket: u64,
}

impl Default for FeedCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl FeedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` filter sets. The current and previous keys
    /// are never evicted, so up to two entries may exceed a tiny capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            recent: VecDeque::new(),
            capacity: capacity.max(1),
            current: None,
            previous: None,
            next_ticket: 0,
        }
    }

    /// Number of filter sets currently cached.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, filters: &FilterSet) {
        self.recent.retain(|k| k != filters);
        self.recent.push_back(filters.clone());
    }

    /// Drop least recently queried keys until the cache fits. A fetch still
    /// running for an evicted key resolves as [`Resolution::Unknown`].
    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            let pinned = |k: &FilterSet| self.current.as_ref() == Some(k) || self.previous.as_ref() == Some(k);
            let Some(pos) = self.recent.iter().position(|k| !pinned(k)) else { break };
            if let Some(key) = self.recent.remove(pos) {
                self.entries.remove(&key);
            }
        }
    }

    /// Switch to `filters`. Returns the fetch to issue, if any.
    pub fn query(&mut self, filters: FilterSet) -> Option<FetchRequest> {
        if self.current.as_ref() == Some(&filters) {
            return None;
        }
        if let Some(old) = self.current.take() {
            let old_has_data = self.entries.get(&old).is_some_and(Entry::has_data);
            if old_has_data {
                self.previous = Some(old);
            }
        }
        self.current = Some(filters.clone());
        self.entries.entry(filters.clone()).or_default();
        self.touch(&filters);
        self.evict();

        let entry = &self.entries[&filters];
        if entry.has_data() {
            self.previous = None;
            return None;
        }
        if entry.pending.is_some() {
            return None;
        }
        Some(self.issue(filters, FetchKind::Initial, None))
    }

    /// Request the page after the last loaded one for the current key.
    ///
    /// `Ok(None)` means a fetch for this key is already running. An entry
    /// whose first page failed retries that page instead.
    pub fn fetch_next_page(&mut self) -> Result<Option<FetchRequest>, FeedError> {
        let key = self.current.clone().ok_or(FeedError::NotCommitted)?;
        let entry = self.entries.entry(key.clone()).or_default();
        if entry.pending.is_some() {
            return Ok(None);
        }
        if !entry.has_data() {
            return Ok(Some(self.issue(key, FetchKind::Initial, None)));
        }
        let cursor = entry.next_cursor().cloned().ok_or(FeedError::NoNextPage)?;
        Ok(Some(self.issue(key, FetchKind::NextPage, Some(cursor))))
    }

    /// Reload the current key from its first page.
    pub fn refetch(&mut self) -> Option<FetchRequest> {
        let key = self.current.clone()?;
        let entry = self.entries.entry(key.clone()).or_default();
        if entry.pending.is_some() {
            return None;
        }
        let kind = if entry.has_data() { FetchKind::Refetch } else { FetchKind::Initial };
        Some(self.issue(key, kind, None))
    }

    fn issue(&mut self, filters: FilterSet, kind: FetchKind, cursor: Option<Cursor>) -> FetchRequest {
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        if let Some(entry) = self.entries.get_mut(&filters) {
            entry.pending = Some((ticket, kind));
        }
        FetchRequest { ticket, kind, filters, cursor }
    }

    /// Take back the result of a request handed out earlier.
    pub fn resolve(&mut self, ticket: Ticket, filters: &FilterSet, result: Result<FeedPage, FetchError>) -> Resolution {
        let is_current = self.current.as_ref() == Some(filters);
        let Some(entry) = self.entries.get_mut(filters) else {
            return Resolution::Unknown;
        };
        let kind = match entry.pending {
            Some((t, kind)) if t == ticket => kind,
            _ => return Resolution::Unknown,
        };
        entry.pending = None;
        if !is_current {
            return Resolution::Stale;
        }

        match result {
            Ok(page) => {
                let items = page.items.len();
                let has_next_page = page.has_more();
                match kind {
                    FetchKind::Initial | FetchKind::Refetch => entry.pages = vec![page],
                    FetchKind::NextPage => entry.pages.push(page),
                }
                entry.error = None;
                self.previous = None;
                Resolution::Applied { kind, items, has_next_page }
            }
            Err(error) => {
                entry.error = Some(error.clone());
                Resolution::Failed { kind, error }
            }
        }
    }

    fn displayed(&self) -> Option<&Entry> {
        let current = self.current.as_ref().and_then(|k| self.entries.get(k));
        if let Some(e) = current.filter(|e| e.has_data()) {
            return Some(e);
        }
        self.previous.as_ref().and_then(|k| self.entries.get(k)).filter(|e| e.has_data())
    }

    fn current_entry(&self) -> Option<&Entry> {
        self.current.as_ref().and_then(|k| self.entries.get(k))
    }

    /// Items on screen: the current key's, or the previous key's while the
    /// current one is still loading its first page.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.displayed().into_iter().flat_map(|e| e.pages.iter().flat_map(|p| p.items.iter()))
    }

    pub fn page_count(&self) -> usize {
        self.displayed().map_or(0, |e| e.pages.len())
    }

    pub fn state(&self) -> FetchState {
        let current = self.current_entry();
        let pending = current.and_then(|e| e.pending.map(|(_, kind)| kind));
        let displayed = self.displayed();
        let is_fetching = pending.is_some();
        FetchState {
            is_loading: is_fetching && displayed.is_none(),
            is_fetching,
            is_refetching: displayed.is_some() && matches!(pending, Some(FetchKind::Initial | FetchKind::Refetch)),
            has_next_page: displayed.is_some_and(|e| e.next_cursor().is_some()),
        }
    }

    pub fn is_fetching(&self) -> bool {
        self.current_entry().is_some_and(|e| e.pending.is_some())
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.current_entry().and_then(|e| e.error.as_ref())
    }

    pub fn current(&self) -> Option<&FilterSet> {
        self.current.as_ref()
    }

    /// Update an item's status wherever it is cached, keeping its position.
    pub fn set_status(&mut self, id: ItemId, status: IngestionStatus) -> bool {
        let mut changed = false;
        for entry in self.entries.values_mut() {
            for item in entry.pages.iter_mut().flat_map(|p| p.items.iter_mut()) {
                if item.id == id && item.ingestion != status {
                    item.ingestion = status;
                    changed = true;
                }
            }
        }
        changed
    }
}
