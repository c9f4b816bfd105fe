use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::filter::FilterSet;
use crate::item::{Cursor, FeedPage};

pub mod fixture;
pub mod http;

pub use fixture::FixtureSource;
pub use http::HttpDataSource;

/// Upstream page fetcher. Must be safe to call again with the same
/// (filters, cursor) pair.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    async fn fetch_page(&self, filters: &FilterSet, cursor: Option<&Cursor>) -> Result<FeedPage, FetchError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceCall {
    pub filters: FilterSet,
    pub cursor: Option<Cursor>,
}

struct Scripted {
    delay: Duration,
    result: Result<FeedPage, FetchError>,
}

/// Scripted data source: answers calls in order from a queue and records
/// every call it receives.
#[derive(Default)]
pub struct MockSource {
    responses: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<SourceCall>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, result: Result<FeedPage, FetchError>) {
        self.push_delayed(Duration::ZERO, result);
    }

    /// Queue a response that resolves only after `delay` of tokio time.
    pub fn push_delayed(&self, delay: Duration, result: Result<FeedPage, FetchError>) {
        self.responses.lock().unwrap().push_back(Scripted { delay, result });
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataSource for MockSource {
    async fn fetch_page(&self, filters: &FilterSet, cursor: Option<&Cursor>) -> Result<FeedPage, FetchError> {
        self.calls.lock().unwrap().push(SourceCall { filters: filters.clone(), cursor: cursor.cloned() });
        let next = self.responses.lock().unwrap().pop_front();
        let Some(scripted) = next else {
            return Err(FetchError::MockQueueEmpty);
        };
        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        scripted.result
    }
}
