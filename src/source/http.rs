use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::FetchError;
use crate::filter::FilterSet;
use crate::item::{Cursor, FeedPage, Item};

use super::DataSource;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Reads pages from `GET {base}/images?{filters}&cursor=..&limit=..`.
#[derive(Clone)]
pub struct HttpDataSource {
    http: HttpClient,
    endpoint: Url,
    limit: u32,
}

impl HttpDataSource {
    pub fn new(base_url: &str, limit: u32) -> Result<Self, FetchError> {
        Self::with_timeout(base_url, limit, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, limit: u32, timeout: Duration) -> Result<Self, FetchError> {
        let endpoint = join_endpoint(base_url, "images")?;
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::from_reqwest)?;
        Ok(Self { http, endpoint, limit })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn query(&self, filters: &FilterSet, cursor: Option<&Cursor>) -> Vec<(String, String)> {
        let mut pairs = filters.query_pairs();
        pairs.push(("limit".to_string(), self.limit.to_string()));
        if let Some(c) = cursor {
            pairs.push(("cursor".to_string(), c.to_string()));
        }
        pairs
    }
}

pub(crate) fn join_endpoint(base_url: &str, path: &str) -> Result<Url, FetchError> {
    let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
        .map_err(|e| FetchError::Endpoint(format!("{base_url}: {e}")))?;
    base.join(path).map_err(|e| FetchError::Endpoint(format!("{base_url}: {e}")))
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn fetch_page(&self, filters: &FilterSet, cursor: Option<&Cursor>) -> Result<FeedPage, FetchError> {
        let response = self
            .http
            .get(self.endpoint.clone())
            .query(&self.query(filters, cursor))
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(FetchError::from_reqwest)?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let page: ApiPage = serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok(FeedPage::new(page.items, cursor_from_value(page.next_cursor)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPage {
    #[serde(default)]
    items: Vec<Item>,
    #[serde(default)]
    next_cursor: Option<Value>,
}

/// Upstream cursors arrive as strings or numbers. Anything else, including
/// an empty string, means there is no next page.
fn cursor_from_value(v: Option<Value>) -> Option<Cursor> {
    match v? {
        Value::String(s) if !s.is_empty() => Some(Cursor(s)),
        Value::Number(n) => Some(Cursor(n.to_string())),
        _ => None,
    }
}
