use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;
use crate::item::{ItemId, StatusUpdate};
use crate::observe::Subscription;
use crate::source::http::join_endpoint;

/// Watches ingestion status for a set of ids and reports changes.
pub trait StatusPoller {
    fn subscribe(&self, ids: BTreeSet<ItemId>, updates: UnboundedSender<StatusUpdate>) -> Subscription;
}

/// One round of status lookups.
#[async_trait]
pub trait StatusSource: Send + Sync + 'static {
    async fn fetch_statuses(&self, ids: &[ItemId]) -> Result<Vec<StatusUpdate>, FetchError>;
}

/// Polls a [`StatusSource`] on a fixed interval from a background task
/// until every watched id settles or the subscription is dropped.
pub struct IntervalPoller<S> {
    source: Arc<S>,
    interval: Duration,
}

impl<S: StatusSource> IntervalPoller<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self { source: Arc::new(source), interval }
    }
}

impl<S: StatusSource> StatusPoller for IntervalPoller<S> {
    fn subscribe(&self, ids: BTreeSet<ItemId>, updates: UnboundedSender<StatusUpdate>) -> Subscription {
        if ids.is_empty() {
            return Subscription::noop();
        }
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let source = Arc::clone(&self.source);
        let period = self.interval;
        tokio::spawn(async move {
            let mut remaining = ids;
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            while !remaining.is_empty() {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let batch: Vec<ItemId> = remaining.iter().copied().collect();
                match source.fetch_statuses(&batch).await {
                    Ok(found) => {
                        for update in found {
                            if update.ingestion.is_settled() {
                                remaining.remove(&update.id);
                            }
                            if updates.send(update).is_err() {
                                return;
                            }
                        }
                    }
                    // failed polls are logged; ids stay watched
                    Err(e) => warn!(error = %e, ids = batch.len(), "status poll failed"),
                }
            }
            debug!("status poller stopped");
        });
        Subscription::from_token(token)
    }
}

/// Reads statuses from `GET {base}/ingestion?ids=1,2,3`, expecting
/// `[{"id": 1, "ingestion": "Scanned"}, ...]`.
#[derive(Clone)]
pub struct HttpStatusSource {
    http: HttpClient,
    endpoint: Url,
}

impl HttpStatusSource {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let endpoint = join_endpoint(base_url, "ingestion")?;
        Ok(Self { http: HttpClient::new(), endpoint })
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch_statuses(&self, ids: &[ItemId]) -> Result<Vec<StatusUpdate>, FetchError> {
        let joined = ids.iter().map(ItemId::to_string).collect::<Vec<_>>().join(",");
        let response = self
            .http
            .get(self.endpoint.clone())
            .query(&[("ids", joined)])
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status { status: status.as_u16(), body });
        }
        response.json::<Vec<StatusUpdate>>().await.map_err(FetchError::from_reqwest)
    }
}

/// Poller driven by hand. Keeps the most recent subscription and lets the
/// caller push updates into it.
#[derive(Clone, Default)]
pub struct ManualPoller {
    inner: Arc<Mutex<ManualPollerState>>,
}

#[derive(Default)]
struct ManualPollerState {
    subscriptions: Vec<BTreeSet<ItemId>>,
    active: Option<(u64, UnboundedSender<StatusUpdate>)>,
    next_id: u64,
}

impl ManualPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every id set ever subscribed, oldest first.
    pub fn subscriptions(&self) -> Vec<BTreeSet<ItemId>> {
        self.inner.lock().unwrap().subscriptions.clone()
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().unwrap().active.is_some()
    }

    /// Deliver an update to the live subscription. False if there is none.
    pub fn push(&self, update: StatusUpdate) -> bool {
        let st = self.inner.lock().unwrap();
        match &st.active {
            Some((_, tx)) => tx.send(update).is_ok(),
            None => false,
        }
    }
}

impl StatusPoller for ManualPoller {
    fn subscribe(&self, ids: BTreeSet<ItemId>, updates: UnboundedSender<StatusUpdate>) -> Subscription {
        let id = {
            let mut st = self.inner.lock().unwrap();
            st.next_id += 1;
            let id = st.next_id;
            st.subscriptions.push(ids);
            st.active = Some((id, updates));
            id
        };
        let inner = Arc::clone(&self.inner);
        Subscription::new(move || {
            let mut st = inner.lock().unwrap();
            if st.active.as_ref().is_some_and(|(active, _)| *active == id) {
                st.active = None;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::IngestionStatus;
    use mockito::{Matcher, Server};
    use tokio::sync::mpsc;

    /// Settles one more id per round; fails the first round.
    struct Stepper {
        rounds: Mutex<usize>,
    }

    #[async_trait]
    impl StatusSource for Stepper {
        async fn fetch_statuses(&self, ids: &[ItemId]) -> Result<Vec<StatusUpdate>, FetchError> {
            let round = {
                let mut r = self.rounds.lock().unwrap();
                *r += 1;
                *r
            };
            if round == 1 {
                return Err(FetchError::Transport("flaky".into()));
            }
            Ok(ids
                .iter()
                .take(1)
                .map(|id| StatusUpdate { id: *id, ingestion: IngestionStatus::Scanned })
                .collect())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn interval_poller_reports_until_all_settled() {
        let poller = IntervalPoller::new(Stepper { rounds: Mutex::new(0) }, Duration::from_secs(3));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = poller.subscribe(BTreeSet::from([ItemId(1), ItemId(2)]), tx);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.id, ItemId(1));
        assert_eq!(second.id, ItemId(2));
        // task exits once nothing is left, closing the channel
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_subscription_stops_polling() {
        let poller = IntervalPoller::new(Stepper { rounds: Mutex::new(1) }, Duration::from_secs(3));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = poller.subscribe(BTreeSet::from([ItemId(1), ItemId(2), ItemId(3)]), tx);
        assert_eq!(rx.recv().await.map(|u| u.id), Some(ItemId(1)));
        drop(sub);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn empty_id_set_subscribes_to_nothing() {
        let poller = IntervalPoller::new(Stepper { rounds: Mutex::new(0) }, Duration::from_secs(1));
        let (tx, _rx) = mpsc::unbounded_channel();
        let sub = poller.subscribe(BTreeSet::new(), tx);
        assert_eq!(format!("{sub:?}"), "Subscription { active: false }");
    }

    #[test]
    fn manual_poller_only_feeds_latest_subscription() {
        let poller = ManualPoller::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let first = poller.subscribe(BTreeSet::from([ItemId(1)]), tx1);
        let _second = poller.subscribe(BTreeSet::from([ItemId(2)]), tx2);
        drop(first);
        assert!(poller.is_active());

        assert!(poller.push(StatusUpdate { id: ItemId(2), ingestion: IngestionStatus::Scanned }));
        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap().id, ItemId(2));
        assert_eq!(poller.subscriptions().len(), 2);
    }

    #[tokio::test]
    async fn http_status_source_decodes_updates() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/ingestion")
            .match_query(Matcher::UrlEncoded("ids".into(), "4,5".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":4,"ingestion":"Scanned"},{"id":5,"status":"Blocked"}]"#)
            .create_async()
            .await;

        let source = HttpStatusSource::new(&server.url()).unwrap();
        let updates = source.fetch_statuses(&[ItemId(4), ItemId(5)]).await.unwrap();
        assert_eq!(updates[0], StatusUpdate { id: ItemId(4), ingestion: IngestionStatus::Scanned });
        assert_eq!(updates[1].ingestion, IngestionStatus::Blocked);
        mock.assert_async().await;
    }
}
