//! The feed coordinator: one task owning filters, cache, pager and
//! ingestion gate.
//!
//! All state lives behind `&mut self`; there is no locking. The only
//! suspension points are page fetches, which run as futures polled by
//! [`FeedCoordinator::step`] alongside the debounce deadlines and the
//! collaborator channels.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep_until, Instant};

use crate::cache::{FeedCache, FetchRequest, Resolution, Ticket};
use crate::config::FeedConfig;
use crate::debounce::{Debounced, Transition};
use crate::error::{FeedError, FetchError};
use crate::filter::image::end_of_feed_allowed;
use crate::filter::{normalize, FilterSet};
use crate::ingestion::{IngestionGate, Partition};
use crate::item::{FeedPage, StatusUpdate};
use crate::observe::{Subscription, VisibilitySensor};
use crate::pager::VisibilityPager;
use crate::poller::StatusPoller;
use crate::source::DataSource;
use crate::telemetry::{self, ctx::LogCtx};
use crate::telemetry::ops::feed::{Feed, Phase as FeedPhase};
use crate::view::FeedView;

/// A finished page fetch, handed back to the cache.
#[derive(Debug)]
pub struct Completion {
    pub ticket: Ticket,
    pub filters: FilterSet,
    pub result: Result<FeedPage, FetchError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A timer fired. `committed` is set when live filters were committed.
    Tick { committed: Option<FilterSet>, page_requested: bool },
    Resolved { ticket: Ticket, resolution: Resolution },
    StatusUpdated { update: StatusUpdate, applied: bool },
    VisibilityChanged(bool),
}

pub struct FeedCoordinator<S: DataSource> {
    source: Arc<S>,
    config: FeedConfig,
    ambient: FilterSet,
    overrides: FilterSet,
    filters: Debounced<FilterSet>,
    cache: FeedCache,
    pager: VisibilityPager,
    gate: IngestionGate,
    sentinel_visible: bool,
    in_flight: FuturesUnordered<BoxFuture<'static, Completion>>,
    poller: Option<Box<dyn StatusPoller>>,
    status_tx: UnboundedSender<StatusUpdate>,
    status_rx: UnboundedReceiver<StatusUpdate>,
    status_sub: Option<Subscription>,
    visibility_rx: Option<UnboundedReceiver<bool>>,
    visibility_sub: Option<Subscription>,
    log: LogCtx<Feed>,
}

impl<S: DataSource> FeedCoordinator<S> {
    /// Build a coordinator and start loading the initial filters, which
    /// are committed without waiting for the debounce.
    pub fn new(source: Arc<S>, config: FeedConfig, ambient: FilterSet, overrides: FilterSet) -> Self {
        let log = telemetry::feed();
        let live = {
            let _s = log.span(&FeedPhase::Normalize).entered();
            normalize(&ambient, &overrides)
        };
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let mut this = Self {
            source,
            filters: Debounced::new(live, config.filter_delay),
            pager: VisibilityPager::new(config.page_delay),
            cache: FeedCache::with_capacity(config.cache_keys),
            config,
            ambient,
            overrides,
            gate: IngestionGate::new(),
            sentinel_visible: false,
            in_flight: FuturesUnordered::new(),
            poller: None,
            status_tx,
            status_rx,
            status_sub: None,
            visibility_rx: None,
            visibility_sub: None,
            log,
        };
        let initial = this.filters.committed().clone();
        this.commit(initial);
        this.sync_pager(Instant::now());
        this
    }

    pub fn set_ambient(&mut self, ambient: FilterSet, now: Instant) -> Transition {
        self.ambient = ambient;
        self.refresh_live(now)
    }

    pub fn set_overrides(&mut self, overrides: FilterSet, now: Instant) -> Transition {
        self.overrides = overrides;
        self.refresh_live(now)
    }

    fn refresh_live(&mut self, now: Instant) -> Transition {
        let _s = self.log.span(&FeedPhase::Normalize).entered();
        let live = normalize(&self.ambient, &self.overrides);
        let transition = self.filters.set(live, now);
        match transition {
            Transition::Scheduled(_) => self.log.debug_kv("filters changed", [("live", self.filters.live().to_string())]),
            Transition::Converged => self.log.debug("filters back to committed; pending commit dropped"),
            Transition::Unchanged => {}
        }
        transition
    }

    fn commit(&mut self, filters: FilterSet) {
        let _s = self.log.span(&FeedPhase::Commit).entered();
        self.log.committed(&filters.canonical_key());
        if let Some(req) = self.cache.query(filters) {
            self.dispatch(req);
        }
    }

    fn dispatch(&mut self, req: FetchRequest) {
        let _s = self.log.span(&FeedPhase::Fetch).entered();
        self.log.debug_kv(
            "fetch page",
            [
                ("ticket", req.ticket.0.to_string()),
                ("kind", req.kind.as_str().to_string()),
                ("cursor", format!("{:?}", req.cursor.as_ref().map(|c| c.as_str()))),
            ],
        );
        let source = Arc::clone(&self.source);
        let fut = async move {
            let result = source.fetch_page(&req.filters, req.cursor.as_ref()).await;
            Completion { ticket: req.ticket, filters: req.filters, result }
        };
        self.in_flight.push(fut.boxed());
    }

    /// Report whether the sentinel is on screen.
    pub fn set_sentinel_visible(&mut self, visible: bool, now: Instant) {
        self.sentinel_visible = visible;
        self.sync_pager(now);
    }

    fn sync_pager(&mut self, now: Instant) {
        let st = self.cache.state();
        let sentinel_rendered = st.has_next_page && !st.is_loading && !st.is_refetching;
        self.pager.observe(self.sentinel_visible && sentinel_rendered, st.is_fetching, now);
    }

    /// Ask for the next page right away. `Ok(false)` when a fetch for the
    /// current filters is already running.
    pub fn fetch_next_page(&mut self, now: Instant) -> Result<bool, FeedError> {
        let _s = self.log.span(&FeedPhase::Paginate).entered();
        match self.cache.fetch_next_page() {
            Ok(Some(req)) => {
                self.dispatch(req);
                self.sync_pager(now);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                self.log.debug_kv("next page not requested", [("reason", e.to_string())]);
                Err(e)
            }
        }
    }

    /// Reload the committed filters from the first page.
    pub fn refetch(&mut self, now: Instant) -> bool {
        let Some(req) = self.cache.refetch() else { return false };
        self.dispatch(req);
        self.sync_pager(now);
        true
    }

    /// Fire whatever timers are due at `now`.
    pub fn advance(&mut self, now: Instant) -> FeedEvent {
        let committed = self.filters.poll(now).cloned();
        if let Some(filters) = &committed {
            self.commit(filters.clone());
            self.sync_ingestion();
        }
        let mut page_requested = false;
        if self.pager.poll(now, self.cache.is_fetching()) {
            page_requested = self.fetch_next_page(now).unwrap_or(false);
        }
        self.sync_pager(now);
        FeedEvent::Tick { committed, page_requested }
    }

    /// Feed a finished fetch back into the cache.
    pub fn resolve(&mut self, done: Completion, now: Instant) -> Resolution {
        let _s = self.log.span(&FeedPhase::Resolve).entered();
        let resolution = self.cache.resolve(done.ticket, &done.filters, done.result);
        match &resolution {
            Resolution::Applied { kind, items, has_next_page } => {
                self.log.page_applied(kind.as_str(), *items, self.cache.items().count(), *has_next_page);
            }
            Resolution::Failed { kind, error } => {
                self.log.warn_kv(
                    "page fetch failed",
                    [
                        ("kind", kind.as_str().to_string()),
                        ("retryable", error.is_retryable().to_string()),
                        ("error", error.to_string()),
                    ],
                );
            }
            Resolution::Stale => self.log.debug_kv("stale page dropped", [("ticket", done.ticket.0.to_string())]),
            Resolution::Unknown => self.log.debug_kv("unknown ticket", [("ticket", done.ticket.0.to_string())]),
        }
        self.sync_ingestion();
        self.sync_pager(now);
        resolution
    }

    /// Connect a status poller. Currently pending items are subscribed at once.
    pub fn attach_poller(&mut self, poller: impl StatusPoller + 'static) {
        self.poller = Some(Box::new(poller));
        let ids = self.gate.pending().clone();
        self.status_sub = None;
        if let Some(poller) = &self.poller {
            if !ids.is_empty() {
                self.status_sub = Some(poller.subscribe(ids, self.status_tx.clone()));
            }
        }
    }

    pub fn attach_sensor(&mut self, sensor: &dyn VisibilitySensor) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.visibility_sub = Some(sensor.register(tx));
        self.visibility_rx = Some(rx);
    }

    /// Release poller and sensor subscriptions.
    pub fn detach(&mut self) {
        self.status_sub = None;
        self.visibility_sub = None;
        self.visibility_rx = None;
        self.poller = None;
    }

    fn sync_ingestion(&mut self) {
        let Some(Partition { settled, pending: ids }) = self.gate.sync(self.cache.items()) else { return };
        let _s = self.log.span(&FeedPhase::Ingest).entered();
        self.log.debug_kv(
            "pending ingestion",
            [("ids", ids.len().to_string()), ("settled", settled.len().to_string())],
        );
        // replacing the handle releases the previous subscription
        self.status_sub = None;
        if let Some(poller) = &self.poller {
            if !ids.is_empty() {
                self.status_sub = Some(poller.subscribe(ids, self.status_tx.clone()));
            }
        }
    }

    pub fn apply_status(&mut self, update: StatusUpdate) -> bool {
        let _s = self.log.span(&FeedPhase::Ingest).entered();
        let applied = self.gate.apply(update, &mut self.cache);
        if applied {
            self.log.debug_kv(
                "status updated",
                [("id", update.id.to_string()), ("status", format!("{:?}", update.ingestion))],
            );
        }
        if self.gate.pending().is_empty() {
            self.status_sub = None;
        }
        applied
    }

    /// A poller subscription is live.
    pub fn is_polling(&self) -> bool {
        self.status_sub.is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.filters.deadline(), self.pager.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// No fetch running and no timer armed.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty() && self.next_deadline().is_none()
    }

    /// Wait for and handle the next event. `None` when there is nothing
    /// left that could ever produce one.
    pub async fn step(&mut self) -> Option<FeedEvent> {
        let deadline = self.next_deadline();
        let has_fetches = !self.in_flight.is_empty();
        let watching_status = self.status_sub.is_some();
        let watching_visibility = self.visibility_rx.is_some();

        tokio::select! {
            Some(done) = self.in_flight.next(), if has_fetches => {
                let ticket = done.ticket;
                let resolution = self.resolve(done, Instant::now());
                Some(FeedEvent::Resolved { ticket, resolution })
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                Some(self.advance(Instant::now()))
            }
            Some(update) = self.status_rx.recv(), if watching_status => {
                let applied = self.apply_status(update);
                Some(FeedEvent::StatusUpdated { update, applied })
            }
            Some(visible) = recv_opt(&mut self.visibility_rx), if watching_visibility => {
                self.set_sentinel_visible(visible, Instant::now());
                Some(FeedEvent::VisibilityChanged(visible))
            }
            else => None,
        }
    }

    /// Handle signals already queued by collaborators without waiting.
    pub fn drain_signals(&mut self, now: Instant) -> usize {
        let mut handled = 0;
        while let Some(visible) = self.visibility_rx.as_mut().and_then(|rx| rx.try_recv().ok()) {
            self.set_sentinel_visible(visible, now);
            handled += 1;
        }
        while let Ok(update) = self.status_rx.try_recv() {
            self.apply_status(update);
            handled += 1;
        }
        handled
    }

    /// Step until no fetch is running and no timer is armed.
    pub async fn settle(&mut self) {
        loop {
            self.drain_signals(Instant::now());
            if self.is_idle() {
                break;
            }
            if self.step().await.is_none() {
                break;
            }
        }
    }

    pub fn view(&self) -> FeedView {
        let st = self.cache.state();
        let mut view = FeedView {
            items: self.cache.items().cloned().collect(),
            pages: self.cache.page_count(),
            is_loading: st.is_loading,
            is_fetching: st.is_fetching,
            is_refetching: st.is_refetching,
            has_next_page: st.has_next_page,
            error: None,
            retryable: false,
            pending_ids: self.gate.pending().iter().copied().collect(),
            show_end_of_feed: end_of_feed_allowed(self.config.show_end_of_feed, self.filters.committed()),
        };
        view.set_error(self.cache.error());
        view
    }

    pub fn live_filters(&self) -> &FilterSet {
        self.filters.live()
    }

    pub fn committed_filters(&self) -> &FilterSet {
        self.filters.committed()
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }
}

async fn recv_opt<T>(rx: &mut Option<UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
