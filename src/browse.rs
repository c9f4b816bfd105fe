use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::FeedConfig;
use crate::coordinator::{FeedCoordinator, FeedEvent};
use crate::filter::{normalize, parse_assignment, FilterSet, FilterValue};
use crate::normalize::{assemble, typed_filters};
use crate::observe::ManualSensor;
use crate::output::Meta;
use crate::pager::wait_for_reveal;
use crate::poller::{HttpStatusSource, IntervalPoller};
use crate::source::fixture::FixtureSource;
use crate::source::http::HttpDataSource;
use crate::source::DataSource;
use crate::telemetry::{self, ctx::LogCtx};
use crate::telemetry::ops::browse::{Browse, Phase as BrowsePhase};
use crate::util::time::parse_delay_opt;
use crate::view::{Display as ViewState, FeedView};

const MAX_RETRIES: usize = 2;

/// `scrollfeed browse ...`
#[derive(Args, Debug)]
pub struct BrowseCmd {
    /// Feed API root; falls back to SCROLLFEED_BASE_URL
    #[arg(long)] base_url: Option<String>,
    /// Serve pages from a JSON fixture instead of HTTP
    #[arg(long, conflicts_with = "base_url")] fixture: Option<PathBuf>,
    #[arg(long = "ambient", value_parser = parse_assignment)] ambient: Vec<(String, FilterValue)>,
    #[arg(long = "set", value_parser = parse_assignment)] overrides: Vec<(String, FilterValue)>,
    #[arg(long, default_value_t = false)] with_tags: bool,

    /// Keep the sentinel visible until this many pages are loaded (default: 2)
    #[arg(long, default_value_t = 2)]
    pub pages: usize,

    #[arg(long)] limit: Option<u32>, // items per page; overrides SCROLLFEED_PAGE_LIMIT
    #[arg(long, default_value_t = false)] show_eof: bool,
    /// Poll ingestion status for pending items (HTTP only)
    #[arg(long, default_value_t = false)] poll: bool,
    /// Keep polling this long after scrolling stops, e.g. 30s
    #[arg(long)] watch: Option<String>,
    #[arg(long)] filter_delay: Option<String>,
    #[arg(long)] page_delay: Option<String>,
    /// Mount the feed only once its reveal sentinel is seen, simulated after this delay
    #[arg(long)] reveal_after: Option<String>,
    /// Print the resolved filters and source, then exit
    #[arg(long, default_value_t = false)] dry_run: bool,
}

pub async fn run(args: BrowseCmd) -> Result<()> {
    let log = telemetry::browse();
    let _g = log
        .root_span_kv([
            ("base_url", format!("{:?}", args.base_url)),
            ("fixture", format!("{:?}", args.fixture)),
            ("pages", args.pages.to_string()),
            ("poll", args.poll.to_string()),
            ("watch", format!("{:?}", args.watch)),
            ("dry_run", args.dry_run.to_string()),
        ])
        .entered();
    let t0 = Instant::now();

    let _s = log.span(&BrowsePhase::Setup).entered();
    let mut config = FeedConfig::from_env();
    if let Some(d) = parse_delay_opt(&args.filter_delay)? { config.filter_delay = d; }
    if let Some(d) = parse_delay_opt(&args.page_delay)? { config.page_delay = d; }
    if let Some(limit) = args.limit { config.page_limit = limit.max(1); }
    if args.show_eof { config.show_end_of_feed = true; }
    if args.base_url.is_some() { config.base_url = args.base_url.clone(); }
    let watch = parse_delay_opt(&args.watch)?;
    let reveal_after = parse_delay_opt(&args.reveal_after)?;

    let (ambient, overrides) = assemble(&args.ambient, &args.overrides, args.with_tags);
    let key = normalize(&ambient, &overrides);
    typed_filters(&key)?;
    let source_label = match (&args.fixture, &config.base_url) {
        (Some(path), _) => format!("fixture:{}", path.display()),
        (None, Some(url)) => url.clone(),
        (None, None) => bail!("provide --base-url or --fixture (or set SCROLLFEED_BASE_URL)"),
    };
    drop(_s);

    if args.dry_run {
        log.info(format!(
            "📝 Browse plan — source={} filters={} pages={} limit={} poll={}",
            source_label, key, args.pages, config.page_limit, args.poll
        ));
        if telemetry::config::json_mode() {
            #[derive(Serialize)]
            struct BrowsePlan<'a> { source: &'a str, filters: &'a FilterSet, pages: usize, limit: u32, poll: bool }
            log.plan(&BrowsePlan {
                source: &source_label,
                filters: &key,
                pages: args.pages,
                limit: config.page_limit,
                poll: args.poll,
            })?;
        }
        return Ok(());
    }

    if let Some(delay) = reveal_after {
        let reveal = ManualSensor::new();
        let scroller = reveal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scroller.set_visible(true);
        });
        if !wait_for_reveal(&reveal).await {
            bail!("feed was never revealed");
        }
        log.info(format!("👀 feed revealed after {}ms", t0.elapsed().as_millis()));
    }

    let view = if let Some(path) = &args.fixture {
        let source = FixtureSource::from_path(path)
            .with_context(|| format!("load fixture {}", path.display()))?;
        if args.poll {
            log.warn("--poll needs an HTTP source; status polling disabled");
        }
        let feed = FeedCoordinator::new(Arc::new(source), config, ambient, overrides);
        scroll(&log, feed, None, args.pages, watch).await
    } else {
        let base = config.base_url.clone().unwrap_or_default();
        let source = HttpDataSource::new(&base, config.page_limit).context("build page source")?;
        let poller = if args.poll {
            let status = HttpStatusSource::new(&base).context("build status source")?;
            Some(IntervalPoller::new(status, config.poll_interval))
        } else {
            None
        };
        let feed = FeedCoordinator::new(Arc::new(source), config, ambient, overrides);
        scroll(&log, feed, poller, args.pages, watch).await
    };

    let _o = log.span(&BrowsePhase::Output).entered();
    let state = view.display();
    log.info(format!(
        "✅ {} items over {} pages — has_next_page={} pending={}",
        view.items.len(),
        view.pages,
        view.has_next_page,
        view.pending_ids.len()
    ));
    if telemetry::config::json_mode() {
        #[derive(Serialize)]
        struct BrowseResult<'a> {
            display: ViewState,
            #[serde(flatten)]
            view: &'a FeedView,
        }
        let meta = Meta {
            duration_ms: Some(t0.elapsed().as_millis()),
            filters_key: Some(key.canonical_key()),
        };
        log.result_with_meta(&BrowseResult { display: state, view: &view }, meta)?;
    } else {
        print_text(&view, state);
    }
    if let Some(err) = &view.error {
        bail!("feed stopped on error: {err}");
    }
    Ok(())
}

async fn scroll<S: DataSource>(
    log: &LogCtx<Browse>,
    mut feed: FeedCoordinator<S>,
    poller: Option<IntervalPoller<HttpStatusSource>>,
    pages: usize,
    watch: Option<Duration>,
) -> FeedView {
    let sensor = ManualSensor::new();
    feed.attach_sensor(&sensor);
    if let Some(p) = poller {
        feed.attach_poller(p);
    }

    let _s = log.span(&BrowsePhase::Scroll).entered();
    sensor.set_visible(true);
    let mut retries = 0;
    loop {
        feed.drain_signals(Instant::now());
        let view = feed.view();
        if view.pages >= pages && sensor.is_visible() {
            sensor.set_visible(false);
            continue;
        }
        if let Some(err) = view.error.as_ref().filter(|_| !view.is_fetching) {
            if view.retryable && retries < MAX_RETRIES {
                retries += 1;
                log.warn(format!("⚠️  page fetch failed, retry {retries}/{MAX_RETRIES}: {err}"));
                if feed.fetch_next_page(Instant::now()).unwrap_or(false) {
                    continue;
                }
            }
            log.warn(format!("⚠️  page fetch failed: {err}"));
            break;
        }
        if feed.is_idle() || feed.step().await.is_none() {
            break;
        }
    }
    drop(_s);

    if let Some(window) = watch.filter(|_| feed.is_polling()) {
        let _p = log.span(&BrowsePhase::Poll).entered();
        let until = Instant::now() + window;
        while feed.is_polling() {
            match tokio::time::timeout_at(until, feed.step()).await {
                Ok(Some(FeedEvent::StatusUpdated { update, applied: true })) => {
                    log.info(format!("🔄 item {} → {:?}", update.id, update.ingestion));
                }
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => break,
            }
        }
    }

    feed.detach();
    feed.view()
}

fn print_text(view: &FeedView, state: ViewState) {
    match state {
        ViewState::Loading => println!("(loading)"),
        ViewState::Empty => println!("No results found"),
        ViewState::Items { end_of_feed, .. } => {
            for item in &view.items {
                let (w, h) = item.dimensions();
                println!("{}\t{:?}\t{}x{}", item.id, item.ingestion, w, h);
            }
            if end_of_feed {
                println!("(end of feed)");
            }
        }
    }
}
