use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Server};
use serde_json::json;
use tokio::time::Instant;

use scrollfeed::cache::Resolution;
use scrollfeed::config::FeedConfig;
use scrollfeed::item::{Cursor, FeedPage, IngestionStatus, Item, ItemId, StatusUpdate};
use scrollfeed::observe::ManualSensor;
use scrollfeed::poller::ManualPoller;
use scrollfeed::source::fixture::FixtureSource;
use scrollfeed::source::http::HttpDataSource;
use scrollfeed::source::MockSource;
use scrollfeed::view::Display;
use scrollfeed::{FeedCoordinator, FeedEvent, FeedError, FilterSet};

fn items_json(ids: std::ops::Range<i64>) -> serde_json::Value {
    json!(ids.map(|id| json!({"id": id, "ingestion": "Scanned", "width": 300, "height": 900})).collect::<Vec<_>>())
}

fn page(start: i64, n: i64, cursor: Option<&str>) -> FeedPage {
    let items = (start..start + n).map(|id| Item::new(id, IngestionStatus::Scanned)).collect();
    FeedPage::new(items, cursor.map(Cursor::new))
}

#[tokio::test]
async fn http_feed_loads_forty_items_over_two_pages() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("GET", "/images")
        .match_query(Matcher::Exact("period=Month&sort=Newest&limit=20".into()))
        .with_header("content-type", "application/json")
        .with_body(json!({"items": items_json(1..21), "nextCursor": "c1"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("GET", "/images")
        .match_query(Matcher::Exact("period=Month&sort=Newest&limit=20&cursor=c1".into()))
        .with_header("content-type", "application/json")
        .with_body(json!({"items": items_json(21..41), "nextCursor": null}).to_string())
        .expect(1)
        .create_async()
        .await;

    let source = Arc::new(HttpDataSource::new(&server.url(), 20).unwrap());
    let ambient = FilterSet::from([("period", "Week"), ("sort", "Newest")]);
    let overrides = FilterSet::new().with("period", "Month").with("username", "");
    let mut feed = FeedCoordinator::new(source, FeedConfig::default(), ambient, overrides);
    feed.settle().await;

    let view = feed.view();
    assert_eq!(view.items.len(), 20);
    assert!(view.has_next_page);
    assert!(view.sentinel());

    assert_eq!(feed.fetch_next_page(Instant::now()), Ok(true));
    feed.settle().await;

    let view = feed.view();
    assert_eq!(view.items.len(), 40);
    assert_eq!(view.items.first().map(|i| i.id), Some(ItemId(1)));
    assert_eq!(view.items.last().map(|i| i.id), Some(ItemId(40)));
    assert!(!view.has_next_page);
    assert_eq!(view.display(), Display::Items { overlay: false, sentinel: false, end_of_feed: false });
    assert_eq!(view.items[0].display_height(300), 600);
    assert_eq!(feed.fetch_next_page(Instant::now()), Err(FeedError::NoNextPage));

    first.assert_async().await;
    second.assert_async().await;
}

const FIXTURE: &str = r#"{
    "feeds": [
        { "filters": {"period": "Month"},
          "pages": [
            { "items": [{"id": 1, "ingestion": "Scanned"}, {"id": 2, "ingestion": "Scanned"}], "nextCursor": "m1" },
            { "items": [{"id": 3, "ingestion": "Scanned"}, {"id": 4, "ingestion": "Scanned"}], "nextCursor": "m2" },
            { "items": [{"id": 5, "ingestion": "Scanned"}] }
          ] },
        { "filters": {"period": "Week"},
          "pages": [ { "items": [{"id": 70}, {"id": 71, "ingestion": "Scanned"}], "nextCursor": "w1" },
                     { "items": [{"id": 72, "ingestion": "Scanned"}] } ] }
    ]
}"#;

#[tokio::test(start_paused = true)]
async fn fixture_feed_scrolls_and_switches_filters() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FIXTURE.as_bytes()).unwrap();
    let source = Arc::new(FixtureSource::from_path(file.path()).unwrap());

    let sensor = ManualSensor::new();
    let poller = ManualPoller::new();
    let config = FeedConfig { show_end_of_feed: true, ..FeedConfig::default() };
    let mut feed = FeedCoordinator::new(source, config, FilterSet::new(), FilterSet::from([("period", "Month")]));
    feed.attach_sensor(&sensor);
    feed.attach_poller(poller.clone());
    sensor.set_visible(true);
    feed.settle().await;

    let view = feed.view();
    assert_eq!(view.pages, 3);
    assert_eq!(view.items.iter().map(|i| i.id.0).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    assert_eq!(view.display(), Display::Items { overlay: false, sentinel: false, end_of_feed: true });
    assert!(!poller.is_active());

    // the sensor stays visible, so the new feed pages on its own
    feed.set_overrides(FilterSet::from([("period", "Week")]), Instant::now());
    feed.settle().await;

    let view = feed.view();
    assert_eq!(view.items.iter().map(|i| i.id.0).collect::<Vec<_>>(), vec![70, 71, 72]);
    assert_eq!(view.pending_ids, vec![ItemId(70)]);
    assert!(poller.is_active());

    poller.push(StatusUpdate { id: ItemId(70), ingestion: IngestionStatus::Processing });
    poller.push(StatusUpdate { id: ItemId(70), ingestion: IngestionStatus::Scanned });
    feed.settle().await;
    let view = feed.view();
    assert!(view.pending_ids.is_empty());
    assert_eq!(view.items[0].ingestion, IngestionStatus::Scanned);
    assert!(!poller.is_active());
}

#[tokio::test(start_paused = true)]
async fn sentinel_flicker_during_fetch_never_overlaps_requests() {
    let mock = Arc::new(MockSource::new());
    mock.push_response(Ok(page(1, 5, Some("c1"))));
    mock.push_delayed(Duration::from_secs(2), Ok(page(6, 5, Some("c2"))));
    mock.push_response(Ok(page(11, 5, None)));

    let sensor = ManualSensor::new();
    let mut feed = FeedCoordinator::new(Arc::clone(&mock), FeedConfig::default(), FilterSet::new(), FilterSet::new());
    feed.attach_sensor(&sensor);
    feed.settle().await;
    assert_eq!(mock.calls().len(), 1);

    sensor.set_visible(true);
    // VisibilityChanged, then the debounced request fires
    feed.step().await.unwrap();
    let ev = feed.step().await.unwrap();
    assert_eq!(ev, FeedEvent::Tick { committed: None, page_requested: true });
    assert!(feed.view().is_fetching);

    for visible in [false, true, false, true] {
        sensor.set_visible(visible);
        feed.drain_signals(Instant::now());
        tokio::time::advance(Duration::from_millis(300)).await;
        let ev = feed.advance(Instant::now());
        assert_eq!(ev, FeedEvent::Tick { committed: None, page_requested: false });
    }

    let ev = feed.step().await.unwrap();
    assert!(matches!(ev, FeedEvent::Resolved { resolution: Resolution::Applied { items: 5, .. }, .. }));
    feed.settle().await;
    let calls = mock.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1].cursor, Some(Cursor::new("c1")));
    assert_eq!(calls[2].cursor, Some(Cursor::new("c2")));
    assert_eq!(feed.view().items.len(), 15);
}
