use std::sync::Arc;
use std::time::Duration;

use abt_core::AppError;
use abt_core::seed::seed_events;
use abt_core::testutil::{MemoryStore, MockFetcher, MockPage, MockSurface, sample_events};

use crate::common::{CALENDAR_HTML, build_service};

fn offline() -> MockFetcher {
    MockFetcher::with_error(AppError::NetworkError("Connection failed: offline".into()))
}

#[tokio::test]
async fn cold_start_offline_serves_seed_then_memory() {
    let store = MemoryStore::new();
    let fetcher = offline();
    let svc = build_service(fetcher.clone(), store.clone(), MockSurface::new(MockPage::ready("")));

    let first = svc.get_events(false).await;
    assert_eq!(first, seed_events());
    assert_eq!(fetcher.calls(), 0);

    let io_before = store.operations();
    let again = svc.get_cached_events().await;
    assert_eq!(again, first);
    assert_eq!(store.operations(), io_before);
}

#[tokio::test]
async fn forbidden_page_still_yields_calendar() {
    let svc = build_service(
        MockFetcher::with_error(AppError::HttpError("HTTP 403 for https://calendar.test".into())),
        MemoryStore::new(),
        MockSurface::new(MockPage::ready("")),
    );

    let events = svc.get_events(true).await;

    assert_eq!(events.len(), 12);
    assert_eq!(events[0].id, "event-1-nov-2025");
    assert_eq!(events[11].id, "event-12-aug-2026");
}

#[tokio::test]
async fn memory_batch_beats_persisted_batch() {
    let svc = build_service(offline(), MemoryStore::new(), MockSurface::new(MockPage::ready("")));
    svc.cache_to_disk(&sample_events("persisted")).await;
    svc.set_memory(sample_events("memory"));

    assert_eq!(svc.get_events(false).await, sample_events("memory"));
}

#[tokio::test]
async fn double_clear_then_deterministic_reseed() {
    let store = MemoryStore::new();
    let svc = build_service(offline(), store.clone(), MockSurface::new(MockPage::ready("")));
    svc.get_events(false).await;

    svc.clear_cache().await;
    let after_one = (svc.cache().get_memory(), store.is_empty());
    svc.clear_cache().await;
    let after_two = (svc.cache().get_memory(), store.is_empty());

    assert_eq!(after_one, (None, true));
    assert_eq!(after_one, after_two);
    assert_eq!(svc.get_events(false).await, seed_events());
}

#[tokio::test]
async fn refreshed_calendar_survives_restart() {
    let store = MemoryStore::new();
    let svc = build_service(
        MockFetcher::new(CALENDAR_HTML),
        store.clone(),
        MockSurface::new(MockPage::ready("")),
    );
    let fetched = svc.get_events(true).await;
    assert_eq!(fetched.len(), 3);

    // A new process sees the persisted batch, not the seed.
    let restarted = build_service(offline(), store, MockSurface::new(MockPage::ready("")));
    assert_eq!(restarted.get_events(false).await, fetched);
    assert!(restarted.persisted_at().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn concurrent_browser_acquisitions_share_one_load() {
    let surface = MockSurface::new(MockPage {
        challenge_polls: 2,
        ..MockPage::ready(CALENDAR_HTML)
    })
    .with_open_delay(Duration::from_millis(250));
    let svc = build_service(offline(), MemoryStore::new(), surface.clone());

    let acquirer = svc.acquirer();
    let (a, b) = tokio::join!(
        acquirer.acquire("https://calendar.test"),
        acquirer.acquire("https://calendar.test")
    );

    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(surface.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn browser_refresh_feeds_cache_tiers() {
    let surface = MockSurface::new(MockPage::ready(CALENDAR_HTML));
    let store = MemoryStore::new();
    let svc = build_service(offline(), store, surface);

    let events = svc.refresh_with_browser().await.unwrap();

    assert_eq!(events.len(), 3);
    assert_eq!(svc.get_cached_events().await, events);
}

#[tokio::test(start_paused = true)]
async fn browser_timeout_falls_back_to_seed_when_offline() {
    let surface = MockSurface::new(MockPage {
        challenge_polls: u32::MAX,
        ..MockPage::ready(CALENDAR_HTML)
    });
    let svc = build_service(offline(), MemoryStore::new(), surface);

    let events = svc.refresh_with_browser_or_fallback().await;

    assert_eq!(events, seed_events());
    assert!(!svc.acquirer().is_in_flight());
}
