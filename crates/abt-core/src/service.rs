use chrono::{DateTime, Utc};

use crate::acquisition::PageAcquirer;
use crate::cache::CalendarCache;
use crate::config::CalendarConfig;
use crate::direct::DirectFetch;
use crate::error::AppError;
use crate::models::EventRecord;
use crate::traits::{Fetcher, KeyValueStore, NullSurface, RenderSurface};

/// Public entry point of the calendar pipeline.
///
/// Serves the calendar through the fallback chain
/// memory -> persisted -> direct fetch -> seed. The read path never fails and
/// never returns an empty list.
///
/// Generic over all external dependencies via traits, so tests run without
/// real HTTP, storage or browser.
#[derive(Clone)]
pub struct CalendarService<F, S, R = NullSurface>
where
    F: Fetcher,
    S: KeyValueStore,
    R: RenderSurface,
{
    cache: CalendarCache<S>,
    direct: DirectFetch<F, S>,
    acquirer: PageAcquirer<R>,
}

impl<F, S> CalendarService<F, S, NullSurface>
where
    F: Fetcher,
    S: KeyValueStore,
{
    /// Create a service without a rendering surface; browser refreshes fail.
    pub fn new(fetcher: F, store: S, config: &CalendarConfig) -> Self {
        Self::with_surface(fetcher, store, NullSurface, config)
    }
}

impl<F, S, R> CalendarService<F, S, R>
where
    F: Fetcher,
    S: KeyValueStore,
    R: RenderSurface,
{
    /// Create a service that can also run full browser acquisitions.
    pub fn with_surface(fetcher: F, store: S, surface: R, config: &CalendarConfig) -> Self {
        let cache = CalendarCache::new(store);
        let direct = DirectFetch::new(fetcher, cache.clone(), config.calendar_url.clone());
        let acquirer = PageAcquirer::new(surface, config.timings.clone());
        Self {
            cache,
            direct,
            acquirer,
        }
    }

    pub fn cache(&self) -> &CalendarCache<S> {
        &self.cache
    }

    pub fn acquirer(&self) -> &PageAcquirer<R> {
        &self.acquirer
    }

    /// Return the calendar, refreshing from the network when forced or when
    /// no tier has anything.
    ///
    /// 1. Not forced: memory, then persisted (seeding on a miss). No network.
    /// 2. Forced or nothing usable: direct fetch.
    /// 3. Direct fetch failed: seed dataset.
    pub async fn get_events(&self, force_refresh: bool) -> Vec<EventRecord> {
        if !force_refresh {
            if let Some(events) = self.cached().await {
                return events;
            }
        }

        match self.direct.direct_fetch().await {
            Ok(events) if !events.is_empty() => events,
            Ok(_) => {
                tracing::debug!("Refresh already in flight, serving cached calendar");
                self.get_cached_events().await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Direct fetch failed, serving seed dataset");
                self.cache.get_seed()
            }
        }
    }

    /// Cache-or-seed read. Never touches the network.
    pub async fn get_cached_events(&self) -> Vec<EventRecord> {
        match self.cached().await {
            Some(events) => events,
            None => self.cache.get_seed(),
        }
    }

    async fn cached(&self) -> Option<Vec<EventRecord>> {
        if let Some(events) = self.cache.get_memory().filter(|e| !e.is_empty()) {
            return Some(events);
        }
        self.cache.get_persisted().await.filter(|e| !e.is_empty())
    }

    /// Drop memory and persisted tiers. Hook this to the host's
    /// "entering background" signal.
    pub async fn clear_cache(&self) {
        self.cache.clear_all().await;
    }

    /// Adopt a batch acquired elsewhere into the memory tier.
    pub fn set_memory(&self, events: Vec<EventRecord>) {
        self.cache.set_memory(events);
    }

    /// Adopt a batch acquired elsewhere into the persisted tier.
    pub async fn cache_to_disk(&self, events: &[EventRecord]) {
        self.cache.set_persisted(events).await;
    }

    pub async fn persisted_at(&self) -> Option<DateTime<Utc>> {
        self.cache.persisted_at().await
    }

    /// Run a full page acquisition and adopt whatever it extracts.
    ///
    /// Engine failures are returned as-is. An empty vector means the page
    /// loaded but nothing could be extracted; the cache is left untouched.
    pub async fn refresh_with_browser(&self) -> Result<Vec<EventRecord>, AppError> {
        let html = self.acquirer.acquire(self.direct.url()).await?;
        Ok(self.direct.adopt_html(&html).await.unwrap_or_default())
    }

    /// Like [`refresh_with_browser`](Self::refresh_with_browser), but falls
    /// back to a forced [`get_events`](Self::get_events) on failure.
    pub async fn refresh_with_browser_or_fallback(&self) -> Vec<EventRecord> {
        match self.refresh_with_browser().await {
            Ok(events) if !events.is_empty() => events,
            Ok(_) => {
                tracing::warn!("Browser acquisition extracted nothing, falling back");
                self.get_events(true).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "Browser acquisition failed, falling back");
                self.get_events(true).await
            }
        }
    }

    /// Clear the memory tier and all in-flight state.
    pub fn reset(&self) {
        self.cache.reset();
        self.acquirer.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::seed_events;
    use crate::testutil::{MemoryStore, MockFetcher, MockPage, MockSurface, sample_events};

    const PAGE: &str = r#"<h2>April 2026</h2><span>16 – 19 Apr</span>
<h3>Las Vegas Backgammon Open (ABT)</h3><p>Thursday, Westgate Las Vegas Resort</p>"#;

    fn service(fetcher: MockFetcher, store: MemoryStore) -> CalendarService<MockFetcher, MemoryStore> {
        CalendarService::new(fetcher, store, &CalendarConfig::default())
    }

    #[tokio::test]
    async fn memory_tier_wins_over_persisted() {
        let fetcher = MockFetcher::new(PAGE);
        let svc = service(fetcher.clone(), MemoryStore::new());
        svc.cache_to_disk(&sample_events("B")).await;
        svc.set_memory(sample_events("A"));

        assert_eq!(svc.get_events(false).await, sample_events("A"));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn persisted_tier_served_when_memory_empty() {
        let fetcher = MockFetcher::new(PAGE);
        let svc = service(fetcher.clone(), MemoryStore::new());
        svc.cache_to_disk(&sample_events("B")).await;

        assert_eq!(svc.get_events(false).await, sample_events("B"));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn forced_refresh_with_failing_http_returns_seed() {
        let svc = service(
            MockFetcher::with_error(AppError::NetworkError("offline".into())),
            MemoryStore::new(),
        );

        let events = svc.get_events(true).await;

        assert_eq!(events.len(), 12);
        assert_eq!(events.first().unwrap().id, "event-1-nov-2025");
        assert_eq!(events.last().unwrap().id, "event-12-aug-2026");
    }

    #[tokio::test]
    async fn forced_refresh_replaces_cached_batch() {
        let svc = service(MockFetcher::new(PAGE), MemoryStore::new());
        svc.set_memory(sample_events("A"));

        let events = svc.get_events(true).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Las Vegas Backgammon Open (ABT)");
        assert_eq!(svc.get_events(false).await, events);
    }

    #[tokio::test]
    async fn refresh_in_flight_serves_cached_batch() {
        let svc = service(MockFetcher::new(PAGE), MemoryStore::new());
        svc.set_memory(sample_events("A"));
        let _permit = svc.cache().fetch_guard().try_acquire().unwrap();

        assert_eq!(svc.get_events(true).await, sample_events("A"));
    }

    #[tokio::test]
    async fn clear_cache_twice_then_reseeds() {
        let store = MemoryStore::new();
        let svc = service(MockFetcher::new(PAGE), store.clone());
        svc.set_memory(sample_events("A"));
        svc.cache_to_disk(&sample_events("B")).await;

        svc.clear_cache().await;
        svc.clear_cache().await;

        assert!(svc.cache().get_memory().is_none());
        assert!(store.is_empty());
        assert_eq!(svc.get_events(false).await, seed_events());
        assert_eq!(svc.get_events(false).await, seed_events());
    }

    #[tokio::test(start_paused = true)]
    async fn browser_refresh_adopts_extracted_events() {
        let surface = MockSurface::new(MockPage::ready(PAGE));
        let store = MemoryStore::new();
        let svc = CalendarService::with_surface(
            MockFetcher::with_error(AppError::HttpError("HTTP 403".into())),
            store,
            surface.clone(),
            &CalendarConfig::default(),
        );

        let events = svc.refresh_with_browser().await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(svc.cache().get_memory().unwrap(), events);
        assert_eq!(svc.cache().load_persisted().await.unwrap(), events);
        assert_eq!(surface.opens(), 1);
    }

    #[tokio::test]
    async fn browser_refresh_surfaces_engine_errors() {
        let svc = service(MockFetcher::new(PAGE), MemoryStore::new());

        let err = svc.refresh_with_browser().await.unwrap_err();

        assert!(matches!(err, AppError::RenderError(_)));
    }

    #[tokio::test]
    async fn browser_refresh_fallback_uses_direct_fetch() {
        let fetcher = MockFetcher::new(PAGE);
        let svc = service(fetcher.clone(), MemoryStore::new());

        let events = svc.refresh_with_browser_or_fallback().await;

        assert_eq!(events.len(), 1);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn reset_clears_memory_and_guard() {
        let svc = service(MockFetcher::new(PAGE), MemoryStore::new());
        svc.set_memory(sample_events("A"));
        std::mem::forget(svc.cache().fetch_guard().try_acquire().unwrap());

        svc.reset();

        assert!(svc.cache().get_memory().is_none());
        assert!(!svc.cache().fetch_guard().is_fetching());
    }
}
