use crate::cache::CalendarCache;
use crate::error::AppError;
use crate::extract::extract_events;
use crate::models::EventRecord;
use crate::traits::{Fetcher, KeyValueStore};

/// Lightweight acquisition: one plain GET of the calendar page.
///
/// The bot gate does not trigger for every request shape, so this is tried
/// before (or instead of) driving a full rendering surface.
#[derive(Clone)]
pub struct DirectFetch<F: Fetcher, S: KeyValueStore> {
    fetcher: F,
    cache: CalendarCache<S>,
    url: String,
}

impl<F: Fetcher, S: KeyValueStore> DirectFetch<F, S> {
    pub fn new(fetcher: F, cache: CalendarCache<S>, url: impl Into<String>) -> Self {
        Self {
            fetcher,
            cache,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch, extract and store the calendar.
    ///
    /// - Another direct fetch in flight: `Ok(vec![])` right away.
    /// - Non-2xx or transport failure: the fetcher's error, no retry.
    /// - Nothing extracted: the seed dataset.
    pub async fn direct_fetch(&self) -> Result<Vec<EventRecord>, AppError> {
        let Some(_permit) = self.cache.fetch_guard().try_acquire() else {
            tracing::debug!("Direct fetch already in flight, skipping");
            return Ok(Vec::new());
        };

        tracing::info!(url = %self.url, "Fetching calendar page");
        let html = self.fetcher.fetch(&self.url).await?;
        tracing::info!("Fetched {} bytes of HTML", html.len());

        match self.adopt_html(&html).await {
            Some(events) => Ok(events),
            None => {
                tracing::warn!("No events extracted from direct fetch, using seed dataset");
                Ok(self.cache.get_seed())
            }
        }
    }

    /// Extract events from `html` and, if any were found, store them in the
    /// memory and persisted tiers.
    pub async fn adopt_html(&self, html: &str) -> Option<Vec<EventRecord>> {
        let events = extract_events(html);
        if events.is_empty() {
            return None;
        }

        tracing::info!(events = events.len(), "Adopting extracted calendar");
        self.cache.set_memory(events.clone());
        self.cache.set_persisted(&events).await;
        Some(events)
    }
}
