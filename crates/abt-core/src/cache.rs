//! Three-tier calendar cache: memory, persistent store, seed dataset.
//!
//! Tiers are consulted memory -> persisted -> seed. A miss on the persisted
//! tier warms both upper tiers with the seed so that the calendar is never
//! empty, even before the first successful fetch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{EventRecord, PersistedBatch, batch_fingerprint};
use crate::seed::seed_events;
use crate::traits::KeyValueStore;

/// Store key holding the serialized [`PersistedBatch`].
pub const EVENTS_KEY: &str = "abt_calendar_events";

/// Store key holding the RFC 3339 write timestamp of the persisted batch.
pub const TIMESTAMP_KEY: &str = "abt_calendar_events_timestamp";

/// Single-flight flag for direct fetches.
///
/// Acquiring while held fails instead of waiting. Each permit carries its own
/// token and releases the guard on drop only while it is still the holder, so
/// a permit outliving [`reset`](Self::reset) cannot free a newer holder.
#[derive(Debug, Clone, Default)]
pub struct FetchGuard {
    holder: Arc<AtomicU64>,
    next_token: Arc<AtomicU64>,
}

/// Releases its [`FetchGuard`] when dropped.
#[derive(Debug)]
pub struct FetchPermit {
    holder: Arc<AtomicU64>,
    token: u64,
}

impl FetchGuard {
    /// Claim the guard, or `None` if a fetch is already in flight.
    pub fn try_acquire(&self) -> Option<FetchPermit> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        self.holder
            .compare_exchange(0, token, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FetchPermit {
                holder: Arc::clone(&self.holder),
                token,
            })
    }

    pub fn is_fetching(&self) -> bool {
        self.holder.load(Ordering::Acquire) != 0
    }

    /// Force the flag back to idle.
    pub fn reset(&self) {
        self.holder.store(0, Ordering::Release);
    }
}

impl Drop for FetchPermit {
    fn drop(&mut self) {
        let _ = self
            .holder
            .compare_exchange(self.token, 0, Ordering::AcqRel, Ordering::Acquire);
    }
}

/// The cache store. Clones share the same tiers.
#[derive(Clone)]
pub struct CalendarCache<S: KeyValueStore> {
    memory: Arc<Mutex<Option<Vec<EventRecord>>>>,
    store: S,
    guard: FetchGuard,
}

impl<S: KeyValueStore> CalendarCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            memory: Arc::new(Mutex::new(None)),
            store,
            guard: FetchGuard::default(),
        }
    }

    /// Acquires the memory tier, recovering from poison if necessary.
    fn lock_memory(&self) -> MutexGuard<'_, Option<Vec<EventRecord>>> {
        self.memory.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned memory tier");
            poisoned.into_inner()
        })
    }

    // -- memory tier --------------------------------------------------------

    pub fn get_memory(&self) -> Option<Vec<EventRecord>> {
        self.lock_memory().clone()
    }

    pub fn set_memory(&self, events: Vec<EventRecord>) {
        tracing::debug!(events = events.len(), "Memory tier updated");
        *self.lock_memory() = Some(events);
    }

    pub fn clear_memory(&self) {
        *self.lock_memory() = None;
    }

    // -- persisted tier -----------------------------------------------------

    /// Raw read of the persisted tier, without self-heal.
    ///
    /// Missing, unreadable and malformed blobs are all reported as `None`.
    pub async fn load_persisted(&self) -> Option<Vec<EventRecord>> {
        let raw = match self.store.get(EVENTS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read persisted calendar");
                return None;
            }
        };

        match serde_json::from_str::<PersistedBatch>(&raw) {
            Ok(batch) => Some(batch.events),
            Err(e) => {
                tracing::warn!(error = %e, "Persisted calendar is malformed, ignoring");
                None
            }
        }
    }

    /// Read the persisted tier; on a miss, warm memory and persisted tiers
    /// with the seed dataset and return it.
    pub async fn get_persisted(&self) -> Option<Vec<EventRecord>> {
        if let Some(events) = self.load_persisted().await {
            return Some(events);
        }

        tracing::info!("Persisted calendar missing, seeding cache");
        let seed = self.get_seed();
        self.set_memory(seed.clone());
        self.set_persisted(&seed).await;
        Some(seed)
    }

    /// Serialize `events` into the persisted tier and stamp the write time.
    ///
    /// Failures are logged and swallowed.
    pub async fn set_persisted(&self, events: &[EventRecord]) {
        if let Err(e) = self.try_set_persisted(events).await {
            tracing::warn!(error = %e, "Failed to persist calendar");
        }
    }

    async fn try_set_persisted(&self, events: &[EventRecord]) -> Result<(), AppError> {
        let previous = self.load_persisted().await;
        let written_at = Utc::now();
        let batch = PersistedBatch {
            events: events.to_vec(),
            written_at,
        };

        self.store
            .set(EVENTS_KEY, &serde_json::to_string(&batch)?)
            .await?;
        self.store
            .set(TIMESTAMP_KEY, &written_at.to_rfc3339())
            .await?;

        let fingerprint = batch_fingerprint(events);
        match previous {
            Some(prev) if batch_fingerprint(&prev) == fingerprint => {
                tracing::info!(events = events.len(), hash = %&fingerprint[..8], "Calendar unchanged");
            }
            Some(_) => {
                tracing::info!(events = events.len(), hash = %&fingerprint[..8], "Calendar CHANGED");
            }
            None => {
                tracing::info!(events = events.len(), hash = %&fingerprint[..8], "Calendar persisted");
            }
        }
        Ok(())
    }

    pub async fn clear_persisted(&self) {
        for key in [EVENTS_KEY, TIMESTAMP_KEY] {
            if let Err(e) = self.store.remove(key).await {
                tracing::warn!(%key, error = %e, "Failed to clear persisted calendar");
            }
        }
    }

    /// When the persisted tier was last written. Informational only.
    pub async fn persisted_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.store.get(TIMESTAMP_KEY).await.ok().flatten()?;
        DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    // -- seed tier ----------------------------------------------------------

    pub fn get_seed(&self) -> Vec<EventRecord> {
        seed_events()
    }

    // -- whole cache --------------------------------------------------------

    /// Drop memory and persisted tiers. Idempotent.
    pub async fn clear_all(&self) {
        self.clear_memory();
        self.clear_persisted().await;
        tracing::info!("Calendar cache cleared");
    }

    pub fn fetch_guard(&self) -> &FetchGuard {
        &self.guard
    }

    /// Clear the memory tier and release the fetch guard.
    pub fn reset(&self) {
        self.clear_memory();
        self.guard.reset();
    }
}
