//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit and integration
//! tests. All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::acquisition::PageProbe;
use crate::error::AppError;
use crate::models::EventRecord;
use crate::traits::{Fetcher, KeyValueStore, RenderSession, RenderSurface};

/// A small batch of valid events whose titles carry `tag`, so that two
/// batches built with different tags compare unequal.
pub fn sample_events(tag: &str) -> Vec<EventRecord> {
    vec![
        EventRecord {
            id: format!("event-1-mar-2026-{tag}"),
            date_range: "19 – 22 Mar".into(),
            title: format!("Spring Backgammon Classic {tag}"),
            location: "Harbor View Conference Center".into(),
            month: "March".into(),
            year: "2026".into(),
        },
        EventRecord {
            id: format!("event-2-apr-2026-{tag}"),
            date_range: "16 – 19 Apr".into(),
            title: format!("Desert Backgammon Open {tag}"),
            location: "Canyon Ridge Resort".into(),
            month: "April".into(),
            year: "2026".into(),
        },
    ]
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that returns a configurable response.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(html.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    /// Sleep this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory key-value store with switchable failures and an I/O counter.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    fail_reads: Arc<Mutex<bool>>,
    fail_writes: Arc<Mutex<bool>>,
    operations: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    pub fn fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().unwrap() = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    /// Number of get/set/remove calls made so far.
    pub fn operations(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        if *self.fail_reads.lock().unwrap() {
            return Err(AppError::StorageError("read failed".into()));
        }
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        if *self.fail_writes.lock().unwrap() {
            return Err(AppError::StorageError("write failed".into()));
        }
        self.insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        if *self.fail_writes.lock().unwrap() {
            return Err(AppError::StorageError("remove failed".into()));
        }
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockSurface
// ---------------------------------------------------------------------------

/// Scripted behaviour of the page behind a [`MockSurface`].
#[derive(Debug, Clone)]
pub struct MockPage {
    /// Challenge probes answering `true` before the challenge clears.
    pub challenge_polls: u32,
    /// Body-length probes answering a short length before content arrives.
    pub short_body_polls: u32,
    /// Successive document heights; the last one repeats.
    pub heights: Vec<u64>,
    /// Markup returned by the final read.
    pub html: String,
    /// Answer every probe with a string the engine cannot decode.
    pub garbled_replies: bool,
}

impl MockPage {
    /// A page with no challenge, full content and a fixed height.
    pub fn ready(html: &str) -> Self {
        Self {
            challenge_polls: 0,
            short_body_polls: 0,
            heights: vec![5000],
            html: html.to_string(),
            garbled_replies: false,
        }
    }
}

/// Mock rendering surface that records opens, probes and scrolls.
#[derive(Clone)]
pub struct MockSurface {
    page: Arc<Mutex<MockPage>>,
    open_delay: Duration,
    open_error: Option<AppError>,
    open_panics: bool,
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    probes: Arc<Mutex<Vec<PageProbe>>>,
    panicking: Arc<AtomicBool>,
}

impl MockSurface {
    pub fn new(page: MockPage) -> Self {
        Self {
            page: Arc::new(Mutex::new(page)),
            open_delay: Duration::ZERO,
            open_error: None,
            open_panics: false,
            opens: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            probes: Arc::new(Mutex::new(Vec::new())),
            panicking: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every session script panic until switched off again.
    pub fn set_panicking(&self, panicking: bool) {
        self.panicking.store(panicking, Ordering::SeqCst);
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    pub fn with_open_error(mut self, error: AppError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// Panic inside `open` instead of returning a session.
    pub fn with_open_panic(mut self) -> Self {
        self.open_panics = true;
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn probe_count(&self, probe: PageProbe) -> usize {
        self.probes
            .lock()
            .unwrap()
            .iter()
            .filter(|p| **p == probe)
            .count()
    }

    pub fn scrolls(&self) -> usize {
        self.probes
            .lock()
            .unwrap()
            .iter()
            .filter(|p| matches!(p, PageProbe::ScrollBy(_)))
            .count()
    }
}

impl RenderSurface for MockSurface {
    type Session = MockSession;

    async fn open(&self, _url: &str) -> Result<MockSession, AppError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        if self.open_panics {
            panic!("rendering surface crashed while loading");
        }
        if let Some(e) = &self.open_error {
            return Err(e.clone());
        }
        Ok(MockSession {
            surface: self.clone(),
        })
    }
}

/// Session handed out by [`MockSurface`].
pub struct MockSession {
    surface: MockSurface,
}

impl MockSession {
    fn classify(script: &str) -> Option<PageProbe> {
        [
            PageProbe::Challenge,
            PageProbe::BodyTextLen,
            PageProbe::ScrollHeight,
            PageProbe::Markup,
        ]
        .into_iter()
        .find(|p| p.script() == script)
        .or_else(|| script.contains("scrollTo").then_some(PageProbe::ScrollBy(0)))
    }
}

impl RenderSession for MockSession {
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, AppError> {
        if self.surface.panicking.load(Ordering::SeqCst) {
            panic!("rendering session crashed");
        }
        let probe = Self::classify(script)
            .ok_or_else(|| AppError::RenderError(format!("unknown script: {script}")))?;
        self.surface.probes.lock().unwrap().push(probe);

        let mut page = self.surface.page.lock().unwrap();
        if page.garbled_replies {
            return Ok(serde_json::Value::String("garbled".into()));
        }

        let value = match probe {
            PageProbe::Challenge => {
                let showing = page.challenge_polls > 0;
                page.challenge_polls = page.challenge_polls.saturating_sub(1);
                serde_json::Value::Bool(showing)
            }
            PageProbe::BodyTextLen => {
                if page.short_body_polls > 0 {
                    page.short_body_polls -= 1;
                    serde_json::json!(12)
                } else {
                    serde_json::json!(10_000)
                }
            }
            PageProbe::ScrollHeight => {
                let height = page.heights.first().copied().unwrap_or(0);
                if page.heights.len() > 1 {
                    page.heights.remove(0);
                }
                serde_json::json!(height)
            }
            PageProbe::ScrollBy(_) => serde_json::json!(0),
            PageProbe::Markup => serde_json::Value::String(page.html.clone()),
        };
        Ok(value)
    }

    async fn close(self) {
        self.surface.closes.fetch_add(1, Ordering::SeqCst);
    }
}
