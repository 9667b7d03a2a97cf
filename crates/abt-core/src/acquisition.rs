//! Page acquisition through a scriptable rendering surface.
//!
//! The calendar page sits behind a bot-challenge interstitial and lazy-loads
//! its event list. [`PageAcquirer`] opens the page on a [`RenderSurface`] and
//! walks it through four phases by evaluating small probe scripts:
//!
//! ```text
//! challenge wait --> minimum content --> lazy-load drain --> settle + read markup
//!      ^                   |
//!      +-------------------+  (body still short: poll again)
//! ```
//!
//! Only one acquisition runs at a time. Callers arriving while one is in
//! flight share its result; the whole flight is bounded by a hard deadline.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::time::{Instant, sleep, timeout_at};
use uuid::Uuid;

use crate::config::AcquisitionTimings;
use crate::error::AppError;
use crate::traits::{RenderSession, RenderSurface};

/// Text shown by the bot-challenge interstitial.
pub const CHALLENGE_MARKER: &str = "Please wait";

/// Scripts evaluated in the page, one per protocol step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageProbe {
    /// `true` while a challenge element containing [`CHALLENGE_MARKER`] is shown.
    Challenge,
    /// Length of the visible body text.
    BodyTextLen,
    /// Current document height in pixels.
    ScrollHeight,
    /// Scroll toward the bottom by at most this many pixels; returns the new offset.
    ScrollBy(u32),
    /// Full rendered markup.
    Markup,
}

impl PageProbe {
    pub fn script(&self) -> String {
        match self {
            PageProbe::Challenge => format!(
                "(() => {{ const nodes = document.querySelectorAll('#challenge-running, #challenge-stage, .cf-browser-verification, #cf-spinner-please-wait, h1, h2, p, span, div'); \
                 for (const n of nodes) {{ if (n.children.length === 0 && (n.textContent || '').includes('{CHALLENGE_MARKER}')) return true; }} \
                 return (document.title || '').includes('{CHALLENGE_MARKER}'); }})()"
            ),
            PageProbe::BodyTextLen => {
                "(() => (document.body ? (document.body.innerText || '').length : 0))()".to_string()
            }
            PageProbe::ScrollHeight => {
                "(() => Math.max(document.body ? document.body.scrollHeight : 0, document.documentElement.scrollHeight))()"
                    .to_string()
            }
            PageProbe::ScrollBy(step) => format!(
                "(() => {{ const bottom = document.documentElement.scrollHeight; \
                 window.scrollTo(0, Math.min(window.scrollY + {step}, bottom)); return window.scrollY; }})()"
            ),
            PageProbe::Markup => "document.documentElement.outerHTML".to_string(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            PageProbe::Challenge => "challenge",
            PageProbe::BodyTextLen => "body_text_len",
            PageProbe::ScrollHeight => "scroll_height",
            PageProbe::ScrollBy(_) => "scroll_by",
            PageProbe::Markup => "markup",
        }
    }
}

type SharedAcquisition = Shared<BoxFuture<'static, Result<Arc<String>, AppError>>>;

struct InFlight {
    id: Uuid,
    url: String,
    result: SharedAcquisition,
}

/// Single-flight page acquisition engine. Clones share the in-flight slot.
#[derive(Clone)]
pub struct PageAcquirer<R: RenderSurface> {
    surface: R,
    timings: AcquisitionTimings,
    in_flight: Arc<Mutex<Option<InFlight>>>,
}

impl<R: RenderSurface> PageAcquirer<R> {
    pub fn new(surface: R, timings: AcquisitionTimings) -> Self {
        Self {
            surface,
            timings,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn timings(&self) -> &AcquisitionTimings {
        &self.timings
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<InFlight>> {
        lock_slot(&self.in_flight)
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock_slot().is_some()
    }

    /// Forget the in-flight acquisition. A running one keeps going, but new
    /// callers start a fresh flight.
    pub fn reset(&self) {
        self.lock_slot().take();
    }

    /// Load `url` and return its rendered markup once the page is stable.
    ///
    /// If an acquisition is already running, waits for it instead and
    /// returns the same `Arc`, whatever URL it was started for.
    pub async fn acquire(&self, url: &str) -> Result<Arc<String>, AppError> {
        let shared = {
            let mut slot = self.lock_slot();
            match slot.as_ref() {
                Some(flight) => {
                    tracing::debug!(request_id = %flight.id, url = %flight.url, "Joining in-flight acquisition");
                    flight.result.clone()
                }
                None => {
                    let id = Uuid::new_v4();
                    tracing::info!(request_id = %id, %url, "Starting page acquisition");
                    let result = self.start(id, url);
                    *slot = Some(InFlight {
                        id,
                        url: url.to_string(),
                        result: result.clone(),
                    });
                    result
                }
            }
        };

        shared.await
    }

    /// Spawn the acquisition so that it runs to completion (or deadline)
    /// independently of any caller being dropped.
    fn start(&self, id: Uuid, url: &str) -> SharedAcquisition {
        let surface = self.surface.clone();
        let timings = self.timings.clone();
        let slot = Arc::clone(&self.in_flight);
        let url = url.to_string();

        let task = tokio::spawn(async move {
            // Held across `run` so the slot is also released if it unwinds.
            let release = ReleaseSlot { slot, id };
            let result = run(&surface, &url, &timings).await;
            drop(release);
            match &result {
                Ok(html) => {
                    tracing::info!(request_id = %id, bytes = html.len(), "Page acquisition complete")
                }
                Err(e) => tracing::warn!(request_id = %id, error = %e, "Page acquisition failed"),
            }
            result.map(Arc::new)
        });

        async move {
            task.await.unwrap_or_else(|e| {
                Err(AppError::RenderError(format!("Acquisition task failed: {e}")))
            })
        }
        .boxed()
        .shared()
    }
}

/// Clears the in-flight slot on drop, unless a newer flight owns it.
struct ReleaseSlot {
    slot: Arc<Mutex<Option<InFlight>>>,
    id: Uuid,
}

impl Drop for ReleaseSlot {
    fn drop(&mut self) {
        let finished = {
            let mut slot = lock_slot(&self.slot);
            if slot.as_ref().is_some_and(|flight| flight.id == self.id) {
                slot.take()
            } else {
                None
            }
        };
        drop(finished);
    }
}

fn lock_slot(slot: &Mutex<Option<InFlight>>) -> MutexGuard<'_, Option<InFlight>> {
    slot.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Recovered from poisoned acquisition slot");
        poisoned.into_inner()
    })
}

async fn run<R: RenderSurface>(
    surface: &R,
    url: &str,
    timings: &AcquisitionTimings,
) -> Result<String, AppError> {
    let deadline = Instant::now() + timings.hard_timeout;
    let timed_out = || AppError::Timeout(timings.hard_timeout.as_secs());

    let session = timeout_at(deadline, surface.open(url))
        .await
        .map_err(|_| timed_out())??;

    // A panicking session still gets closed.
    let driven = AssertUnwindSafe(drive(&session, timings)).catch_unwind();
    let result = match timeout_at(deadline, driven).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(AppError::RenderError("Rendering session panicked".into())),
        Err(_) => Err(timed_out()),
    };

    session.close().await;
    result
}

async fn drive<S: RenderSession>(
    session: &S,
    timings: &AcquisitionTimings,
) -> Result<String, AppError> {
    // Challenge wait and minimum-content gate.
    let mut polls = 0u32;
    loop {
        if probe_bool(session, PageProbe::Challenge).await? {
            polls += 1;
            tracing::debug!(polls, "Bot challenge still showing");
            sleep(timings.challenge_poll).await;
            continue;
        }

        let text_len = probe_u64(session, PageProbe::BodyTextLen).await?;
        if text_len as usize > timings.min_content_len {
            tracing::debug!(text_len, "Initial content present");
            break;
        }
        polls += 1;
        tracing::debug!(polls, text_len, "Waiting for content");
        sleep(timings.content_poll).await;
    }

    // Lazy-load drain.
    let mut last_height = probe_u64(session, PageProbe::ScrollHeight).await?;
    let mut stable = 0u32;
    let mut attempts = 0u32;
    while stable < timings.stable_checks && attempts < timings.max_scroll_attempts {
        session
            .evaluate(&PageProbe::ScrollBy(timings.scroll_step).script())
            .await?;
        attempts += 1;
        sleep(timings.scroll_delay).await;

        let height = probe_u64(session, PageProbe::ScrollHeight).await?;
        if height == last_height {
            stable += 1;
        } else {
            stable = 0;
            last_height = height;
        }
        tracing::debug!(attempts, height, stable, "Scrolled");
    }
    if stable < timings.stable_checks {
        tracing::info!(attempts, "Scroll ceiling reached before page settled");
    }

    // Handoff.
    sleep(timings.settle_delay).await;
    let value = session.evaluate(&PageProbe::Markup.script()).await?;
    match value {
        serde_json::Value::String(html) => Ok(html),
        other => Err(unexpected(PageProbe::Markup, "string", &other)),
    }
}

async fn probe_bool<S: RenderSession>(session: &S, probe: PageProbe) -> Result<bool, AppError> {
    let value = session.evaluate(&probe.script()).await?;
    value
        .as_bool()
        .ok_or_else(|| unexpected(probe, "boolean", &value))
}

async fn probe_u64<S: RenderSession>(session: &S, probe: PageProbe) -> Result<u64, AppError> {
    let value = session.evaluate(&probe.script()).await?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        .ok_or_else(|| unexpected(probe, "number", &value))
}

fn unexpected(probe: PageProbe, expected: &str, got: &serde_json::Value) -> AppError {
    AppError::MessageError(format!(
        "probe '{}' returned {got}, expected a {expected}",
        probe.name()
    ))
}
