use std::path::PathBuf;
use std::sync::Arc;

use abt_core::error::AppError;
use abt_core::traits::{RenderSession, RenderSurface};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;

use crate::fetcher::BROWSER_USER_AGENT;

/// Headless Chromium as a rendering surface, driven over the Chrome
/// DevTools Protocol.
///
/// A single Chromium process is shared across all clones; each
/// [`RenderSurface::open`] opens a new tab, which the session closes when the
/// acquisition is done.
///
/// # Example
///
/// ```rust,no_run
/// use abt_client::{ChromiumSurface, ReqwestFetcher, FileStore};
/// use abt_core::{CalendarConfig, CalendarService};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CalendarConfig::from_env()?;
/// let svc = CalendarService::with_surface(
///     ReqwestFetcher::new()?,
///     FileStore::new(&config.cache_dir),
///     ChromiumSurface::launch().await?,
///     &config,
/// );
/// let events = svc.refresh_with_browser_or_fallback().await;
/// println!("{} events", events.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ChromiumSurface {
    browser: Arc<Browser>,
}

impl ChromiumSurface {
    /// Launches a headless Chromium browser.
    ///
    /// Requires a Chromium / Chrome binary reachable via `$CHROME_BIN`, one of
    /// the well-known install paths, or the lookup done by `chromiumoxide`.
    pub async fn launch() -> Result<Self, AppError> {
        let mut builder = BrowserConfig::builder();
        builder = builder.no_sandbox().disable_default_args();

        // The snap wrapper rejects standard Chrome CLI flags, so prefer the
        // real binary inside the snap when it exists.
        if let Some(bin) = Self::find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-translate")
            .arg("--no-first-run")
            .arg(format!("--user-agent={BROWSER_USER_AGENT}"))
            .build()
            .map_err(|e| AppError::RenderError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::RenderError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok(Self {
            browser: Arc::new(browser),
        })
    }

    fn find_chrome_binary() -> Option<PathBuf> {
        let candidates: &[&str] = &[
            // Snap (Ubuntu default)
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            // Flatpak
            "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ];

        if let Ok(p) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
        }

        candidates.iter().map(PathBuf::from).find(|p| p.exists())
    }
}

impl RenderSurface for ChromiumSurface {
    type Session = ChromiumSession;

    async fn open(&self, url: &str) -> Result<ChromiumSession, AppError> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| AppError::RenderError(format!("Failed to navigate to {url}: {e}")))?;
        tracing::debug!(url, "Opened browser tab");
        Ok(ChromiumSession { page })
    }
}

/// One open Chromium tab.
pub struct ChromiumSession {
    page: Page,
}

impl RenderSession for ChromiumSession {
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, AppError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| AppError::RenderError(format!("Script evaluation failed: {e}")))?;
        result
            .into_value::<serde_json::Value>()
            .map_err(|e| AppError::MessageError(format!("Undecodable script result: {e}")))
    }

    async fn close(self) {
        if let Err(e) = self.page.close().await {
            tracing::debug!(error = %e, "Failed to close browser tab");
        }
    }
}
