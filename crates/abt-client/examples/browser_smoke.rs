/// Smoke-test for `ChromiumSurface`.
///
/// Launches a headless Chromium, runs a full acquisition of the live calendar
/// page and prints what the extractor found.
///
/// Run with:
///   cargo run -p abt-client --example browser_smoke --features browser
use abt_client::ChromiumSurface;
use abt_core::{AcquisitionTimings, PageAcquirer, extract_events};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    println!("Launching headless browser…");
    let surface = ChromiumSurface::launch().await?;
    let acquirer = PageAcquirer::new(surface, AcquisitionTimings::default());

    let url = abt_core::config::DEFAULT_CALENDAR_URL;
    println!("Acquiring {url} …");
    let html = acquirer.acquire(url).await?;
    assert!(html.len() > 500, "HTML suspiciously short ({} bytes)", html.len());

    let events = extract_events(&html);
    println!("OK: {} bytes of rendered HTML, {} events", html.len(), events.len());
    for event in events.iter().take(5) {
        println!("  {} | {} | {}", event.date_range, event.title, event.location);
    }
    Ok(())
}
