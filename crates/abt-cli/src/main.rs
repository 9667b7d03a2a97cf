use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use abt_client::{FileStore, ReqwestFetcher};
use abt_core::config::validate_calendar_url;
use abt_core::models::batch_fingerprint;
use abt_core::traits::RenderSurface;
use abt_core::{CalendarConfig, CalendarService, EventRecord, extract_events};

#[derive(Parser)]
#[command(name = "abtcal", version, about = "ABT backgammon tournament calendar")]
struct Cli {
    /// Calendar page to fetch
    #[arg(long, global = true, env = "ABT_CALENDAR_URL")]
    url: Option<String>,

    /// Directory holding the persisted calendar
    #[arg(long, global = true, env = "ABT_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// HTTP timeout in seconds
    #[arg(long, global = true, env = "ABT_HTTP_TIMEOUT_SECS")]
    http_timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Layer the command-line settings over the environment configuration.
    fn config(&self) -> Result<CalendarConfig> {
        let mut config = CalendarConfig::from_env().context("Invalid configuration")?;

        if let Some(url) = &self.url {
            config.calendar_url = validate_calendar_url(url).context("Invalid --url")?;
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = dir.clone();
        }
        if let Some(secs) = self.http_timeout {
            anyhow::ensure!(secs > 0, "--http-timeout must be at least 1 second");
            config.http_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the calendar (cache first, network only when needed)
    Events {
        /// Skip the cache and fetch the calendar page now
        #[arg(long, default_value_t = false)]
        refresh: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Show the cached calendar without touching the network
    Cached {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Drop the persisted calendar
    Clear,

    /// Run the extractor on a saved HTML file
    Extract {
        /// Path to the HTML file
        #[arg(long)]
        file: PathBuf,

        /// Store the extracted events in the cache
        #[arg(long, default_value_t = false)]
        save: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Render the calendar in headless Chromium (falls back to a plain fetch)
    Scrape {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Show configuration and cache state
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("abt=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;
    let fetcher =
        ReqwestFetcher::with_timeout(config.http_timeout).context("Failed to create HTTP client")?;
    let store = FileStore::new(&config.cache_dir);

    match cli.command {
        Commands::Events { refresh, format } => {
            let svc = CalendarService::new(fetcher, store, &config);
            print_events(&svc.get_events(refresh).await, format)?;
        }
        Commands::Cached { format } => {
            let svc = CalendarService::new(fetcher, store, &config);
            print_events(&svc.get_cached_events().await, format)?;
        }
        Commands::Clear => {
            let svc = CalendarService::new(fetcher, store, &config);
            svc.clear_cache().await;
            println!("Cleared cache in {}", config.cache_dir.display());
        }
        Commands::Extract { file, save, format } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read HTML file: {}", file.display()))?;
            let events = extract_events(&html);
            tracing::info!(events = events.len(), "Extracted from {}", file.display());

            if save && !events.is_empty() {
                let svc = CalendarService::new(fetcher, store, &config);
                svc.cache_to_disk(&events).await;
            }
            print_events(&events, format)?;
        }
        Commands::Scrape { format } => {
            let events = cmd_scrape(fetcher, store, &config).await?;
            print_events(&events, format)?;
        }
        Commands::Info => {
            let svc = CalendarService::new(fetcher, store, &config);
            cmd_info(&svc, &config).await;
        }
    }

    Ok(())
}

#[cfg(feature = "browser")]
async fn cmd_scrape(
    fetcher: ReqwestFetcher,
    store: FileStore,
    config: &CalendarConfig,
) -> Result<Vec<EventRecord>> {
    let surface = abt_client::ChromiumSurface::launch()
        .await
        .context("Failed to launch browser")?;
    let svc = CalendarService::with_surface(fetcher, store, surface, config);
    Ok(svc.refresh_with_browser_or_fallback().await)
}

#[cfg(not(feature = "browser"))]
async fn cmd_scrape(
    fetcher: ReqwestFetcher,
    store: FileStore,
    config: &CalendarConfig,
) -> Result<Vec<EventRecord>> {
    tracing::warn!("Built without the `browser` feature, using a plain fetch");
    let svc = CalendarService::new(fetcher, store, config);
    Ok(svc.refresh_with_browser_or_fallback().await)
}

async fn cmd_info<R: RenderSurface>(
    svc: &CalendarService<ReqwestFetcher, FileStore, R>,
    config: &CalendarConfig,
) {
    println!("Calendar URL:   {}", config.calendar_url);
    println!("Cache dir:      {}", config.cache_dir.display());
    println!("HTTP timeout:   {}s", config.http_timeout.as_secs());
    println!(
        "Acquisition:    {}s deadline, {} stable checks, {} scroll attempts max",
        config.timings.hard_timeout.as_secs(),
        config.timings.stable_checks,
        config.timings.max_scroll_attempts,
    );

    match svc.cache().load_persisted().await {
        Some(events) => {
            let written = svc
                .persisted_at()
                .await
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!(
                "Persisted:      {} events (written {}, fingerprint {}...)",
                events.len(),
                written,
                &batch_fingerprint(&events)[..8],
            );
        }
        None => println!("Persisted:      none (seed dataset will be served)"),
    }
}

fn print_events(events: &[EventRecord], format: OutputFormat) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Table => write_table(&mut out, events)?,
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(events)?)?,
        OutputFormat::Csv => write_csv(&mut out, events)?,
    }
    Ok(())
}

fn write_table(out: &mut impl Write, events: &[EventRecord]) -> Result<()> {
    let mut current: Option<(&str, &str)> = None;
    for event in events {
        let heading = (event.month.as_str(), event.year.as_str());
        if current != Some(heading) {
            if current.is_some() {
                writeln!(out)?;
            }
            writeln!(out, "{} {}", event.month, event.year)?;
            current = Some(heading);
        }
        writeln!(
            out,
            "  {:<14} {}\n  {:<14} {}",
            event.date_range, event.title, "", event.location
        )?;
    }
    writeln!(out, "\nTotal: {} events", events.len())?;
    Ok(())
}

fn write_csv(out: &mut impl Write, events: &[EventRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for event in events {
        writer.serialize(event)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use abt_core::seed_events;

    use super::*;

    #[test]
    fn test_table_groups_by_month() {
        let events = seed_events();
        let mut buf = Vec::new();
        write_table(&mut buf, &events[..3]).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.starts_with("November 2025\n"));
        assert!(text.contains("Miami Open"));
        assert!(text.contains("Newport Beachside Hotel & Resort"));
        assert!(text.ends_with("Total: 3 events\n"));
    }

    #[test]
    fn test_csv_has_header_and_rows() {
        let events = seed_events();
        let mut buf = Vec::new();
        write_csv(&mut buf, &events).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next(),
            Some("id,dateRange,title,location,month,year")
        );
        assert_eq!(lines.count(), events.len());
    }

    #[test]
    fn test_global_flags_override_config() {
        let cli = Cli::try_parse_from([
            "abtcal",
            "cached",
            "--url",
            "https://calendar.example.org/abt",
            "--cache-dir",
            "/tmp/abt-test-cache",
            "--http-timeout",
            "7",
        ])
        .unwrap();

        let config = cli.config().unwrap();

        assert_eq!(config.calendar_url, "https://calendar.example.org/abt");
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/abt-test-cache"));
        assert_eq!(config.http_timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_invalid_flags_are_rejected() {
        let cli = Cli::try_parse_from(["abtcal", "info", "--url", "ftp://calendar.example.org"])
            .unwrap();
        assert!(cli.config().is_err());

        let cli = Cli::try_parse_from(["abtcal", "info", "--http-timeout", "0"]).unwrap();
        assert!(cli.config().is_err());
    }

    #[test]
    fn test_cli_parses_events_flags() {
        let cli = Cli::try_parse_from(["abtcal", "events", "--refresh", "--format", "json"]).unwrap();
        match cli.command {
            Commands::Events { refresh, format } => {
                assert!(refresh);
                assert!(matches!(format, OutputFormat::Json));
            }
            _ => panic!("expected events subcommand"),
        }
    }
}
