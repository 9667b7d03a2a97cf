use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::AppError;

/// Public calendar page of the federation.
pub const DEFAULT_CALENDAR_URL: &str = "https://www.usbgf.org/abt-calendar/";

/// Directory used by the file-backed persistent store when none is configured.
pub const DEFAULT_CACHE_DIR: &str = ".abt-cache";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Timing and threshold knobs for the page acquisition protocol.
///
/// The defaults encode how the calendar page behaves in practice: the bot
/// challenge clears within a few seconds and the event list lazy-loads in
/// batches as the viewport approaches the bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionTimings {
    /// Delay between polls while the "Please wait" challenge is showing.
    pub challenge_poll: Duration,
    /// Delay between polls while the body text is still too short.
    pub content_poll: Duration,
    /// Visible body text must exceed this many characters.
    pub min_content_len: usize,
    /// Pixels scrolled per lazy-load step.
    pub scroll_step: u32,
    /// Delay after each scroll before re-measuring document height.
    pub scroll_delay: Duration,
    /// Consecutive unchanged height checks that mark the page as stable.
    pub stable_checks: u32,
    /// Upper bound on scroll attempts regardless of stability.
    pub max_scroll_attempts: u32,
    /// Delay between reaching stability and reading the markup.
    pub settle_delay: Duration,
    /// Hard deadline for one acquisition.
    pub hard_timeout: Duration,
}

impl Default for AcquisitionTimings {
    fn default() -> Self {
        Self {
            challenge_poll: Duration::from_secs(2),
            content_poll: Duration::from_secs(2),
            min_content_len: 500,
            scroll_step: 1000,
            scroll_delay: Duration::from_millis(1500),
            stable_checks: 3,
            max_scroll_attempts: 20,
            settle_delay: Duration::from_millis(1500),
            hard_timeout: Duration::from_secs(60),
        }
    }
}

impl AcquisitionTimings {
    pub fn with_hard_timeout(mut self, timeout: Duration) -> Self {
        self.hard_timeout = timeout;
        self
    }

    pub fn with_stable_checks(mut self, checks: u32) -> Self {
        self.stable_checks = checks;
        self
    }

    pub fn with_max_scroll_attempts(mut self, attempts: u32) -> Self {
        self.max_scroll_attempts = attempts;
        self
    }

    /// Apply `ABT_*` overrides from the environment on top of `self`.
    ///
    /// - `ABT_CHALLENGE_POLL_MS`, `ABT_CONTENT_POLL_MS`, `ABT_SCROLL_DELAY_MS`,
    ///   `ABT_SETTLE_DELAY_MS`, `ABT_ACQUIRE_TIMEOUT_MS`
    /// - `ABT_STABLE_CHECKS`, `ABT_MAX_SCROLL_ATTEMPTS`, `ABT_MIN_CONTENT_LEN`
    pub fn with_env_overrides(mut self) -> Result<Self, AppError> {
        if let Some(ms) = env_parse::<u64>("ABT_CHALLENGE_POLL_MS")? {
            self.challenge_poll = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("ABT_CONTENT_POLL_MS")? {
            self.content_poll = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("ABT_SCROLL_DELAY_MS")? {
            self.scroll_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("ABT_SETTLE_DELAY_MS")? {
            self.settle_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("ABT_ACQUIRE_TIMEOUT_MS")? {
            if ms == 0 {
                return Err(AppError::ConfigError(
                    "ABT_ACQUIRE_TIMEOUT_MS must be at least 1".into(),
                ));
            }
            self.hard_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = env_parse::<u32>("ABT_STABLE_CHECKS")? {
            self.stable_checks = n;
        }
        if let Some(n) = env_parse::<u32>("ABT_MAX_SCROLL_ATTEMPTS")? {
            self.max_scroll_attempts = n;
        }
        if let Some(n) = env_parse::<usize>("ABT_MIN_CONTENT_LEN")? {
            self.min_content_len = n;
        }
        Ok(self)
    }
}

/// Configuration for the calendar pipeline.
#[derive(Debug, Clone)]
pub struct CalendarConfig {
    pub calendar_url: String,
    pub cache_dir: PathBuf,
    pub http_timeout: Duration,
    pub timings: AcquisitionTimings,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_url: DEFAULT_CALENDAR_URL.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            timings: AcquisitionTimings::default(),
        }
    }
}

impl CalendarConfig {
    /// Read configuration from environment variables.
    ///
    /// - `ABT_CALENDAR_URL` (optional, must be http/https)
    /// - `ABT_CACHE_DIR` (optional, defaults to `.abt-cache`)
    /// - `ABT_HTTP_TIMEOUT_SECS` (optional, defaults to 30)
    /// - acquisition timing overrides, see [`AcquisitionTimings::with_env_overrides`]
    pub fn from_env() -> Result<Self, AppError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("ABT_CALENDAR_URL") {
            config.calendar_url = validate_calendar_url(&url)?;
        }
        if let Ok(dir) = std::env::var("ABT_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(secs) = env_parse::<u64>("ABT_HTTP_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(AppError::ConfigError(
                    "ABT_HTTP_TIMEOUT_SECS must be at least 1".into(),
                ));
            }
            config.http_timeout = Duration::from_secs(secs);
        }
        config.timings = config.timings.with_env_overrides()?;

        Ok(config)
    }
}

/// Check that a calendar URL parses and uses http or https.
pub fn validate_calendar_url(raw: &str) -> Result<String, AppError> {
    let parsed = Url::parse(raw)
        .map_err(|e| AppError::ConfigError(format!("Invalid calendar URL '{raw}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        scheme => Err(AppError::ConfigError(format!(
            "Calendar URL scheme '{scheme}' is not allowed (only http/https)"
        ))),
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, AppError> {
    match std::env::var(key) {
        Err(_) => Ok(None),
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| {
            AppError::ConfigError(format!("Invalid {key} '{raw}': must be a non-negative integer"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let t = AcquisitionTimings::default();
        assert_eq!(t.challenge_poll, Duration::from_secs(2));
        assert_eq!(t.scroll_delay, Duration::from_millis(1500));
        assert_eq!(t.stable_checks, 3);
        assert_eq!(t.max_scroll_attempts, 20);
        assert_eq!(t.min_content_len, 500);
        assert_eq!(t.hard_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_builder_overrides() {
        let t = AcquisitionTimings::default()
            .with_hard_timeout(Duration::from_secs(5))
            .with_stable_checks(1)
            .with_max_scroll_attempts(2);
        assert_eq!(t.hard_timeout, Duration::from_secs(5));
        assert_eq!(t.stable_checks, 1);
        assert_eq!(t.max_scroll_attempts, 2);
    }

    #[test]
    fn test_validate_calendar_url() {
        assert!(validate_calendar_url("https://example.com/calendar").is_ok());
        let err = validate_calendar_url("file:///etc/passwd").unwrap_err();
        assert!(err.to_string().contains("not allowed"));
        assert!(matches!(
            validate_calendar_url("not a url"),
            Err(AppError::ConfigError(_))
        ));
    }
}
