//! Heuristic extraction of calendar events from the federation's HTML page.
//!
//! The page has no structured data, so events are recovered from text
//! patterns: "Month Year" headings open sections, date ranges inside a
//! section anchor candidate events, and a fixed window after each date range
//! is searched for a title and a location.

use std::panic::{self, AssertUnwindSafe};
use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use crate::models::{EventRecord, month_abbrev};

/// Bytes scanned after a date range when looking for its title and location.
pub const EVENT_WINDOW_LEN: usize = 500;

/// A title candidate must be longer than this to be accepted by a matcher.
pub const MIN_TITLE_CANDIDATE_LEN: usize = 10;

/// Records need a title longer than this.
pub const MIN_TITLE_LEN: usize = 15;

/// Records need a location longer than this.
pub const MIN_LOCATION_LEN: usize = 5;

static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
        .expect("script/style regex is valid")
});

static MONTH_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(January|February|March|April|May|June|July|August|September|October|November|December)\s+(\d{4})\b",
    )
    .expect("month heading regex is valid")
});

static DATE_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b\d{1,2}(?:\s*[–—-]\s*\d{1,2})?\s+(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\b",
    )
    .expect("date range regex is valid")
});

static WEEKDAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday)\b")
        .expect("weekday regex is valid")
});

static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday)\b,?\s*([^,.<]+)")
        .expect("location regex is valid")
});

static MARKER_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"####\s*([^\n<#]+)").expect("marker heading regex is valid"));

static HEADING_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<h([34])\b[^>]*>(.*?)</h([34])\s*>").expect("heading tag regex is valid")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex is valid"));

/// A named title matcher. Matchers run in priority order; the first one that
/// yields a cleaned candidate longer than [`MIN_TITLE_CANDIDATE_LEN`] wins.
#[derive(Clone, Copy)]
pub struct TitleMatcher {
    pub name: &'static str,
    matcher: fn(&str) -> Option<String>,
}

impl TitleMatcher {
    /// Runs this matcher alone against an event window.
    pub fn apply(&self, window: &str) -> Option<String> {
        (self.matcher)(window).filter(|title| title.chars().count() > MIN_TITLE_CANDIDATE_LEN)
    }
}

impl std::fmt::Debug for TitleMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TitleMatcher").field("name", &self.name).finish()
    }
}

/// Title matchers in priority order.
pub const TITLE_MATCHERS: [TitleMatcher; 3] = [
    TitleMatcher {
        name: "marker_heading",
        matcher: marker_heading,
    },
    TitleMatcher {
        name: "heading_tag",
        matcher: heading_tag,
    },
    TitleMatcher {
        name: "text_run",
        matcher: text_run,
    },
];

/// `#### Title` lines, as produced by markdown-ish page builders.
pub fn marker_heading(window: &str) -> Option<String> {
    let caps = MARKER_HEADING_RE.captures(window)?;
    non_empty(clean_text(caps.get(1)?.as_str()))
}

/// The first `<h3>` or `<h4>` element.
pub fn heading_tag(window: &str) -> Option<String> {
    HEADING_TAG_RE
        .captures_iter(window)
        .find(|caps| caps.get(1).map(|m| m.as_str()) == caps.get(3).map(|m| m.as_str()))
        .and_then(|caps| non_empty(clean_text(caps.get(2)?.as_str())))
}

/// The first text run between tags that is long enough, stopping at the
/// first day-of-week token.
pub fn text_run(window: &str) -> Option<String> {
    for segment in TAG_RE.split(window) {
        let (run, hit_weekday) = match WEEKDAY_RE.find(segment) {
            Some(m) => (&segment[..m.start()], true),
            None => (segment, false),
        };

        let candidate = clean_text(run.trim_start_matches(|c: char| c == '#' || c.is_whitespace()));
        if candidate.chars().count() > MIN_TITLE_CANDIDATE_LEN {
            return Some(candidate);
        }
        if hit_weekday {
            break;
        }
    }
    None
}

/// Runs the title matchers in order and returns the winner's name and title.
pub fn match_title(window: &str) -> Option<(&'static str, String)> {
    TITLE_MATCHERS
        .iter()
        .find_map(|m| m.apply(window).map(|title| (m.name, title)))
}

/// Text after a day-of-week token, up to the next comma, period, tag or
/// the literal `EVENT`.
pub fn match_location(window: &str) -> Option<String> {
    let caps = LOCATION_RE.captures(window)?;
    let raw = caps.get(1)?.as_str();
    let raw = match raw.find("EVENT") {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    non_empty(clean_text(raw))
}

/// Extracts every event found in `html`, ordered by `(year, month)`.
///
/// Never panics; an internal failure is logged and yields an empty vector.
pub fn extract_events(html: &str) -> Vec<EventRecord> {
    match panic::catch_unwind(AssertUnwindSafe(|| extract_inner(html))) {
        Ok(events) => {
            tracing::debug!(events = events.len(), bytes = html.len(), "Extracted events");
            events
        }
        Err(cause) => {
            let reason = cause
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| cause.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::warn!(%reason, "Event extraction failed");
            Vec::new()
        }
    }
}

fn extract_inner(html: &str) -> Vec<EventRecord> {
    let doc = SCRIPT_STYLE_RE.replace_all(html, "");
    let doc = doc.as_ref();

    let headings: Vec<_> = MONTH_HEADING_RE.captures_iter(doc).collect();
    let mut events = Vec::new();

    for (i, caps) in headings.iter().enumerate() {
        let (Some(whole), Some(month), Some(year)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let section_end = headings
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(doc.len(), |m| m.start());
        let section_start = whole.start();
        let section = &doc[section_start..section_end];

        for date in DATE_RANGE_RE.find_iter(section) {
            let window_start = section_start + date.end();
            let window = window_at(doc, window_start);

            let Some((matcher, title)) = match_title(window) else {
                continue;
            };
            let Some(location) = match_location(window) else {
                continue;
            };

            if !is_valid_record(&title, &location) {
                tracing::trace!(%title, %location, matcher, "Discarded event candidate");
                continue;
            }

            let index = events.len() + 1;
            events.push(EventRecord {
                id: format!(
                    "event-{index}-{}-{}",
                    month_abbrev(month.as_str()),
                    year.as_str()
                ),
                date_range: date.as_str().trim().to_string(),
                title,
                location,
                month: month.as_str().to_string(),
                year: year.as_str().to_string(),
            });
        }
    }

    events.sort_by_key(EventRecord::sort_key);
    events
}

fn is_valid_record(title: &str, location: &str) -> bool {
    title.chars().count() > MIN_TITLE_LEN
        && location.chars().count() > MIN_LOCATION_LEN
        && !title.to_uppercase().contains("DETAIL")
}

/// Up to [`EVENT_WINDOW_LEN`] bytes of `doc` from `start`, cut on a char boundary.
fn window_at(doc: &str, start: usize) -> &str {
    let mut end = (start + EVENT_WINDOW_LEN).min(doc.len());
    while !doc.is_char_boundary(end) {
        end -= 1;
    }
    &doc[start..end]
}

/// Strips markup, decodes entities and collapses whitespace.
fn clean_text(fragment: &str) -> String {
    let parsed = Html::parse_fragment(fragment);
    let text = parsed.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}
