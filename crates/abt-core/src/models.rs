use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Full English month names, indexed from January.
pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// A single calendar event extracted from the federation's calendar page.
///
/// `date_range` is kept as free text ("18 – 24 Nov"); it is never parsed
/// into start/end dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Synthetic id, unique within one extraction batch only.
    pub id: String,
    pub date_range: String,
    pub title: String,
    pub location: String,
    /// Full month name, e.g. "November".
    pub month: String,
    /// Four-digit year, e.g. "2025".
    pub year: String,
}

impl EventRecord {
    /// Sort key used to order a batch chronologically: `(year, month index)`.
    ///
    /// Unparseable years sort last, unknown months sort after December.
    pub fn sort_key(&self) -> (u32, usize) {
        let year = self.year.parse().unwrap_or(u32::MAX);
        let month = month_index(&self.month).unwrap_or(MONTH_NAMES.len());
        (year, month)
    }
}

/// Zero-based index of a full English month name (case-insensitive).
pub fn month_index(name: &str) -> Option<usize> {
    MONTH_NAMES
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name.trim()))
}

/// Lowercase three-letter abbreviation for a full month name ("November" -> "nov").
pub fn month_abbrev(name: &str) -> String {
    name.trim().chars().take(3).collect::<String>().to_lowercase()
}

/// On-disk form of the persisted tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedBatch {
    pub events: Vec<EventRecord>,
    /// Informational only; never used for expiry.
    pub written_at: DateTime<Utc>,
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fingerprint of a batch of events, used for change detection in logs.
pub fn batch_fingerprint(events: &[EventRecord]) -> String {
    let serialized = serde_json::to_string(events).unwrap_or_default();
    compute_hash(&serialized)
}
