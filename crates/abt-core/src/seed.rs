//! Hand-curated calendar used as the dataset of last resort.

use crate::models::EventRecord;

/// `(id, date_range, title, location, month, year)`, in chronological order.
const SEED: [(&str, &str, &str, &str, &str, &str); 12] = [
    (
        "event-1-nov-2025",
        "18 – 24 Nov",
        "2025 Miami Open Backgammon Championship (ABT)",
        "Newport Beachside Hotel & Resort",
        "November",
        "2025",
    ),
    (
        "event-2-dec-2025",
        "4 – 7 Dec",
        "Texas Backgammon Championships (ABT)",
        "Hilton Dallas Lincoln Centre",
        "December",
        "2025",
    ),
    (
        "event-3-jan-2026",
        "15 – 19 Jan",
        "New England Backgammon Open (ABT)",
        "Crowne Plaza Boston-Woburn",
        "January",
        "2026",
    ),
    (
        "event-4-feb-2026",
        "12 – 16 Feb",
        "Midwest Backgammon Championships (ABT)",
        "Hyatt Regency Schaumburg",
        "February",
        "2026",
    ),
    (
        "event-5-mar-2026",
        "19 – 22 Mar",
        "Carolinas Backgammon Open (ABT)",
        "Embassy Suites Charlotte Concord",
        "March",
        "2026",
    ),
    (
        "event-6-apr-2026",
        "16 – 19 Apr",
        "Las Vegas Backgammon Open (ABT)",
        "Westgate Las Vegas Resort",
        "April",
        "2026",
    ),
    (
        "event-7-may-2026",
        "21 – 25 May",
        "Chicago Backgammon Open (ABT)",
        "Westin O'Hare Rosemont",
        "May",
        "2026",
    ),
    (
        "event-8-jun-2026",
        "11 – 14 Jun",
        "Michigan Summer Backgammon Championships",
        "Detroit Marriott Troy",
        "June",
        "2026",
    ),
    (
        "event-9-jun-2026",
        "25 – 28 Jun",
        "Atlanta Backgammon Open (ABT)",
        "Sheraton Atlanta Hotel",
        "June",
        "2026",
    ),
    (
        "event-10-jul-2026",
        "2 – 5 Jul",
        "Wisconsin State Backgammon Championships",
        "Milwaukee Marriott Downtown",
        "July",
        "2026",
    ),
    (
        "event-11-jul-2026",
        "23 – 26 Jul",
        "Northern California Backgammon Open",
        "Hyatt Regency San Francisco Airport",
        "July",
        "2026",
    ),
    (
        "event-12-aug-2026",
        "13 – 16 Aug",
        "Arizona State Backgammon Championships (ABT)",
        "Scottsdale Plaza Resort",
        "August",
        "2026",
    ),
];

/// Returns the full seed dataset. Never empty.
pub fn seed_events() -> Vec<EventRecord> {
    SEED.iter()
        .map(|&(id, date_range, title, location, month, year)| EventRecord {
            id: id.to_string(),
            date_range: date_range.to_string(),
            title: title.to_string(),
            location: location.to_string(),
            month: month.to_string(),
            year: year.to_string(),
        })
        .collect()
}
