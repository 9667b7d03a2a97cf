use abt_core::extract::extract_events;

use crate::common::CALENDAR_HTML;

#[test]
fn fixture_page_yields_sorted_events() {
    let events = extract_events(CALENDAR_HTML);

    let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["event-2-nov-2025", "event-1-jan-2026", "event-3-feb-2026"]
    );

    assert_eq!(events[0].title, "2025 Miami Open Backgammon Championship (ABT)");
    assert_eq!(events[0].location, "Newport Beachside Hotel & Resort");
    assert_eq!(events[0].date_range, "18 – 24 Nov");

    assert_eq!(events[2].title, "Midwest Backgammon Championships (ABT)");
    assert_eq!(events[2].location, "Hyatt Regency Schaumburg");
    assert_eq!(events[2].month, "February");
    assert_eq!(events[2].year, "2026");
}

#[test]
fn fixture_page_ignores_script_and_style_text() {
    let events = extract_events(CALENDAR_HTML);
    assert!(events.iter().all(|e| !e.title.contains("Scripted")));
    assert!(events.iter().all(|e| e.year != "2030" && e.year != "2031"));
}

#[test]
fn extracted_records_hold_invariants() {
    let mut inputs = vec![CALENDAR_HTML.to_string()];
    // Truncations land mid-tag, mid-entity and mid multi-byte character.
    for cut in (0..CALENDAR_HTML.len()).step_by(97) {
        if CALENDAR_HTML.is_char_boundary(cut) {
            inputs.push(CALENDAR_HTML[..cut].to_string());
            inputs.push(CALENDAR_HTML[cut..].to_string());
        }
    }
    inputs.push(CALENDAR_HTML.replace('>', ""));
    inputs.push(CALENDAR_HTML.replace('<', "&lt;"));

    for input in &inputs {
        let events = extract_events(input);
        for e in &events {
            assert!(e.title.chars().count() > 15, "title too short: {:?}", e.title);
            assert!(e.location.chars().count() > 5, "location too short: {:?}", e.location);
            assert!(!e.title.to_uppercase().contains("DETAIL"));
        }
        assert!(events.windows(2).all(|w| w[0].sort_key() <= w[1].sort_key()));
    }
}

#[test]
fn binary_garbage_yields_nothing() {
    let bytes: Vec<u8> = (0..4096u32).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8).collect();
    let garbage = String::from_utf8_lossy(&bytes);
    assert!(extract_events(&garbage).is_empty());
}
