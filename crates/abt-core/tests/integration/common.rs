use abt_core::CalendarConfig;
use abt_core::service::CalendarService;
use abt_core::testutil::{MemoryStore, MockFetcher, MockSurface};

pub const CALENDAR_HTML: &str = include_str!("../fixtures/calendar.html");

pub type TestService = CalendarService<MockFetcher, MemoryStore, MockSurface>;

/// Builds a service over the given mocks with default configuration.
pub fn build_service(fetcher: MockFetcher, store: MemoryStore, surface: MockSurface) -> TestService {
    CalendarService::with_surface(fetcher, store, surface, &CalendarConfig::default())
}
