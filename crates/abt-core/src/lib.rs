pub mod acquisition;
pub mod cache;
pub mod config;
pub mod direct;
pub mod error;
pub mod extract;
pub mod models;
pub mod seed;
pub mod service;
pub mod testutil;
pub mod traits;

pub use acquisition::PageAcquirer;
pub use cache::CalendarCache;
pub use config::{AcquisitionTimings, CalendarConfig};
pub use direct::DirectFetch;
pub use error::AppError;
pub use extract::extract_events;
pub use models::{EventRecord, PersistedBatch, compute_hash};
pub use seed::seed_events;
pub use service::CalendarService;
pub use traits::{Fetcher, KeyValueStore, NullSurface, RenderSession, RenderSurface};
