pub mod fetcher;
pub mod store;

#[cfg(feature = "browser")]
pub mod browser;

#[cfg(feature = "browser")]
pub use browser::{ChromiumSession, ChromiumSurface};
pub use fetcher::ReqwestFetcher;
pub use store::FileStore;
