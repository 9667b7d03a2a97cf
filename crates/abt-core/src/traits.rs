use std::future::Future;

use crate::error::AppError;

/// Fetches raw HTML content from a URL with a plain HTTP GET.
///
/// Implementations must return [`AppError::HttpError`] for non-2xx responses.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// String key-value store that survives process restarts.
pub trait KeyValueStore: Send + Sync + Clone {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, AppError>> + Send;

    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    fn remove(&self, key: &str) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A scriptable rendering surface (an embedded or headless browser).
///
/// `open` loads a page and hands back a session; scripts run in the page
/// context through [`RenderSession::evaluate`], whose JSON result is the
/// reply to that request.
pub trait RenderSurface: Send + Sync + Clone + 'static {
    type Session: RenderSession;

    fn open(&self, url: &str) -> impl Future<Output = Result<Self::Session, AppError>> + Send;
}

/// One loaded page on a [`RenderSurface`].
pub trait RenderSession: Send + Sync + 'static {
    /// Evaluates `script` in the page and returns its JSON-encoded result.
    fn evaluate(
        &self,
        script: &str,
    ) -> impl Future<Output = Result<serde_json::Value, AppError>> + Send;

    /// Releases the page. Errors are not interesting to callers.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// A rendering surface for builds without a browser. Every load fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSurface;

/// Session type of [`NullSurface`]; never constructed.
#[derive(Debug)]
pub struct NullSession;

impl RenderSurface for NullSurface {
    type Session = NullSession;

    async fn open(&self, _url: &str) -> Result<NullSession, AppError> {
        Err(AppError::RenderError(
            "no rendering surface configured".into(),
        ))
    }
}

impl RenderSession for NullSession {
    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value, AppError> {
        Err(AppError::RenderError(
            "no rendering surface configured".into(),
        ))
    }

    async fn close(self) {}
}
