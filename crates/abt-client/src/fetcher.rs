use std::time::Duration;

use abt_core::error::AppError;
use abt_core::traits::Fetcher;
use reqwest::Client;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, HeaderMap, HeaderName, HeaderValue, PRAGMA,
    UPGRADE_INSECURE_REQUESTS,
};

/// Desktop Chrome user agent presented to the calendar site.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// HTTP fetcher using reqwest.
///
/// Sends the header set of a regular desktop browser navigation, which is
/// sometimes enough to get past the site's bot gate without rendering.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout_secs: u64,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let timeout_secs = timeout.as_secs();
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(browser_headers())
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs,
        })
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("document"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("navigate"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("none"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-user"),
        HeaderValue::from_static("?1"),
    );
    headers
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use abt_core::seed::seed_events;
    use abt_core::testutil::MemoryStore;
    use abt_core::{CalendarConfig, CalendarService};
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const PAGE: &str = r#"<h2>July 2026</h2><span>2 – 5 Jul</span>
<h3>Wisconsin State Backgammon Championships</h3><p>Thursday, Milwaukee Marriott Downtown</p>"#;

    #[tokio::test]
    async fn test_fetch_sends_browser_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendar"))
            .and(header("accept-language", "en-US,en;q=0.9"))
            .and(header("sec-fetch-mode", "navigate"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = ReqwestFetcher::new().unwrap();
        let body = fetcher
            .fetch(&format!("{}/calendar", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(body, PAGE);
    }

    #[tokio::test]
    async fn test_fetch_forbidden_is_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Please wait..."))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = ReqwestFetcher::new().unwrap();
        let err = fetcher.fetch(&mock_server.uri()).await.unwrap_err();

        assert!(matches!(err, AppError::HttpError(_)));
        assert!(err.to_string().contains("HTTP 403"));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_network_error() {
        // Bind then drop a listener so the port is almost certainly closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let fetcher = ReqwestFetcher::with_timeout(Duration::from_secs(5)).unwrap();

        let err = fetcher
            .fetch(&format!("http://127.0.0.1:{port}/"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NetworkError(_)));
    }

    #[tokio::test]
    async fn test_forbidden_calendar_degrades_to_seed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let config = CalendarConfig {
            calendar_url: mock_server.uri(),
            ..CalendarConfig::default()
        };
        let svc = CalendarService::new(ReqwestFetcher::new().unwrap(), MemoryStore::new(), &config);

        let events = svc.get_events(true).await;

        assert!(!events.is_empty());
        assert_eq!(events, seed_events());
    }

    #[tokio::test]
    async fn test_calendar_refresh_over_http() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&mock_server)
            .await;

        let config = CalendarConfig {
            calendar_url: mock_server.uri(),
            ..CalendarConfig::default()
        };
        let svc = CalendarService::new(ReqwestFetcher::new().unwrap(), MemoryStore::new(), &config);

        let events = svc.get_events(true).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Wisconsin State Backgammon Championships");
        assert_eq!(events[0].id, "event-1-jul-2026");
    }
}
