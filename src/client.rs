//! Page retrieval with polite pacing and linear-backoff retries.
//!
//! # Architecture
//!
//! - [`PageSource`]: core trait, fetches the body of one URL
//! - [`HttpPage`]: `reqwest` implementation with a fixed user agent and a
//!   random pause before every request
//! - [`RetryFetch`]: decorator that retries any [`PageSource`]
//!
//! # Retry Strategy
//!
//! - `attempts` total tries, the first one included
//! - After failed attempt `n` the decorator sleeps `base_delay × n`
//! - Each failure is logged; the last one is returned to the caller

use crate::config::{DelayRange, Settings};
use crate::utils::pause;
use reqwest::Client;
use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Something that can return the body of a page.
pub trait PageSource {
    /// Fetch `url` and return its body as text.
    async fn get_page(&self, url: &str) -> Result<String, Box<dyn Error>>;
}

/// HTTP page source backed by a shared `reqwest::Client`.
pub struct HttpPage {
    client: Client,
    request_delay: DelayRange,
}

impl HttpPage {
    pub fn new(settings: &Settings) -> Result<Self, Box<dyn Error>> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self::with_client(client, settings.request_delay))
    }

    pub fn with_client(client: Client, request_delay: DelayRange) -> Self {
        Self {
            client,
            request_delay,
        }
    }
}

impl fmt::Debug for HttpPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPage")
            .field("request_delay", &self.request_delay)
            .finish()
    }
}

impl PageSource for HttpPage {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn get_page(&self, url: &str) -> Result<String, Box<dyn Error>> {
        pause(self.request_delay).await;

        let t0 = Instant::now();
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "Fetched page"
        );
        Ok(body)
    }
}

/// Wrapper that adds linear backoff retries to any [`PageSource`].
pub struct RetryFetch<T> {
    inner: T,
    /// Total attempts, including the first.
    attempts: usize,
    /// Delay after the first failure; later failures wait a multiple of it.
    base_delay: Duration,
}

impl<T> RetryFetch<T>
where
    T: PageSource,
{
    /// Wrap `inner`. `attempts` below one is treated as one.
    pub fn new(inner: T, attempts: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            base_delay,
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("attempts", &self.attempts)
            .field("base_delay", &self.base_delay)
            .finish()
    }
}

impl<T> PageSource for RetryFetch<T>
where
    T: PageSource,
{
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn get_page(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            match self.inner.get_page(url).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt >= self.attempts => {
                    error!(attempt, max = self.attempts, error = %e, "get_page() exhausted retries");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.base_delay.saturating_mul(attempt as u32);
                    warn!(
                        attempt,
                        max = self.attempts,
                        ?delay,
                        error = %e,
                        "get_page() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Canned responses keyed by URL. Unknown URLs fail.
    #[derive(Default)]
    pub(crate) struct StubPages {
        pages: HashMap<String, String>,
        /// Number of leading calls that fail regardless of URL.
        fail_first: usize,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl StubPages {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with_page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }

        pub(crate) fn failing_first(mut self, n: usize) -> Self {
            self.fail_first = n;
            self
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl PageSource for StubPages {
        async fn get_page(&self, url: &str) -> Result<String, Box<dyn Error>> {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(url.to_string());
                calls.len()
            };
            if n <= self.fail_first {
                return Err(format!("transient failure #{n}").into());
            }
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| format!("404 for {url}").into())
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_failures() {
        let stub = StubPages::new().with_page("http://x/a", "ok").failing_first(2);
        let retry = RetryFetch::new(stub, 3, Duration::ZERO);

        let body = retry.get_page("http://x/a").await.unwrap();
        assert_eq!(body, "ok");
        assert_eq!(retry.inner.call_count(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_attempts() {
        let stub = StubPages::new();
        let retry = RetryFetch::new(stub, 3, Duration::ZERO);

        let err = retry.get_page("http://x/missing").await.unwrap_err();
        assert!(err.to_string().contains("404"));
        assert_eq!(retry.inner.call_count(), 3);
    }

    #[tokio::test]
    async fn test_retry_zero_attempts_still_tries_once() {
        let stub = StubPages::new().with_page("http://x/a", "ok");
        let retry = RetryFetch::new(stub, 0, Duration::ZERO);

        assert_eq!(retry.get_page("http://x/a").await.unwrap(), "ok");
        assert_eq!(retry.inner.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_backoff_is_linear() {
        let stub = StubPages::new().with_page("http://x/a", "ok").failing_first(2);
        let retry = RetryFetch::new(stub, 3, Duration::from_secs(2));

        let t0 = tokio::time::Instant::now();
        retry.get_page("http://x/a").await.unwrap();
        // 2s after the first failure, 4s after the second
        let elapsed = t0.elapsed();
        assert!(elapsed >= Duration::from_secs(6));
        assert!(elapsed < Duration::from_secs(7));
    }

    /// Answer a single HTTP request on a local port and hand back the raw request.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            let response = format!(
                "{status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });
        (format!("http://{addr}/page"), handle)
    }

    fn local_client(user_agent: &str) -> Client {
        Client::builder()
            .user_agent(user_agent.to_string())
            .no_proxy()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_http_page_pauses_then_fetches() {
        let (url, server) = serve_once("HTTP/1.1 200 OK", "<table></table>").await;
        let page = HttpPage::with_client(local_client("catalog-test/1.0"), DelayRange::new(0.2, 0.2));

        let t0 = Instant::now();
        let body = page.get_page(&url).await.unwrap();
        assert!(t0.elapsed() >= Duration::from_millis(200));
        assert_eq!(body, "<table></table>");

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /page"));
        assert!(request.contains("user-agent: catalog-test/1.0"));
    }

    #[tokio::test]
    async fn test_http_page_rejects_error_status() {
        let (url, server) = serve_once("HTTP/1.1 503 Service Unavailable", "busy").await;
        let page = HttpPage::with_client(local_client("catalog-test/1.0"), DelayRange::zero());

        assert!(page.get_page(&url).await.is_err());
        server.await.unwrap();
    }

    #[test]
    fn test_http_page_builds_from_settings() {
        let page = HttpPage::new(&Settings::default()).unwrap();
        assert!(format!("{page:?}").contains("HttpPage"));
    }
}
