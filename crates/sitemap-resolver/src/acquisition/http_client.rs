//! Pluggable HTTP transport for sitemap fetches.
//!
//! The resolver only issues `GET` requests and streams the body into the
//! parser. [`ReqwestClient`] is the default; tests and callers with their own
//! transport (proxies, caches, decompression) implement [`HttpClient`].

use async_trait::async_trait;
use futures::TryStreamExt;
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncReadExt};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};
use url::Url;

/// Boxed error returned by transports and processors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A streamed response body. Dropping it releases the connection.
pub type BodyReader = Pin<Box<dyn AsyncBufRead + Send>>;

/// Upper bound on the body bytes kept for non-2xx diagnostics.
pub const ERROR_BODY_LIMIT: u64 = 4096;

/// Response to a `GET` request.
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, not yet read.
    pub body: BodyReader,
}

impl HttpResponse {
    /// Wrap a status code and an unread body.
    pub fn new(status: u16, body: BodyReader) -> Self {
        Self { status, body }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Read up to [`ERROR_BODY_LIMIT`] bytes of the body as lossy UTF-8.
    ///
    /// Read failures yield whatever was collected so far; this is only used
    /// to decorate an error that is already being reported.
    pub async fn body_snippet(mut self) -> String {
        let mut bytes = Vec::new();
        let _ = (&mut self.body)
            .take(ERROR_BODY_LIMIT)
            .read_to_end(&mut bytes)
            .await;
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Transport used by the resolver. Must be safe to share across workers.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue a `GET` for `url`.
    ///
    /// Any status code is a successful response; only failures to obtain a
    /// response at all are errors.
    async fn get(&self, url: &Url) -> Result<HttpResponse, BoxError>;
}

/// Default [`HttpClient`] built on `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Build the default client.
    ///
    /// - 30s connect timeout, 30s TCP keepalive, 90s idle pool timeout
    /// - no overall request timeout; bound it with a cancellation token
    /// - follows at most 10 redirects and never from HTTPS to HTTP
    pub fn new() -> Result<Self, BoxError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(redirect_policy())
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an already-configured `reqwest::Client`.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn redirect_policy() -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(|attempt| {
        if attempt.previous().len() >= 10 {
            warn!("giving up on {} after 10 redirects", attempt.url());
            return attempt.error("too many redirects");
        }
        let downgrade = attempt
            .previous()
            .last()
            .is_some_and(|prev| prev.scheme() == "https" && attempt.url().scheme() == "http");
        if downgrade {
            warn!("not following HTTPS to HTTP redirect to {}", attempt.url());
            attempt.stop()
        } else {
            attempt.follow()
        }
    })
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &Url) -> Result<HttpResponse, BoxError> {
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status().as_u16();
        debug!("GET {url} -> {status}");
        let stream = resp.bytes_stream().map_err(std::io::Error::other);
        Ok(HttpResponse::new(status, Box::pin(StreamReader::new(stream))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_success() {
        let ok = HttpResponse::new(204, Box::pin(&b""[..]));
        assert!(ok.is_success());
        let moved = HttpResponse::new(301, Box::pin(&b""[..]));
        assert!(!moved.is_success());
    }

    #[tokio::test]
    async fn test_body_snippet_is_bounded() {
        let body = vec![b'x'; 10_000];
        let resp = HttpResponse::new(500, Box::pin(std::io::Cursor::new(body)));
        let snippet = resp.body_snippet().await;
        assert_eq!(snippet.len(), ERROR_BODY_LIMIT as usize);
    }

    #[test]
    fn test_default_client_builds() {
        assert!(ReqwestClient::new().is_ok());
    }
}
