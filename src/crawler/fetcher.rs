//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the crawler user agent and request timeout
//! - GET requests following redirects
//! - Error classification into network and HTTP failures

use async_trait::async_trait;
use reqwest::{header, redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// User agent sent with every crawler request
pub const CRAWLER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_6_8) AppleWebKit/534.30 (KHTML, like Gecko) Chrome/12.0.742.112 Safari/534.30";

const MAX_REDIRECTS: usize = 10;

/// A successfully fetched response (2xx)
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// HTTP status code
    pub status: u16,
    /// Final URL after redirects
    pub final_url: Url,
    /// Content-Type header value, if any
    pub content_type: Option<String>,
    /// Raw response body
    pub body: Vec<u8>,
}

impl FetchResult {
    /// Returns true if the response declares an HTML media type
    ///
    /// A missing Content-Type is treated as HTML.
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            Some(ct) => {
                let media_type = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
                media_type == "text/html" || media_type == "application/xhtml+xml"
            }
            None => true,
        }
    }
}

/// Per-URL fetch failures
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection failure, timeout or interrupted body
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    /// Non-2xx status
    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            Self::Network { url, .. } | Self::Http { url, .. } => url,
        }
    }
}

/// Anything that can retrieve a page by URL
///
/// The coordinator only talks to this trait, so crawls can be driven by
/// an in-memory site in tests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchResult, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The User-Agent header value
/// * `timeout` - Total time allowed for one request, body included
///
/// # Example
///
/// ```no_run
/// use sitesearch::crawler::{build_http_client, CRAWLER_USER_AGENT};
/// use std::time::Duration;
///
/// let client = build_http_client(CRAWLER_USER_AGENT, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed fetcher used for real crawls
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(user_agent, timeout)?,
        })
    }
}

fn network_error(url: &Url, err: &reqwest::Error) -> FetchError {
    let message = if err.is_timeout() {
        "Request timeout".to_string()
    } else if err.is_connect() {
        "Connection refused".to_string()
    } else if err.is_redirect() {
        "Too many redirects".to_string()
    } else {
        err.to_string()
    };

    FetchError::Network {
        url: url.to_string(),
        message,
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResult, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| network_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(|e| network_error(url, &e))?;

        Ok(FetchResult {
            status: status.as_u16(),
            final_url,
            content_type,
            body: body.to_vec(),
        })
    }
}
