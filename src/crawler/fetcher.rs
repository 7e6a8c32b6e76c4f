//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the target's user agent, headers and proxy
//! - GET requests with redirect following and a per-request timeout
//! - Error classification into recordable outcomes

use crate::config::CrawlTarget;
use crate::storage::truncate_message;
use crate::{ConfigError, CrawlError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client, ClientBuilder, Proxy, StatusCode};
use std::time::{Duration, Instant};
use url::Url;

/// Maximum redirect hops followed per request
pub const MAX_REDIRECTS: usize = 10;

/// Headers sent with every request unless overridden by name
const DEFAULT_HEADERS: [(&str, &str); 4] = [
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8,application/json",
    ),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("DNT", "1"),
    ("Upgrade-Insecure-Requests", "1"),
];

/// Result of a fetch attempt
#[derive(Debug)]
pub enum FetchOutcome {
    /// HTTP 200 with a readable body
    Success {
        /// Final URL after redirects
        final_url: Url,
        content_type: Option<String>,
        body: String,
        elapsed: Duration,
    },

    /// HTTP 200 whose body could not be read
    BodyError {
        content_type: Option<String>,
        elapsed: Duration,
        error: String,
    },

    /// Any status other than 200
    HttpStatus {
        status_code: u16,
        content_type: Option<String>,
        elapsed: Duration,
    },

    /// The request exceeded the configured timeout
    Timeout,

    /// Transport, proxy, TLS or redirect failure
    ClientError(String),
}

impl FetchOutcome {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Success { .. } | Self::BodyError { .. } => Some(StatusCode::OK.as_u16()),
            Self::HttpStatus { status_code, .. } => Some(*status_code),
            Self::Timeout | Self::ClientError(_) => None,
        }
    }
}

/// Builds the request headers: defaults first, then the target's custom headers
///
/// # Returns
///
/// * `Ok(HeaderMap)` - Merged headers
/// * `Err(ConfigError::InvalidHeader)` - A custom header name or value is invalid
pub fn request_headers(target: &CrawlTarget) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();

    let defaults = DEFAULT_HEADERS
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()));
    let custom = target
        .headers
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()));

    for (name, value) in defaults.chain(custom) {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::InvalidHeader(name.clone()))?;
        let header_value = HeaderValue::from_str(&value)
            .map_err(|_| ConfigError::InvalidHeader(format!("{}: {}", name, value)))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

/// Prepares a client builder configured for a crawl target
///
/// Callers may adjust the builder (for example DNS overrides) before
/// building it.
pub fn client_builder(target: &CrawlTarget) -> Result<ClientBuilder, CrawlError> {
    let mut builder = Client::builder()
        .user_agent(target.user_agent.clone())
        .default_headers(request_headers(target)?)
        .timeout(target.timeout)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = &target.proxy {
        builder = builder.proxy(Proxy::all(proxy.as_str())?);
    }

    Ok(builder)
}

/// Builds an HTTP client for a crawl target
///
/// # Arguments
///
/// * `target` - The crawl target carrying user agent, headers, timeout and proxy
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(CrawlError)` - Invalid header or proxy, or the TLS backend failed
pub fn build_http_client(target: &CrawlTarget) -> Result<Client, CrawlError> {
    Ok(client_builder(target)?.build()?)
}

/// Fetches a URL and classifies the result
///
/// | Condition | Outcome |
/// |-----------|---------|
/// | HTTP 200 | `Success` (or `BodyError` if the body read fails) |
/// | Any other status | `HttpStatus` |
/// | Timeout | `Timeout` |
/// | Anything else | `ClientError` with a capped message |
pub async fn fetch_url(client: &Client, url: &Url) -> FetchOutcome {
    let started = Instant::now();

    let response = match client.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => return classify_error(&e),
    };

    let elapsed = started.elapsed();
    let status = response.status();
    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    if status != StatusCode::OK {
        return FetchOutcome::HttpStatus {
            status_code: status.as_u16(),
            content_type,
            elapsed,
        };
    }

    match response.text().await {
        Ok(body) => FetchOutcome::Success {
            final_url,
            content_type,
            body,
            elapsed,
        },
        Err(e) => FetchOutcome::BodyError {
            content_type,
            elapsed,
            error: error_message(&e),
        },
    }
}

fn classify_error(error: &reqwest::Error) -> FetchOutcome {
    if error.is_timeout() {
        FetchOutcome::Timeout
    } else {
        FetchOutcome::ClientError(error_message(error))
    }
}

fn error_message(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else {
        truncate_message(&format!("Client error: {}", error))
    }
}
