use crate::UrlError;
use url::Url;

/// Normalizes a URL for deduplication
///
/// Only the fragment is removed. Scheme, host, port, path and query are kept
/// as the `url` crate parses them, so normalizing an already normalized URL
/// returns it unchanged.
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - The string is not an absolute URL
///
/// # Examples
///
/// ```
/// use subtrace::url::normalize_url;
///
/// let url = normalize_url("http://x.com/a?b=1#frag").unwrap();
/// assert_eq!(url.as_str(), "http://x.com/a?b=1");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    Ok(strip_fragment(url))
}

/// Removes the fragment from an already parsed URL
pub fn strip_fragment(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

/// Parses and validates a crawl target URL
///
/// The URL must be absolute, use http or https, and carry a host.
pub fn parse_target_url(url_str: &str) -> Result<Url, UrlError> {
    let url = normalize_url(url_str)?;

    if !is_http(&url) {
        return Err(UrlError::InvalidScheme(format!(
            "Only http and https are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}

/// Returns true for http and https URLs
pub fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}
