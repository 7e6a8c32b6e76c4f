use crate::url::subdomain_of;
use regex::Regex;
use url::Url;

/// Checks whether a URL is excluded by the path or subdomain pattern
///
/// The path pattern is searched (not anchored) in the URL's path component.
/// The subdomain pattern is searched in the extracted subdomain; a URL with
/// no subdomain is never excluded by it.
///
/// # Arguments
///
/// * `url` - The candidate URL
/// * `path_pattern` - Optional regex applied to the path
/// * `subdomain_pattern` - Optional regex applied to the subdomain
///
/// # Examples
///
/// ```
/// use regex::Regex;
/// use url::Url;
/// use subtrace::url::is_excluded;
///
/// let admin = Regex::new("/admin/.*").unwrap();
/// let url = Url::parse("https://example.com/admin/users").unwrap();
/// assert!(is_excluded(&url, Some(&admin), None));
/// ```
pub fn is_excluded(url: &Url, path_pattern: Option<&Regex>, subdomain_pattern: Option<&Regex>) -> bool {
    if let Some(pattern) = path_pattern {
        if pattern.is_match(url.path()) {
            return true;
        }
    }

    if let Some(pattern) = subdomain_pattern {
        if let Some(subdomain) = subdomain_of(url) {
            if pattern.is_match(&subdomain) {
                return true;
            }
        }
    }

    false
}

/// Compiled exclusion rules for one crawl target
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    pub paths: Option<Regex>,
    pub subdomains: Option<Regex>,
}

impl ExclusionRules {
    /// Returns true when no pattern is configured
    pub fn is_empty(&self) -> bool {
        self.paths.is_none() && self.subdomains.is_none()
    }

    pub fn excludes(&self, url: &Url) -> bool {
        is_excluded(url, self.paths.as_ref(), self.subdomains.as_ref())
    }
}
