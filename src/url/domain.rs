use url::{Host, Url};

/// Extracts the lowercase host of a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use subtrace::url::extract_domain;
///
/// let url = Url::parse("https://API.Example.com:8080/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("api.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the registrable domain (domain label + public suffix) of a URL
///
/// IP addresses and bare suffixes such as `localhost` are their own
/// registrable domain. Hosts on a suffix the public suffix list does not know
/// use their last label as the suffix.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use subtrace::url::registrable_domain;
///
/// let url = Url::parse("https://api.example.co.uk/").unwrap();
/// assert_eq!(registrable_domain(&url), Some("example.co.uk".to_string()));
/// ```
pub fn registrable_domain(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
        Host::Domain(host) => {
            let host = host.trim_end_matches('.').to_lowercase();
            let (_, registrable) = split_host(&host)?;
            Some(registrable.to_string())
        }
    }
}

/// Splits a lowercase domain host into (subdomain labels, registrable domain)
fn split_host(host: &str) -> Option<(Option<&str>, &str)> {
    if host.is_empty() {
        return None;
    }

    let suffix = public_suffix(host);
    if suffix.len() >= host.len() {
        return Some((None, host));
    }

    // host = "<rest>.<suffix>"
    let rest = &host[..host.len() - suffix.len() - 1];
    match rest.rfind('.') {
        Some(idx) => Some((Some(&rest[..idx]), &host[idx + 1..])),
        None => Some((None, host)),
    }
}

/// Returns the public suffix of a host, falling back to its last label
fn public_suffix(host: &str) -> &str {
    let last_label = host.rsplit('.').next().unwrap_or(host);

    match psl::suffix_str(host) {
        Some(suffix)
            if !suffix.is_empty()
                && host.ends_with(suffix)
                && (suffix.len() == host.len()
                    || host.as_bytes()[host.len() - suffix.len() - 1] == b'.') =>
        {
            suffix
        }
        _ => last_label,
    }
}

/// Checks whether two URLs share a registrable domain
///
/// `api.example.com` and `example.com` match; `example.com` and
/// `example.org` do not. URLs without a host never match.
pub fn same_registrable_domain(a: &Url, b: &Url) -> bool {
    match (registrable_domain(a), registrable_domain(b)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

/// Extracts the subdomain of a URL as a full host name
///
/// Returns `None` when the host has no labels below its registrable domain
/// or when the only such label is `www`.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use subtrace::url::subdomain_of;
///
/// let api = Url::parse("https://api.example.com/x").unwrap();
/// assert_eq!(subdomain_of(&api), Some("api.example.com".to_string()));
///
/// let www = Url::parse("https://www.example.com").unwrap();
/// assert_eq!(subdomain_of(&www), None);
/// ```
pub fn subdomain_of(url: &Url) -> Option<String> {
    let host = match url.host()? {
        Host::Domain(host) => host.trim_end_matches('.').to_lowercase(),
        _ => return None,
    };

    let (labels, registrable) = split_host(&host)?;
    match labels {
        Some(labels) if !labels.is_empty() && labels != "www" => {
            Some(format!("{}.{}", labels, registrable))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_extract_with_port() {
        assert_eq!(
            extract_domain(&url("https://example.com:8080/")),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_registrable_simple() {
        assert_eq!(
            registrable_domain(&url("https://example.com/")),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_registrable_nested_subdomain() {
        assert_eq!(
            registrable_domain(&url("https://a.b.c.example.com/")),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_registrable_multi_label_suffix() {
        assert_eq!(
            registrable_domain(&url("https://shop.example.co.uk/")),
            Some("example.co.uk".to_string())
        );
    }

    #[test]
    fn test_registrable_ip_address() {
        assert_eq!(
            registrable_domain(&url("http://127.0.0.1:8080/")),
            Some("127.0.0.1".to_string())
        );
    }

    #[test]
    fn test_registrable_unknown_suffix() {
        assert_eq!(
            registrable_domain(&url("http://api.site.test/")),
            Some("site.test".to_string())
        );
    }

    #[test]
    fn test_same_domain_with_subdomain() {
        assert!(same_registrable_domain(
            &url("https://api.example.com/x"),
            &url("https://example.com/")
        ));
    }

    #[test]
    fn test_different_suffix_not_same() {
        assert!(!same_registrable_domain(
            &url("https://example.com/"),
            &url("https://example.org/")
        ));
    }

    #[test]
    fn test_different_domain_not_same() {
        assert!(!same_registrable_domain(
            &url("https://example.com/"),
            &url("https://notexample.com/")
        ));
    }

    #[test]
    fn test_same_domain_ignores_scheme_and_port() {
        assert!(same_registrable_domain(
            &url("http://example.com:8080/"),
            &url("https://blog.example.com/")
        ));
    }

    #[test]
    fn test_subdomain_api() {
        assert_eq!(
            subdomain_of(&url("https://api.example.com/x")),
            Some("api.example.com".to_string())
        );
    }

    #[test]
    fn test_subdomain_www_excluded() {
        assert_eq!(subdomain_of(&url("https://www.example.com")), None);
    }

    #[test]
    fn test_subdomain_bare_domain() {
        assert_eq!(subdomain_of(&url("https://example.com")), None);
    }

    #[test]
    fn test_subdomain_nested_keeps_all_labels() {
        assert_eq!(
            subdomain_of(&url("https://v2.api.example.com/")),
            Some("v2.api.example.com".to_string())
        );
    }

    #[test]
    fn test_subdomain_www_with_more_labels() {
        assert_eq!(
            subdomain_of(&url("https://www.dev.example.com/")),
            Some("www.dev.example.com".to_string())
        );
    }

    #[test]
    fn test_subdomain_lowercased() {
        assert_eq!(
            subdomain_of(&url("https://API.Example.com/")),
            Some("api.example.com".to_string())
        );
    }

    #[test]
    fn test_subdomain_ip_is_none() {
        assert_eq!(subdomain_of(&url("http://127.0.0.1/")), None);
    }

    #[test]
    fn test_subdomain_multi_label_suffix() {
        assert_eq!(
            subdomain_of(&url("https://shop.example.co.uk/")),
            Some("shop.example.co.uk".to_string())
        );
        assert_eq!(subdomain_of(&url("https://example.co.uk/")), None);
    }
}
