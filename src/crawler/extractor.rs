//! Link extraction from fetched bodies
//!
//! HTML bodies yield every `a[href]` resolved against the fetched URL. JSON
//! bodies yield every string value that looks like a URL or an absolute path.
//! Other content types yield nothing.

use crate::url::strip_fragment;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

/// How a body should be scanned, decided from its Content-Type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Json,
    Other,
}

impl ContentKind {
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let content_type = content_type.unwrap_or("").to_lowercase();
        if content_type.contains("application/json") {
            Self::Json
        } else if content_type.contains("text/html") {
            Self::Html
        } else {
            Self::Other
        }
    }
}

/// Candidate URLs parsed out of one body
///
/// The body is parsed once; [`Candidates::iter`] can be called any number of
/// times and resolves URLs lazily.
pub enum Candidates {
    Html {
        document: Html,
        selector: Selector,
        base: Url,
    },
    Json {
        value: Value,
        base: Url,
    },
    Empty,
}

impl Candidates {
    /// Parses a body according to its content type
    ///
    /// # Arguments
    ///
    /// * `content_type` - The response Content-Type header, if any
    /// * `body` - The response body
    /// * `base` - URL the body was fetched from, used to resolve relative links
    pub fn parse(content_type: Option<&str>, body: &str, base: &Url) -> Self {
        match ContentKind::from_content_type(content_type) {
            ContentKind::Html => match Selector::parse("a[href]") {
                Ok(selector) => Self::Html {
                    document: Html::parse_document(body),
                    selector,
                    base: base.clone(),
                },
                Err(_) => Self::Empty,
            },
            ContentKind::Json => match serde_json::from_str(body) {
                Ok(value) => Self::Json {
                    value,
                    base: base.clone(),
                },
                Err(e) => {
                    tracing::debug!("Failed to parse JSON from {}: {}", base, e);
                    Self::Empty
                }
            },
            ContentKind::Other => {
                tracing::debug!(
                    "Unsupported content type {} for {}",
                    content_type.unwrap_or("<none>"),
                    base
                );
                Self::Empty
            }
        }
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Iterates over candidate URLs in document order
    pub fn iter(&self) -> Box<dyn Iterator<Item = Url> + '_> {
        match self {
            Self::Html {
                document,
                selector,
                base,
            } => Box::new(
                document
                    .select(selector)
                    .filter_map(|element| element.value().attr("href"))
                    .filter_map(move |href| base.join(href.trim()).ok())
                    .map(strip_fragment),
            ),
            Self::Json { value, base } => Box::new(
                JsonStrings::new(value)
                    .filter(|s| looks_like_link(s))
                    .filter_map(move |s| base.join(s).ok())
                    .map(strip_fragment),
            ),
            Self::Empty => Box::new(std::iter::empty()),
        }
    }
}

fn looks_like_link(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with('/')
}

/// Depth-first walk over every string value in a JSON tree
struct JsonStrings<'a> {
    stack: Vec<&'a Value>,
}

impl<'a> JsonStrings<'a> {
    fn new(root: &'a Value) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for JsonStrings<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(value) = self.stack.pop() {
            match value {
                Value::String(s) => return Some(s),
                Value::Array(items) => self.stack.extend(items.iter().rev()),
                Value::Object(map) => {
                    let values: Vec<&Value> = map.values().collect();
                    self.stack.extend(values.into_iter().rev());
                }
                _ => {}
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/dir/page").unwrap()
    }

    fn collect(candidates: &Candidates) -> Vec<String> {
        candidates.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn test_content_kind() {
        assert_eq!(
            ContentKind::from_content_type(Some("text/html; charset=utf-8")),
            ContentKind::Html
        );
        assert_eq!(
            ContentKind::from_content_type(Some("Application/JSON")),
            ContentKind::Json
        );
        assert_eq!(
            ContentKind::from_content_type(Some("image/png")),
            ContentKind::Other
        );
        assert_eq!(ContentKind::from_content_type(None), ContentKind::Other);
    }

    #[test]
    fn test_html_links_resolved() {
        let html = r#"<html><body>
            <a href="/about">About</a>
            <a href="child">Child</a>
            <a href="https://api.example.com/v1#top">API</a>
            <a name="no-href">Anchor</a>
        </body></html>"#;

        let candidates = Candidates::parse(Some("text/html"), html, &base_url());
        assert_eq!(
            collect(&candidates),
            vec![
                "https://example.com/about",
                "https://example.com/dir/child",
                "https://api.example.com/v1",
            ]
        );
    }

    #[test]
    fn test_html_keeps_other_schemes() {
        // Scheme filtering belongs to the worker
        let html = r#"<a href="mailto:a@example.com">Mail</a><a href="javascript:void(0)">JS</a>"#;
        let candidates = Candidates::parse(Some("text/html"), html, &base_url());
        let schemes: Vec<String> = candidates.iter().map(|u| u.scheme().to_string()).collect();
        assert_eq!(schemes, vec!["mailto", "javascript"]);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let html = r#"<a href="/a">A</a><a href="/b">B</a>"#;
        let candidates = Candidates::parse(Some("text/html"), html, &base_url());
        assert_eq!(collect(&candidates), collect(&candidates));
        assert_eq!(candidates.iter().count(), 2);
    }

    #[test]
    fn test_json_strings_walked_recursively() {
        let json = r#"{
            "self": "https://example.com/api",
            "items": [
                {"href": "/items/1", "name": "first"},
                {"nested": {"deep": ["http://cdn.example.com/x.js", 42, null]}}
            ],
            "note": "relative/ignored"
        }"#;

        let candidates = Candidates::parse(Some("application/json"), json, &base_url());
        let mut urls = collect(&candidates);
        urls.sort();
        assert_eq!(
            urls,
            vec![
                "http://cdn.example.com/x.js",
                "https://example.com/api",
                "https://example.com/items/1",
            ]
        );
    }

    #[test]
    fn test_malformed_json_yields_nothing() {
        let candidates = Candidates::parse(Some("application/json"), "{not json", &base_url());
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_other_content_type_yields_nothing() {
        let candidates = Candidates::parse(Some("text/plain"), "/looks/like/a/path", &base_url());
        assert!(matches!(candidates, Candidates::Empty));
        assert!(candidates.is_empty());
    }
}
