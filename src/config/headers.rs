//! Custom request header parsing
//!
//! Headers come from repeatable `Name: Value` arguments and from a headers
//! file with one header per line.

use crate::config::validation::validate_header_name;
use crate::ConfigError;
use std::collections::BTreeMap;
use std::path::Path;

/// Parses a single `Name: Value` line
///
/// Splits on the first colon and trims both sides. Returns `None` when the
/// line has no colon or an empty name.
pub fn parse_header_line(line: &str) -> Option<(String, String)> {
    let (name, value) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

/// Parses header arguments, skipping malformed entries with a warning
pub fn parse_header_args(args: &[String]) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    for arg in args {
        match parse_header_line(arg) {
            Some((name, value)) if validate_header_name(&name).is_ok() => {
                headers.insert(name, value);
            }
            _ => tracing::warn!("Invalid header format (ignoring): {}", arg),
        }
    }
    headers
}

/// Loads headers from a file
///
/// Blank lines, `#` comments and lines without a colon are ignored.
///
/// # Returns
///
/// * `Ok(BTreeMap)` - Header name to value
/// * `Err(ConfigError)` - The file could not be read or holds an invalid name
pub fn load_headers_file(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut headers = BTreeMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((name, value)) = parse_header_line(line) {
            validate_header_name(&name)?;
            headers.insert(name, value);
        }
    }

    tracing::info!(
        "Loaded {} custom headers from {}",
        headers.len(),
        path.display()
    );
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_simple_header() {
        assert_eq!(
            parse_header_line("X-Api-Key: secret"),
            Some(("X-Api-Key".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn test_parse_splits_on_first_colon() {
        assert_eq!(
            parse_header_line("Referer: https://example.com:8080/"),
            Some(("Referer".to_string(), "https://example.com:8080/".to_string()))
        );
    }

    #[test]
    fn test_parse_without_colon() {
        assert_eq!(parse_header_line("NoColonHere"), None);
        assert_eq!(parse_header_line(": value"), None);
    }

    #[test]
    fn test_args_skip_invalid() {
        let args = vec![
            "Cookie: session=1".to_string(),
            "broken".to_string(),
            "Bad Name: x".to_string(),
        ];
        let headers = parse_header_args(&args);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("Cookie"), Some(&"session=1".to_string()));
    }

    #[test]
    fn test_load_headers_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# auth headers").unwrap();
        writeln!(file, "Authorization: Bearer abc").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "X-Trace: 1").unwrap();
        writeln!(file, "garbage line").unwrap();
        file.flush().unwrap();

        let headers = load_headers_file(file.path()).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("Authorization"), Some(&"Bearer abc".to_string()));
    }

    #[test]
    fn test_load_missing_headers_file() {
        let result = load_headers_file(Path::new("/nonexistent/headers.txt"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
