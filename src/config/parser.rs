use crate::config::types::{CrawlTarget, OutputSettings, Settings, StorageOptions};
use crate::config::validation::{build_storage_options, build_target};
use crate::ConfigError;
use std::path::Path;

/// Fully validated configuration for one run
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub target: CrawlTarget,
    pub storage: StorageOptions,
    pub output: OutputSettings,
}

/// Loads and parses a settings file without validating it
///
/// Validation is deferred because command line flags may still fill in or
/// override fields (the target url in particular).
///
/// # Arguments
///
/// * `path` - Path to the TOML settings file
///
/// # Returns
///
/// * `Ok(Settings)` - Successfully parsed settings
/// * `Err(ConfigError)` - Failed to read or parse the file
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use subtrace::config::load_settings;
///
/// let settings = load_settings(Path::new("subtrace.toml")).unwrap();
/// println!("Target: {:?}", settings.crawl.url);
/// ```
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let settings: Settings = toml::from_str(&content)?;
    Ok(settings)
}

/// Validates settings and resolves every default
pub fn resolve_settings(settings: &Settings) -> Result<ResolvedConfig, ConfigError> {
    let target = build_target(&settings.crawl)?;
    let storage = build_storage_options(&settings.storage)?;

    Ok(ResolvedConfig {
        target,
        storage,
        output: settings.output.clone(),
    })
}

/// Loads a settings file and validates it in one step
pub fn load_config(path: &Path) -> Result<ResolvedConfig, ConfigError> {
    let settings = load_settings(path)?;
    resolve_settings(&settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawl]
url = "https://example.com"
max-depth = 4
workers = 10
rate-limit = 0.3
timeout = 8
exclude-paths = "/admin/.*"

[crawl.headers]
Authorization = "Bearer token"

[storage]
database-path = "./crawl.db"
buffer-size = 50
buffer-dir = "./buffers"
flush-interval-ms = 250

[output]
prefix = "out"
json = true
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.target.base_url.as_str(), "https://example.com/");
        assert_eq!(config.target.max_depth, 4);
        assert_eq!(config.target.workers, 10);
        assert_eq!(config.target.timeout, Duration::from_secs(8));
        assert!(config.target.exclude_paths().is_some());
        assert_eq!(
            config.target.headers.get("Authorization"),
            Some(&"Bearer token".to_string())
        );
        assert_eq!(config.storage.buffer_size, 50);
        assert_eq!(config.storage.flush_interval, Duration::from_millis(250));
        assert_eq!(config.output.prefix.as_deref(), Some("out"));
        assert!(config.output.json);
    }

    #[test]
    fn test_empty_file_parses_to_defaults() {
        let file = create_temp_config("");
        let settings = load_settings(file.path()).unwrap();
        assert!(settings.crawl.url.is_none());
        assert!(settings.storage.database_path.is_none());
        assert!(!settings.output.json);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[crawl]
url = "https://example.com"
workers = 0
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }
}
