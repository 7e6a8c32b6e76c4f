//! Configuration module for Subtrace
//!
//! This module handles loading TOML settings files, parsing custom headers,
//! and validating everything into an immutable [`CrawlTarget`].
//!
//! # Example
//!
//! ```no_run
//! use subtrace::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("subtrace.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.target.max_depth);
//! ```

mod headers;
mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CrawlSettings, CrawlTarget, OutputSettings, Settings, StorageOptions, StorageSettings,
    DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use headers::{load_headers_file, parse_header_args, parse_header_line};
pub use parser::{load_config, load_settings, resolve_settings, ResolvedConfig};
pub use validation::{build_storage_options, build_target};
