//! Configuration file parser for ~/.config/feedharvest/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::fetcher::{DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_PAGE_BYTES};
use crate::feed::pagination::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
use crate::harvest::{FailurePolicy, HarvestSettings};
use crate::util::validate_base_url;

/// Public Atom feed endpoint queried when no `base_url` is configured.
pub const DEFAULT_BASE_URL: &str = "https://www.fpds.gov/ezsearch/FEEDS/ATOM?FEEDNAME=PUBLIC";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A value parsed but is outside its allowed range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level harvest configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed endpoint; the `q` and `start` parameters are appended to it.
    pub base_url: String,

    /// Entries per page as served by the feed.
    pub page_size: u64,

    /// Refuse a harvest whose last-page link implies more pages than this.
    pub max_pages: u64,

    /// Maximum number of page requests in flight at once.
    pub max_concurrency: usize,

    /// Deadline for a single page request, body included.
    pub request_timeout_secs: u64,

    /// Largest response body accepted for one page.
    pub max_page_bytes: usize,

    /// Assembler threads. 0 = one per logical CPU.
    pub workers: usize,

    /// `strict` aborts on the first failed page, `collect` keeps going.
    pub failure_policy: FailurePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            request_timeout_secs: 30,
            max_page_bytes: DEFAULT_MAX_PAGE_BYTES,
            workers: 0,
            failure_policy: FailurePolicy::Strict,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "base_url",
                "page_size",
                "max_pages",
                "max_concurrency",
                "request_timeout_secs",
                "max_page_bytes",
                "workers",
                "failure_policy",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), base_url = %config.base_url, "Loaded configuration");
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Checks value ranges and resolves the base URL.
    pub fn harvest_settings(&self) -> Result<HarvestSettings, ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::Invalid("max_pages must be at least 1".into()));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.max_page_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_page_bytes must be at least 1".into(),
            ));
        }
        let base_url = validate_base_url(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url: {}", e)))?;

        Ok(HarvestSettings {
            base_url,
            page_size: self.page_size,
            max_pages: self.max_pages,
            max_concurrency: self.max_concurrency,
            failure_policy: self.failure_policy,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.page_size, 10);
        assert_eq!(config.max_pages, 100_000);
        assert_eq!(config.max_concurrency, 10);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_page_bytes, 10 * 1024 * 1024);
        assert_eq!(config.workers, 0);
        assert_eq!(config.failure_policy, FailurePolicy::Strict);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedharvest_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.page_size, 10);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = std::env::temp_dir().join("feedharvest_config_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = std::env::temp_dir().join("feedharvest_config_test_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "max_concurrency = 4\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.page_size, 10); // default
        assert_eq!(config.failure_policy, FailurePolicy::Strict); // default

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let dir = std::env::temp_dir().join("feedharvest_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
base_url = "https://feeds.example.com/atom?FEEDNAME=TEST"
page_size = 25
max_pages = 500
max_concurrency = 3
request_timeout_secs = 5
max_page_bytes = 2048
workers = 2
failure_policy = "collect"
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_page_bytes, 2048);
        assert_eq!(config.workers, 2);
        assert_eq!(config.failure_policy, FailurePolicy::Collect);

        let settings = config.harvest_settings().unwrap();
        assert_eq!(settings.base_url.host_str(), Some("feeds.example.com"));
        assert_eq!(settings.page_size, 25);
        assert_eq!(settings.max_pages, 500);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("feedharvest_config_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let result = Config::load(&path);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let dir = std::env::temp_dir().join("feedharvest_config_test_unknown");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
page_size = 10
totally_fake_key = "should not fail"
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.page_size, 10);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_failure_policy_returns_error() {
        let dir = std::env::temp_dir().join("feedharvest_config_test_policy");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "failure_policy = \"lenient\"\n").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));

        std::fs::remove_dir_all(&dir).ok();
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("feedharvest_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = "a".repeat(1_048_577);
        std::fs::write(&path, content).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = Config {
            page_size: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.harvest_settings(),
            Err(ConfigError::Invalid(_))
        ));

        let config = Config {
            max_concurrency: 0,
            ..Config::default()
        };
        assert!(config.harvest_settings().is_err());

        let config = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert!(config.harvest_settings().is_err());

        let config = Config {
            max_pages: 0,
            ..Config::default()
        };
        assert!(config.harvest_settings().is_err());
    }

    #[test]
    fn test_zero_max_page_bytes_rejected() {
        let config = Config {
            max_page_bytes: 0,
            ..Config::default()
        };
        let err = config.harvest_settings().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("max_page_bytes"));
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let config = Config {
            base_url: "ftp://example.com/feed".to_string(),
            ..Config::default()
        };
        let err = config.harvest_settings().unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }
}
