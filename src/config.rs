//! Configuration file parser for ~/.config/agora/config.toml.
//!
//! The file is optional; a missing or empty file yields `Config::default()`.
//! Unknown keys are accepted but logged, so typos show up in agora.log.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding `api_base_url`.
pub const API_URL_ENV: &str = "AGORA_API_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

/// Application configuration. Every key is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the REST API, including the `/api` prefix.
    pub api_base_url: String,

    pub request_timeout_secs: u64,

    /// Communities fetched per sidebar page.
    pub community_page_size: u32,

    pub typeahead_debounce_ms: u64,

    /// Rows from the bottom of the sidebar at which the next page is fetched.
    pub scroll_threshold: usize,

    pub catalog_page_size: u32,

    pub catalog_search_debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".to_string(),
            request_timeout_secs: 30,
            community_page_size: 15,
            typeahead_debounce_ms: 300,
            scroll_threshold: 50,
            catalog_page_size: 12,
            catalog_search_debounce_ms: 400,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "api_base_url",
        "request_timeout_secs",
        "community_page_size",
        "typeahead_debounce_ms",
        "scroll_threshold",
        "catalog_page_size",
        "catalog_search_debounce_ms",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing or blank file → defaults
    /// - Invalid TOML or wrong value types → `ConfigError::Parse`
    /// - Zero page sizes or timeout → replaced by defaults with a warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // size check before reading
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
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        let config = config.sanitized();
        tracing::info!(
            path = %path.display(),
            api_base_url = %config.api_base_url,
            "Loaded configuration"
        );
        Ok(config)
    }

    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.request_timeout_secs == 0 {
            tracing::warn!("request_timeout_secs must be positive, using default");
            self.request_timeout_secs = defaults.request_timeout_secs;
        }
        if self.community_page_size == 0 {
            tracing::warn!("community_page_size must be positive, using default");
            self.community_page_size = defaults.community_page_size;
        }
        if self.catalog_page_size == 0 {
            tracing::warn!("catalog_page_size must be positive, using default");
            self.catalog_page_size = defaults.catalog_page_size;
        }
        self
    }

    /// Apply the environment and command-line base URL overrides.
    /// The command line wins over the environment, which wins over the file.
    pub fn with_api_url_overrides(mut self, env: Option<String>, cli: Option<String>) -> Self {
        if let Some(url) = cli.or(env).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn typeahead_debounce(&self) -> Duration {
        Duration::from_millis(self.typeahead_debounce_ms)
    }

    pub fn catalog_search_debounce(&self) -> Duration {
        Duration::from_millis(self.catalog_search_debounce_ms)
    }
}
