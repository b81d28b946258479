//! Configuration file parser for ~/.config/kiosk/config.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields`
//! off), though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid api_base_url: {0}")]
    InvalidBaseUrl(String),

    /// Base URL must be HTTPS except for localhost (testing).
    #[error("Insecure api_base_url: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the news aggregation API.
    pub api_base_url: String,

    /// Number of articles requested per feed page.
    pub page_size: u32,

    /// Sort order passed to the general feed endpoint.
    pub sort: String,

    /// Transport-level request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "https://localhost:8001".to_string(),
            page_size: 10,
            sort: "-published_at".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Largest page size the backend will honor.
    const MAX_PAGE_SIZE: u32 = 100;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    /// - Non-HTTPS base URL (except localhost) → `Err(ConfigError::InsecureBaseUrl)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to avoid slurping a corrupted or
        // maliciously large config file into memory.
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
            Ok(_) => {} // Size is within limits, proceed
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

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = ["api_base_url", "page_size", "sort", "timeout_secs"];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let mut config: Config = toml::from_str(&content)?;
        config.validate()?;

        if config.page_size > Self::MAX_PAGE_SIZE {
            tracing::warn!(
                page_size = config.page_size,
                max = Self::MAX_PAGE_SIZE,
                "page_size exceeds backend limit, clamping"
            );
            config.page_size = Self::MAX_PAGE_SIZE;
        }

        tracing::info!(path = %path.display(), base_url = %config.api_base_url, "Loaded configuration");
        Ok(config)
    }

    /// Validate the base URL: parseable, and HTTPS unless pointed at
    /// localhost. Plain HTTP to a remote host would send bearer tokens in
    /// the clear.
    fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.api_base_url)
            .map_err(|e| ConfigError::InvalidBaseUrl(e.to_string()))?;

        match parsed.scheme() {
            "https" => Ok(()),
            "http" => {
                let is_localhost = matches!(parsed.host_str(), Some("localhost" | "127.0.0.1"));
                if is_localhost {
                    tracing::warn!(base_url = %self.api_base_url, "Using non-HTTPS API base URL (localhost only)");
                    Ok(())
                } else {
                    tracing::error!(base_url = %self.api_base_url, "Rejecting non-HTTPS base URL (HTTPS required except for localhost)");
                    Err(ConfigError::InsecureBaseUrl)
                }
            }
            other => Err(ConfigError::InvalidBaseUrl(format!(
                "unsupported scheme '{}'",
                other
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
