//! # Application Configuration
//!
//! Optional TOML file passed with `--config`:
//!
//! ```toml
//! [indexer]
//! log_root = "logs"
//! job_prefixes = ["periodic-ci-openshift-release-", "release-openshift-"]
//! required_metric = "job:duration:total:seconds"
//! index_failures = false
//!
//! [server]
//! timeout_secs = 10
//! max_body_bytes = 2097152
//! push_token = "shared-secret"
//! subscriptions = ["projects/ci/subscriptions/job-artifacts"]
//! rate_limit = 100
//! ```
//!
//! Every key is optional. Unknown keys are rejected so typos surface at
//! startup instead of silently falling back to defaults.
//!
//! `JOBINDEX_PUSH_TOKEN` and `JOBINDEX_RATE_LIMIT` override the matching
//! `[server]` keys.

use jobindex_core::{IndexError, IndexerConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default wall-clock limit for one invocation.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default request body limit (2 MB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Default request budget per second across all push endpoints.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Environment variable holding the push token.
pub const PUSH_TOKEN_VAR: &str = "JOBINDEX_PUSH_TOKEN";

/// Environment variable holding the rate limit.
pub const RATE_LIMIT_VAR: &str = "JOBINDEX_RATE_LIMIT";

/// Largest configuration file accepted.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub timeout_secs: u64,
    pub max_body_bytes: usize,
    /// Token the push subscription sends, as a bearer header or `?token=`.
    /// Unset leaves the endpoints open.
    pub push_token: Option<String>,
    /// Pub/Sub subscriptions allowed to push. Empty accepts any.
    pub subscriptions: Vec<String>,
    /// Requests per second; 0 disables limiting.
    pub rate_limit: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            push_token: None,
            subscriptions: Vec::new(),
            rate_limit: DEFAULT_RATE_LIMIT,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Whole-application settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub indexer: IndexerConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Parse TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, IndexError> {
        toml::from_str(text).map_err(|e| IndexError::Decode {
            context: "configuration".to_string(),
            reason: e.to_string(),
        })
    }

    /// Load `path`, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, IndexError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let metadata = std::fs::metadata(path).map_err(|e| {
            IndexError::Io(format!("Cannot read config file '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(IndexError::Serialization(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            IndexError::Io(format!("Cannot read config file '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply environment overrides looked up through `var`.
    ///
    /// An empty token clears the configured one. An unparsable rate limit
    /// is ignored with a warning.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(token) = var(PUSH_TOKEN_VAR) {
            self.server.push_token = Some(token).filter(|t| !t.is_empty());
        }

        if let Some(raw) = var(RATE_LIMIT_VAR) {
            match raw.trim().parse() {
                Ok(rate) => self.server.rate_limit = rate,
                Err(e) => tracing::warn!(
                    "Ignoring {}={:?}: {}, keeping {} requests/second",
                    RATE_LIMIT_VAR,
                    raw,
                    e,
                    self.server.rate_limit
                ),
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = AppConfig::from_toml_str("").expect("parse");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server.timeout(), Duration::from_secs(10));
        assert!(!config.indexer.index_failures);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [indexer]
            index_failures = true
            job_prefixes = ["nightly-"]

            [server]
            timeout_secs = 3
            "#,
        )
        .expect("parse");

        assert!(config.indexer.index_failures);
        assert_eq!(config.indexer.job_prefixes, vec!["nightly-".to_string()]);
        assert_eq!(config.indexer.log_root, "logs");
        assert_eq!(config.server.timeout_secs, 3);
        assert_eq!(config.server.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn push_settings_parse() {
        let config = AppConfig::from_toml_str(
            r#"
            [server]
            push_token = "s3cret"
            subscriptions = ["projects/ci/subscriptions/artifacts"]
            rate_limit = 0
            "#,
        )
        .expect("parse");

        assert_eq!(config.server.push_token.as_deref(), Some("s3cret"));
        assert_eq!(config.server.subscriptions.len(), 1);
        assert_eq!(config.server.rate_limit, 0);
        assert_eq!(AppConfig::default().server.rate_limit, DEFAULT_RATE_LIMIT);
    }

    #[test]
    fn environment_overrides_server_keys() {
        let mut config = AppConfig::from_toml_str("[server]\npush_token = \"file\"\n").expect("parse");
        config.apply_env(|name| match name {
            PUSH_TOKEN_VAR => Some("env".to_string()),
            RATE_LIMIT_VAR => Some(" 7 ".to_string()),
            _ => None,
        });
        assert_eq!(config.server.push_token.as_deref(), Some("env"));
        assert_eq!(config.server.rate_limit, 7);

        config.apply_env(|name| match name {
            PUSH_TOKEN_VAR => Some(String::new()),
            RATE_LIMIT_VAR => Some("fast".to_string()),
            _ => None,
        });
        assert_eq!(config.server.push_token, None);
        assert_eq!(config.server.rate_limit, 7);

        let mut untouched = AppConfig::default();
        untouched.apply_env(|_| None);
        assert_eq!(untouched, AppConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = AppConfig::from_toml_str("[server]\ntimeout = 3\n").expect_err("unknown key");
        assert!(err.to_string().contains("configuration"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/jobindex.toml")))
            .expect_err("missing file");
        assert!(err.is_transient());
        assert_eq!(AppConfig::load(None).expect("defaults"), AppConfig::default());
    }
}
