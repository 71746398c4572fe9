//! Service configuration
//!
//! Layered with figment: built-in defaults, then an optional TOML file,
//! then `GINHAWA_*` environment variables. The API key itself is not part of
//! the configuration; only the name of the variable holding it is.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "GINHAWA_";

/// Default request body limit; fits a data URI for a 20+ MB photo
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listen address
    pub bind_addr: SocketAddr,
    /// Generative-language REST base URL
    pub api_base_url: String,
    /// Vision-description model
    pub analysis_model: String,
    /// Image-synthesis model
    pub synthesis_model: String,
    /// Per-request HTTP timeout in seconds; 0 disables it
    pub request_timeout_secs: u64,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Largest accepted request body, in bytes (uploads arrive as base64)
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            analysis_model: "gemini-2.5-flash".to_string(),
            synthesis_model: "imagen-3.0-generate-002".to_string(),
            request_timeout_secs: 120,
            api_key_env: "API_KEY".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    /// Built-in defaults
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
    }

    /// Load from an optional TOML file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Self::figment();
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|e| ConfigError::Invalid(Box::new(e)))
    }

    /// HTTP timeout, if enabled
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.analysis_model, "gemini-2.5-flash");
        assert_eq!(config.synthesis_model, "imagen-3.0-generate-002");
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(config.api_key_env, "API_KEY");
        assert_eq!(config.max_upload_bytes, 32 * 1024 * 1024);
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ginhawa.toml");
        std::fs::write(
            &path,
            "bind_addr = \"0.0.0.0:9090\"\nrequest_timeout_secs = 0\napi_key_env = \"GEMINI_KEY\"\nmax_upload_bytes = 1048576\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.bind_addr.port(), 9090);
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.api_key_env, "GEMINI_KEY");
        assert_eq!(config.max_upload_bytes, 1024 * 1024);
        assert_eq!(config.analysis_model, "gemini-2.5-flash");
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/ginhawa.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_invalid_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ginhawa.toml");
        std::fs::write(&path, "bind_addr = \"not an address\"\n").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
