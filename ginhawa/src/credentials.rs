//! API key lookup
//!
//! The key is read fresh at the start of every run, so rotating the
//! environment value takes effect without a restart.

use crate::error::ErrorInfo;

/// Placeholder shipped in sample configuration; treated as no key at all
pub const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY_HERE";

/// Source of the API key
pub trait CredentialProvider: Send + Sync {
    /// Current raw value, if any
    fn api_key(&self) -> Option<String>;
}

/// Reads the key from an environment variable on every lookup
#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialProvider for EnvCredential {
    fn api_key(&self) -> Option<String> {
        std::env::var(&self.var).ok()
    }
}

/// A fixed key, mostly for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(pub Option<String>);

impl StaticCredential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Some(key.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl CredentialProvider for StaticCredential {
    fn api_key(&self) -> Option<String> {
        self.0.clone()
    }
}

/// A key that passed the presence check
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Read and check the key: absent, blank or placeholder fails
pub fn resolve(provider: &dyn CredentialProvider) -> Result<ApiKey, ErrorInfo> {
    match provider.api_key() {
        Some(key) => {
            let key = key.trim();
            if key.is_empty() || key == PLACEHOLDER_API_KEY {
                Err(ErrorInfo::missing_credential())
            } else {
                Ok(ApiKey(key.to_string()))
            }
        }
        None => Err(ErrorInfo::missing_credential()),
    }
}
