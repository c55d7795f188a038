use std::time::Duration;

use serde::Deserialize;

use crate::auth::error::SigningError;
use crate::auth::signer::PrivateKey;

pub const DEFAULT_ENDPOINT: &str = "https://api.example.com/v6";
pub const DEFAULT_TOKEN_EXPIRATION: &str = "1 day";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// ================================
/// Client configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// account name, required when a private key is used
    pub login: Option<String>,
    /// inline PEM
    pub private_key: Option<String>,
    pub private_key_path: Option<String>,
    /// previously issued bearer token, used instead of a private key
    pub token: Option<String>,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub read_only: bool,
    /// requested lifetime, e.g. "30 minutes" or "1 day"
    #[serde(default = "default_token_expiration")]
    pub token_expiration: String,
    pub label: Option<String>,
    #[serde(default)]
    pub allow_any_source: bool,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub cache: CacheConfig,
    pub logging: Option<LoggingConfig>,
}

impl ClientConfig {
    /// Minimal configuration for a key-based client.
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: Some(login.into()),
            private_key: None,
            private_key_path: None,
            token: None,
            endpoint: default_endpoint(),
            read_only: false,
            token_expiration: default_token_expiration(),
            label: None,
            allow_any_source: false,
            timeout_seconds: default_timeout_seconds(),
            cache: CacheConfig::default(),
            logging: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn token_url(&self) -> String {
        format!("{}/auth", self.endpoint.trim_end_matches('/'))
    }

    /// Tokens of different scopes are never shared.
    pub fn cache_key(&self) -> String {
        let login = self.login.as_deref().unwrap_or("anonymous");
        let mode = if self.read_only { "read-only" } else { "read-write" };
        if self.allow_any_source {
            format!("{}:{}:global", login, mode)
        } else {
            format!("{}:{}", login, mode)
        }
    }

    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some() || self.private_key_path.is_some()
    }

    /// Inline PEM wins over the key path.
    pub fn load_private_key(&self) -> Result<Option<PrivateKey>, SigningError> {
        match (&self.private_key, &self.private_key_path) {
            (Some(pem), _) => PrivateKey::from_pem(pem).map(Some),
            (None, Some(path)) => PrivateKey::from_file(path).map(Some),
            (None, None) => Ok(None),
        }
    }
}

/// ================================
/// Token cache
/// ================================
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheConfig {
    #[default]
    Memory,
    File { path: String },
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new("info".to_owned(), LogFormat::Compact)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_token_expiration() -> String {
    DEFAULT_TOKEN_EXPIRATION.to_string()
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}
