use std::path::Path;

use anyhow::{anyhow, bail, Result};
use regex::Regex;
use tracing::{debug, error};

use crate::config::settings::{ClientConfig, LoggingConfig};

/// Load, expand and validate a client config from a YAML file.
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<ClientConfig> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow!("cannot read config {}: {}", path.display(), e))?;
    parse_config(&expand_env_vars(&content))
}

pub fn parse_config(content: &str) -> Result<ClientConfig> {
    let mut config: ClientConfig = serde_yaml::from_str(content)
        .inspect_err(|e| error!("parse config error: {}", e))
        .map_err(|e| anyhow!("Invalid config format: {}", e))?;

    // Apply defaults
    if config.logging.is_none() {
        config.logging = Some(LoggingConfig::default());
    }
    if config.label.as_deref().is_some_and(|label| label.trim().is_empty()) {
        config.label = None;
    }

    debug!("validation config ...");
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &ClientConfig) -> Result<()> {
    if !config.has_private_key() && config.token.is_none() {
        bail!("either 'private_key', 'private_key_path' or 'token' must be configured");
    }
    if config.has_private_key()
        && config.login.as_deref().map(str::trim).unwrap_or_default().is_empty()
    {
        bail!("'login' is required when a private key is configured");
    }
    if !(config.endpoint.starts_with("https://") || config.endpoint.starts_with("http://")) {
        bail!("'endpoint' must be an http(s) url, got '{}'", config.endpoint);
    }
    if config.timeout_seconds == 0 {
        bail!("'timeout_seconds' must be greater than 0");
    }
    Ok(())
}

/// Replaces `${VAR}` and `${VAR:default}` with the environment value.
fn expand_env_vars(input: &str) -> String {
    let re = match Regex::new(r"\$\{(\w+)(?::([^\}]+))?\}") {
        Ok(re) => re,
        Err(_) => return input.to_owned(),
    };
    re.replace_all(input, |caps: &regex::Captures| {
        let var = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}
