use std::sync::atomic::{AtomicU32, Ordering};

use rand::RngCore;
use serde::Serialize;

use crate::auth::error::RequestError;
use crate::config::settings::{ClientConfig, DEFAULT_TOKEN_EXPIRATION};
use crate::helpers::time::now_u64;

static LABEL_PREFIX: &str = "hostapi-auth";

static NONCE_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Body of a token issuance call. Field order is the serialized order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenRequest {
    pub login: String,
    pub nonce: String,
    pub read_only: bool,
    pub expiration_time: String,
    pub label: String,
    /// When false the token is only accepted from the requesting source address.
    #[serde(rename = "global_key")]
    pub allow_any_source: bool,
}

impl TokenRequest {
    /// Exact bytes that are signed and sent as the request body.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, RequestError> {
        serde_json::to_vec(self).map_err(|e| RequestError::Encode(e.to_string()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenRequestBuilder {
    login: Option<String>,
    read_only: bool,
    expiration_time: Option<String>,
    label: Option<String>,
    allow_any_source: bool,
}

impl TokenRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            login: config.login.clone(),
            read_only: config.read_only,
            expiration_time: Some(config.token_expiration.clone()),
            label: config.label.clone(),
            allow_any_source: config.allow_any_source,
        }
    }

    pub fn login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn expiration_time(mut self, expiration_time: impl Into<String>) -> Self {
        self.expiration_time = Some(expiration_time.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn allow_any_source(mut self, allow_any_source: bool) -> Self {
        self.allow_any_source = allow_any_source;
        self
    }

    /// Every call yields a fresh nonce.
    pub fn build(&self) -> Result<TokenRequest, RequestError> {
        let login = self
            .login
            .as_deref()
            .map(str::trim)
            .filter(|login| !login.is_empty())
            .ok_or(RequestError::MissingLogin)?;

        Ok(TokenRequest {
            login: login.to_owned(),
            nonce: new_nonce(),
            read_only: self.read_only,
            expiration_time: self
                .expiration_time
                .clone()
                .unwrap_or_else(|| DEFAULT_TOKEN_EXPIRATION.to_owned()),
            label: self
                .label
                .clone()
                .unwrap_or_else(|| format!("{}-{}", LABEL_PREFIX, now_u64())),
            allow_any_source: self.allow_any_source,
        })
    }
}

/// 32 hex characters: 96 random bits followed by a process-wide counter.
pub fn new_nonce() -> String {
    let mut random = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut random);
    let counter = NONCE_COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut nonce = String::with_capacity(32);
    for byte in random {
        nonce.push_str(&format!("{:02x}", byte));
    }
    nonce.push_str(&format!("{:08x}", counter));
    nonce
}
