use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde_json::Value;

use crate::auth::error::TokenError;
use crate::helpers::time::now_i64;

/// Scheme prefix of the `Authorization` header.
pub const AUTHORIZATION_SCHEME: &str = "Bearer";

static EXPIRY_CLAIM: &str = "exp";

// JWT segments are unpadded base64url, but some issuers keep the padding.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Short-lived bearer credential.
///
/// The expiry is read from the token's own `exp` claim. The signature of the
/// issuer is not verified: the token is opaque to the client apart from its
/// claimed lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    raw: String,
    expires_at: i64, // UNIX TIMESTAMP
}

impl Token {
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let raw = raw.trim();
        let parts: Vec<&str> = raw.split('.').collect();
        if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
            return Err(TokenError::Malformed { segments: parts.len() });
        }

        let decoded = PAYLOAD_ENGINE
            .decode(parts[1])
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        let payload: Value = serde_json::from_slice(&decoded)
            .map_err(|e| TokenError::Payload(e.to_string()))?;
        let claims = payload
            .as_object()
            .ok_or_else(|| TokenError::Payload("payload is not a JSON object".to_owned()))?;
        let exp = claims
            .get(EXPIRY_CLAIM)
            .ok_or_else(|| TokenError::Payload(format!("missing '{}' claim", EXPIRY_CLAIM)))?;
        let expires_at = exp
            .as_i64()
            .or_else(|| exp.as_f64().map(|v| v.floor() as i64))
            .ok_or_else(|| TokenError::Payload(format!("'{}' claim is not numeric: {}", EXPIRY_CLAIM, exp)))?;

        Ok(Self {
            raw: raw.to_owned(),
            expires_at,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// No grace period: a token is usable up to and including its `exp` second.
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }

    pub fn is_expired_now(&self) -> bool {
        self.is_expired(now_i64())
    }

    pub fn authorization_header_value(&self) -> String {
        format!("{} {}", AUTHORIZATION_SCHEME, self.raw)
    }
}
