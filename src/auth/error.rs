use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

/// Failures while turning a raw credential string into a [`Token`](crate::auth::token::Token).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The credential does not consist of exactly three non-empty `.` separated segments.
    #[error("malformed token: expected 3 non-empty segments, got {segments}")]
    Malformed { segments: usize },
    #[error("token payload is not valid base64url: {0}")]
    Encoding(String),
    #[error("token payload is invalid: {0}")]
    Payload(String),
}

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("refusing to sign an empty payload")]
    EmptyPayload,
    #[error("private key could not be parsed: {0}")]
    InvalidKey(String),
    #[error("private key is {bits} bits, at least {min_bits} bits are required")]
    KeyTooSmall { bits: usize, min_bits: usize },
    #[error("signature computation failed: {0}")]
    Signature(#[from] rsa::Error),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("login is required to request a token")]
    MissingLogin,
    #[error("token request could not be serialized: {0}")]
    Encode(String),
}

/// Why a token could not be issued. Never retried internally; callers that
/// queued behind the failing issuance receive the same failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("token endpoint unreachable: {0}")]
    Transport(String),
    #[error("token endpoint did not answer within {0:?}")]
    Timeout(Duration),
    #[error("token endpoint answered {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("token endpoint returned an unusable token: {0}")]
    InvalidResponse(#[from] TokenError),
    #[error("configured token expired at {expired_at} and no private key is available to renew it")]
    Expired { expired_at: i64 },
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("neither a private key nor a token is configured")]
    NoCredentials,
    #[error("configured token is unusable: {0}")]
    InvalidToken(TokenError),
    #[error("authentication failed: {0}")]
    Failed(#[from] AuthFailure),
}

impl AuthError {
    /// True for failures of the remote issuance call itself.
    pub fn is_auth_failed(&self) -> bool {
        matches!(self, AuthError::Failed(_))
    }
}

/// Write-side failures of a persistent cache. Reads never fail.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cache serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
