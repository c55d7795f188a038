use std::fmt;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha512};
use tracing::debug;

use crate::auth::error::SigningError;

pub const MIN_KEY_BITS: usize = 1024;

/// Account private key, loaded once from configuration and shared read-only.
pub struct PrivateKey {
    inner: RsaPrivateKey,
}

impl PrivateKey {
    /// Accepts PKCS#8 (`BEGIN PRIVATE KEY`) and PKCS#1 (`BEGIN RSA PRIVATE KEY`) PEM.
    pub fn from_pem(pem: &str) -> Result<Self, SigningError> {
        let pem = pem.trim();
        let inner = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|pkcs8_err| {
                RsaPrivateKey::from_pkcs1_pem(pem).map_err(|pkcs1_err| {
                    SigningError::InvalidKey(format!("pkcs8: {pkcs8_err}; pkcs1: {pkcs1_err}"))
                })
            })?;

        let bits = inner.size() * 8;
        if bits < MIN_KEY_BITS {
            return Err(SigningError::KeyTooSmall { bits, min_bits: MIN_KEY_BITS });
        }
        debug!(bits, "private key loaded");
        Ok(Self { inner })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SigningError> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path)
            .map_err(|e| SigningError::InvalidKey(format!("{}: {}", path.display(), e)))?;
        Self::from_pem(&pem)
    }

    pub fn bits(&self) -> usize {
        self.inner.size() * 8
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey").field("bits", &self.bits()).finish_non_exhaustive()
    }
}

/// RSASSA-PKCS1-v1_5 over SHA-512. Deterministic for a given key and payload.
pub fn sign(payload: &[u8], key: &PrivateKey) -> Result<Vec<u8>, SigningError> {
    if payload.is_empty() {
        return Err(SigningError::EmptyPayload);
    }
    let digest = Sha512::digest(payload);
    let signature = key.inner.sign(Pkcs1v15Sign::new::<Sha512>(), &digest)?;
    Ok(signature)
}

/// [`sign`] followed by standard base64, the form carried in headers and cookies.
pub fn sign_base64(payload: &[u8], key: &PrivateKey) -> Result<String, SigningError> {
    sign(payload, key).map(|signature| STANDARD.encode(signature))
}
