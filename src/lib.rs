//! # Hosting API authentication
//!
//! Turns an account private key (or a previously issued token) into
//! short-lived bearer tokens, cached and shared between concurrent callers,
//! and signs calls of the legacy parameter-ordered convention.
//!
//! Modules:
//! - `auth`: signing, token parsing, token requests and the coordinator
//! - `cache`: in-memory and file-backed token caches
//! - `transport`: the HTTP executor used for issuance
//! - `legacy`: ordered parameter encoding and legacy call signing
//! - `config`: client configuration and loader

pub mod auth;
pub mod cache;
pub mod config;
pub mod helpers;
pub mod legacy;
pub mod observability;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::auth::coordinator::AuthCoordinator;
pub use crate::auth::error::{AuthError, AuthFailure, SigningError, TokenError};
pub use crate::auth::signer::PrivateKey;
pub use crate::auth::token::Token;
pub use crate::config::settings::ClientConfig;
