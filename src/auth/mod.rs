//! Token issuance: signing, token parsing and the cache-backed coordinator.

pub mod coordinator;
pub mod error;
pub mod request;
pub mod signer;
pub mod token;
