//! Persistence of issued tokens, keyed by account/scope.
//!
//! Caches only store and return what they were given. Expiry is judged by
//! the [`AuthCoordinator`](crate::auth::coordinator::AuthCoordinator), which
//! is also the only writer.

pub mod file;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::error::CacheError;
use crate::auth::token::Token;
use crate::config::settings::CacheConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub token: Token,
    pub fetched_at: i64, // UNIX TIMESTAMP
}

impl CacheEntry {
    pub fn new(token: Token, fetched_at: i64) -> Self {
        Self { token, fetched_at }
    }
}

#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Absent entries and unreadable persisted state both yield `None`.
    async fn get(&self, key: &str) -> Option<Token>;

    async fn set(&self, key: &str, token: Token) -> Result<(), CacheError>;

    /// Short label used in logs and metrics.
    fn kind(&self) -> &'static str;
}

pub fn build_cache(config: &CacheConfig) -> Arc<dyn TokenCache> {
    match config {
        CacheConfig::Memory => Arc::new(memory::MemoryTokenCache::new()),
        CacheConfig::File { path } => Arc::new(file::FileTokenCache::new(path)),
    }
}
