use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::auth::error::CacheError;
use crate::auth::token::Token;
use crate::cache::{CacheEntry, TokenCache};
use crate::helpers::time::now_i64;
use crate::observability::metrics::get_metrics;

static CACHE_KIND: &str = "memory";

/// Process-local cache: key -> last issued token
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenCache {
    inner: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[async_trait]
impl TokenCache for MemoryTokenCache {
    async fn get(&self, key: &str) -> Option<Token> {
        let token = self.entry(key).await.map(|entry| entry.token);
        let result = if token.is_some() { "hit" } else { "miss" };
        get_metrics().await.cache_lookups.with_label_values(&[CACHE_KIND, result]).inc();
        token
    }

    async fn set(&self, key: &str, token: Token) -> Result<(), CacheError> {
        debug!(key, expires_at = token.expires_at(), "memory cache store");
        let mut map = self.inner.write().await;
        map.insert(key.to_string(), CacheEntry::new(token, now_i64()));
        Ok(())
    }

    fn kind(&self) -> &'static str {
        CACHE_KIND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::tests::sample_jwt;

    #[tokio::test]
    async fn set_then_get_returns_same_token() {
        let cache = MemoryTokenCache::new();
        let token = Token::parse(&sample_jwt(now_i64() + 60)).unwrap();

        cache.set("demo:read-write", token.clone()).await.unwrap();

        assert_eq!(cache.get("demo:read-write").await, Some(token));
        assert_eq!(cache.get("demo:read-only").await, None);
    }

    #[tokio::test]
    async fn set_replaces_previous_entry() {
        let cache = MemoryTokenCache::new();
        let old = Token::parse(&sample_jwt(10)).unwrap();
        let new = Token::parse(&sample_jwt(20)).unwrap();

        cache.set("k", old).await.unwrap();
        cache.set("k", new.clone()).await.unwrap();

        let entry = cache.entry("k").await.unwrap();
        assert_eq!(entry.token, new);
        assert!(entry.fetched_at > 0);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn expired_tokens_are_still_returned() {
        let cache = MemoryTokenCache::new();
        let expired = Token::parse(&sample_jwt(1)).unwrap();
        cache.set("k", expired.clone()).await.unwrap();
        assert_eq!(cache.get("k").await, Some(expired));
    }
}
