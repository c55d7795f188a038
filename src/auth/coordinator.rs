use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::auth::error::{AuthError, AuthFailure, TokenError};
use crate::auth::request::TokenRequestBuilder;
use crate::auth::signer::{sign_base64, PrivateKey};
use crate::auth::token::Token;
use crate::cache::{build_cache, TokenCache};
use crate::config::settings::{ClientConfig, DEFAULT_TIMEOUT_SECONDS};
use crate::helpers::time::{get_instant, now_i64};
use crate::observability::metrics::get_metrics;
use crate::transport::{HttpExecutor, HttpRequest, TransportError};

/// Header carrying the base64 signature of the token request body.
pub const SIGNATURE_HEADER: &str = "signature";

static TOKEN_RESPONSE_FIELD: &str = "token";

/// Result of one network issuance, handed to every caller that queued behind it.
type Outcome = Result<Token, AuthFailure>;

// One per cache key. Holding `slot` means owning the only issuance in flight
// for that key. `completed` counts finished issuances: a caller that sees it
// move while queued takes the outcome left in `slot` instead of issuing again.
#[derive(Default)]
struct Flight {
    completed: AtomicU64,
    slot: Mutex<Option<Outcome>>,
}

impl Flight {
    fn holds_valid_token(outcome: &Option<Outcome>) -> bool {
        matches!(outcome, Some(Ok(token)) if !token.is_expired(now_i64()))
    }
}

/// Everything needed to issue tokens from a private key.
struct Issuer {
    key: Arc<PrivateKey>,
    request_builder: TokenRequestBuilder,
    token_url: String,
    cache: Arc<dyn TokenCache>,
    executor: Arc<dyn HttpExecutor>,
    // entries live while a flight is queued or while they hold a valid token
    flights: StdMutex<HashMap<String, Arc<Flight>>>,
}

enum Credentials {
    Issuer(Issuer),
    Static(Token),
}

/// Hands out valid tokens, issuing a new one only when the cached one is
/// missing or expired.
///
/// Concurrent callers asking for the same key while no valid token is cached
/// share a single issuance call and its outcome, success or failure.
/// Failures are returned as is; retrying is up to the caller.
pub struct AuthCoordinator {
    credentials: Credentials,
    timeout: Duration,
    default_key: String,
}

impl AuthCoordinator {
    pub fn with_private_key(
        key: Arc<PrivateKey>,
        request_builder: TokenRequestBuilder,
        token_url: impl Into<String>,
        cache: Arc<dyn TokenCache>,
        executor: Arc<dyn HttpExecutor>,
    ) -> Self {
        Self::new(Credentials::Issuer(Issuer {
            key,
            request_builder,
            token_url: token_url.into(),
            cache,
            executor,
            flights: StdMutex::new(HashMap::new()),
        }))
    }

    /// A previously issued token; it is served until it expires and never renewed.
    pub fn with_token(token: Token) -> Self {
        Self::new(Credentials::Static(token))
    }

    fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            default_key: String::from("default"),
        }
    }

    /// A configured private key takes precedence over a configured token.
    pub fn from_config(config: &ClientConfig, executor: Arc<dyn HttpExecutor>) -> Result<Self, AuthError> {
        let coordinator = match (config.load_private_key()?, &config.token) {
            (Some(key), _) => {
                let request_builder = TokenRequestBuilder::from_config(config);
                // fail early rather than on the first authenticated call
                request_builder.build()?;
                let cache = build_cache(&config.cache);
                Self::with_private_key(Arc::new(key), request_builder, config.token_url(), cache, executor)
            }
            (None, Some(raw)) => Self::with_token(Token::parse(raw).map_err(AuthError::InvalidToken)?),
            (None, None) => return Err(AuthError::NoCredentials),
        };
        Ok(coordinator
            .with_timeout(config.timeout())
            .with_default_key(config.cache_key()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_default_key(mut self, key: impl Into<String>) -> Self {
        self.default_key = key.into();
        self
    }

    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    /// Token cache, absent for a static token.
    pub fn cache(&self) -> Option<&Arc<dyn TokenCache>> {
        match &self.credentials {
            Credentials::Issuer(issuer) => Some(&issuer.cache),
            Credentials::Static(_) => None,
        }
    }

    /// Token for the configured account and scope.
    pub async fn token(&self) -> Result<Token, AuthError> {
        self.acquire(&self.default_key).await
    }

    /// Value for the `Authorization` header of the next call.
    pub async fn authorization_header(&self) -> Result<String, AuthError> {
        self.token().await.map(|token| token.authorization_header_value())
    }

    pub async fn acquire(&self, cache_key: &str) -> Result<Token, AuthError> {
        self.acquire_with_timeout(cache_key, self.timeout).await
    }

    /// Like [`acquire`](Self::acquire) with a caller supplied deadline for the issuance call.
    pub async fn acquire_with_timeout(&self, cache_key: &str, timeout: Duration) -> Result<Token, AuthError> {
        let issuer = match &self.credentials {
            Credentials::Static(token) => {
                return if token.is_expired_now() {
                    Err(AuthFailure::Expired { expired_at: token.expires_at() }.into())
                } else {
                    Ok(token.clone())
                };
            }
            Credentials::Issuer(issuer) => issuer,
        };

        // fast path
        if let Some(token) = issuer.valid_cached(cache_key).await {
            debug!(key = cache_key, "token served from cache");
            return Ok(token);
        }

        let flight = issuer.flight(cache_key);
        let seen = flight.completed.load(Ordering::Acquire);
        let mut slot = flight.slot.lock().await;

        let result = issuer.run_flight(cache_key, &flight, seen, &mut slot, timeout).await;

        let keep = Flight::holds_valid_token(&slot);
        drop(slot);
        if !keep {
            issuer.retire_flight(cache_key, &flight);
        }
        result
    }
}

impl Issuer {
    async fn valid_cached(&self, cache_key: &str) -> Option<Token> {
        let now = now_i64();
        self.cache
            .get(cache_key)
            .await
            .filter(|token| !token.is_expired(now))
    }

    fn flight(&self, cache_key: &str) -> Arc<Flight> {
        let mut flights = self.flights.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        flights.entry(cache_key.to_owned()).or_default().clone()
    }

    /// Drops the key's entry once nobody else holds it.
    fn retire_flight(&self, cache_key: &str, flight: &Arc<Flight>) {
        let mut flights = self.flights.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let idle = flights
            .get(cache_key)
            .is_some_and(|entry| Arc::ptr_eq(entry, flight) && Arc::strong_count(flight) == 2);
        if idle {
            flights.remove(cache_key);
        }
    }

    /// Runs with the key's flight slot locked.
    async fn run_flight(
        &self,
        cache_key: &str,
        flight: &Flight,
        seen: u64,
        slot: &mut Option<Outcome>,
        timeout: Duration,
    ) -> Result<Token, AuthError> {
        // an issuance finished while we queued: its outcome is ours
        if flight.completed.load(Ordering::Acquire) != seen {
            if let Some(outcome) = slot.as_ref() {
                debug!(key = cache_key, ok = outcome.is_ok(), "sharing outcome of concurrent issuance");
                return outcome.clone().map_err(AuthError::from);
            }
        }

        if let Some(token) = self.valid_cached(cache_key).await {
            debug!(key = cache_key, "token issued by a concurrent caller");
            return Ok(token);
        }
        if Flight::holds_valid_token(slot) {
            if let Some(Ok(token)) = slot.as_ref() {
                debug!(key = cache_key, "token issued earlier, cache write was lost");
                return Ok(token.clone());
            }
        }

        let outcome = self.issue(cache_key, timeout).await?;
        if let Ok(token) = &outcome {
            if let Err(err) = self.cache.set(cache_key, token.clone()).await {
                warn!(key = cache_key, cache = self.cache.kind(), error = %err, "token issued but could not be cached");
            }
        }
        *slot = Some(outcome.clone());
        flight.completed.fetch_add(1, Ordering::Release);
        outcome.map_err(AuthError::from)
    }

    /// The outer error covers local failures that never reach the network.
    async fn issue(&self, cache_key: &str, timeout: Duration) -> Result<Outcome, AuthError> {
        let request = self.request_builder.build()?;
        let body = request.to_canonical_bytes()?;
        let signature = sign_base64(&body, &self.key)?;

        let metrics = get_metrics().await;
        let start = get_instant();
        info!(key = cache_key, login = %request.login, url = %self.token_url, "requesting new token");
        metrics.token_fetch_requests.with_label_values(&[cache_key]).inc();

        let result = self.send(body, &signature, timeout).await;
        metrics
            .token_fetch_duration
            .with_label_values(&[cache_key])
            .observe(start.elapsed().as_secs_f64());

        match &result {
            Ok(token) => {
                metrics
                    .token_expiry_unix
                    .with_label_values(&[cache_key])
                    .set(token.expires_at());
                info!(key = cache_key, expires_at = token.expires_at(), "token issued");
            }
            Err(failure) => {
                metrics
                    .token_fetch_failures
                    .with_label_values(&[cache_key, failure_reason(failure)])
                    .inc();
                error!(key = cache_key, error = %failure, "token issuance failed");
            }
        }
        Ok(result)
    }

    async fn send(&self, body: Vec<u8>, signature: &str, timeout: Duration) -> Result<Token, AuthFailure> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(signature).map_err(|e| AuthFailure::Transport(e.to_string()))?,
        );

        let request = HttpRequest {
            method: Method::POST,
            url: self.token_url.clone(),
            headers,
            body,
            timeout: Some(timeout),
        };

        let response = match tokio::time::timeout(timeout, self.executor.execute(request)).await {
            Err(_) | Ok(Err(TransportError::Timeout)) => return Err(AuthFailure::Timeout(timeout)),
            Ok(Err(err)) => return Err(AuthFailure::Transport(err.to_string())),
            Ok(Ok(response)) => response,
        };

        if !response.status.is_success() {
            return Err(AuthFailure::Status {
                status: response.status,
                body: response.text(),
            });
        }
        Ok(parse_token_response(&response.text())?)
    }
}

/// The issuance endpoint answers either with the bare token or with `{"token": "..."}`.
pub fn parse_token_response(body: &str) -> Result<Token, TokenError> {
    let body = body.trim();
    if !body.starts_with('{') {
        return Token::parse(body);
    }

    let json: Value = serde_json::from_str(body).map_err(|e| TokenError::Payload(e.to_string()))?;
    let raw = json
        .get(TOKEN_RESPONSE_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| TokenError::Payload(format!("response has no '{}' field", TOKEN_RESPONSE_FIELD)))?;
    Token::parse(raw)
}

fn failure_reason(failure: &AuthFailure) -> &'static str {
    match failure {
        AuthFailure::Transport(_) => "transport",
        AuthFailure::Timeout(_) => "timeout",
        AuthFailure::Status { .. } => "status",
        AuthFailure::InvalidResponse(_) => "invalid_response",
        AuthFailure::Expired { .. } => "expired",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use http::StatusCode;

    use super::*;
    use crate::auth::signer::tests::test_key;
    use crate::auth::token::tests::sample_jwt;
    use crate::cache::memory::MemoryTokenCache;
    use crate::transport::HttpResponse;

    /// Answers every call with the same response after an optional delay.
    struct StubExecutor {
        calls: AtomicUsize,
        status: StatusCode,
        body: String,
        delay: Duration,
    }

    impl StubExecutor {
        fn ok(body: String) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), status: StatusCode::OK, body, delay: Duration::ZERO })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpExecutor for StubExecutor {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(request.headers.contains_key(SIGNATURE_HEADER));
            tokio::time::sleep(self.delay).await;
            Ok(HttpResponse { status: self.status, headers: HeaderMap::new(), body: self.body.clone().into_bytes() })
        }
    }

    fn coordinator(executor: Arc<StubExecutor>, cache: Arc<dyn TokenCache>) -> AuthCoordinator {
        AuthCoordinator::with_private_key(
            Arc::new(test_key()),
            TokenRequestBuilder::new().login("demo"),
            "http://localhost/v6/auth",
            cache,
            executor,
        )
    }

    #[tokio::test]
    async fn reuses_valid_cached_token() {
        let raw = sample_jwt(now_i64() + 600);
        let executor = StubExecutor::ok(format!(r#"{{"token":"{raw}"}}"#));
        let coordinator = coordinator(executor.clone(), Arc::new(MemoryTokenCache::new()));

        let first = coordinator.acquire("demo").await.unwrap();
        let second = coordinator.acquire("demo").await.unwrap();

        assert_eq!(first.raw(), raw);
        assert_eq!(first, second);
        assert_eq!(executor.calls(), 1);
    }

    #[tokio::test]
    async fn replaces_expired_cached_token() {
        let cache = Arc::new(MemoryTokenCache::new());
        cache.set("demo", Token::parse(&sample_jwt(now_i64() - 5)).unwrap()).await.unwrap();
        let fresh = sample_jwt(now_i64() + 600);
        let executor = StubExecutor::ok(fresh.clone());
        let coordinator = coordinator(executor.clone(), cache.clone());

        let token = coordinator.acquire("demo").await.unwrap();

        assert_eq!(token.raw(), fresh);
        assert_eq!(cache.get("demo").await.unwrap().raw(), fresh);
        assert_eq!(executor.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_issuance() {
        let executor = Arc::new(StubExecutor {
            calls: AtomicUsize::new(0),
            status: StatusCode::OK,
            body: sample_jwt(now_i64() + 600),
            delay: Duration::from_millis(200),
        });
        let coordinator = Arc::new(coordinator(executor.clone(), Arc::new(MemoryTokenCache::new())));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.acquire("demo").await })
            })
            .collect();

        let mut raws = Vec::new();
        for handle in handles {
            raws.push(handle.await.unwrap().unwrap().raw().to_owned());
        }
        assert_eq!(executor.calls(), 1);
        assert!(raws.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn keys_are_issued_independently() {
        let executor = StubExecutor::ok(sample_jwt(now_i64() + 600));
        let coordinator = coordinator(executor.clone(), Arc::new(MemoryTokenCache::new()));

        coordinator.acquire("demo:read-write").await.unwrap();
        coordinator.acquire("demo:read-only").await.unwrap();

        assert_eq!(executor.calls(), 2);
    }

    #[tokio::test]
    async fn server_error_is_not_retried_and_not_cached() {
        let executor = Arc::new(StubExecutor {
            calls: AtomicUsize::new(0),
            status: StatusCode::UNAUTHORIZED,
            body: r#"{"error":"signature invalid"}"#.into(),
            delay: Duration::ZERO,
        });
        let cache = Arc::new(MemoryTokenCache::new());
        let coordinator = coordinator(executor.clone(), cache.clone());

        let err = coordinator.acquire("demo").await.unwrap_err();

        assert!(err.is_auth_failed());
        assert!(matches!(err, AuthError::Failed(AuthFailure::Status { status: StatusCode::UNAUTHORIZED, .. })));
        assert_eq!(executor.calls(), 1);
        assert_eq!(cache.get("demo").await, None);
    }

    #[tokio::test]
    async fn unusable_token_response_is_an_auth_failure() {
        let executor = StubExecutor::ok("not-a-token".into());
        let coordinator = coordinator(executor, Arc::new(MemoryTokenCache::new()));

        let err = coordinator.acquire("demo").await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Failed(AuthFailure::InvalidResponse(TokenError::Malformed { segments: 1 }))
        ));
    }

    #[tokio::test]
    async fn slow_issuance_times_out_and_releases_the_key() {
        let executor = Arc::new(StubExecutor {
            calls: AtomicUsize::new(0),
            status: StatusCode::OK,
            body: sample_jwt(now_i64() + 600),
            delay: Duration::from_millis(500),
        });
        let coordinator = coordinator(executor.clone(), Arc::new(MemoryTokenCache::new()));

        let err = coordinator
            .acquire_with_timeout("demo", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Failed(AuthFailure::Timeout(_))));

        // the key is not left locked
        let token = coordinator.acquire_with_timeout("demo", Duration::from_secs(5)).await.unwrap();
        assert!(!token.is_expired_now());
        assert_eq!(executor.calls(), 2);
    }

    #[tokio::test]
    async fn static_token_is_served_until_expiry() {
        let valid = Token::parse(&sample_jwt(now_i64() + 60)).unwrap();
        let coordinator = AuthCoordinator::with_token(valid.clone());
        assert_eq!(coordinator.token().await.unwrap(), valid);
        assert_eq!(
            coordinator.authorization_header().await.unwrap(),
            format!("Bearer {}", valid.raw())
        );
        assert!(coordinator.cache().is_none());

        let expired = Token::parse(&sample_jwt(now_i64() - 60)).unwrap();
        let coordinator = AuthCoordinator::with_token(expired);
        assert!(matches!(
            coordinator.token().await,
            Err(AuthError::Failed(AuthFailure::Expired { .. }))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_failure() {
        let executor = Arc::new(StubExecutor {
            calls: AtomicUsize::new(0),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "upstream down".into(),
            delay: Duration::from_millis(100),
        });
        let coordinator = Arc::new(coordinator(executor.clone(), Arc::new(MemoryTokenCache::new())));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.acquire("k").await })
            })
            .collect();
        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(
                err,
                AuthError::Failed(AuthFailure::Status { status: StatusCode::INTERNAL_SERVER_ERROR, .. })
            ));
        }
        assert_eq!(executor.calls(), 1);

        // a later caller did not queue behind the failure and issues again
        assert!(coordinator.acquire("k").await.is_err());
        assert_eq!(executor.calls(), 2);
    }

    fn flight_count(coordinator: &AuthCoordinator) -> usize {
        match &coordinator.credentials {
            Credentials::Issuer(issuer) => issuer.flights.lock().unwrap().len(),
            Credentials::Static(_) => 0,
        }
    }

    #[tokio::test]
    async fn flights_are_retired_unless_they_hold_a_valid_token() {
        let failing = Arc::new(StubExecutor {
            calls: AtomicUsize::new(0),
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
            delay: Duration::ZERO,
        });
        let coordinator_failing = coordinator(failing, Arc::new(MemoryTokenCache::new()));
        for i in 0..5 {
            assert!(coordinator_failing.acquire(&format!("key-{i}")).await.is_err());
        }
        assert_eq!(flight_count(&coordinator_failing), 0);

        let ok = StubExecutor::ok(sample_jwt(now_i64() + 600));
        let coordinator_ok = coordinator(ok, Arc::new(MemoryTokenCache::new()));
        coordinator_ok.acquire("demo").await.unwrap();
        assert_eq!(flight_count(&coordinator_ok), 1);
    }

    #[test]
    fn from_config_requires_credentials() {
        let executor: Arc<dyn HttpExecutor> = StubExecutor::ok(String::new());
        let config = ClientConfig::new("demo");
        assert!(matches!(
            AuthCoordinator::from_config(&config, executor),
            Err(AuthError::NoCredentials)
        ));
    }

    #[test]
    fn from_config_rejects_bad_key_and_missing_login() {
        let executor: Arc<dyn HttpExecutor> = StubExecutor::ok(String::new());

        let mut config = ClientConfig::new("demo");
        config.private_key = Some("garbage".into());
        assert!(matches!(
            AuthCoordinator::from_config(&config, executor.clone()),
            Err(AuthError::Signing(_))
        ));

        let mut config = ClientConfig::new("");
        config.private_key = Some(crate::auth::signer::tests::TEST_KEY_PEM.into());
        assert!(matches!(
            AuthCoordinator::from_config(&config, executor),
            Err(AuthError::Request(_))
        ));
    }

    #[test]
    fn parses_both_response_forms() {
        let raw = sample_jwt(42);
        assert_eq!(parse_token_response(&raw).unwrap().raw(), raw);
        assert_eq!(parse_token_response(&format!("{{\"token\":\"{raw}\"}}\n")).unwrap().raw(), raw);
        assert!(matches!(parse_token_response(r#"{"jwt":"x"}"#), Err(TokenError::Payload(_))));
    }
}
