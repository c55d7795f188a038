// src/tests/common/mod.rs
use std::sync::Arc;
use std::time::Duration;

use httpmock::MockServer;
use reqwest::Client;

use crate::auth::coordinator::AuthCoordinator;
use crate::auth::request::TokenRequestBuilder;
use crate::auth::signer::tests::test_key;
use crate::cache::TokenCache;
use crate::transport::client::ReqwestExecutor;

pub(crate) use crate::auth::token::tests::sample_jwt;

pub static AUTH_PATH: &str = "/v6/auth";

pub fn build_executor() -> Arc<ReqwestExecutor> {
    let client = Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("reqwest client");
    Arc::new(ReqwestExecutor::new(client))
}

/// Coordinator for login `demo` issuing against `server`.
pub fn coordinator_for(server: &MockServer, cache: Arc<dyn TokenCache>) -> AuthCoordinator {
    AuthCoordinator::with_private_key(
        Arc::new(test_key()),
        TokenRequestBuilder::new().login("demo").label("tests"),
        server.url(AUTH_PATH),
        cache,
        build_executor(),
    )
}
