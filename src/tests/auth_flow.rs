// Full issuance path from a YAML config through reqwest to a mock endpoint.

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::{json, Value};

    use crate::auth::coordinator::SIGNATURE_HEADER;
    use crate::auth::error::{AuthError, AuthFailure};
    use crate::auth::signer::tests::verify_with_test_key;
    use crate::config::loader::parse_config;
    use crate::helpers::time::now_i64;
    use crate::tests::common::{build_executor, sample_jwt, AUTH_PATH};
    use crate::transport::client::ReqwestExecutor;
    use crate::transport::{HttpExecutor, HttpRequest, HttpResponse, TransportError};
    use crate::AuthCoordinator;

    const KEY_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src/tests/fixtures/test_key.pem");

    /// Passes requests through while keeping a copy of each.
    struct RecordingExecutor {
        inner: Arc<ReqwestExecutor>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl HttpExecutor for RecordingExecutor {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            self.inner.execute(request).await
        }
    }

    fn config_yaml(server: &MockServer, extra: &str) -> String {
        format!(
            "login: demo\nprivate_key_path: {}\nendpoint: {}\nlabel: ci\n{}",
            KEY_PATH,
            server.url("/v6"),
            extra
        )
    }

    #[tokio::test]
    async fn issues_signed_request_from_config() {
        let server = MockServer::start_async().await;
        let raw = sample_jwt(now_i64() + 1800);
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path(AUTH_PATH).header("content-type", "application/json");
                then.status(201)
                    .header("Content-Type", "application/json")
                    .json_body(json!({ "token": raw.clone() }));
            })
            .await;

        let config = parse_config(&config_yaml(&server, "read_only: true\nallow_any_source: true\n")).unwrap();
        let executor = Arc::new(RecordingExecutor {
            inner: build_executor(),
            requests: Mutex::new(Vec::new()),
        });
        let coordinator = AuthCoordinator::from_config(&config, executor.clone()).unwrap();
        assert_eq!(coordinator.default_key(), "demo:read-only:global");

        let header = coordinator.authorization_header().await.unwrap();
        assert_eq!(header, format!("Bearer {}", raw));
        mock.assert_calls_async(1).await;

        let requests = executor.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["login"], "demo");
        assert_eq!(body["read_only"], true);
        assert_eq!(body["global_key"], true);
        assert_eq!(body["label"], "ci");
        assert_eq!(body["expiration_time"], "1 day");
        assert_eq!(body["nonce"].as_str().unwrap().len(), 32);

        let signature = request.headers.get(SIGNATURE_HEADER).unwrap().to_str().unwrap();
        assert!(verify_with_test_key(&request.body, signature));
    }

    #[tokio::test]
    async fn each_issuance_uses_a_fresh_nonce() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(AUTH_PATH);
                // already expired, so every call issues again
                then.status(200).body(sample_jwt(now_i64() - 1));
            })
            .await;

        let config = parse_config(&config_yaml(&server, "")).unwrap();
        let executor = Arc::new(RecordingExecutor {
            inner: build_executor(),
            requests: Mutex::new(Vec::new()),
        });
        let coordinator = AuthCoordinator::from_config(&config, executor.clone()).unwrap();
        coordinator.token().await.unwrap();
        coordinator.token().await.unwrap();

        let requests = executor.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let nonce = |r: &HttpRequest| serde_json::from_slice::<Value>(&r.body).unwrap()["nonce"].clone();
        assert_ne!(nonce(&requests[0]), nonce(&requests[1]));
    }

    #[tokio::test]
    async fn rejected_credentials_are_reported_without_retry() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path(AUTH_PATH);
                then.status(401).json_body(json!({ "error": "Signature could not be verified" }));
            })
            .await;

        let config = parse_config(&config_yaml(&server, "")).unwrap();
        let coordinator = AuthCoordinator::from_config(&config, build_executor()).unwrap();
        let err = coordinator.token().await.unwrap_err();
        match &err {
            AuthError::Failed(AuthFailure::Status { status, body }) => {
                assert_eq!(status.as_u16(), 401);
                assert!(body.contains("could not be verified"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_auth_failed());
        mock.assert_calls_async(1).await;
        assert!(coordinator.cache().unwrap().get(coordinator.default_key()).await.is_none());
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(AUTH_PATH);
                then.status(200)
                    .body(sample_jwt(now_i64() + 600))
                    .delay(Duration::from_secs(3));
            })
            .await;

        let config = parse_config(&config_yaml(&server, "")).unwrap();
        let coordinator = AuthCoordinator::from_config(&config, build_executor()).unwrap();
        let err = coordinator
            .acquire_with_timeout("demo:read-write", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Failed(AuthFailure::Timeout(_))));
    }
}
