/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for stopline-adapter tests

use std::time::Duration;

use stopline_adapter::{BitmexClient, ClientConfig, Credentials, RequestSigner};
use wiremock::{Match, MockServer, Request};

pub const PUBLIC_KEY: &str = "test-public-key";
pub const PRIVATE_KEY: &str = "test-private-key";

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Client config with short delays so retries finish quickly
pub fn fast_config() -> ClientConfig {
    ClientConfig {
        retry_delay: Duration::from_millis(10),
        heartbeat_interval: Duration::from_millis(20),
        ..ClientConfig::default()
    }
}

pub fn test_credentials() -> Credentials {
    Credentials {
        public_key: PUBLIC_KEY.to_string(),
        private_key: PRIVATE_KEY.to_string(),
    }
}

/// Client pointed at the mock server
pub fn test_client(server: &MockServer) -> BitmexClient {
    BitmexClient::with_config_and_base_url(test_credentials(), fast_config(), &server.uri())
        .expect("client init")
}

/// Accepts only requests whose signature matches method, path, expiry and body
#[derive(Debug, Clone)]
pub struct ValidSignatureMatcher {
    signer: RequestSigner,
}

impl ValidSignatureMatcher {
    pub fn new() -> Self {
        Self {
            signer: RequestSigner::new(PUBLIC_KEY, PRIVATE_KEY),
        }
    }
}

impl Match for ValidSignatureMatcher {
    fn matches(&self, request: &Request) -> bool {
        let header = |name: &str| {
            request
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        let Some(expires) = header("api-expires").and_then(|value| value.parse::<i64>().ok())
        else {
            return false;
        };
        let Some(signature) = header("api-signature") else {
            return false;
        };
        if header("api-key").as_deref() != Some(PUBLIC_KEY) {
            return false;
        }

        let body = String::from_utf8_lossy(&request.body);
        match self
            .signer
            .sign(request.method.as_str(), request.url.path(), expires, &body)
        {
            Ok(expected) => expected == signature,
            Err(_) => false,
        }
    }
}
