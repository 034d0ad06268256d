/*
[INPUT]:  HTTP configuration (base URL, timeouts, retry cadence), API key pair
[OUTPUT]: Configured exchange client with infinite retry and sync bookkeeping
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use crate::http::{ExchangeError, RequestSigner, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Base URL for BitMEX API
const BASE_URL: &str = "https://www.bitmex.com";
/// Path prefix shared by every REST endpoint
pub const API_POINT: &str = "/api/v1/";
pub const DEFAULT_SYMBOL: &str = "XBTUSD";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Fixed pause between attempts of a failed request
    pub retry_delay: Duration,
    /// Pause between heartbeat position reads
    pub heartbeat_interval: Duration,
    /// Signature validity window added to "now" on every attempt
    pub expiry_window: Duration,
    /// Instrument every request is scoped to
    pub symbol: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(10),
            expiry_window: Duration::from_secs(60),
            symbol: DEFAULT_SYMBOL.to_string(),
        }
    }
}

/// API key pair for authenticated requests
#[derive(Clone)]
pub struct Credentials {
    pub public_key: String,
    pub private_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Default)]
struct SyncState {
    last_sync: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Main HTTP client for the BitMEX REST API
///
/// Every call retries until it succeeds; failures are only visible through
/// [`BitmexClient::last_error`].
#[derive(Debug)]
pub struct BitmexClient {
    http_client: Client,
    base_url: Url,
    signer: RequestSigner,
    config: ClientConfig,
    sync_state: Mutex<SyncState>,
}

impl BitmexClient {
    /// Create a new client with default configuration
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_config(credentials, ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        Self::with_config_and_base_url(credentials, config, BASE_URL)
    }

    /// Create a client against a custom base URL (mock servers, testnet)
    pub fn with_config_and_base_url(
        credentials: Credentials,
        config: ClientConfig,
        base_url: &str,
    ) -> Result<Self> {
        if credentials.public_key.is_empty() || credentials.private_key.is_empty() {
            return Err(ExchangeError::Config("API key pair must not be empty".to_string()));
        }

        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: Url::parse(base_url)?,
            signer: RequestSigner::new(credentials.public_key, credentials.private_key),
            config,
            sync_state: Mutex::new(SyncState::default()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    /// Time of the last successful heartbeat
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.sync_state().last_sync
    }

    /// Most recent request failure, prefixed with the time it happened
    pub fn last_error(&self) -> Option<String> {
        self.sync_state().last_error.clone()
    }

    fn sync_state(&self) -> MutexGuard<'_, SyncState> {
        self.sync_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn record_sync(&self, at: DateTime<Utc>) {
        self.sync_state().last_sync = Some(at);
    }

    fn record_error(&self, err: &ExchangeError) {
        let now = Utc::now();
        self.sync_state().last_error = Some(format!("{} :: {err}", now.to_rfc3339()));
    }

    /// Issue a signed request, retrying forever on any failure.
    pub(crate) async fn request<T, B>(&self, method: Method, point: &str, params: &B) -> T
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            match self.try_request(method.clone(), point, params).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(method = %method, point, attempt, "exchange request recovered");
                    }
                    return value;
                }
                Err(err) => {
                    if err.is_auth_error() {
                        tracing::error!(method = %method, point, attempt, error = %err, "exchange rejected credentials; retrying");
                    } else {
                        tracing::warn!(method = %method, point, attempt, error = %err, "exchange request failed; retrying");
                    }
                    self.record_error(&err);
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }
    }

    /// One attempt. Expiry and signature are recomputed here so a retried
    /// request never replays a stale signature.
    async fn try_request<T, B>(&self, method: Method, point: &str, params: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let path = format!("{API_POINT}{point}");
        let expires = self.expires_at();
        let body = serde_json::to_string(params)?;
        let headers = self.signer.headers(method.as_str(), &path, expires, &body)?;
        let url = self.base_url.join(&path)?;

        let response = self
            .http_client
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ExchangeError::from_status(status, text));
        }

        Ok(serde_json::from_str(&text)?)
    }

    fn expires_at(&self) -> i64 {
        let window = i64::try_from(self.config.expiry_window.as_secs()).unwrap_or(i64::MAX);
        Utc::now().timestamp().saturating_add(window)
    }

    /// One heartbeat: a lightweight position read that stamps `last_sync`.
    pub async fn heartbeat(&self) {
        let _ = self.get_position().await;
        self.record_sync(Utc::now());
        tracing::debug!("exchange heartbeat");
    }

    /// Run heartbeats every `heartbeat_interval` until `shutdown` is cancelled.
    pub fn spawn_heartbeat(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = self.heartbeat() => {}
                }
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.heartbeat_interval) => {}
                }
            }
            tracing::info!("exchange heartbeat stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            public_key: "public".to_string(),
            private_key: "private".to_string(),
        }
    }

    #[test]
    fn test_client_rejects_empty_keys() {
        let err = BitmexClient::new(Credentials {
            public_key: String::new(),
            private_key: "secret".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, ExchangeError::Config(_)));
    }

    #[test]
    fn test_fresh_client_has_no_sync_or_error() {
        let client = BitmexClient::new(credentials()).unwrap();
        assert_eq!(client.last_sync(), None);
        assert_eq!(client.last_error(), None);
        assert_eq!(client.symbol(), DEFAULT_SYMBOL);
    }

    #[test]
    fn test_record_error_is_timestamped() {
        let client = BitmexClient::new(credentials()).unwrap();
        client.record_error(&ExchangeError::Signature("bad".to_string()));
        let last_error = client.last_error().unwrap();
        assert!(last_error.ends_with(" :: Signature error: bad"));
    }

    #[test]
    fn test_expiry_is_in_the_future() {
        let client = BitmexClient::new(credentials()).unwrap();
        let now = Utc::now().timestamp();
        let expires = client.expires_at();
        assert!(expires >= now + 59 && expires <= now + 61);
    }

    #[test]
    fn test_credentials_debug_redacts_private_key() {
        let rendered = format!("{:?}", credentials());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("\"private\""));
    }
}
