/*
[INPUT]:  Optional YAML file, process environment
[OUTPUT]: Validated service configuration
[POS]:    Configuration layer - startup settings for the exchange client, tasks and server
[UPDATE]: When adding new configuration options
*/

use crate::task::TaskTiming;
use anyhow::{Context, Result, bail};
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use stopline_adapter::{ClientConfig, Credentials};

pub const SUPPORTED_STOCK: &str = "BITMEX";

/// Service configuration. Every key can be given in the YAML file or as an
/// upper-case environment variable of the same name (`BITMEX_PUBLIC_KEY`).
#[derive(Clone, Deserialize)]
pub struct ServiceConfig {
    /// Shared secret every control request must carry
    pub password: String,
    pub bitmex_public_key: String,
    pub bitmex_private_key: String,
    /// Exchange backend; only BITMEX is known
    pub stock: String,
    pub port: u16,
    pub symbol: String,
    pub poll_interval_secs: u64,
    pub retry_delay_secs: u64,
    pub heartbeat_interval_secs: u64,
    pub status_delay_ms: u64,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("password", &"<redacted>")
            .field("bitmex_public_key", &self.bitmex_public_key)
            .field("bitmex_private_key", &"<redacted>")
            .field("stock", &self.stock)
            .field("port", &self.port)
            .field("symbol", &self.symbol)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("heartbeat_interval_secs", &self.heartbeat_interval_secs)
            .field("status_delay_ms", &self.status_delay_ms)
            .finish()
    }
}

impl ServiceConfig {
    /// Load from an optional YAML file, overridden by the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::defaults()?;
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }
        let builder = builder.add_source(Environment::default());
        Self::finish(builder)
    }

    /// Load from YAML text only; used by tests.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let builder = Self::defaults()?.add_source(File::from_str(content, FileFormat::Yaml));
        Self::finish(builder)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        Ok(Config::builder()
            .set_default("password", "")?
            .set_default("bitmex_public_key", "")?
            .set_default("bitmex_private_key", "")?
            .set_default("stock", "")?
            .set_default("port", 3000)?
            .set_default("symbol", stopline_adapter::http::client::DEFAULT_SYMBOL)?
            .set_default("poll_interval_secs", 5)?
            .set_default("retry_delay_secs", 5)?
            .set_default("heartbeat_interval_secs", 10)?
            .set_default("status_delay_ms", 1000)?)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: Self = builder
            .build()
            .context("read configuration sources")?
            .try_deserialize()
            .context("parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.password.is_empty() {
            bail!("password is not configured");
        }
        if self.bitmex_public_key.is_empty() || self.bitmex_private_key.is_empty() {
            bail!("BitMEX API key pair is not configured");
        }
        if !self.stock.eq_ignore_ascii_case(SUPPORTED_STOCK) {
            bail!("Unknown stock {:?}", self.stock);
        }
        if self.symbol.is_empty() {
            bail!("symbol must not be empty");
        }
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be positive");
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            public_key: self.bitmex_public_key.clone(),
            private_key: self.bitmex_private_key.clone(),
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            symbol: self.symbol.clone(),
            ..ClientConfig::default()
        }
    }

    pub fn timing(&self) -> TaskTiming {
        TaskTiming {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
        }
    }

    pub fn status_delay(&self) -> Duration {
        Duration::from_millis(self.status_delay_ms)
    }
}
