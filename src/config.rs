//! Client configuration.
//!
//! Settings come from an optional TOML file, then from `ADMON_*`
//! environment variables (`ADMON_HOST`, `ADMON_PORT`, `ADMON_INTERVAL`,
//! `ADMON_WAIT_TIMEOUT`, `ADMON_REQUEST_TIMEOUT`, `ADMON_PASSWORD`).
//! Durations are written like `"500ms"` or `"2s"`; bare numbers are seconds.
//!
//! ```toml
//! host = "admon.cluster.local"
//! port = 8000
//! interval = "2s"
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer};

use crate::data::duration::parse_duration;
use crate::refresh::{DEFAULT_LOOP_DELAY, DEFAULT_WAIT_TIMEOUT};
use crate::source::{DaemonAddress, DEFAULT_REQUEST_TIMEOUT};

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "ADMON";

#[derive(Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Delay between two polls of a periodic view.
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,
    /// How long a view waits for data before reporting a timeout.
    #[serde(deserialize_with = "deserialize_duration")]
    pub wait_timeout: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
    /// Admin password for authenticated commands.
    pub password: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let address = DaemonAddress::default();
        Self {
            host: address.host,
            port: address.port,
            interval: DEFAULT_LOOP_DELAY,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            password: None,
        }
    }
}

impl ClientConfig {
    /// Load from an optional file plus `ADMON_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder
            .add_source(Environment::with_prefix(prefix).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// The daemon address.
    pub fn address(&self) -> DaemonAddress {
        DaemonAddress::new(self.host.clone(), self.port)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("interval", &self.interval)
            .field("wait_timeout", &self.wait_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}
