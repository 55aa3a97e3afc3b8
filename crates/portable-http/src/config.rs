//! File and environment configuration for [`HttpClient`](crate::HttpClient)

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::client::HttpClientBuilder;
use crate::error::Result;
use crate::headers::Headers;

/// Prefix of environment variables read by [`ClientConfig::from_file`]
pub const ENV_PREFIX: &str = "PORTABLE_HTTP";

/// Static client settings
///
/// Every field is optional. A per-URI proxy resolver cannot be expressed
/// here; set it on the builder returned by [`ClientConfig::into_builder`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Proxy URL used for every request
    pub proxy: Option<String>,
    /// Headers merged into every request
    pub headers: BTreeMap<String, String>,
    /// Idle timeout of pooled connections, in seconds
    pub idle_timeout_secs: Option<u64>,
    /// Maximum concurrent exchanges per host
    pub max_connections_per_host: Option<usize>,
    /// Decompress response bodies (defaults to true)
    pub auto_uncompress: Option<bool>,
    /// User-Agent override; an empty string sends none
    pub user_agent: Option<String>,
    /// Skip TLS certificate validation
    pub ignore_bad_certificates: bool,
}

impl ClientConfig {
    /// Load settings from `path`, then apply `PORTABLE_HTTP_*` variables
    ///
    /// The file format follows the extension (TOML, JSON, YAML...).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Turn these settings into a client builder
    pub fn into_builder(self) -> HttpClientBuilder {
        let mut builder = HttpClientBuilder::default()
            .danger_accept_invalid_certs(self.ignore_bad_certificates)
            .default_headers(self.headers.into_iter().collect::<Headers>());

        if let Some(proxy) = self.proxy {
            builder = builder.proxy(proxy);
        }
        if let Some(secs) = self.idle_timeout_secs {
            builder = builder.idle_timeout(Duration::from_secs(secs));
        }
        if let Some(max) = self.max_connections_per_host {
            builder = builder.max_connections_per_host(max);
        }
        if let Some(enabled) = self.auto_uncompress {
            builder = builder.auto_uncompress(enabled);
        }
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }
        builder
    }
}

impl From<ClientConfig> for HttpClientBuilder {
    fn from(config: ClientConfig) -> Self {
        config.into_builder()
    }
}
