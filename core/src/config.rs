//! Client configuration: the `Config` capability and its simple variants.
//!
//! # Design
//! A `Config` supplies the two things a `Client` cannot decide for itself:
//! where named endpoints live and how requests are authorized. Both are
//! resolved once, in `Client::new`. `ClientOptions` carries the settings the
//! client owns directly (currently the request timeout).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::context::Context;
use crate::error::ConfigError;
use crate::transport::{BearerTransport, Transport};

/// Maps an endpoint name to its URL. `None` means the name is unknown.
pub type EndpointResolver = Arc<dyn Fn(&str) -> Option<Url> + Send + Sync>;

/// Supplies endpoint resolution and authorization for a `Client`.
#[async_trait]
pub trait Config: Send + Sync {
    /// Resolver for the location of named endpoints.
    fn endpoints(&self) -> Result<EndpointResolver, ConfigError>;

    /// Wrap `transport` with this configuration's authorization.
    ///
    /// `ctx` governs any requests needed to obtain credentials. A
    /// configuration without authorization returns `transport` as-is.
    async fn authorize(
        &self,
        ctx: &Context,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<dyn Transport>, ConfigError>;
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable read by `ClientOptions::from_env`.
pub const TIMEOUT_ENV: &str = "API_CLIENT_TIMEOUT_SECS";

/// Settings owned by the client itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ClientOptions {
    /// Upper bound on a whole exchange: round trip plus body read.
    /// Defaults to 10 seconds.
    #[serde(rename = "timeout_secs", with = "secs", default = "default_timeout")]
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientOptions {
    /// Defaults, with the timeout overridden by `API_CLIENT_TIMEOUT_SECS`
    /// when it holds a positive integer.
    pub fn from_env() -> Self {
        let timeout = std::env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        Self { timeout }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Parse a base URL, forcing a trailing slash so relative joins append to
/// the path instead of replacing its last segment.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|source| ConfigError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

/// Resolver that joins endpoint names onto `base`.
pub fn base_url_resolver(base: Url) -> EndpointResolver {
    Arc::new(move |endpoint: &str| base.join(endpoint.trim_start_matches('/')).ok())
}

/// Anonymous access to a service rooted at a base URL.
#[derive(Debug, Clone)]
pub struct StaticConfig {
    base_url: String,
}

impl StaticConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Config for StaticConfig {
    fn endpoints(&self) -> Result<EndpointResolver, ConfigError> {
        Ok(base_url_resolver(parse_base_url(&self.base_url)?))
    }

    async fn authorize(
        &self,
        _ctx: &Context,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<dyn Transport>, ConfigError> {
        Ok(transport)
    }
}

/// Access with a fixed bearer token.
#[derive(Clone)]
pub struct TokenConfig {
    base_url: String,
    token: String,
}

impl TokenConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Config for TokenConfig {
    fn endpoints(&self) -> Result<EndpointResolver, ConfigError> {
        Ok(base_url_resolver(parse_base_url(&self.base_url)?))
    }

    async fn authorize(
        &self,
        _ctx: &Context,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<dyn Transport>, ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::Authorization("empty bearer token".to_string()));
        }
        tracing::debug!("authorizing with static bearer token");
        Ok(Arc::new(BearerTransport::new(transport, self.token.clone())))
    }
}
