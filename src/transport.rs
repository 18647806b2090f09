//! One-attempt HTTP exchange over a pooled connection layer.

use std::time::Duration;

use async_trait::async_trait;

use crate::{ClientConfig, ConfigError};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const TCP_KEEPALIVE: Duration = Duration::from_secs(30);
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Performs a single HTTP attempt.
///
/// Implementations own their connection pool; callers never touch it.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error>;
}

#[async_trait]
impl Transport for reqwest::Client {
    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error> {
        self.execute(request).await
    }
}

/// Builds the keep-alive pool for a resolved config.
///
/// Proxy settings come from the environment. The per-attempt timeout is the
/// config's `timeout`, with zero meaning no per-attempt limit;
/// `max_idle_conns` has no pool-wide equivalent in `reqwest`, so only the
/// per-host limit bounds idle connections.
pub fn pooled(config: &ClientConfig) -> Result<reqwest::Client, ConfigError> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .tcp_keepalive(TCP_KEEPALIVE)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(config.max_idle_conns_per_host);
    if !config.timeout.is_zero() {
        builder = builder.timeout(config.timeout);
    }
    builder.build().map_err(ConfigError::Transport)
}
