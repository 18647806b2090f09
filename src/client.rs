use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Method,
};
use serde::de::DeserializeOwned;

use crate::{
    backoff::{Retriable, Retrier},
    executor::Executor,
    transport::{self, Transport},
    CallContext, ClientConfig, ClientOption, ConfigError, Resp,
};

/// HTTP client with its own connection pool and retry policy.
///
/// Cloning is cheap and clones share the pool. Safe for concurrent use;
/// it keeps no per-call state.
#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    executor: Arc<Executor>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Applies options on top of the defaults and builds a client.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use named_http::{with_retry_count, with_timeout_str, Client};
    ///
    /// let client = Client::new([with_timeout_str("2s"), with_retry_count(3)])?;
    /// # Ok::<(), named_http::ConfigError>(())
    /// ```
    pub fn new<I>(options: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = ClientOption>,
    {
        Self::build(ClientConfig::from_options(options)?)
    }

    /// Builds a client with a fresh pooled transport.
    ///
    /// Zero pool sizes are replaced with their defaults first.
    pub fn build(config: ClientConfig) -> Result<Self, ConfigError> {
        let config = config.resolved();
        let transport = transport::pooled(&config)?;
        let retrier = Retrier::new(config.retry_count, config.backoff.clone());
        Self::from_parts(config, Arc::new(transport), Arc::new(retrier))
    }

    /// Builds a client around a caller-supplied transport and retry policy.
    ///
    /// Only `default_content_type` is read from `config` here; timeouts and
    /// pool limits are the transport's business.
    pub fn from_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        retrier: Arc<dyn Retriable>,
    ) -> Result<Self, ConfigError> {
        let config = config.resolved();
        let default_content_type = config
            .default_content_type
            .as_deref()
            .map(|value| {
                HeaderValue::from_str(value)
                    .map_err(|_| ConfigError::InvalidContentType(value.to_owned()))
            })
            .transpose()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            timeout_ms = config.timeout.as_millis() as u64,
            retry_count = config.retry_count,
            max_idle_conns = config.max_idle_conns,
            max_idle_conns_per_host = config.max_idle_conns_per_host,
            "http client built"
        );

        Ok(Self {
            config,
            executor: Arc::new(Executor::new(transport, retrier, default_content_type)),
        })
    }

    /// Resolved configuration this client was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends a `GET` and returns the raw body.
    pub async fn get(&self, ctx: &CallContext, url: &str, headers: Option<HeaderMap>) -> Resp {
        self.executor
            .execute(ctx, Method::GET, url, headers, None, false)
            .await
    }

    /// Sends a `GET` and decodes a successful body as JSON into `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
        headers: Option<HeaderMap>,
    ) -> Resp<T> {
        self.executor
            .execute(ctx, Method::GET, url, headers, None, true)
            .await
    }

    /// Sends a `POST` with `body`. The body is buffered so every retry
    /// replays the same bytes.
    pub async fn post(
        &self,
        ctx: &CallContext,
        url: &str,
        body: impl Into<Bytes>,
        headers: Option<HeaderMap>,
    ) -> Resp {
        let body = body.into();
        self.executor
            .execute(ctx, Method::POST, url, headers, Some(body), false)
            .await
    }

    /// Sends a `POST` and decodes a successful body as JSON into `T`.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
        body: impl Into<Bytes>,
        headers: Option<HeaderMap>,
    ) -> Resp<T> {
        let body = body.into();
        self.executor
            .execute(ctx, Method::POST, url, headers, Some(body), true)
            .await
    }

    /// General entry point. Methods other than `GET` and `POST` fail with
    /// [`HttpClientError::UnsupportedMethod`](crate::HttpClientError::UnsupportedMethod)
    /// without touching the network.
    pub async fn request(
        &self,
        ctx: &CallContext,
        method: Method,
        url: &str,
        headers: Option<HeaderMap>,
        body: Option<Bytes>,
    ) -> Resp {
        self.executor
            .execute(ctx, method, url, headers, body, false)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Client;
    use crate::{
        with_default_content_type, with_max_idle_conns_per_host, with_timeout_str, ClientConfig,
        ConfigError, DEFAULT_MAX_IDLE_CONNS,
    };

    #[test]
    fn new_resolves_pool_defaults() {
        let client = Client::new([with_timeout_str("2s"), with_max_idle_conns_per_host(100)])
            .expect("client must build");

        assert_eq!(client.config().timeout, Duration::from_secs(2));
        assert_eq!(client.config().max_idle_conns, DEFAULT_MAX_IDLE_CONNS);
        assert_eq!(client.config().max_idle_conns_per_host, 100);
    }

    #[test]
    fn bad_textual_timeout_fails_construction() {
        let err = Client::new([with_timeout_str("2 secs")]).expect_err("must fail");
        assert!(matches!(err, ConfigError::InvalidDuration { .. }));
    }

    #[test]
    fn bad_content_type_fails_construction() {
        let err = Client::new([with_default_content_type("text/plain\n")]).expect_err("must fail");
        assert!(matches!(err, ConfigError::InvalidContentType(_)));
    }

    #[test]
    fn clones_share_the_executor() {
        let client = Client::build(ClientConfig::default()).expect("client must build");
        let clone = client.clone();
        assert!(std::sync::Arc::ptr_eq(&client.executor, &clone.executor));
    }
}
