use std::time::Duration;

use serde::Deserialize;

use crate::{backoff::BackoffPolicy, duration, ConfigError};

/// Per-attempt timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
/// Retries after the initial attempt when none are configured.
pub const DEFAULT_RETRY_COUNT: u32 = 1;
/// Idle connections kept across all hosts when the config says `0`.
pub const DEFAULT_MAX_IDLE_CONNS: usize = 20_000;
/// Idle connections kept per host when the config says `0`.
pub const DEFAULT_MAX_IDLE_CONNS_PER_HOST: usize = 1_000;
/// `Content-Type` injected into calls that supply none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Configures timeout, retry and connection-pool behavior of one client.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Per-attempt timeout. Zero disables it, leaving only the caller's
    /// [`CallContext`](crate::CallContext) deadline.
    #[serde(with = "duration::serde_text")]
    pub timeout: Duration,
    /// Number of retries after the initial attempt.
    pub retry_count: u32,
    /// Idle connections kept across all hosts; `0` means the default.
    pub max_idle_conns: usize,
    /// Idle connections kept per host; `0` means the default.
    pub max_idle_conns_per_host: usize,
    /// `Content-Type` injected when a call supplies none; `None` passes
    /// headers through untouched.
    pub default_content_type: Option<String>,
    /// Delay schedule between retries.
    pub backoff: BackoffPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry_count: DEFAULT_RETRY_COUNT,
            max_idle_conns: 0,
            max_idle_conns_per_host: 0,
            default_content_type: Some(DEFAULT_CONTENT_TYPE.to_owned()),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Applies options in order on top of the defaults. Later options win.
    pub fn from_options<I>(options: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = ClientOption>,
    {
        let mut config = Self::default();
        for option in options {
            option.apply(&mut config)?;
        }
        Ok(config)
    }

    /// Replaces zero pool sizes with their defaults.
    pub fn resolved(mut self) -> Self {
        if self.max_idle_conns == 0 {
            self.max_idle_conns = DEFAULT_MAX_IDLE_CONNS;
        }
        if self.max_idle_conns_per_host == 0 {
            self.max_idle_conns_per_host = DEFAULT_MAX_IDLE_CONNS_PER_HOST;
        }
        self
    }
}

/// A named client configuration, as loaded from a service's config file.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct ClientProfile {
    /// Registry name the client is stored under.
    pub name: String,
    /// Remaining keys of the profile object.
    #[serde(flatten)]
    pub config: ClientConfig,
}

/// One configuration mutator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientOption {
    /// Per-attempt timeout; zero disables it.
    Timeout(Duration),
    /// Timeout in textual form, parsed when applied.
    TimeoutText(String),
    /// Retries after the initial attempt.
    RetryCount(u32),
    /// Idle connections across all hosts; `0` means the default.
    MaxIdleConns(usize),
    /// Idle connections per host; `0` means the default.
    MaxIdleConnsPerHost(usize),
    /// `Content-Type` to inject, or `None` to pass headers through.
    DefaultContentType(Option<String>),
    /// Delay schedule between retries.
    Backoff(BackoffPolicy),
}

impl ClientOption {
    /// Writes this option into `config`.
    ///
    /// Fails only for a textual timeout that does not parse.
    pub fn apply(&self, config: &mut ClientConfig) -> Result<(), ConfigError> {
        match self {
            Self::Timeout(timeout) => config.timeout = *timeout,
            Self::TimeoutText(text) => config.timeout = duration::parse_duration(text)?,
            Self::RetryCount(count) => config.retry_count = *count,
            Self::MaxIdleConns(count) => config.max_idle_conns = *count,
            Self::MaxIdleConnsPerHost(count) => config.max_idle_conns_per_host = *count,
            Self::DefaultContentType(content_type) => {
                config.default_content_type = content_type.clone()
            }
            Self::Backoff(policy) => config.backoff = policy.clone(),
        }
        Ok(())
    }
}

/// Sets the per-attempt timeout. [`Duration::ZERO`] disables it.
pub fn with_timeout(timeout: Duration) -> ClientOption {
    ClientOption::Timeout(timeout)
}

/// Sets the timeout from text such as `"2s"` or `"500ms"`; `"0"` disables it.
pub fn with_timeout_str(timeout: impl Into<String>) -> ClientOption {
    ClientOption::TimeoutText(timeout.into())
}

/// Sets how many times a transport failure is retried.
pub fn with_retry_count(retry_count: u32) -> ClientOption {
    ClientOption::RetryCount(retry_count)
}

/// Sets the idle connection limit across all hosts.
pub fn with_max_idle_conns(max_idle_conns: usize) -> ClientOption {
    ClientOption::MaxIdleConns(max_idle_conns)
}

/// Sets the idle connection limit per host.
pub fn with_max_idle_conns_per_host(max_idle_conns_per_host: usize) -> ClientOption {
    ClientOption::MaxIdleConnsPerHost(max_idle_conns_per_host)
}

/// Sets the `Content-Type` injected into calls that supply none.
pub fn with_default_content_type(content_type: impl Into<String>) -> ClientOption {
    ClientOption::DefaultContentType(Some(content_type.into()))
}

/// Stops injecting a `Content-Type` header into calls that supply none.
pub fn without_default_content_type() -> ClientOption {
    ClientOption::DefaultContentType(None)
}

/// Sets the delay schedule between retries.
pub fn with_backoff(policy: BackoffPolicy) -> ClientOption {
    ClientOption::Backoff(policy)
}
