use reqwest::{Method, StatusCode};

/// Error carried in-band by [`Resp`](crate::Resp) for one logical call.
#[derive(Debug, thiserror::Error)]
pub enum HttpClientError {
    /// Only `GET` and `POST` are dispatched; the request never left the process.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(Method),
    /// The URL could not be parsed.
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Connect, timeout or other request execution error from `reqwest`,
    /// surfaced after retries were exhausted.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// The response head arrived but reading the body failed.
    #[error("failed to read response body: {0}")]
    Body(reqwest::Error),
    /// The caller's cancellation token fired.
    #[error("call cancelled")]
    Cancelled,
    /// The caller's overall deadline passed.
    #[error("call deadline exceeded")]
    DeadlineExceeded,
    /// The server answered with a status of 400 or above.
    #[error("{0}")]
    Status(StatusCode),
    /// The body did not match the expected JSON shape.
    #[error("decode error: {0}")]
    Decode(serde_json::Error),
}

impl HttpClientError {
    /// Returns true for failures that happened before any response arrived.
    ///
    /// Only these are eligible for retry.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Transport(err) => !err.is_builder(),
            _ => false,
        }
    }

    /// Returns true when the call was stopped by its [`CallContext`](crate::CallContext).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

/// Error returned while building a client or registering it by name.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Registry names must be non-empty.
    #[error("client name must not be empty")]
    EmptyName,
    /// A textual duration did not parse.
    #[error("invalid duration '{input}': {reason}")]
    InvalidDuration { input: String, reason: &'static str },
    /// The default content type is not a valid header value.
    #[error("invalid default content type '{0}'")]
    InvalidContentType(String),
    /// The connection pool could not be built.
    #[error("failed to build transport: {0}")]
    Transport(reqwest::Error),
    /// A client with this name already exists with a different configuration.
    #[error("client '{name}' is already registered with a different configuration")]
    Mismatch { name: String },
}
