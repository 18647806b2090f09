//! `named-http` provides pooled async HTTP clients addressable by a stable
//! name, with bounded retry, caller deadlines and per-call telemetry.
//!
//! - [`Registry::get_or_create`] builds one [`Client`] per name and shares it
//! - [`Client::get`] / [`Client::post`] return a [`Resp`] envelope that always
//!   carries a [`Telemetry`] record, whatever the outcome
//! - [`Client::get_json`] / [`Client::post_json`] also decode the body
//!
//! Only transport failures are retried. Status codes of 400 and above are
//! reported in [`Resp::error`] with the raw body kept for inspection.

mod backoff;
mod client;
mod context;
mod duration;
mod error;
mod executor;
mod options;
mod registry;
mod response;
mod telemetry;
mod transport;

pub use backoff::{BackoffPolicy, NoRetry, Retriable, Retrier};
pub use client::Client;
pub use context::CallContext;
pub use duration::parse_duration;
pub use error::{ConfigError, HttpClientError};
pub use options::{
    with_backoff, with_default_content_type, with_max_idle_conns, with_max_idle_conns_per_host,
    with_retry_count, with_timeout, with_timeout_str, without_default_content_type, ClientConfig,
    ClientOption, ClientProfile, DEFAULT_CONTENT_TYPE, DEFAULT_MAX_IDLE_CONNS,
    DEFAULT_MAX_IDLE_CONNS_PER_HOST, DEFAULT_RETRY_COUNT, DEFAULT_TIMEOUT,
};
pub use registry::Registry;
pub use response::Resp;
pub use telemetry::Telemetry;
pub use transport::{pooled as pooled_transport, Transport};

pub use bytes::Bytes;
pub use reqwest::{header, Method, StatusCode};
pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, HttpClientError>;
