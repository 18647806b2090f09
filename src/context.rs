//! Caller-side cancellation and overall call deadlines.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::HttpClientError;

/// Bounds one logical call from the caller's side.
///
/// The per-attempt timeout lives in [`ClientConfig`](crate::ClientConfig);
/// this deadline spans every attempt and backoff wait. Whichever fires first
/// wins.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self::background().deadline(deadline)
    }

    /// Ties the context to an existing token, e.g. a server shutdown signal.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Sets or tightens the deadline. A later deadline never loosens an
    /// earlier one.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<HttpClientError> {
        if self.token.is_cancelled() {
            return Some(HttpClientError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(HttpClientError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> HttpClientError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => HttpClientError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => HttpClientError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                HttpClientError::Cancelled
            }
        }
    }
}
