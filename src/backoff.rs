//! Retry eligibility and inter-attempt delays.

use std::time::Duration;

use serde::Deserialize;

use crate::duration::serde_text;

/// Decides whether a failed attempt may be retried and how long to wait.
///
/// `attempt` is zero-based: it is `0` after the first try failed.
pub trait Retriable: Send + Sync {
    /// Whether another attempt may follow failed `attempt`.
    fn should_retry(&self, attempt: u32) -> bool;
    /// How long to wait before that attempt.
    fn next_delay(&self, attempt: u32) -> Duration;
}

/// Delay schedule between attempts.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffPolicy {
    /// Fixed delay plus a random jitter in `[0, max_jitter)`.
    Constant {
        #[serde(with = "serde_text")]
        interval: Duration,
        #[serde(with = "serde_text", default)]
        max_jitter: Duration,
    },
    /// `base * 2^attempt`, capped at `max`.
    Exponential {
        #[serde(with = "serde_text")]
        base: Duration,
        #[serde(with = "serde_text")]
        max: Duration,
    },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::Constant {
            interval: Duration::from_millis(1),
            max_jitter: Duration::from_millis(5),
        }
    }
}

impl BackoffPolicy {
    /// Fixed `interval` plus up to `max_jitter` of random delay.
    pub fn constant(interval: Duration, max_jitter: Duration) -> Self {
        Self::Constant {
            interval,
            max_jitter,
        }
    }

    /// Doubling delay starting at `base`, never above `max`.
    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self::Exponential { base, max }
    }

    /// Delay before the retry that follows failed `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Constant {
                interval,
                max_jitter,
            } => interval.saturating_add(jitter(*max_jitter)),
            Self::Exponential { base, max } => {
                let multiplier = 1u32 << attempt.min(16);
                base.saturating_mul(multiplier).min(*max)
            }
        }
    }
}

fn jitter(max: Duration) -> Duration {
    let max_nanos = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
    if max_nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(fastrand::u64(..max_nanos))
}

/// Retries up to `max_retries` times, waiting per the backoff policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Retrier {
    max_retries: u32,
    backoff: BackoffPolicy,
}

impl Retrier {
    /// Allows `max_retries` retries after the first attempt.
    pub fn new(max_retries: u32, backoff: BackoffPolicy) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Retry bound this retrier was built with.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Retriable for Retrier {
    fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

/// Never retries.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRetry;

impl Retriable for NoRetry {
    fn should_retry(&self, _attempt: u32) -> bool {
        false
    }

    fn next_delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{BackoffPolicy, NoRetry, Retriable, Retrier};

    #[test]
    fn constant_delay_stays_within_jitter_window() {
        let policy = BackoffPolicy::constant(Duration::from_millis(1), Duration::from_millis(5));
        for attempt in 0..50 {
            let delay = policy.delay(attempt);
            assert!(delay >= Duration::from_millis(1));
            assert!(delay < Duration::from_millis(6));
        }
    }

    #[test]
    fn constant_delay_without_jitter_is_exact() {
        let policy = BackoffPolicy::constant(Duration::from_millis(3), Duration::ZERO);
        assert_eq!(policy.delay(7), Duration::from_millis(3));
    }

    #[test]
    fn huge_constant_interval_saturates() {
        let policy = BackoffPolicy::constant(Duration::MAX, Duration::from_millis(5));
        assert_eq!(policy.delay(0), Duration::MAX);
    }

    #[test]
    fn exponential_delay_doubles_and_caps() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
        assert_eq!(policy.delay(4), Duration::from_secs(1));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn retrier_is_bounded_by_max_retries() {
        let retrier = Retrier::new(2, BackoffPolicy::default());
        assert!(retrier.should_retry(0));
        assert!(retrier.should_retry(1));
        assert!(!retrier.should_retry(2));

        let none = Retrier::new(0, BackoffPolicy::default());
        assert!(!none.should_retry(0));
        assert!(!NoRetry.should_retry(0));
    }

    #[test]
    fn policy_deserializes_from_textual_durations() {
        let policy: BackoffPolicy =
            serde_json::from_str(r#"{"kind":"exponential","base":"50ms","max":"2s"}"#).unwrap();
        assert_eq!(
            policy,
            BackoffPolicy::exponential(Duration::from_millis(50), Duration::from_secs(2))
        );

        let policy: BackoffPolicy =
            serde_json::from_str(r#"{"kind":"constant","interval":"10ms"}"#).unwrap();
        assert_eq!(
            policy,
            BackoffPolicy::constant(Duration::from_millis(10), Duration::ZERO)
        );
    }
}
