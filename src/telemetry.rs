//! Per-call telemetry.

use std::fmt;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use reqwest::Method;

/// Timing, size and status of one logical call, populated on every exit path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Telemetry {
    pub request_url: String,
    pub method: Method,
    /// `0` when no response head was received.
    pub status_code: u16,
    /// Length of the body that was read, if any.
    pub response_size: Option<usize>,
    /// Network attempts made, including the first.
    pub attempts: u32,
    pub start_time: SystemTime,
    pub end_time: SystemTime,
    pub elapsed: Duration,
}

impl Telemetry {
    fn begin(method: Method, request_url: String, start_time: SystemTime) -> Self {
        Self {
            request_url,
            method,
            status_code: 0,
            response_size: None,
            attempts: 0,
            start_time,
            end_time: start_time,
            elapsed: Duration::ZERO,
        }
    }

    /// Response size as a decimal string, empty when no body was read.
    pub fn response_size_bytes(&self) -> String {
        self.response_size
            .map(|size| size.to_string())
            .unwrap_or_default()
    }
}

impl fmt::Display for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start_ms = self
            .start_time
            .duration_since(UNIX_EPOCH)
            .map(|since| since.as_millis())
            .unwrap_or_default();
        write!(
            f,
            "{} {} status={} size={} attempts={} start_ms={} elapsed_ms={:.3}",
            self.method,
            self.request_url,
            self.status_code,
            self.response_size
                .map_or_else(|| "-".to_owned(), |size| size.to_string()),
            self.attempts,
            start_ms,
            self.elapsed.as_secs_f64() * 1_000.0,
        )
    }
}

/// Builds a [`Telemetry`] record while a call is in flight.
pub(crate) struct Recorder {
    record: Telemetry,
    started: Instant,
    finished: bool,
}

impl Recorder {
    pub(crate) fn start(method: Method, request_url: &str) -> Self {
        Self {
            record: Telemetry::begin(method, request_url.to_owned(), SystemTime::now()),
            started: Instant::now(),
            finished: false,
        }
    }

    pub(crate) fn attempt(&mut self) {
        self.record.attempts += 1;
    }

    pub(crate) fn status(&mut self, status_code: u16) {
        self.record.status_code = status_code;
    }

    pub(crate) fn response_size(&mut self, size: usize) {
        self.record.response_size = Some(size);
    }

    /// Stamps the end time and hands out the final record.
    ///
    /// The end time is measured on the monotonic clock so it never precedes
    /// the start time.
    pub(crate) fn finish(mut self) -> Telemetry {
        self.finished = true;
        let elapsed = self.started.elapsed();
        let placeholder = Telemetry::begin(Method::GET, String::new(), self.record.start_time);
        let mut record = std::mem::replace(&mut self.record, placeholder);
        record.elapsed = elapsed;
        record.end_time = record.start_time + elapsed;
        record
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if !self.finished {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                method = %self.record.method,
                url = %self.record.request_url,
                attempts = self.record.attempts,
                "http call dropped before completion"
            );
        }
    }
}
