use std::borrow::Cow;

use bytes::Bytes;

use crate::{HttpClientError, Telemetry};

/// Result of one logical call.
///
/// `error` is set when no response arrived (`status_code == 0`), when the
/// status is 400 or above, or when decoding into `T` failed. In the last two
/// cases `body` still holds the raw bytes.
#[derive(Debug)]
pub struct Resp<T = ()> {
    pub status_code: u16,
    pub body: Option<Bytes>,
    pub error: Option<HttpClientError>,
    /// Decoded body; only set by the `*_json` calls on success.
    pub data: Option<T>,
    pub telemetry: Telemetry,
}

impl<T> Resp<T> {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Body as UTF-8, lossily.
    pub fn body_text(&self) -> Option<Cow<'_, str>> {
        self.body.as_deref().map(String::from_utf8_lossy)
    }

    /// Converts into the decoded value, or the call's error.
    ///
    /// For calls that did not decode, `Ok(None)` signals success.
    pub fn into_result(self) -> crate::Result<Option<T>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.data),
        }
    }
}
