use std::sync::Arc;

use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Method, Url,
};
use serde::de::DeserializeOwned;

#[cfg(feature = "tracing")]
use crate::Telemetry;
use crate::{
    backoff::Retriable, telemetry::Recorder, transport::Transport, CallContext, HttpClientError,
    Resp,
};

/// Drives one logical call: headers, dispatch with retry, classification
/// and decoding.
pub(crate) struct Executor {
    transport: Arc<dyn Transport>,
    retrier: Arc<dyn Retriable>,
    default_content_type: Option<HeaderValue>,
}

struct Outcome<T> {
    status_code: u16,
    body: Option<Bytes>,
    error: Option<HttpClientError>,
    data: Option<T>,
}

impl<T> Outcome<T> {
    fn failed(error: HttpClientError) -> Self {
        Self {
            status_code: 0,
            body: None,
            error: Some(error),
            data: None,
        }
    }
}

impl Executor {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        retrier: Arc<dyn Retriable>,
        default_content_type: Option<HeaderValue>,
    ) -> Self {
        Self {
            transport,
            retrier,
            default_content_type,
        }
    }

    pub(crate) async fn execute<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        method: Method,
        url: &str,
        headers: Option<HeaderMap>,
        body: Option<Bytes>,
        decode: bool,
    ) -> Resp<T> {
        let mut recorder = Recorder::start(method.clone(), url);
        let outcome = self
            .run(ctx, method, url, headers, body, decode, &mut recorder)
            .await;
        let telemetry = recorder.finish();

        #[cfg(feature = "tracing")]
        log_finished(&telemetry, outcome.error.as_ref());

        Resp {
            status_code: outcome.status_code,
            body: outcome.body,
            error: outcome.error,
            data: outcome.data,
            telemetry,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        method: Method,
        url: &str,
        headers: Option<HeaderMap>,
        body: Option<Bytes>,
        decode: bool,
        recorder: &mut Recorder,
    ) -> Outcome<T> {
        let body = if method == Method::GET {
            None
        } else if method == Method::POST {
            Some(body.unwrap_or_default())
        } else {
            return Outcome::failed(HttpClientError::UnsupportedMethod(method));
        };

        let url = match Url::parse(url) {
            Ok(url) => url,
            Err(err) => {
                return Outcome::failed(HttpClientError::InvalidUrl {
                    url: url.to_owned(),
                    reason: err.to_string(),
                })
            }
        };
        let headers = self.normalize_headers(headers);

        let response = match self
            .send_with_retry(ctx, &method, &url, &headers, body.as_ref(), recorder)
            .await
        {
            Ok(response) => response,
            Err(err) => return Outcome::failed(err),
        };

        let status = response.status();
        recorder.status(status.as_u16());

        let read = tokio::select! {
            biased;
            err = ctx.done() => Err(err),
            bytes = response.bytes() => bytes.map_err(HttpClientError::Body),
        };
        let bytes = match read {
            Ok(bytes) => bytes,
            Err(err) => return Outcome::failed(err),
        };
        recorder.response_size(bytes.len());

        if status.as_u16() >= 400 {
            return Outcome {
                status_code: status.as_u16(),
                body: Some(bytes),
                error: Some(HttpClientError::Status(status)),
                data: None,
            };
        }

        let (data, error) = if decode {
            match serde_json::from_slice::<T>(&bytes) {
                Ok(data) => (Some(data), None),
                Err(err) => (None, Some(HttpClientError::Decode(err))),
            }
        } else {
            (None, None)
        };

        Outcome {
            status_code: status.as_u16(),
            body: Some(bytes),
            error,
            data,
        }
    }

    fn normalize_headers(&self, headers: Option<HeaderMap>) -> HeaderMap {
        let mut headers = headers.unwrap_or_default();
        if let Some(content_type) = &self.default_content_type {
            headers
                .entry(CONTENT_TYPE)
                .or_insert_with(|| content_type.clone());
        }
        headers
    }

    /// Sends until a response head arrives, the retrier gives up, or the
    /// context is done. Only transport failures are retried.
    async fn send_with_retry(
        &self,
        ctx: &CallContext,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: Option<&Bytes>,
        recorder: &mut Recorder,
    ) -> Result<reqwest::Response, HttpClientError> {
        let mut attempt = 0u32;
        loop {
            if let Some(err) = ctx.err() {
                return Err(err);
            }

            let mut request = reqwest::Request::new(method.clone(), url.clone());
            *request.headers_mut() = headers.clone();
            if let Some(body) = body {
                *request.body_mut() = Some(body.clone().into());
            }

            recorder.attempt();
            let result = tokio::select! {
                biased;
                err = ctx.done() => return Err(err),
                result = self.transport.send(request) => result,
            };
            let err = match result {
                Ok(response) => return Ok(response),
                Err(err) => HttpClientError::Transport(err),
            };

            if !err.is_transport() || !self.retrier.should_retry(attempt) {
                return Err(err);
            }

            let delay = self.retrier.next_delay(attempt);
            #[cfg(feature = "tracing")]
            tracing::debug!(
                %method,
                %url,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying http call"
            );

            tokio::select! {
                biased;
                err = ctx.done() => return Err(err),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

#[cfg(feature = "tracing")]
fn log_finished(telemetry: &Telemetry, error: Option<&HttpClientError>) {
    let size = telemetry.response_size_bytes();
    match error {
        None => tracing::debug!(
            method = %telemetry.method,
            url = %telemetry.request_url,
            status = telemetry.status_code,
            size = %size,
            attempts = telemetry.attempts,
            elapsed_ms = telemetry.elapsed.as_millis() as u64,
            "http call finished"
        ),
        Some(err) => tracing::warn!(
            method = %telemetry.method,
            url = %telemetry.request_url,
            status = telemetry.status_code,
            size = %size,
            attempts = telemetry.attempts,
            elapsed_ms = telemetry.elapsed.as_millis() as u64,
            error = %err,
            "http call failed"
        ),
    }
}
