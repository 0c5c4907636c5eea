//! HTTP request/response values and the injectable transport seam.

use std::future::Future;
use std::sync::Arc;

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;

use crate::{MarvinError, Result, TransportError};

/// A fully built request, ready for a [`Transport`].
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL: base URL followed by the endpoint path and query.
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// A buffered HTTP response.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Canonical reason phrase, or `"Unknown"` for unregistered codes.
    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("Unknown")
    }

    /// Looks up a header value as text. Non-UTF-8 values read as absent.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|value| value.to_str().ok())
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|err| MarvinError::Decode(format!("invalid JSON response: {err}")))
    }

    /// Reads the body as UTF-8 text.
    pub fn text(&self) -> Result<String> {
        std::str::from_utf8(&self.body)
            .map(ToOwned::to_owned)
            .map_err(|err| not_utf8(&err))
    }

    /// Consumes the response and returns the body as UTF-8 text.
    pub fn into_text(self) -> Result<String> {
        String::from_utf8(self.body).map_err(|err| not_utf8(&err.utf8_error()))
    }
}

/// Performs a single network exchange.
///
/// Implementations must not retry or apply their own timeout policy; the
/// [`RequestExecutor`](crate::RequestExecutor) owns both.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = std::result::Result<HttpResponse, TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = std::result::Result<HttpResponse, TransportError>> + Send {
        (**self).send(request)
    }
}

/// Production transport backed by `reqwest`.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured `reqwest` client (proxies, TLS roots, ...).
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let mut builder = self
            .http
            .request(request.method, request.url.as_str())
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse::new(status, headers, body.to_vec()))
    }
}

fn not_utf8(err: &std::str::Utf8Error) -> MarvinError {
    MarvinError::Decode(format!("response body is not UTF-8: {err}"))
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::connection(err)
    }
}

pub(crate) fn merge_headers(target: &mut HeaderMap, overrides: &HeaderMap) {
    let mut last: Option<&HeaderName> = None;
    for (name, value) in overrides {
        if last != Some(name) {
            target.remove(name);
            last = Some(name);
        }
        target.append(name.clone(), value.clone());
    }
}

pub(crate) fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value.trim()).map_err(|_| {
        MarvinError::Config(format!("{name} contains characters not allowed in a header"))
    })
}
