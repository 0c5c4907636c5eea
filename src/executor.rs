use std::fmt;
use std::time::{Duration, SystemTime};

use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    retry::{backoff_delay_ms, parse_retry_after, Sleeper, TokioSleeper},
    transport::{
        header_value, merge_headers, HttpRequest, HttpResponse, ReqwestTransport, Transport,
    },
    ApiError, ClientOptions, MarvinError, Result,
};

/// Header carrying the API credential on every request.
pub const API_TOKEN_HEADER: &str = "x-api-token";

/// One logical call: endpoint, method, optional JSON body and per-call headers.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    endpoint: String,
    method: Method,
    body: Option<Vec<u8>>,
    headers: HeaderMap,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    /// Serializes `body` as the JSON payload.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let bytes = serde_json::to_vec(body).map_err(|err| {
            MarvinError::InvalidRequest(format!(
                "request body for {} is not serializable: {err}",
                self.endpoint
            ))
        })?;
        self.body = Some(bytes);
        Ok(self)
    }

    /// Sets a per-call header. Per-call headers win over every default.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

/// Appends `endpoint` to `base_url` verbatim, collapsing only the doubled
/// slash when both sides carry one.
fn join_url(base_url: &str, endpoint: &str) -> String {
    match (base_url.strip_suffix('/'), endpoint.starts_with('/')) {
        (Some(base), true) => format!("{base}{endpoint}"),
        _ => format!("{base_url}{endpoint}"),
    }
}

/// Decodes a successful response body as JSON.
pub fn parse_json<T: DeserializeOwned>(response: HttpResponse) -> Result<T> {
    response.json()
}

/// Returns a successful response body as text.
pub fn parse_text(response: HttpResponse) -> Result<String> {
    response.into_text()
}

/// Issues requests with a per-attempt timeout and retries recoverable failures.
///
/// Holds no mutable state, so one executor can serve any number of
/// concurrent calls.
#[derive(Clone)]
pub struct RequestExecutor<T = ReqwestTransport, S = TokioSleeper> {
    transport: T,
    sleeper: S,
    base_url: String,
    credential: HeaderValue,
    default_headers: HeaderMap,
    options: ClientOptions,
}

impl<T, S> fmt::Debug for RequestExecutor<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("base_url", &self.base_url)
            .field("credential", &"<redacted>")
            .field("options", &self.options)
            .finish()
    }
}

impl RequestExecutor {
    /// Creates an executor using the `reqwest` transport and tokio timer.
    pub fn new(
        base_url: impl Into<String>,
        credential: impl AsRef<str>,
        options: ClientOptions,
    ) -> Result<Self> {
        Self::with_parts(
            base_url,
            credential,
            options,
            ReqwestTransport::new(),
            TokioSleeper,
        )
    }
}

impl<T, S> RequestExecutor<T, S> {
    /// Creates an executor from explicit transport and sleeper implementations.
    pub fn with_parts(
        base_url: impl Into<String>,
        credential: impl AsRef<str>,
        options: ClientOptions,
        transport: T,
        sleeper: S,
    ) -> Result<Self> {
        options.validate()?;
        let mut credential = header_value("credential", credential.as_ref())?;
        credential.set_sensitive(true);

        Ok(Self {
            transport,
            sleeper,
            base_url: base_url.into(),
            credential,
            default_headers: HeaderMap::new(),
            options,
        })
    }

    /// Replaces the transport.
    pub fn with_transport<T2>(self, transport: T2) -> RequestExecutor<T2, S> {
        RequestExecutor {
            transport,
            sleeper: self.sleeper,
            base_url: self.base_url,
            credential: self.credential,
            default_headers: self.default_headers,
            options: self.options,
        }
    }

    /// Replaces the sleeper used between attempts.
    pub fn with_sleeper<S2>(self, sleeper: S2) -> RequestExecutor<T, S2> {
        RequestExecutor {
            transport: self.transport,
            sleeper,
            base_url: self.base_url,
            credential: self.credential,
            default_headers: self.default_headers,
            options: self.options,
        }
    }

    /// Validates and applies new options.
    pub fn with_options(mut self, options: ClientOptions) -> Result<Self> {
        options.validate()?;
        self.options = options;
        Ok(self)
    }

    /// Adds a header sent on every request, overriding the built-in defaults.
    pub fn with_default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn build_request(&self, request: &ApiRequest) -> HttpRequest {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            HeaderName::from_static(API_TOKEN_HEADER),
            self.credential.clone(),
        );
        merge_headers(&mut headers, &self.default_headers);
        merge_headers(&mut headers, &request.headers);

        HttpRequest {
            method: request.method.clone(),
            url: join_url(&self.base_url, &request.endpoint),
            headers,
            body: request.body.clone(),
        }
    }
}

impl<T: Transport, S: Sleeper> RequestExecutor<T, S> {
    /// Executes `request`, retrying recoverable failures, and hands the
    /// successful response to `parser`.
    ///
    /// Parser failures are returned as-is and never retried.
    pub async fn request<O, P>(&self, request: ApiRequest, parser: P) -> Result<O>
    where
        P: FnOnce(HttpResponse) -> Result<O>,
    {
        if request.endpoint.trim().is_empty() {
            return Err(MarvinError::InvalidRequest(
                "endpoint must not be empty".to_owned(),
            ));
        }
        let response = self.send_with_retry(&request).await?;
        parser(response)
    }

    /// GET `endpoint` and decode the JSON body.
    pub async fn get<O: DeserializeOwned>(&self, endpoint: &str) -> Result<O> {
        self.request(ApiRequest::get(endpoint), parse_json).await
    }

    /// POST `body` as JSON to `endpoint` and decode the JSON body.
    pub async fn post<O, B>(&self, endpoint: &str, body: &B) -> Result<O>
    where
        O: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = ApiRequest::post(endpoint).json(body)?;
        self.request(request, parse_json).await
    }

    /// GET `endpoint` and return the raw body text.
    pub async fn get_text(&self, endpoint: &str) -> Result<String> {
        self.request(ApiRequest::get(endpoint), parse_text).await
    }

    /// POST to `endpoint`, with an optional JSON body, and return the raw body text.
    pub async fn post_text<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<String> {
        let mut request = ApiRequest::post(endpoint);
        if let Some(body) = body {
            request = request.json(body)?;
        }
        self.request(request, parse_text).await
    }

    async fn send_with_retry(
        &self,
        request: &ApiRequest,
    ) -> std::result::Result<HttpResponse, ApiError> {
        let max_retries = self.options.max_retries;
        let mut last_error: Option<ApiError> = None;

        for attempt in 0..=max_retries {
            let error = match self.attempt(request).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            if error.is_client_error() && !error.is_rate_limited() {
                return Err(error);
            }
            if attempt == max_retries {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    endpoint = %request.endpoint,
                    attempts = attempt + 1,
                    status = error.status(),
                    "giving up: {}",
                    error
                );
                return Err(error);
            }

            let delay_ms = error
                .retry_after_ms()
                .unwrap_or_else(|| backoff_delay_ms(self.options.retry_backoff_ms, attempt));

            #[cfg(feature = "tracing")]
            tracing::debug!(
                endpoint = %request.endpoint,
                attempt,
                status = error.status(),
                "retrying request after {} ms",
                delay_ms
            );

            last_error = Some(error);
            self.sleeper.sleep(Duration::from_millis(delay_ms)).await;
        }

        Err(last_error.unwrap_or_else(|| {
            ApiError::retry_exhausted(&request.endpoint, &request.method, max_retries + 1)
        }))
    }

    /// Runs one attempt under the timeout governor.
    async fn attempt(&self, request: &ApiRequest) -> std::result::Result<HttpResponse, ApiError> {
        let http_request = self.build_request(request);
        let budget = Duration::from_millis(self.options.timeout_ms);

        let outcome = match tokio::time::timeout(budget, self.transport.send(http_request)).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => {
                return Err(ApiError::timed_out(
                    &request.endpoint,
                    &request.method,
                    self.options.timeout_ms,
                ))
            }
        };

        let response = outcome
            .map_err(|fault| ApiError::from_transport(fault, &request.endpoint, &request.method))?;
        if response.is_success() {
            return Ok(response);
        }

        let retry_after_ms = response
            .header(header::RETRY_AFTER)
            .and_then(|value| parse_retry_after(value, SystemTime::now()));
        Err(ApiError::from_response(
            response.status.as_u16(),
            response.status_text(),
            request.endpoint.clone(),
            request.method.clone(),
            retry_after_ms,
        ))
    }
}
