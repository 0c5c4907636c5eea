use std::fmt;
use std::time::SystemTime;

use reqwest::Method;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum MarvinError {
    /// A failed call: transport fault, timeout or non-success HTTP status.
    #[error(transparent)]
    Api(ApiError),
    /// The response was successful but its body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// The request could not be built (empty endpoint, unserializable body).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Invalid client options, header values or environment.
    #[error("configuration error: {0}")]
    Config(String),
}

impl MarvinError {
    /// Returns the failure record when this error came from a call attempt.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ApiError> for MarvinError {
    fn from(err: ApiError) -> Self {
        Self::Api(err)
    }
}

/// Raw fault produced by a [`Transport`](crate::Transport) before any HTTP
/// response was received.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport already produced a normalized failure.
    #[error(transparent)]
    Api(ApiError),
    /// Connection refused, DNS failure, TLS error, broken body stream.
    #[error("connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The underlying client gave up waiting.
    #[error("request timed out")]
    Timeout,
    /// A fault with nothing useful to report.
    #[error("unknown error")]
    Unknown,
}

impl TransportError {
    /// Wraps any error as a connection fault.
    pub fn connection(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Connection(err.into())
    }
}

const NETWORK_ERROR: &str = "Network Error";
const UNKNOWN_ERROR: &str = "Unknown Error";
const RETRY_EXHAUSTED: &str = "Retry Exhausted";

/// Normalized record of one failed attempt.
///
/// `status` is `0` when no response was ever received. The record is never
/// mutated after construction.
#[derive(Clone, Debug)]
pub struct ApiError {
    message: String,
    status: u16,
    status_text: String,
    endpoint: String,
    method: Method,
    timestamp: SystemTime,
    retry_after_ms: Option<u64>,
}

impl ApiError {
    /// Builds a failure from a non-success HTTP response.
    pub fn from_response(
        status: u16,
        status_text: &str,
        endpoint: impl Into<String>,
        method: Method,
        retry_after_ms: Option<u64>,
    ) -> Self {
        let status_text = if status_text.trim().is_empty() {
            UNKNOWN_ERROR
        } else {
            status_text
        };
        Self {
            message: format!("HTTP {status}: {status_text}"),
            status,
            status_text: status_text.to_owned(),
            endpoint: endpoint.into(),
            method,
            timestamp: SystemTime::now(),
            retry_after_ms,
        }
    }

    /// Normalizes a raw transport fault.
    ///
    /// An already-normalized failure passes through unchanged.
    pub fn from_transport(fault: TransportError, endpoint: &str, method: &Method) -> Self {
        match fault {
            TransportError::Api(err) => err,
            TransportError::Connection(err) => {
                Self::network(err.to_string(), NETWORK_ERROR, endpoint, method.clone())
            }
            TransportError::Timeout => Self::network(
                TransportError::Timeout.to_string(),
                NETWORK_ERROR,
                endpoint,
                method.clone(),
            ),
            TransportError::Unknown => {
                Self::network("Unknown error", UNKNOWN_ERROR, endpoint, method.clone())
            }
        }
    }

    /// The attempt was aborted because it outlived its time budget.
    pub fn timed_out(endpoint: &str, method: &Method, timeout_ms: u64) -> Self {
        Self::network(
            format!("request aborted: no response within {timeout_ms} ms"),
            NETWORK_ERROR,
            endpoint,
            method.clone(),
        )
    }

    pub(crate) fn retry_exhausted(endpoint: &str, method: &Method, attempts: usize) -> Self {
        Self::network(
            format!("request to {endpoint} failed after {attempts} attempt(s)"),
            RETRY_EXHAUSTED,
            endpoint,
            method.clone(),
        )
    }

    fn network(
        message: impl Into<String>,
        status_text: &str,
        endpoint: &str,
        method: Method,
    ) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "Unknown error".to_owned();
        }
        Self {
            message,
            status: 0,
            status_text: status_text.to_owned(),
            endpoint: endpoint.to_owned(),
            method,
            timestamp: SystemTime::now(),
            retry_after_ms: None,
        }
    }

    /// Human-readable summary, also used by `Display`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status code, or `0` for a transport-level fault.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Reason phrase, or `"Network Error"` for transport faults.
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Endpoint path the request was sent to, without the base URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// HTTP method of the failed request.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// When the failure was recorded.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Server-requested delay before retrying, if one was sent.
    pub fn retry_after_ms(&self) -> Option<u64> {
        self.retry_after_ms
    }

    /// True for 4xx statuses, including 429.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// True for 5xx statuses.
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    /// True for server errors and transport faults.
    pub fn is_retryable(&self) -> bool {
        self.is_server_error() || self.status == 0
    }

    /// True for 429 Too Many Requests.
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::{ApiError, MarvinError, TransportError};
    use reqwest::Method;

    fn status_error(status: u16) -> ApiError {
        ApiError::from_response(status, "Reason", "/todayItems", Method::GET, None)
    }

    #[test]
    fn classifies_client_errors() {
        for status in [400, 404, 429, 499] {
            let err = status_error(status);
            assert!(err.is_client_error(), "{status} must be a client error");
            assert!(!err.is_server_error());
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn classifies_server_errors_as_retryable() {
        for status in [500, 502, 503, 599] {
            let err = status_error(status);
            assert!(err.is_server_error());
            assert!(!err.is_client_error());
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn redirect_like_status_is_neither_client_nor_server() {
        let err = status_error(304);
        assert!(!err.is_client_error());
        assert!(!err.is_server_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn classification_is_stable_across_calls() {
        let err = status_error(503);
        let first = (err.is_client_error(), err.is_server_error(), err.is_retryable());
        for _ in 0..5 {
            assert_eq!(
                (err.is_client_error(), err.is_server_error(), err.is_retryable()),
                first
            );
        }
    }

    #[test]
    fn response_failure_message_names_status_and_reason() {
        let err =
            ApiError::from_response(503, "Service Unavailable", "/me", Method::GET, Some(1_500));
        assert_eq!(err.message(), "HTTP 503: Service Unavailable");
        assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");
        assert_eq!(err.endpoint(), "/me");
        assert_eq!(err.method(), &Method::GET);
        assert_eq!(err.retry_after_ms(), Some(1_500));
    }

    #[test]
    fn blank_reason_phrase_is_replaced() {
        let err = ApiError::from_response(520, "", "/me", Method::GET, None);
        assert_eq!(err.status_text(), "Unknown Error");
        assert_eq!(err.message(), "HTTP 520: Unknown Error");
    }

    #[test]
    fn connection_fault_keeps_its_message() {
        let fault = TransportError::connection("dns lookup failed");
        let err = ApiError::from_transport(fault, "/addTask", &Method::POST);
        assert_eq!(err.status(), 0);
        assert_eq!(err.status_text(), "Network Error");
        assert!(err.message().contains("dns lookup failed"));
        assert!(err.is_retryable());
        assert_eq!(err.retry_after_ms(), None);
    }

    #[test]
    fn opaque_fault_becomes_unknown_error() {
        let err = ApiError::from_transport(TransportError::Unknown, "/me", &Method::GET);
        assert_eq!(err.status(), 0);
        assert_eq!(err.message(), "Unknown error");
        assert_eq!(err.status_text(), "Unknown Error");
    }

    #[test]
    fn typed_fault_passes_through_unchanged() {
        let original = ApiError::from_response(418, "I'm a teapot", "/me", Method::GET, None);
        let timestamp = original.timestamp();
        let err = ApiError::from_transport(
            TransportError::Api(original),
            "/other",
            &Method::POST,
        );
        assert_eq!(err.status(), 418);
        assert_eq!(err.endpoint(), "/me");
        assert_eq!(err.method(), &Method::GET);
        assert_eq!(err.timestamp(), timestamp);
    }

    #[test]
    fn timeout_failure_is_a_transport_fault() {
        let err = ApiError::timed_out("/habits", &Method::GET, 250);
        assert_eq!(err.status(), 0);
        assert!(err.message().contains("aborted"));
        assert!(err.message().contains("250"));
        assert!(err.is_retryable());
    }

    #[test]
    fn marvin_error_exposes_failure_record() {
        let err = MarvinError::from(status_error(404));
        assert_eq!(err.as_api().map(ApiError::status), Some(404));
        assert_eq!(err.to_string(), "HTTP 404: Reason");
        assert!(MarvinError::Decode("bad".to_owned()).as_api().is_none());
    }
}
