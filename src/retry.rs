//! Backoff computation, `Retry-After` parsing and the delay seam.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Parses a `Retry-After` header value into milliseconds from `now`.
///
/// Accepts delay-seconds (`"120"`, `"1.5"`) or an HTTP-date
/// (`"Wed, 21 Oct 2015 07:28:00 GMT"`). Fractional milliseconds are
/// floored. Past instants and negative seconds clamp to zero. Anything
/// else, including `NaN` and infinities, is treated as absent.
pub fn parse_retry_after(value: &str, now: SystemTime) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(seconds) = value.parse::<f64>() {
        if !seconds.is_finite() {
            return None;
        }
        // Float-to-int `as` saturates at the bounds.
        return Some((seconds * 1_000.0).floor().max(0.0) as u64);
    }

    let at = httpdate::parse_http_date(value).ok()?;
    let wait = at.duration_since(now).unwrap_or(Duration::ZERO);
    Some(u64::try_from(wait.as_millis()).unwrap_or(u64::MAX))
}

/// Exponential backoff: `base_ms * 2^attempt`, saturating.
pub fn backoff_delay_ms(base_ms: u64, attempt: usize) -> u64 {
    let factor = u32::try_from(attempt)
        .ok()
        .and_then(|exp| 1u64.checked_shl(exp))
        .unwrap_or(u64::MAX);
    base_ms.saturating_mul(factor)
}

/// Suspends between retry attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

impl<S: Sleeper> Sleeper for Arc<S> {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        (**self).sleep(duration)
    }
}

/// Sleeps on the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
