use crate::{MarvinError, Result};

/// Configures HTTP timeout and retry behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Per-attempt timeout in milliseconds. Must be positive.
    pub timeout_ms: u64,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Base retry backoff in milliseconds (exponential strategy). Must be positive.
    pub retry_backoff_ms: u64,
}

impl ClientOptions {
    /// Shorter timeout for calls a user is actively waiting on.
    pub fn interactive() -> Self {
        Self {
            timeout_ms: 10_000,
            ..Self::default()
        }
    }

    /// Checks the invariants the executor relies on.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(MarvinError::Config(
                "timeout_ms must be greater than zero".to_owned(),
            ));
        }
        if self.retry_backoff_ms == 0 {
            return Err(MarvinError::Config(
                "retry_backoff_ms must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_retries: 3,
            retry_backoff_ms: 1_000,
        }
    }
}
