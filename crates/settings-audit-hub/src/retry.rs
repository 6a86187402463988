// crates/settings-audit-hub/src/retry.rs
// ============================================================================
// Module: Request Retry Policy
// Description: Bounded retries with exponential backoff for hub requests.
// Purpose: Absorb transient network failures without masking real errors.
// Dependencies: settings-audit-core, tracing
// ============================================================================

//! ## Overview
//! Only transport failures (timeouts, connection errors) are retried. An HTTP
//! status error is an answer from the hub and is returned immediately.
//! The delay before retry `n` (zero-based) is `initial_backoff * 2^n`, capped
//! at `max_backoff`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::thread;
use std::time::Duration;

use settings_audit_core::FetchError;
use tracing::debug;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default total attempts per request, first try included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
/// Default delay before the first retry.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(100);
/// Default upper bound on a single retry delay.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(2);

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Retry policy applied to every hub request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included. Zero behaves as one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on a single retry delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` and default backoff bounds.
    #[must_use]
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Returns the delay before retry number `retry` (zero-based).
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    /// Runs `call` until it succeeds, fails permanently, or attempts run out.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last retryable one once
    /// attempts are exhausted.
    pub fn run<T, F>(&self, operation: &str, mut call: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Result<T, FetchError>,
    {
        let attempts = self.max_attempts.max(1);
        let mut retry = 0;
        loop {
            match call() {
                Ok(value) => {
                    if retry > 0 {
                        debug!(operation, attempt = retry + 1, "request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && retry + 1 < attempts => {
                    let delay = self.backoff(retry);
                    debug!(
                        operation,
                        attempt = retry + 1,
                        max_attempts = attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient error, retrying after backoff"
                    );
                    thread::sleep(delay);
                    retry += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
