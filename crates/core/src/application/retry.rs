// Retry logic for transport faults
use tracing::warn;

use crate::error::TransportFault;

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Close the connection, reopen it and replay the same request
    Retry,
    /// Surface the fault to the caller
    GiveUp,
}

/// Retry policy for a flaky persistent connection
///
/// Pool workers are recycled periodically; a request that lands on a
/// worker mid-recycle is rejected at the connection level. That rejection
/// is replayed on a fresh connection a bounded number of times. Any other
/// fault class is fatal immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single()
    }
}

impl RetryPolicy {
    /// Exactly one replay per run
    pub const fn single() -> Self {
        Self { max_retries: 1 }
    }

    pub const fn never() -> Self {
        Self { max_retries: 0 }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Decide what to do after `fault` on attempt number `attempt` (0-based)
    ///
    /// # Example
    /// ```text
    /// let policy = RetryPolicy::single();
    /// assert_eq!(policy.should_retry(TransportFault::Forbidden, 0), RetryDecision::Retry);
    /// assert_eq!(policy.should_retry(TransportFault::Forbidden, 1), RetryDecision::GiveUp);
    /// ```
    pub fn should_retry(&self, fault: TransportFault, attempt: u32) -> RetryDecision {
        if !fault.is_transient() {
            return RetryDecision::GiveUp;
        }

        if attempt >= self.max_retries {
            warn!(
                fault = %fault,
                attempt = %attempt,
                max_retries = %self.max_retries,
                "Transient fault repeated, giving up"
            );
            return RetryDecision::GiveUp;
        }

        RetryDecision::Retry
    }
}
