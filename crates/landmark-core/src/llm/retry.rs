//! When and how long to wait before re-asking the enrichment service.

use crate::error::PipelineError;
use std::time::Duration;

/// Longest pause between two enrichment attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Retry budget for one enrichment call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub retries: u32,
    /// Pause before the first retry; doubles for each one after
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, base_delay_ms: u64) -> Self {
        Self {
            retries,
            base_delay: Duration::from_millis(base_delay_ms),
        }
    }

    /// Total attempts including the first.
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Pause before retry number `retry` (1-based), capped at `MAX_BACKOFF`.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// Whether `error` after attempt number `attempt` (1-based) earns another try.
    pub fn should_retry(&self, error: &PipelineError, attempt: u32) -> bool {
        attempt <= self.retries && is_transient(error)
    }
}

/// Errors that may clear up on their own: timeouts, unreachable services,
/// and HTTP 408/429/5xx.
pub fn is_transient(error: &PipelineError) -> bool {
    match error {
        PipelineError::Timeout { .. } | PipelineError::Unreachable { .. } => true,
        PipelineError::Llm {
            status_code: Some(code),
            ..
        } => matches!(code, 408 | 429 | 500..=599),
        _ => false,
    }
}
