//! Bounded retry for the per-frame pipeline.
//!
//! A frame that fails to process is retried after a fixed delay.  A failure
//! that keeps reproducing past the budget becomes [`CaptureError::Fatal`],
//! which the binary turns into a non-zero exit so a supervisor can restart
//! the relay with fresh state.

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Errors raised while turning a captured frame into a delivered one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// A single processing attempt failed; it may succeed on retry.
    #[error("frame processing failed: {0}")]
    Transient(String),

    /// The retry budget was exhausted.
    #[error("frame processing failed {attempts} times in a row; last error: {last}")]
    Fatal { attempts: u32, last: String },
}

/// How often and how patiently to retry a failing frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Pause before each retry.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    /// 10 retries, 100 ms apart.
    fn default() -> Self {
        Self {
            max_retries: 10,
            delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Total number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Runs `op` until it succeeds or the policy's budget is spent.
///
/// `op` receives the 1-based attempt number.  Only [`CaptureError::Transient`]
/// is retried; any other error is returned immediately.  The thread sleeps
/// between attempts, so call this from the blocking capture thread only.
///
/// # Errors
///
/// Returns [`CaptureError::Fatal`] carrying the last transient message when
/// every attempt failed, or the first non-transient error.
pub fn retry_with_backoff<T, F>(policy: &RetryPolicy, mut op: F) -> Result<T, CaptureError>
where
    F: FnMut(u32) -> Result<T, CaptureError>,
{
    let attempts = policy.max_attempts();
    let mut last = String::new();

    for attempt in 1..=attempts {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(CaptureError::Transient(msg)) => {
                warn!("frame attempt {attempt}/{attempts} failed: {msg}");
                last = msg;
                if attempt < attempts && !policy.delay.is_zero() {
                    std::thread::sleep(policy.delay);
                }
            }
            Err(other) => return Err(other),
        }
    }

    Err(CaptureError::Fatal { attempts, last })
}
