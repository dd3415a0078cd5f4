//! Bounded retry with a fixed delay between attempts

use crate::{CaptureConfig, Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retry an operation up to a fixed number of attempts
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy. At least one attempt is always made.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `operation` until it succeeds or the attempts run out.
    ///
    /// The delay is only slept between attempts, never after the last one.
    /// On exhaustion the error of the final attempt is returned.
    pub async fn attempt<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    debug!("Attempt {}/{} failed: {}", attempt, self.max_attempts, e);
                    last_error = Some(e);

                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::config("Retry policy made no attempts")))
    }
}

impl From<&CaptureConfig> for RetryPolicy {
    fn from(config: &CaptureConfig) -> Self {
        Self::new(config.max_attempts, config.retry_delay())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_zero_attempts_clamped() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_succeeds_after_failures() {
        let policy = RetryPolicy::new(5, Duration::from_secs(5));
        let started = Instant::now();

        let mut calls = 0;
        let result = policy
            .attempt(|| {
                calls += 1;
                let current = calls;
                async move {
                    if current < 3 {
                        Err(Error::Capture("display busy".to_string()))
                    } else {
                        Ok(current)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
        // Two failed attempts, two delays
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_exhausted_returns_last_error() {
        let policy = RetryPolicy::new(3, Duration::from_secs(5));
        let started = Instant::now();

        let mut calls = 0;
        let result: Result<()> = policy
            .attempt(|| {
                calls += 1;
                let current = calls;
                async move { Err(Error::Capture(format!("failure {}", current))) }
            })
            .await;

        assert_eq!(calls, 3);
        assert_eq!(result.unwrap_err().to_string(), "Capture error: failure 3");
        // No delay after the final attempt
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[test]
    fn test_from_capture_config() {
        let policy = RetryPolicy::from(&CaptureConfig::default());
        assert_eq!(policy.max_attempts(), 10);
        assert_eq!(policy.delay(), Duration::from_secs(5));
    }
}
