//! Diagnostic screenshots with bounded retries

use rig_core::{CaptureConfig, DiagnosticCapture, RetryPolicy};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Retries a [`DiagnosticCapture`] with a fixed delay; failure is never fatal
#[derive(Clone)]
pub struct CaptureRetry {
    capture: Arc<dyn DiagnosticCapture>,
    policy: RetryPolicy,
}

impl CaptureRetry {
    pub fn new(capture: Arc<dyn DiagnosticCapture>, config: &CaptureConfig) -> Self {
        Self {
            capture,
            policy: RetryPolicy::from(config),
        }
    }

    /// Take a screenshot, returning whether one was recorded
    pub async fn capture_screenshot(&self) -> bool {
        info!("Taking screenshot");

        let result = self
            .policy
            .attempt(move || async move {
                let result = self.capture.capture().await;
                if let Err(e) = &result {
                    error!("Screenshot failed: {}", e);
                }
                result
            })
            .await;

        match result {
            Ok(()) => {
                info!("Screenshot done");
                true
            }
            Err(e) => {
                warn!(
                    "Failed to take screenshot after {} attempts: {}",
                    self.policy.max_attempts(),
                    e
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig_core::mock::MockCapture;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_capture_retries_until_success() {
        let capture = MockCapture::failing_times(3);
        let retry = CaptureRetry::new(Arc::new(capture.clone()), &CaptureConfig::default());
        let started = Instant::now();

        assert!(retry.capture_screenshot().await);
        assert_eq!(capture.calls(), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_gives_up_after_attempt_cap() {
        let capture = MockCapture::failing_times(100);
        let retry = CaptureRetry::new(Arc::new(capture.clone()), &CaptureConfig::default());

        assert!(!retry.capture_screenshot().await);
        assert_eq!(capture.calls(), 10);
        assert_eq!(capture.successes(), 0);
    }
}
