//! Outer supervise loop: restart the workload whenever it is judged unhealthy

use crate::capture::CaptureRetry;
use crate::health::{HealthChecker, HealthDecision};
use rig_core::{Result, WorkloadControl};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Keeps one workload running and restarts it when its throughput fails
pub struct Sentinel {
    workload: Arc<dyn WorkloadControl>,
    checker: HealthChecker,
    capture: CaptureRetry,
}

impl Sentinel {
    pub fn new(workload: Arc<dyn WorkloadControl>, checker: HealthChecker, capture: CaptureRetry) -> Self {
        Self {
            workload,
            checker,
            capture,
        }
    }

    /// Kill the workload, launch it again and wait for it to settle.
    ///
    /// A failed stop is logged and the launch still happens; only a failed
    /// start is returned.
    pub async fn restart_cycle(&self) -> Result<()> {
        info!("Restarting workload");
        if let Err(e) = self.workload.stop().await {
            warn!("Failed to stop workload, relaunching anyway: {}", e);
        }
        let handle = self.workload.start().await?;

        let settle = self.checker.config().settle_delay();
        info!(
            "Waiting {}s for workload to initialize (pid {:?})...",
            settle.as_secs(),
            handle.pid
        );
        sleep(settle).await;
        Ok(())
    }

    /// One health cycle followed by a restart
    pub async fn supervise_once(&self) -> HealthDecision {
        let decision = self.checker.check_health().await;
        warn!("Workload {}, restarting", decision);

        if let Err(e) = self.restart_cycle().await {
            error!("Restart failed: {}", e);
        }
        decision
    }

    /// Capture the initial state, restart the workload, then supervise forever
    pub async fn run(&self) {
        self.capture.capture_screenshot().await;
        if let Err(e) = self.restart_cycle().await {
            error!("Initial restart failed: {}", e);
        }

        loop {
            self.supervise_once().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig_core::mock::{MockCapture, MockWorkload, ScriptedSampler};
    use rig_core::{CaptureConfig, WatchdogConfig};
    use std::time::Duration;
    use tokio::time::Instant;

    fn sentinel(workload: &MockWorkload, sampler: &ScriptedSampler, capture: &MockCapture) -> Sentinel {
        let capture = CaptureRetry::new(Arc::new(capture.clone()), &CaptureConfig::default());
        let checker = HealthChecker::new(WatchdogConfig::default(), Arc::new(sampler.clone()), capture.clone());
        Sentinel::new(Arc::new(workload.clone()), checker, capture)
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_cycle_stops_then_starts_and_settles() {
        let workload = MockWorkload::new();
        let sentinel = sentinel(&workload, &ScriptedSampler::steady(16000.0), &MockCapture::new());
        let started = Instant::now();

        sentinel.restart_cycle().await.unwrap();

        assert_eq!(workload.stops(), 1);
        assert_eq!(workload.starts(), 1);
        assert_eq!(started.elapsed(), Duration::from_secs(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_failure_is_reported() {
        let workload = MockWorkload::failing();
        let sentinel = sentinel(&workload, &ScriptedSampler::steady(16000.0), &MockCapture::new());

        let err = sentinel.restart_cycle().await.unwrap_err();
        assert!(err.is_io());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_stop_still_relaunches() {
        let workload = MockWorkload::unstoppable();
        let sentinel = sentinel(&workload, &ScriptedSampler::broken(), &MockCapture::new());

        sentinel.restart_cycle().await.unwrap();
        assert_eq!(workload.stops(), 1);
        assert_eq!(workload.starts(), 1);

        assert_eq!(sentinel.supervise_once().await, HealthDecision::Down);
        assert_eq!(workload.stops(), 2);
        assert_eq!(workload.starts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervise_once_restarts_after_decision() {
        let workload = MockWorkload::new();
        let sampler = ScriptedSampler::broken();
        let capture = MockCapture::new();
        let sentinel = sentinel(&workload, &sampler, &capture);

        let decision = sentinel.supervise_once().await;

        assert_eq!(decision, HealthDecision::Down);
        assert_eq!(capture.successes(), 1);
        assert_eq!(workload.stops(), 1);
        assert_eq!(workload.starts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervise_survives_failed_restart() {
        let workload = MockWorkload::failing();
        let sampler = ScriptedSampler::steady(100.0);
        let sentinel = sentinel(&workload, &sampler, &MockCapture::new());

        assert_eq!(sentinel.supervise_once().await, HealthDecision::Dropped);
        assert_eq!(sentinel.supervise_once().await, HealthDecision::Dropped);
        assert_eq!(sampler.calls(), 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_keeps_restarting() {
        let workload = MockWorkload::new();
        let sampler = ScriptedSampler::broken();
        let capture = MockCapture::new();
        let sentinel = sentinel(&workload, &sampler, &capture);

        // Initial restart settles at 200s; each cycle then takes 20s of
        // sampling and 200s of settling, so decisions land at 220s, 440s,
        // 660s and 880s.
        let result = tokio::time::timeout(Duration::from_secs(1000), sentinel.run()).await;

        assert!(result.is_err());
        assert_eq!(workload.starts(), 5);
        assert_eq!(workload.stops(), 5);
        assert_eq!(capture.successes(), 5);
    }
}
