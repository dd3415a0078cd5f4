//! Stability judgement of an applied configuration

use rig_core::{ProbeConfig, Result, ThroughputSampler, Verdict, WorkloadControl};
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Runs the workload against an applied configuration and watches its throughput.
///
/// A probe owns the workload for the duration of [`StabilityProbe::run`]: it
/// starts it, and stops it again before returning either verdict.
pub struct StabilityProbe {
    config: ProbeConfig,
    workload: Arc<dyn WorkloadControl>,
    sampler: Arc<dyn ThroughputSampler>,
}

impl StabilityProbe {
    pub fn new(
        config: ProbeConfig,
        workload: Arc<dyn WorkloadControl>,
        sampler: Arc<dyn ThroughputSampler>,
    ) -> Self {
        Self {
            config,
            workload,
            sampler,
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Start the workload, observe it for the configured window and stop it.
    ///
    /// Sampling errors never escape; only failures to start or stop the
    /// workload are returned as errors.
    pub async fn run(&self) -> Result<Verdict> {
        let handle = self.workload.start().await?;
        debug!("Workload started: {:?}", handle);

        info!("Waiting {}s for workload to initialize...", self.config.warmup_secs);
        sleep(self.config.warmup()).await;

        let verdict = self.observe().await;

        self.workload.stop().await?;
        Ok(verdict)
    }

    async fn observe(&self) -> Verdict {
        let deadline = Instant::now() + self.config.window();
        let mut error_count = 0;

        loop {
            match self.sampler.sample().await {
                Ok(sample) => {
                    error_count = 0;
                    let left = deadline.saturating_duration_since(Instant::now());
                    info!("Hash rate = {:.1}/s, {}s left", sample.rate, left.as_secs());
                }
                Err(e) => {
                    error_count += 1;
                    warn!(
                        "Sampling failed ({}/{}): {}",
                        error_count, self.config.error_threshold, e
                    );
                    if error_count >= self.config.error_threshold {
                        warn!("Stability check failed because of too many errors");
                        return Verdict::Unstable;
                    }
                }
            }

            sleep(self.config.poll_interval()).await;

            if Instant::now() >= deadline {
                info!("Stability check succeeded");
                return Verdict::Stable;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig_core::mock::{MockWorkload, SampleStep, ScriptedSampler};
    use std::time::Duration;

    fn probe(workload: &MockWorkload, sampler: &ScriptedSampler) -> StabilityProbe {
        StabilityProbe::new(
            ProbeConfig::default(),
            Arc::new(workload.clone()),
            Arc::new(sampler.clone()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_budget_ends_probe_early() {
        let workload = MockWorkload::new();
        let sampler = ScriptedSampler::broken();
        let started = Instant::now();

        let verdict = probe(&workload, &sampler).run().await.unwrap();

        assert_eq!(verdict, Verdict::Unstable);
        assert_eq!(sampler.calls(), 5);
        // 40s warm-up, then failures at +0s .. +4s
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(44));
        assert!(elapsed < Duration::from_secs(45));
        assert_eq!(workload.starts(), 1);
        assert_eq!(workload.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_window_is_stable_at_deadline() {
        let workload = MockWorkload::new();
        let sampler = ScriptedSampler::steady(16000.0);
        let started = Instant::now();

        let verdict = probe(&workload, &sampler).run().await.unwrap();

        assert_eq!(verdict, Verdict::Stable);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(40 + 1800));
        assert!(elapsed < Duration::from_secs(40 + 1801));
        assert_eq!(sampler.calls(), 1800);
        assert_eq!(workload.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_sample_resets_error_count() {
        let workload = MockWorkload::new();
        // Four failures followed by one good reading, over and over
        let script: Vec<SampleStep> = (0..2000)
            .map(|i| if i % 5 == 4 { SampleStep::Rate(15000.0) } else { SampleStep::Fail })
            .collect();
        let sampler = ScriptedSampler::new(script, SampleStep::Rate(15000.0));

        let verdict = probe(&workload, &sampler).run().await.unwrap();

        assert_eq!(verdict, Verdict::Stable);
        assert_eq!(workload.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_after_good_samples() {
        let workload = MockWorkload::new();
        let script = [
            SampleStep::Rate(1.0),
            SampleStep::Rate(1.0),
            SampleStep::Rate(1.0),
        ];
        let sampler = ScriptedSampler::new(script, SampleStep::Fail);
        let started = Instant::now();

        let verdict = probe(&workload, &sampler).run().await.unwrap();

        assert_eq!(verdict, Verdict::Unstable);
        assert_eq!(sampler.calls(), 8);
        assert!(started.elapsed() < Duration::from_secs(40 + 10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_workload_start_failure_propagates() {
        let workload = MockWorkload::failing();
        let sampler = ScriptedSampler::steady(16000.0);

        let err = probe(&workload, &sampler).run().await.unwrap_err();

        assert!(err.is_io());
        assert_eq!(sampler.calls(), 0);
    }
}
