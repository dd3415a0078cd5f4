//! Throughput health classification

use crate::capture::CaptureRetry;
use rig_core::{HealthSample, Result, ThroughputSampler, WatchdogConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Why the watchdog gave up on the running workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthDecision {
    /// The status surface stopped answering
    Down,
    /// Throughput stayed at or below the threshold
    Dropped,
}

impl fmt::Display for HealthDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthDecision::Down => write!(f, "down"),
            HealthDecision::Dropped => write!(f, "dropped"),
        }
    }
}

/// Consecutive failure counters of one health cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchdogCounters {
    pub error_count: u32,
    pub drop_count: u32,
}

impl WatchdogCounters {
    /// Fold one sampling attempt into the counters.
    ///
    /// A successful reading clears the error count; a failed one leaves the
    /// drop count untouched.
    pub fn record(&mut self, sample: &Result<HealthSample>, rate_threshold: f64) {
        match sample {
            Ok(sample) => {
                self.error_count = 0;
                if sample.rate <= rate_threshold {
                    self.drop_count += 1;
                } else {
                    self.drop_count = 0;
                }
            }
            Err(_) => self.error_count += 1,
        }
    }

    /// Decision reached by the counters, if any. Errors are checked before drops.
    pub fn decision(&self, config: &WatchdogConfig) -> Option<HealthDecision> {
        if self.error_count >= config.error_threshold {
            Some(HealthDecision::Down)
        } else if self.drop_count >= config.drop_threshold {
            Some(HealthDecision::Dropped)
        } else {
            None
        }
    }
}

/// Samples a running workload until it is judged down or degraded
#[derive(Clone)]
pub struct HealthChecker {
    config: WatchdogConfig,
    sampler: Arc<dyn ThroughputSampler>,
    capture: CaptureRetry,
}

impl HealthChecker {
    pub fn new(config: WatchdogConfig, sampler: Arc<dyn ThroughputSampler>, capture: CaptureRetry) -> Self {
        Self {
            config,
            sampler,
            capture,
        }
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    /// Monitor until a decision is reached. Never returns while the workload is healthy.
    pub async fn check_health(&self) -> HealthDecision {
        let mut counters = WatchdogCounters::default();

        loop {
            let sample = self.sampler.sample().await;
            match &sample {
                Ok(sample) => {
                    info!("Hash rate = {:.1}/s", sample.rate);
                    if sample.rate <= self.config.rate_threshold {
                        warn!(
                            "Hash rate ({:.1}/s) at or below threshold ({:.1}/s)",
                            sample.rate, self.config.rate_threshold
                        );
                    }
                }
                Err(e) => error!("Sampling failed: {}", e),
            }

            counters.record(&sample, self.config.rate_threshold);
            debug!("Watchdog counters: {:?}", counters);

            if let Some(decision) = counters.decision(&self.config) {
                match decision {
                    HealthDecision::Down => warn!("Workload is down"),
                    HealthDecision::Dropped => warn!("Workload has dropped hash rate"),
                }
                self.capture.capture_screenshot().await;
                return decision;
            }

            sleep(self.config.check_interval()).await;
        }
    }
}
