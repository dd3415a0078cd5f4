//! Per-device tuning loop

use crate::ledger::TuningLedger;
use crate::probe::StabilityProbe;
use crate::search::Tuner;

use rig_core::{Configurator, DeviceId, DeviceReport, Error, Result, TuningResult, Verdict};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome of running one device through the optimizer
#[derive(Debug)]
pub struct DeviceOutcome<T> {
    pub device: DeviceId,
    pub outcome: Result<T>,
}

/// Drives the search, the configurator and the stability probe for one device at a time
pub struct Optimizer {
    tuner: Tuner,
    configurator: Arc<dyn Configurator>,
    probe: StabilityProbe,
    ledger: TuningLedger,
}

impl Optimizer {
    pub fn new(
        tuner: Tuner,
        configurator: Arc<dyn Configurator>,
        probe: StabilityProbe,
        ledger: TuningLedger,
    ) -> Self {
        Self {
            tuner,
            configurator,
            probe,
            ledger,
        }
    }

    pub fn ledger(&self) -> &TuningLedger {
        &self.ledger
    }

    /// Search for a stable configuration of `device`.
    ///
    /// Devices that already have a result are not touched again. Otherwise
    /// the search resumes from the stored progress and tries candidates until
    /// one is stable or the search is exhausted; both end with a recorded
    /// result. Control surface and workload errors abort the search without
    /// recording the candidate that was being tried.
    pub async fn optimize_device(&mut self, device: DeviceId) -> Result<DeviceReport> {
        if let Some(result) = self.ledger.result(device) {
            info!("Device {} already optimized", device);
            return Ok(DeviceReport::from(result));
        }

        info!("Optimizing device {}...", device);
        self.configurator.select_active_device(device).await?;

        let mut progress = self
            .ledger
            .progress(device)
            .unwrap_or_else(|| self.tuner.initial_progress());

        loop {
            if let Err(e) = self.tuner.advance(&mut progress) {
                let reason = match e {
                    Error::SearchExhausted(reason) => reason,
                    other => other.to_string(),
                };
                warn!("Device {} search exhausted: {}", device, reason);

                self.ledger.set_progress(device, progress);
                self.ledger.set_result(device, TuningResult::Failed { reason: reason.clone() });
                self.ledger.persist().await?;
                return Ok(DeviceReport::Failed { reason });
            }

            info!(
                "Device {}: trying {} mV / {} MHz ({})",
                device, progress.voltage, progress.memory_clock, progress.state
            );
            self.configurator
                .apply(device, progress.voltage, progress.memory_clock)
                .await?;

            let verdict = self.probe.run().await?;
            self.ledger.set_progress(device, progress);

            if verdict == Verdict::Stable {
                let result = TuningResult::Stable(progress);
                let report = DeviceReport::from(&result);
                self.ledger.set_result(device, result);
                self.ledger.persist().await?;
                info!("Device {} {}", device, report);
                return Ok(report);
            }

            self.ledger.persist().await?;
        }
    }

    /// Re-run the stored candidate of `device` once without advancing the search.
    ///
    /// Returns `None` when the device has no stored progress. The ledger is never modified.
    pub async fn check_device(&self, device: DeviceId) -> Result<Option<Verdict>> {
        let Some(progress) = self.ledger.progress(device) else {
            info!("Skipping device {}", device);
            return Ok(None);
        };

        info!(
            "Checking device {} at {} mV / {} MHz...",
            device, progress.voltage, progress.memory_clock
        );
        self.configurator.select_active_device(device).await?;
        self.configurator
            .apply(device, progress.voltage, progress.memory_clock)
            .await?;

        let verdict = self.probe.run().await?;
        match verdict {
            Verdict::Stable => info!("Device {} is stable", device),
            Verdict::Unstable => warn!("Device {} is NOT stable", device),
        }
        Ok(Some(verdict))
    }

    /// Optimize each device in turn; a failing device does not stop the others
    pub async fn optimize_all(&mut self, devices: &[DeviceId]) -> Vec<DeviceOutcome<DeviceReport>> {
        let mut outcomes = Vec::with_capacity(devices.len());
        for &device in devices {
            let outcome = self.optimize_device(device).await;
            if let Err(e) = &outcome {
                error!("Optimizing device {} aborted: {}", device, e);
            }
            outcomes.push(DeviceOutcome { device, outcome });
        }
        outcomes
    }

    /// Check each device in turn; a failing device does not stop the others
    pub async fn check_all(&self, devices: &[DeviceId]) -> Vec<DeviceOutcome<Option<Verdict>>> {
        let mut outcomes = Vec::with_capacity(devices.len());
        for &device in devices {
            let outcome = self.check_device(device).await;
            if let Err(e) = &outcome {
                error!("Checking device {} aborted: {}", device, e);
            }
            outcomes.push(DeviceOutcome { device, outcome });
        }
        outcomes
    }
}
