//! Capability traits for the collaborators the control loops drive
//!
//! The tuner and the watchdog never touch hardware, processes or status
//! pages directly. They call into these traits, which `rig-adapters`
//! implements for real deployments and [`crate::mock`] implements for tests.

use crate::{DeviceId, HealthSample, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Pushes operating parameters to a device's control surface
#[async_trait]
pub trait Configurator: Send + Sync {
    /// Apply a core voltage (mV) and memory clock (MHz) to a device
    async fn apply(&self, device: DeviceId, voltage: i32, memory_clock: i32) -> Result<()>;

    /// Direct the workload to exercise the given device
    async fn select_active_device(&self, device: DeviceId) -> Result<()>;
}

/// Handle describing a started workload
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadHandle {
    /// OS process id, when the workload is a local process
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
}

/// Starts and stops the workload (the mining or compute job)
#[async_trait]
pub trait WorkloadControl: Send + Sync {
    /// Launch the workload
    async fn start(&self) -> Result<WorkloadHandle>;

    /// Terminate the workload. Stopping a workload that is not running is not an error.
    async fn stop(&self) -> Result<()>;
}

/// Reads the current throughput of a running workload
#[async_trait]
pub trait ThroughputSampler: Send + Sync {
    /// Take one reading; failures are reported as [`crate::Error::Transient`]
    async fn sample(&self) -> Result<HealthSample>;
}

/// Records a diagnostic screenshot
#[async_trait]
pub trait DiagnosticCapture: Send + Sync {
    async fn capture(&self) -> Result<()>;
}
