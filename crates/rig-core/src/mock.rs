//! Scripted collaborators for testing the control loops

use crate::traits::{Configurator, DiagnosticCapture, ThroughputSampler, WorkloadControl, WorkloadHandle};
use crate::{DeviceId, Error, HealthSample, Result};

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Configurator that records every call
#[derive(Debug, Clone, Default)]
pub struct MockConfigurator {
    applied: Arc<RwLock<Vec<(DeviceId, i32, i32)>>>,
    selected: Arc<RwLock<Vec<DeviceId>>>,
    fail_apply: bool,
}

impl MockConfigurator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A configurator whose `apply` always fails
    pub fn failing() -> Self {
        Self {
            fail_apply: true,
            ..Self::default()
        }
    }

    pub async fn applied(&self) -> Vec<(DeviceId, i32, i32)> {
        self.applied.read().await.clone()
    }

    pub async fn selected(&self) -> Vec<DeviceId> {
        self.selected.read().await.clone()
    }
}

#[async_trait]
impl Configurator for MockConfigurator {
    async fn apply(&self, device: DeviceId, voltage: i32, memory_clock: i32) -> Result<()> {
        if self.fail_apply {
            return Err(Error::device(format!("mock apply failed for device {}", device)));
        }
        debug!("Mock apply device {}: {} mV / {} MHz", device, voltage, memory_clock);
        self.applied.write().await.push((device, voltage, memory_clock));
        Ok(())
    }

    async fn select_active_device(&self, device: DeviceId) -> Result<()> {
        self.selected.write().await.push(device);
        Ok(())
    }
}

/// Workload that only counts starts and stops
#[derive(Debug, Clone, Default)]
pub struct MockWorkload {
    starts: Arc<AtomicU32>,
    stops: Arc<AtomicU32>,
    fail_start: bool,
    fail_stop: bool,
}

impl MockWorkload {
    pub fn new() -> Self {
        Self::default()
    }

    /// A workload that can never be started
    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    /// A workload whose stop always fails; stops are still counted
    pub fn unstoppable() -> Self {
        Self {
            fail_stop: true,
            ..Self::default()
        }
    }

    pub fn starts(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkloadControl for MockWorkload {
    async fn start(&self) -> Result<WorkloadHandle> {
        if self.fail_start {
            return Err(Error::workload("mock workload refused to start"));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(WorkloadHandle {
            pid: None,
            started_at: Utc::now(),
        })
    }

    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(Error::workload("mock workload refused to stop"));
        }
        Ok(())
    }
}

/// One scripted sampler response
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleStep {
    Rate(f64),
    Fail,
}

/// Sampler that replays a script, then repeats a fallback step forever
#[derive(Debug, Clone)]
pub struct ScriptedSampler {
    script: Arc<RwLock<VecDeque<SampleStep>>>,
    fallback: SampleStep,
    calls: Arc<AtomicU32>,
}

impl ScriptedSampler {
    pub fn new(script: impl IntoIterator<Item = SampleStep>, fallback: SampleStep) -> Self {
        Self {
            script: Arc::new(RwLock::new(script.into_iter().collect())),
            fallback,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// A sampler that always returns the same rate
    pub fn steady(rate: f64) -> Self {
        Self::new([], SampleStep::Rate(rate))
    }

    /// A sampler that always fails
    pub fn broken() -> Self {
        Self::new([], SampleStep::Fail)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ThroughputSampler for ScriptedSampler {
    async fn sample(&self) -> Result<HealthSample> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.write().await.pop_front().unwrap_or(self.fallback);
        match step {
            SampleStep::Rate(rate) => Ok(HealthSample::now(rate)),
            SampleStep::Fail => Err(Error::transient("mock status page unreachable")),
        }
    }
}

/// Capture that fails a fixed number of times before succeeding
#[derive(Debug, Clone, Default)]
pub struct MockCapture {
    failures_left: Arc<AtomicU32>,
    calls: Arc<AtomicU32>,
    successes: Arc<AtomicU32>,
}

impl MockCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_times(failures: u32) -> Self {
        Self {
            failures_left: Arc::new(AtomicU32::new(failures)),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiagnosticCapture for MockCapture {
    async fn capture(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Capture("mock display unavailable".to_string()));
        }
        self.successes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
