//! # rig-core
//!
//! Core types, traits, and utilities shared by the rig tuner and watchdog.
//!
//! This crate provides the foundational pieces every other rig crate builds on:
//!
//! - Device identifiers, search positions and per-device tuning outcomes
//! - Capability traits for the collaborators the control loops drive
//!   (configurator, workload control, throughput sampler, diagnostic capture)
//! - Configuration sections carrying the tuning and monitoring policy
//! - The error taxonomy and a bounded retry combinator
//! - Scripted mock collaborators for tests (feature `mock`)

pub mod config;
pub mod error;
pub mod retry;
pub mod traits;
pub mod types;

#[cfg(any(feature = "mock", test))]
pub mod mock;

// Re-export commonly used types at the crate root
pub use config::{CaptureConfig, ProbeConfig, SearchPolicy, WatchdogConfig};
pub use error::{Error, Result};
pub use retry::RetryPolicy;
pub use traits::{Configurator, DiagnosticCapture, ThroughputSampler, WorkloadControl, WorkloadHandle};
pub use types::{
    DeviceId, DeviceRecord, DeviceReport, HealthSample, SearchState, TuningProgress, TuningResult,
    Verdict,
};
