//! # rig-watchdog
//!
//! Continuous throughput monitoring of a running workload.
//!
//! This crate provides:
//! - [`HealthChecker`]: samples throughput until the workload is down or degraded
//! - [`CaptureRetry`]: bounded retries around diagnostic screenshots
//! - [`Sentinel`]: the outer supervise loop (capture, restart, then check and restart forever)

pub mod capture;
pub mod health;
pub mod sentinel;

pub use capture::CaptureRetry;
pub use health::{HealthChecker, HealthDecision, WatchdogCounters};
pub use sentinel::Sentinel;
