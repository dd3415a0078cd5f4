//! # rig-tuner
//!
//! Per-device search for a stable (core voltage, memory clock) pair.
//!
//! This crate provides:
//! - [`Tuner`]: the monotonic search state machine
//! - [`StabilityProbe`]: runs the workload and judges a candidate over an observation window
//! - [`TuningLedger`]: durable per-device progress and results with pluggable storage
//! - [`Optimizer`]: the per-device loop tying the three together
//!
//! ## Example
//!
//! ```rust,no_run
//! use rig_core::{DeviceId, ProbeConfig, SearchPolicy};
//! use rig_tuner::{FileStore, Optimizer, StabilityProbe, Tuner, TuningLedger};
//! # use std::sync::Arc;
//! # async fn run(
//! #     configurator: Arc<dyn rig_core::Configurator>,
//! #     workload: Arc<dyn rig_core::WorkloadControl>,
//! #     sampler: Arc<dyn rig_core::ThroughputSampler>,
//! # ) -> rig_core::Result<()> {
//! let ledger = TuningLedger::open(Box::new(FileStore::new("optimizer-db.json"))).await;
//! let probe = StabilityProbe::new(ProbeConfig::default(), workload, sampler);
//! let mut optimizer = Optimizer::new(Tuner::new(SearchPolicy::default()), configurator, probe, ledger);
//!
//! let report = optimizer.optimize_device(DeviceId(6)).await?;
//! println!("device 6: {}", report);
//! # Ok(())
//! # }
//! ```

pub mod ledger;
pub mod optimizer;
pub mod probe;
pub mod search;

pub use ledger::{FileStore, LedgerStore, MemoryStore, TuningLedger};
pub use optimizer::{DeviceOutcome, Optimizer};
pub use probe::StabilityProbe;
pub use search::Tuner;
