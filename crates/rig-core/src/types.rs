//! Core data types shared by the tuner and the watchdog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one physical device, as the workload and control tools index it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub u32);

impl DeviceId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(DeviceId)
            .map_err(|e| format!("Invalid device id '{}': {}", s, e))
    }
}

impl From<u32> for DeviceId {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

/// Phase of the voltage / memory clock search.
///
/// Phases are ordered and the search only ever moves forward through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchState {
    RaisingVoltage,
    LoweringMemoryClock,
    RaisingVoltage2,
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchState::RaisingVoltage => write!(f, "raising-voltage"),
            SearchState::LoweringMemoryClock => write!(f, "lowering-memory-clock"),
            SearchState::RaisingVoltage2 => write!(f, "raising-voltage-2"),
        }
    }
}

/// Current search position of one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuningProgress {
    pub state: SearchState,

    /// Core voltage in mV
    pub voltage: i32,

    /// Memory clock in MHz
    pub memory_clock: i32,
}

/// Terminal tuning outcome of a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TuningResult {
    /// The last candidate survived a full observation window
    Stable(TuningProgress),
    /// The search ran out of candidates
    Failed { reason: String },
}

/// Everything the ledger knows about one device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<TuningProgress>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TuningResult>,
}

impl DeviceRecord {
    /// A device with a result is finished and never tuned again
    pub fn is_done(&self) -> bool {
        self.result.is_some()
    }
}

/// Judgement of a stability probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Stable,
    Unstable,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Stable => write!(f, "stable"),
            Verdict::Unstable => write!(f, "unstable"),
        }
    }
}

/// Operator-facing outcome of optimizing one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceReport {
    Stable { voltage: i32, memory_clock: i32 },
    Failed { reason: String },
}

impl DeviceReport {
    pub fn is_stable(&self) -> bool {
        matches!(self, DeviceReport::Stable { .. })
    }
}

impl From<&TuningResult> for DeviceReport {
    fn from(result: &TuningResult) -> Self {
        match result {
            TuningResult::Stable(progress) => DeviceReport::Stable {
                voltage: progress.voltage,
                memory_clock: progress.memory_clock,
            },
            TuningResult::Failed { reason } => DeviceReport::Failed {
                reason: reason.clone(),
            },
        }
    }
}

impl fmt::Display for DeviceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceReport::Stable { voltage, memory_clock } => {
                write!(f, "stable at {} mV / {} MHz", voltage, memory_clock)
            }
            DeviceReport::Failed { reason } => write!(f, "not stable: {}", reason),
        }
    }
}

/// One throughput reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSample {
    /// Throughput in units per second (hashes per second for miners)
    pub rate: f64,
    pub timestamp: DateTime<Utc>,
}

impl HealthSample {
    /// Create a sample stamped with the current time
    pub fn now(rate: f64) -> Self {
        Self {
            rate,
            timestamp: Utc::now(),
        }
    }
}
