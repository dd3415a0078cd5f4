//! Policy configuration for the tuning search, the stability probe and the watchdog
//!
//! Durations are stored as whole seconds so the sections read naturally in
//! YAML; use the accessor methods to get a [`Duration`].

use crate::{SearchState, TuningProgress};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds and step sizes of the voltage / memory clock search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchPolicy {
    /// Voltage the search starts from (mV)
    pub start_voltage: i32,

    /// Memory clock the search starts from (MHz)
    pub start_memory_clock: i32,

    /// Highest voltage the search may apply (mV)
    pub max_voltage: i32,

    /// Lowest memory clock the search may apply (MHz)
    pub min_memory_clock: i32,

    /// Voltage increase per step (mV)
    pub voltage_step: i32,

    /// Memory clock decrease per step (MHz)
    pub memory_clock_step: i32,
}

/// How a candidate configuration is judged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Delay after starting the workload before sampling begins
    pub warmup_secs: u64,

    /// Length of the observation window
    pub window_secs: u64,

    /// Delay between polls
    pub poll_interval_secs: u64,

    /// Consecutive sampling errors that make a candidate unstable
    pub error_threshold: u32,
}

/// Health classification of a running workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Samples at or below this rate count as a drop
    pub rate_threshold: f64,

    /// Consecutive sampling errors before the workload is considered down
    pub error_threshold: u32,

    /// Consecutive drops before the workload is considered degraded
    pub drop_threshold: u32,

    /// Delay between health samples
    pub check_interval_secs: u64,

    /// Delay after a restart before monitoring resumes
    pub settle_secs: u64,
}

/// Retry policy of diagnostic screenshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
}

impl SearchPolicy {
    /// The position a device's search starts from
    pub fn initial_progress(&self) -> TuningProgress {
        TuningProgress {
            state: SearchState::RaisingVoltage,
            voltage: self.start_voltage,
            memory_clock: self.start_memory_clock,
        }
    }

    /// Validate the policy
    pub fn validate(&self) -> Result<(), String> {
        if self.voltage_step <= 0 {
            return Err("Voltage step must be greater than zero".to_string());
        }
        if self.memory_clock_step <= 0 {
            return Err("Memory clock step must be greater than zero".to_string());
        }
        if self.start_voltage > self.max_voltage {
            return Err(format!(
                "Start voltage {} exceeds max voltage {}",
                self.start_voltage, self.max_voltage
            ));
        }
        if self.start_memory_clock < self.min_memory_clock {
            return Err(format!(
                "Start memory clock {} is below min memory clock {}",
                self.start_memory_clock, self.min_memory_clock
            ));
        }
        Ok(())
    }
}

impl ProbeConfig {
    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.window_secs == 0 {
            return Err("Observation window must be greater than zero".to_string());
        }
        if self.poll_interval_secs == 0 {
            return Err("Poll interval must be greater than zero".to_string());
        }
        if self.error_threshold == 0 {
            return Err("Error threshold must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl WatchdogConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.error_threshold == 0 || self.drop_threshold == 0 {
            return Err("Watchdog thresholds must be greater than zero".to_string());
        }
        if self.check_interval_secs == 0 {
            return Err("Check interval must be greater than zero".to_string());
        }
        if !self.rate_threshold.is_finite() || self.rate_threshold < 0.0 {
            return Err(format!("Invalid rate threshold: {}", self.rate_threshold));
        }
        Ok(())
    }
}

impl CaptureConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("Capture attempts must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            start_voltage: 895,
            start_memory_clock: 1150,
            max_voltage: 995,
            min_memory_clock: 900,
            voltage_step: 10,
            memory_clock_step: 25,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            warmup_secs: 40,
            window_secs: 1800,
            poll_interval_secs: 1,
            error_threshold: 5,
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            rate_threshold: 15500.0,
            error_threshold: 5,
            drop_threshold: 20,
            check_interval_secs: 5,
            settle_secs: 200,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            retry_delay_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_policy_defaults() {
        let policy = SearchPolicy::default();
        assert!(policy.validate().is_ok());

        let start = policy.initial_progress();
        assert_eq!(start.state, SearchState::RaisingVoltage);
        assert_eq!(start.voltage, 895);
        assert_eq!(start.memory_clock, 1150);
    }

    #[test]
    fn test_search_policy_validation() {
        let mut policy = SearchPolicy::default();
        policy.voltage_step = 0;
        assert!(policy.validate().is_err());

        let mut policy = SearchPolicy::default();
        policy.start_voltage = 1000;
        assert!(policy.validate().is_err());

        let mut policy = SearchPolicy::default();
        policy.min_memory_clock = 1200;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_probe_config() {
        let config = ProbeConfig::default();
        assert_eq!(config.warmup(), Duration::from_secs(40));
        assert_eq!(config.window(), Duration::from_secs(1800));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert!(config.validate().is_ok());

        let config = ProbeConfig {
            error_threshold: 0,
            ..ProbeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_watchdog_config() {
        let config = WatchdogConfig::default();
        assert_eq!(config.error_threshold, 5);
        assert_eq!(config.drop_threshold, 20);
        assert_eq!(config.settle_delay(), Duration::from_secs(200));
        assert!(config.validate().is_ok());

        let config = WatchdogConfig {
            rate_threshold: f64::NAN,
            ..WatchdogConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: ProbeConfig = serde_yaml::from_str("window_secs: 60\n").unwrap();
        assert_eq!(config.window_secs, 60);
        assert_eq!(config.warmup_secs, 40);
        assert_eq!(config.error_threshold, 5);
    }
}
