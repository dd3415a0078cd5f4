//! Configuration management for rigd

use rig_adapters::{ProcessConfig, ProfileConfig, SamplerConfig, ScreenshotConfig};
use rig_core::{CaptureConfig, ProbeConfig, SearchPolicy, WatchdogConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete configuration for rigd
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Tuning search and stability probe
    pub tuning: TuningSection,

    /// Throughput watchdog
    pub watchdog: WatchdogSection,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Everything `optimize` and `check` need
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningSection {
    /// Ledger file holding per-device progress and results
    pub ledger_path: PathBuf,

    pub search: SearchPolicy,

    pub probe: ProbeConfig,

    /// Workload launched for each stability probe
    pub workload: ProcessConfig,

    /// Status endpoint read during probes
    pub sampler: SamplerConfig,

    /// Overdrive profile the candidates are written to
    pub profile: ProfileConfig,
}

/// Everything `watch` needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogSection {
    pub policy: WatchdogConfig,

    pub capture: CaptureConfig,

    /// Workload kept running by the watchdog
    pub workload: ProcessConfig,

    /// Status endpoint read by the watchdog
    pub sampler: SamplerConfig,

    pub screenshot: ScreenshotConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,

    /// Show target in logs
    pub show_target: bool,

    /// Show thread IDs in logs
    pub show_thread_ids: bool,

    /// Show line numbers in logs
    pub show_line_numbers: bool,

    /// Log file path; logs go to stdout when unset
    pub file: Option<PathBuf>,
}

// Defaults describe a Windows rig: batch launchers, taskkill, OverdriveNTool
// and nircmd screenshots.
impl Default for TuningSection {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from("optimizer-db.json"),
            search: SearchPolicy::default(),
            probe: ProbeConfig::default(),
            workload: ProcessConfig::new("exec-miner.bat")
                .with_kill_command(["taskkill", "/IM", "xmr-stak.exe", "/T", "/F"]),
            sampler: SamplerConfig::default(),
            profile: ProfileConfig::default(),
        }
    }
}

impl Default for WatchdogSection {
    fn default() -> Self {
        Self {
            policy: WatchdogConfig::default(),
            capture: CaptureConfig::default(),
            workload: ProcessConfig::new("start.bat")
                .with_kill_command(["taskkill", "/IM", "xmr-stak.exe", "/T", "/F"]),
            // 60s average of the total hash rate
            sampler: SamplerConfig::new("http://127.0.0.1:8080/api.json", "/hashrate/total/1"),
            screenshot: ScreenshotConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            show_target: true,
            show_thread_ids: false,
            show_line_numbers: false,
            file: None,
        }
    }
}

impl AgentConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::AgentError::Config(format!("Failed to read config file: {}", e)))?;

        let config: AgentConfig = serde_yaml::from_str(&content)
            .map_err(|e| crate::AgentError::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<std::path::Path>>(&self, path: P) -> crate::Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| crate::AgentError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| crate::AgentError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        let sections = [
            ("tuning.search", self.tuning.search.validate()),
            ("tuning.probe", self.tuning.probe.validate()),
            ("tuning.workload", self.tuning.workload.validate()),
            ("tuning.sampler", self.tuning.sampler.validate()),
            ("watchdog.policy", self.watchdog.policy.validate()),
            ("watchdog.capture", self.watchdog.capture.validate()),
            ("watchdog.workload", self.watchdog.workload.validate()),
            ("watchdog.sampler", self.watchdog.sampler.validate()),
        ];

        for (name, result) in sections {
            result.map_err(|e| crate::AgentError::Config(format!("{}: {}", name, e)))?;
        }

        if self.tuning.ledger_path.as_os_str().is_empty() {
            return Err(crate::AgentError::Config("Ledger path cannot be empty".to_string()));
        }

        // Validate logging configuration
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(crate::AgentError::Config(format!("Invalid log level: {}", self.logging.level))),
        }

        match self.logging.format.as_str() {
            "text" | "json" => {}
            _ => return Err(crate::AgentError::Config(format!("Invalid log format: {}", self.logging.format))),
        }

        Ok(())
    }
}
