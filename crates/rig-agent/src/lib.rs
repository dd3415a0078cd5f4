//! # rig-agent
//!
//! Wiring for the `rigd` daemon: configuration, logging, and construction of
//! the optimizer and the watchdog from their concrete adapters.

pub mod config;

pub use config::{AgentConfig, LoggingConfig, TuningSection, WatchdogSection};

use rig_adapters::{CommandCapture, HttpSampler, ProcessWorkload, ProfileConfigurator};
use rig_tuner::{FileStore, Optimizer, StabilityProbe, Tuner, TuningLedger};
use rig_watchdog::{CaptureRetry, HealthChecker, Sentinel};
use std::sync::{Arc, Mutex};

// Error handling
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Core error: {0}")]
    Core(#[from] rig_core::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;

/// Initialize logging and tracing
pub fn init_logging(logging_config: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging_config.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(logging_config.show_target)
        .with_thread_ids(logging_config.show_thread_ids)
        .with_line_number(logging_config.show_line_numbers);

    let initialized = match (&logging_config.file, logging_config.format.as_str()) {
        (Some(path), format) => {
            let file = Mutex::new(std::fs::File::create(path)?);
            let subscriber = subscriber.with_ansi(false).with_writer(file);
            if format == "json" {
                subscriber.json().try_init()
            } else {
                subscriber.try_init()
            }
        }
        (None, "json") => subscriber.json().try_init(),
        (None, _) => subscriber.try_init(),
    };

    initialized.map_err(|e| AgentError::Config(format!("Failed to initialize logging: {}", e)))
}

/// Build the optimizer from the tuning section, loading the ledger from disk
pub async fn build_optimizer(config: &TuningSection) -> Result<Optimizer> {
    let workload = Arc::new(ProcessWorkload::new(config.workload.clone()));
    let sampler = Arc::new(HttpSampler::new(config.sampler.clone())?);
    let configurator = Arc::new(ProfileConfigurator::new(config.profile.clone()));

    let ledger = TuningLedger::open(Box::new(FileStore::new(&config.ledger_path))).await;
    let probe = StabilityProbe::new(config.probe.clone(), workload, sampler);

    Ok(Optimizer::new(
        Tuner::new(config.search.clone()),
        configurator,
        probe,
        ledger,
    ))
}

/// Build the watchdog from the watchdog section
pub fn build_sentinel(config: &WatchdogSection) -> Result<Sentinel> {
    let workload = Arc::new(ProcessWorkload::new(config.workload.clone()));
    let sampler = Arc::new(HttpSampler::new(config.sampler.clone())?);
    let capture = CaptureRetry::new(
        Arc::new(CommandCapture::new(config.screenshot.clone())),
        &config.capture,
    );

    let checker = HealthChecker::new(config.policy.clone(), sampler, capture.clone());
    Ok(Sentinel::new(workload, checker, capture))
}
