//! Main binary for the rig tuning daemon (rigd)

use clap::{Parser, Subcommand};
use rig_agent::{build_optimizer, build_sentinel, init_logging, AgentConfig, AgentError, Result};
use rig_core::{DeviceId, Verdict};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "rigd")]
#[command(about = "GPU undervolt tuner and mining rig watchdog")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for a stable voltage and memory clock per device
    Optimize {
        /// Device to tune, repeat for several
        #[arg(short, long = "device", value_name = "ID", required = true)]
        devices: Vec<DeviceId>,
    },
    /// Re-run the stability probe at each device's stored progress
    Check {
        /// Device to check, repeat for several
        #[arg(short, long = "device", value_name = "ID", required = true)]
        devices: Vec<DeviceId>,
    },
    /// Keep the workload running and restart it when throughput degrades
    Watch,
    /// Generate default configuration
    #[command(name = "config")]
    GenerateConfig {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate configuration
    Validate {
        /// Configuration file to validate
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::GenerateConfig { output } => generate_config(output.clone()),
        Commands::Validate { file } => validate_config(file.clone()),
        Commands::Optimize { devices } => {
            let config = load_config(&cli)?;
            optimize(&config, devices).await
        }
        Commands::Check { devices } => {
            let config = load_config(&cli)?;
            check(&config, devices).await
        }
        Commands::Watch => {
            let config = load_config(&cli)?;
            watch(&config).await
        }
    }
}

fn load_config(cli: &Cli) -> Result<AgentConfig> {
    let mut config = match cli.config {
        Some(ref path) => AgentConfig::from_file(path)?,
        None => AgentConfig::default(),
    };

    // Apply CLI overrides
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }

    config.validate()?;
    init_logging(&config.logging)?;

    match cli.config {
        Some(ref path) => info!("Loaded configuration from: {}", path.display()),
        None => info!("Using default configuration"),
    }

    Ok(config)
}

async fn optimize(config: &AgentConfig, devices: &[DeviceId]) -> Result<()> {
    let mut optimizer = build_optimizer(&config.tuning).await?;
    let mut failures = 0;

    for outcome in optimizer.optimize_all(devices).await {
        match outcome.outcome {
            Ok(report) => println!("Device {}: {}", outcome.device, report),
            Err(e) => {
                failures += 1;
                println!("Device {}: error: {}", outcome.device, e);
            }
        }
    }

    if failures > 0 {
        return Err(AgentError::Config(format!("{} device(s) failed to optimize", failures)));
    }
    Ok(())
}

async fn check(config: &AgentConfig, devices: &[DeviceId]) -> Result<()> {
    let optimizer = build_optimizer(&config.tuning).await?;

    for outcome in optimizer.check_all(devices).await {
        match outcome.outcome {
            Ok(Some(Verdict::Stable)) => println!("Device {} is stable.", outcome.device),
            Ok(Some(Verdict::Unstable)) => println!("Device {} is NOT stable!", outcome.device),
            Ok(None) => println!("Device {}: no stored progress, skipped", outcome.device),
            Err(e) => println!("Device {}: error: {}", outcome.device, e),
        }
    }

    Ok(())
}

async fn watch(config: &AgentConfig) -> Result<()> {
    let sentinel = build_sentinel(&config.watchdog)?;
    info!("Starting watchdog");

    tokio::select! {
        _ = sentinel.run() => {}
        _ = tokio::signal::ctrl_c() => info!("Received shutdown signal"),
    }

    Ok(())
}

fn generate_config(output: Option<PathBuf>) -> Result<()> {
    let config = AgentConfig::default();

    match output {
        Some(path) => {
            config.to_file(&path)?;
            println!("Generated default configuration: {}", path.display());
        }
        None => {
            let yaml = serde_yaml::to_string(&config)
                .map_err(|e| AgentError::Config(format!("Failed to serialize config: {}", e)))?;
            println!("{}", yaml);
        }
    }

    Ok(())
}

fn validate_config(file: PathBuf) -> Result<()> {
    let config = AgentConfig::from_file(&file)?;
    config.validate()?;
    println!("Configuration is valid: {}", file.display());
    Ok(())
}
