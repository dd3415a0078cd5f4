//! Process management for the workload

use async_trait::async_trait;
use chrono::Utc;
use rig_core::{Error, Result, WorkloadControl, WorkloadHandle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Workload process configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Command that launches the workload
    pub command: String,

    /// Command arguments
    pub args: Vec<String>,

    /// Environment variables
    pub env: HashMap<String, String>,

    /// Working directory
    pub working_dir: Option<PathBuf>,

    /// Time allowed for a graceful exit before the process is killed
    pub shutdown_timeout_secs: u64,

    /// Command run on every stop to catch workers the launcher left behind,
    /// e.g. `["taskkill", "/IM", "xmr-stak.exe", "/T", "/F"]`
    pub kill_command: Option<Vec<String>>,
}

impl ProcessConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_kill_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kill_command = Some(command.into_iter().map(Into::into).collect());
        self
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.command.trim().is_empty() {
            return Err("Workload command cannot be empty".to_string());
        }
        if matches!(&self.kill_command, Some(command) if command.is_empty()) {
            return Err("Kill command cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            command: "xmr-stak".to_string(),
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
            shutdown_timeout_secs: 10,
            kill_command: None,
        }
    }
}

struct Running {
    child: Child,
    handle: WorkloadHandle,
}

/// Workload backed by a local child process
pub struct ProcessWorkload {
    config: ProcessConfig,
    running: Mutex<Option<Running>>,
}

impl ProcessWorkload {
    pub fn new(config: ProcessConfig) -> Self {
        Self {
            config,
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Check if the launched process is still alive
    pub async fn is_running(&self) -> bool {
        let mut running = self.running.lock().await;
        match running.as_mut().map(|r| r.child.try_wait()) {
            Some(Ok(None)) => true,
            Some(_) => {
                // Exited, or its status could not be read
                *running = None;
                false
            }
            None => false,
        }
    }

    async fn terminate(&self, mut child: Child) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(child.id() as i32);
            if let Err(e) = signal::kill(pid, Signal::SIGTERM) {
                warn!("Failed to send SIGTERM: {}", e);
            } else {
                debug!("Sent SIGTERM to workload");
            }
        }

        let graceful = timeout(self.config.shutdown_timeout(), async {
            loop {
                match child.try_wait() {
                    Ok(Some(_)) => return Ok(()),
                    Ok(None) => tokio::time::sleep(Duration::from_millis(100)).await,
                    Err(e) => return Err(e),
                }
            }
        })
        .await;

        match graceful {
            Ok(Ok(())) => info!("Workload stopped gracefully"),
            Ok(Err(e)) => error!("Error while waiting for workload exit: {}", e),
            Err(_) => {
                warn!("Graceful shutdown timed out, forcing kill");
                if let Err(e) = child.kill() {
                    error!("Failed to kill workload: {}", e);
                }
                if let Err(e) = child.wait() {
                    error!("Failed to wait for killed workload: {}", e);
                }
            }
        }
    }

    /// Run the extra kill command. Its failures never fail a stop: a
    /// missing program and a nonzero exit both leave nothing to act on.
    async fn run_kill_command(&self, command: &[String]) {
        let Some((program, args)) = command.split_first() else {
            return;
        };

        let status = tokio::process::Command::new(program)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            // A nonzero exit usually means there was nothing left to kill
            Ok(status) => debug!("Kill command {} exited with {}", program, status),
            Err(e) => warn!("Failed to run kill command {}: {}", program, e),
        }
    }
}

#[async_trait]
impl WorkloadControl for ProcessWorkload {
    async fn start(&self) -> Result<WorkloadHandle> {
        let mut running = self.running.lock().await;
        if let Some(current) = running.as_mut() {
            if let Ok(None) = current.child.try_wait() {
                debug!("Workload already running");
                return Ok(current.handle.clone());
            }
        }

        info!("Starting workload: {} {:?}", self.config.command, self.config.args);

        let mut command = Command::new(&self.config.command);
        command.args(&self.config.args);

        for (key, value) in &self.config.env {
            command.env(key, value);
        }

        if let Some(working_dir) = &self.config.working_dir {
            command.current_dir(working_dir);
        }

        command
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .stdin(Stdio::null());

        let child = command
            .spawn()
            .map_err(|e| Error::workload(format!("Failed to spawn {}: {}", self.config.command, e)))?;

        let handle = WorkloadHandle {
            pid: Some(child.id()),
            started_at: Utc::now(),
        };
        *running = Some(Running {
            child,
            handle: handle.clone(),
        });

        Ok(handle)
    }

    async fn stop(&self) -> Result<()> {
        let current = self.running.lock().await.take();
        if let Some(current) = current {
            info!("Stopping workload (pid {:?})", current.handle.pid);
            self.terminate(current.child).await;
        }

        if let Some(command) = &self.config.kill_command {
            self.run_kill_command(command).await;
        }

        Ok(())
    }
}

impl Drop for ProcessWorkload {
    fn drop(&mut self) {
        if let Some(mut current) = self.running.get_mut().take() {
            warn!("Workload dropped while running, killing it");
            if let Err(e) = current.child.kill() {
                error!("Failed to kill workload during cleanup: {}", e);
            }
            let _ = current.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_config_validation() {
        assert!(ProcessConfig::default().validate().is_ok());
        assert!(ProcessConfig::new(" ").validate().is_err());

        let config = ProcessConfig::new("xmr-stak").with_kill_command(Vec::<String>::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_process_config_builder() {
        let config = ProcessConfig::new("start.bat")
            .with_args(["--noUAC"])
            .with_kill_command(["taskkill", "/IM", "xmr-stak.exe", "/T", "/F"]);

        assert_eq!(config.args, vec!["--noUAC"]);
        assert_eq!(config.kill_command.as_ref().unwrap().len(), 5);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_stop_without_start_is_ok() {
        let workload = ProcessWorkload::new(ProcessConfig::new("sleep"));
        assert!(workload.stop().await.is_ok());
        assert!(workload.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_stop_with_missing_kill_command_is_ok() {
        let config = ProcessConfig::new("sleep").with_kill_command(["/nonexistent/taskkill"]);
        let workload = ProcessWorkload::new(config);

        assert!(workload.stop().await.is_ok());
        assert!(workload.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_workload_error() {
        let workload = ProcessWorkload::new(ProcessConfig::new("/nonexistent/rig-workload"));
        let err = workload.start().await.unwrap_err();
        assert!(err.is_io());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_and_stop_process() {
        let config = ProcessConfig::new("sleep")
            .with_args(["30"])
            .with_kill_command(["true"]);
        let workload = ProcessWorkload::new(config);

        let handle = workload.start().await.unwrap();
        assert!(handle.pid.is_some());
        assert!(workload.is_running().await);

        // A second start reuses the running process
        let again = workload.start().await.unwrap();
        assert_eq!(again.pid, handle.pid);

        workload.stop().await.unwrap();
        assert!(!workload.is_running().await);
    }
}
