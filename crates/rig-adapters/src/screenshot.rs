//! Screenshot capture through an external command

use async_trait::async_trait;
use chrono::Utc;
use rig_core::{DiagnosticCapture, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use tracing::debug;

/// Screenshot command settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    /// Program that writes a screenshot to the path given as its last argument
    pub command: String,

    /// Arguments placed before the output path
    pub args: Vec<String>,

    /// Directory screenshots are written to
    pub output_dir: PathBuf,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            // Same Windows rig as the workload and overdrive defaults
            command: "nircmd.exe".to_string(),
            args: vec!["savescreenshot".to_string()],
            output_dir: PathBuf::from("screenshots"),
        }
    }
}

/// Captures screenshots named after the current unix time
pub struct CommandCapture {
    config: ScreenshotConfig,
}

impl CommandCapture {
    pub fn new(config: ScreenshotConfig) -> Self {
        Self { config }
    }

    fn next_path(&self) -> PathBuf {
        self.config
            .output_dir
            .join(format!("{}.png", Utc::now().timestamp()))
    }
}

#[async_trait]
impl DiagnosticCapture for CommandCapture {
    async fn capture(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|e| Error::Capture(format!("Failed to create {}: {}", self.config.output_dir.display(), e)))?;

        let path = self.next_path();
        let status = tokio::process::Command::new(&self.config.command)
            .args(&self.config.args)
            .arg(&path)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::Capture(format!("Failed to run {}: {}", self.config.command, e)))?;

        if !status.success() {
            return Err(Error::Capture(format!("{} exited with {}", self.config.command, status)));
        }

        debug!("Screenshot saved to {}", path.display());
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_capture_writes_into_output_dir() {
        let temp_dir = TempDir::new().unwrap();
        let output_dir = temp_dir.path().join("screenshots");
        let capture = CommandCapture::new(ScreenshotConfig {
            command: "touch".to_string(),
            args: Vec::new(),
            output_dir: output_dir.clone(),
        });

        capture.capture().await.unwrap();

        let files: Vec<_> = std::fs::read_dir(&output_dir).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_command_is_capture_error() {
        let temp_dir = TempDir::new().unwrap();
        let capture = CommandCapture::new(ScreenshotConfig {
            command: "false".to_string(),
            args: Vec::new(),
            output_dir: temp_dir.path().to_path_buf(),
        });

        let err = capture.capture().await.unwrap_err();
        assert!(matches!(err, Error::Capture(_)));
    }
}
