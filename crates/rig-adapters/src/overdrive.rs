//! Device configuration through an overdrive profile file
//!
//! The profile holds `KEY=clock;voltage` pairs per power state. A candidate
//! is pushed by rewriting the top core states and the top memory state, then
//! running the tool that applies the profile to the hardware.

use async_trait::async_trait;
use rig_core::{Configurator, DeviceId, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use tracing::{debug, info};

/// Offset of the second-highest core state below the top state (mV)
const P6_VOLTAGE_OFFSET: i32 = 5;

/// Profile configurator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Overdrive profile (UTF-8, or UTF-16 with byte order mark)
    pub profile_path: PathBuf,

    /// Workload thread file whose `"index"` entries select the active device
    pub threads_path: Option<PathBuf>,

    /// Command that applies the profile to the hardware
    pub apply_command: Option<Vec<String>>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            profile_path: PathBuf::from("OverdriveN/OverdriveNTool.ini"),
            threads_path: Some(PathBuf::from("xmr-stak/amd.txt")),
            apply_command: Some(vec!["apply-oc.bat".to_string()]),
        }
    }
}

/// Text encoding of a profile file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Utf8,
    Utf16Le,
}

/// Pushes candidates by rewriting the overdrive profile
pub struct ProfileConfigurator {
    config: ProfileConfig,
}

impl ProfileConfigurator {
    pub fn new(config: ProfileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    async fn run_apply_command(&self) -> Result<()> {
        let Some((program, args)) = self.config.apply_command.as_deref().and_then(|c| c.split_first()) else {
            return Ok(());
        };

        let status = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::device(format!("Failed to run {}: {}", program, e)))?;

        if !status.success() {
            return Err(Error::device(format!("{} exited with {}", program, status)));
        }
        Ok(())
    }
}

#[async_trait]
impl Configurator for ProfileConfigurator {
    async fn apply(&self, device: DeviceId, voltage: i32, memory_clock: i32) -> Result<()> {
        let path = &self.config.profile_path;
        let raw = tokio::fs::read(path).await?;
        let (content, encoding) = decode(&raw)?;

        let updated = rewrite_profile(&content, voltage, memory_clock)?;
        tokio::fs::write(path, encode(&updated, encoding)).await?;
        debug!("Profile {} updated", path.display());

        info!("Applying {} mV / {} MHz to device {}", voltage, memory_clock, device);
        self.run_apply_command().await
    }

    async fn select_active_device(&self, device: DeviceId) -> Result<()> {
        let Some(path) = &self.config.threads_path else {
            return Ok(());
        };

        let content = tokio::fs::read_to_string(path).await?;
        let updated = rewrite_thread_index(&content, device);
        tokio::fs::write(path, updated).await?;

        debug!("Workload threads pinned to device {}", device);
        Ok(())
    }
}

fn decode(raw: &[u8]) -> Result<(String, Encoding)> {
    if let Some(body) = raw.strip_prefix(&[0xFFu8, 0xFE]) {
        let pairs = body.chunks_exact(2);
        if !pairs.remainder().is_empty() {
            return Err(Error::device("Profile is truncated UTF-16: odd byte count"));
        }
        let units: Vec<u16> = pairs
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let content = String::from_utf16(&units)
            .map_err(|e| Error::device(format!("Profile is not valid UTF-16: {}", e)))?;
        return Ok((content, Encoding::Utf16Le));
    }

    let content = String::from_utf8(raw.to_vec())
        .map_err(|e| Error::device(format!("Profile is not valid UTF-8: {}", e)))?;
    Ok((content, Encoding::Utf8))
}

fn encode(content: &str, encoding: Encoding) -> Vec<u8> {
    match encoding {
        Encoding::Utf8 => content.as_bytes().to_vec(),
        Encoding::Utf16Le => {
            let mut bytes = vec![0xFF, 0xFE];
            bytes.extend(content.encode_utf16().flat_map(|unit| unit.to_le_bytes()));
            bytes
        }
    }
}

/// Replace field `index` of every `key=a;b` line. Returns how many lines changed.
fn set_field(lines: &mut [String], key: &str, index: usize, value: &str) -> usize {
    let prefix = format!("{}=", key);
    let mut changed = 0;

    for line in lines.iter_mut() {
        let trimmed = line.trim_end_matches('\r');
        let Some(fields) = trimmed.strip_prefix(&prefix) else {
            continue;
        };

        let mut fields: Vec<String> = fields.split(';').map(str::to_string).collect();
        if index >= fields.len() {
            continue;
        }
        fields[index] = value.to_string();

        let carriage = if line.ends_with('\r') { "\r" } else { "" };
        *line = format!("{}{}{}", prefix, fields.join(";"), carriage);
        changed += 1;
    }
    changed
}

fn rewrite_profile(content: &str, voltage: i32, memory_clock: i32) -> Result<String> {
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();

    let updates = [
        ("GPU_P6", 1, (voltage - P6_VOLTAGE_OFFSET).to_string()),
        ("GPU_P7", 1, voltage.to_string()),
        ("Mem_P3", 0, memory_clock.to_string()),
    ];

    for (key, index, value) in updates.iter() {
        if set_field(&mut lines, key, *index, value) == 0 {
            return Err(Error::device(format!("Profile has no {} entry", key)));
        }
    }

    Ok(lines.join("\n"))
}

/// Point every `"index" : N` entry of a thread file at `device`
fn rewrite_thread_index(content: &str, device: DeviceId) -> String {
    const KEY: &str = "\"index\"";

    let mut output = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(position) = rest.find(KEY) {
        let after_key = position + KEY.len();
        output.push_str(&rest[..after_key]);
        rest = &rest[after_key..];

        let separator_len = rest
            .char_indices()
            .find(|&(_, c)| !(c.is_whitespace() || c == ':'))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if !rest[..separator_len].contains(':') {
            continue;
        }
        output.push_str(&rest[..separator_len]);
        rest = &rest[separator_len..];

        let digits_len = rest
            .char_indices()
            .find(|&(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if digits_len > 0 {
            output.push_str(&device.to_string());
            rest = &rest[digits_len..];
        }
    }

    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PROFILE: &str = "[Profile_0]\r\nName=vega\r\nGPU_P6=1212;990\r\nGPU_P7=1408;1000\r\nMem_P3=1100;900\r\nFan_Min=2000\r\n";

    const THREADS: &str = "\"gpu_threads_conf\" : [\n  { \"index\" : 0, \"intensity\" : 1920 },\n  { \"index\" : 0, \"intensity\" : 1920 },\n],\n\"platform_index\" : 0,\n";

    #[test]
    fn test_rewrite_profile() {
        let updated = rewrite_profile(PROFILE, 955, 1075).unwrap();
        assert!(updated.contains("GPU_P6=1212;950\r\n"));
        assert!(updated.contains("GPU_P7=1408;955\r\n"));
        assert!(updated.contains("Mem_P3=1075;900\r\n"));
        assert!(updated.contains("Fan_Min=2000\r\n"));
        assert!(updated.ends_with("\r\n"));
    }

    #[test]
    fn test_rewrite_profile_requires_entries() {
        let err = rewrite_profile("[Profile_0]\nGPU_P7=1408;1000\n", 955, 1075).unwrap_err();
        assert!(err.is_io());
        assert!(err.to_string().contains("GPU_P6"));
    }

    #[test]
    fn test_rewrite_thread_index() {
        let updated = rewrite_thread_index(THREADS, DeviceId(6));
        assert_eq!(updated.matches("\"index\" : 6").count(), 2);
        // Keys that merely end in "index" are left alone
        assert!(updated.contains("\"platform_index\" : 0"));
        assert!(updated.contains("\"intensity\" : 1920"));
    }

    #[test]
    fn test_utf16_round_trip() {
        let encoded = encode(PROFILE, Encoding::Utf16Le);
        assert_eq!(&encoded[..2], &[0xFF, 0xFE]);

        let (decoded, encoding) = decode(&encoded).unwrap();
        assert_eq!(encoding, Encoding::Utf16Le);
        assert_eq!(decoded, PROFILE);

        let (decoded, encoding) = decode(PROFILE.as_bytes()).unwrap();
        assert_eq!(encoding, Encoding::Utf8);
        assert_eq!(decoded, PROFILE);
    }

    #[test]
    fn test_truncated_utf16_is_rejected() {
        let mut encoded = encode(PROFILE, Encoding::Utf16Le);
        encoded.pop();

        let err = decode(&encoded).unwrap_err();
        assert!(err.is_io());
        assert!(err.to_string().contains("truncated"));
    }

    #[tokio::test]
    async fn test_apply_rewrites_files() {
        let temp_dir = TempDir::new().unwrap();
        let profile_path = temp_dir.path().join("OverdriveNTool.ini");
        let threads_path = temp_dir.path().join("amd.txt");
        std::fs::write(&profile_path, encode(PROFILE, Encoding::Utf16Le)).unwrap();
        std::fs::write(&threads_path, THREADS).unwrap();

        let configurator = ProfileConfigurator::new(ProfileConfig {
            profile_path: profile_path.clone(),
            threads_path: Some(threads_path.clone()),
            apply_command: None,
        });

        configurator.select_active_device(DeviceId(7)).await.unwrap();
        configurator.apply(DeviceId(7), 965, 1050).await.unwrap();

        let (profile, encoding) = decode(&std::fs::read(&profile_path).unwrap()).unwrap();
        assert_eq!(encoding, Encoding::Utf16Le);
        assert!(profile.contains("GPU_P7=1408;965"));
        assert!(profile.contains("Mem_P3=1050;900"));

        let threads = std::fs::read_to_string(&threads_path).unwrap();
        assert_eq!(threads.matches("\"index\" : 7").count(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_apply_command_is_device_error() {
        let temp_dir = TempDir::new().unwrap();
        let profile_path = temp_dir.path().join("OverdriveNTool.ini");
        std::fs::write(&profile_path, PROFILE).unwrap();

        let configurator = ProfileConfigurator::new(ProfileConfig {
            profile_path,
            threads_path: None,
            apply_command: Some(vec!["false".to_string()]),
        });

        let err = configurator.apply(DeviceId(6), 905, 1150).await.unwrap_err();
        assert!(matches!(err, Error::Device(_)));
    }

    #[tokio::test]
    async fn test_missing_profile_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let configurator = ProfileConfigurator::new(ProfileConfig {
            profile_path: temp_dir.path().join("missing.ini"),
            threads_path: None,
            apply_command: None,
        });

        let err = configurator.apply(DeviceId(6), 905, 1150).await.unwrap_err();
        assert!(err.is_io());
    }
}
