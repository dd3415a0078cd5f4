//! Throughput sampling from the workload's JSON status endpoint

use async_trait::async_trait;
use reqwest::Client;
use rig_core::{Error, HealthSample, Result, ThroughputSampler};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Status endpoint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// URL of the JSON status document
    pub url: String,

    /// JSON pointer to the rate inside the document
    pub rate_pointer: String,

    /// Request timeout
    pub timeout_secs: u64,
}

impl SamplerConfig {
    pub fn new(url: impl Into<String>, rate_pointer: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            rate_pointer: rate_pointer.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(format!("Status URL must use HTTP or HTTPS scheme: {}", self.url));
        }
        if !self.rate_pointer.is_empty() && !self.rate_pointer.starts_with('/') {
            return Err(format!("Rate pointer must start with '/': {}", self.rate_pointer));
        }
        if self.timeout_secs == 0 {
            return Err("Request timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080/api.json".to_string(),
            // 10s average of the total hash rate
            rate_pointer: "/hashrate/total/0".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Reads one rate from a JSON status document per sample
pub struct HttpSampler {
    config: SamplerConfig,
    client: Client,
}

impl HttpSampler {
    pub fn new(config: SamplerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }
}

#[async_trait]
impl ThroughputSampler for HttpSampler {
    async fn sample(&self) -> Result<HealthSample> {
        let response = self
            .client
            .get(&self.config.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::transient(format!("Status request failed: {}", e)))?;

        let document: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::transient(format!("Invalid status document: {}", e)))?;

        let rate = extract_rate(&document, &self.config.rate_pointer)?;
        debug!("Sampled rate {} from {}", rate, self.config.url);
        Ok(HealthSample::now(rate))
    }
}

/// Read a numeric rate at `pointer`; a missing, null or non-numeric value is transient
fn extract_rate(document: &serde_json::Value, pointer: &str) -> Result<f64> {
    let value = document
        .pointer(pointer)
        .ok_or_else(|| Error::transient(format!("No rate at {}", pointer)))?;

    value
        .as_f64()
        .ok_or_else(|| Error::transient(format!("Rate at {} is not a number: {}", pointer, value)))
}
