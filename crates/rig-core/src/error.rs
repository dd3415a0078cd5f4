//! Error handling for rig
//!
//! One error type covers every control loop. The variants fall into four
//! classes that decide how a failure is treated:
//!
//! - transient: a single sample or poll failed; counted, never surfaced
//! - search exhausted: a device's tuning search ended; recorded as its result
//! - I/O: a config write or workload control failed; aborts the current device
//! - store corrupt: the ledger could not be parsed; reset to empty

/// Result type alias for rig operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for rig
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A single throughput reading could not be taken
    #[error("Transient error: {0}")]
    Transient(String),

    /// The tuning search ran out of candidates for a device
    #[error("Search exhausted: {0}")]
    SearchExhausted(String),

    /// Pushing values to a device's control surface failed
    #[error("Device control error: {0}")]
    Device(String),

    /// Starting or stopping the workload failed
    #[error("Workload error: {0}")]
    Workload(String),

    /// The ledger's backing store held unreadable content
    #[error("Store corrupt: {0}")]
    StoreCorrupt(String),

    /// A diagnostic screenshot could not be captured
    #[error("Capture error: {0}")]
    Capture(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a transient sampling error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a search exhaustion error
    pub fn exhausted(msg: impl Into<String>) -> Self {
        Self::SearchExhausted(msg.into())
    }

    /// Create a device control error
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    /// Create a workload control error
    pub fn workload(msg: impl Into<String>) -> Self {
        Self::Workload(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Check if this error is a single failed reading that may be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    /// Check if this error ends a device's tuning for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::SearchExhausted(_))
    }

    /// Check if this error came from the device control surface or the workload
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Device(_) | Error::Workload(_))
    }
}
