//! # rig-adapters
//!
//! Concrete collaborators for the rig control loops.
//!
//! This crate provides:
//! - [`ProcessWorkload`]: launches and terminates the workload as a local process
//! - [`HttpSampler`]: reads throughput from a JSON status endpoint
//! - [`ProfileConfigurator`]: rewrites an overdrive profile and the workload's thread file
//! - [`CommandCapture`]: records screenshots through an external command

pub mod overdrive;
pub mod process;
pub mod sampler;
pub mod screenshot;

pub use overdrive::{ProfileConfig, ProfileConfigurator};
pub use process::{ProcessConfig, ProcessWorkload};
pub use sampler::{HttpSampler, SamplerConfig};
pub use screenshot::{CommandCapture, ScreenshotConfig};
