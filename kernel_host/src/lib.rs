//! # Kernel Host
//!
//! Runs the simulated kernel as an ordinary host process.
//!
//! ## Responsibilities
//!
//! The host:
//! - Resolves the component selection from a config file and flags
//! - Boots the kernel and drives its clock
//! - Runs either the demo workload or a comparison of one category
//! - Owns all output; the kernel only logs
//!
//! ## Non-Responsibilities
//!
//! The host does NOT:
//! - Implement any component
//! - Interpret statistics beyond printing them

pub mod options;
pub mod runtime;

pub use options::{usage, HostMode, HostOptions, DEFAULT_TICKS};
pub use runtime::{run_demo, DemoReport, HostOutput, HostRuntime};

use sim_kernel::{ConfigError, KernelError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Missing value for {0}")]
    MissingValue(&'static str),

    #[error("Invalid value for {flag}: {value}")]
    InvalidValue { flag: &'static str, value: String },

    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("Message error: {0}")]
    Message(#[from] ipc::MessageError),

    #[error("Report serialization failed: {0}")]
    Report(#[from] serde_json::Error),
}

impl HostError {
    /// Whether the error came from the command line rather than the kernel.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            HostError::MissingValue(_) | HostError::InvalidValue { .. } | HostError::UnknownOption(_)
        )
    }
}
