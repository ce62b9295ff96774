//! # Command-Line Options
//!
//! ```text
//! kernel-host [--config FILE] [--allocator NAME] [--scheduler NAME]
//!             [--ipc NAME] [--ticks N] [--compare CATEGORY]
//! ```
//!
//! Component names go through the same prefix matching as a runtime switch,
//! so `--allocator bu` selects `buddy`. Flags override the config file no
//! matter where they appear on the line.

use crate::HostError;
use kernel_api::Category;
use sim_kernel::KernelConfig;
use std::path::PathBuf;

pub const DEFAULT_TICKS: u64 = 200;

/// What the host does once the kernel configuration is settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMode {
    /// Boot and run the demo workload
    Demo,
    /// Run the comparison workload for one category
    Compare(Category),
    /// Print usage and exit
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOptions {
    pub mode: HostMode,
    pub config_path: Option<PathBuf>,
    pub allocator: Option<String>,
    pub scheduler: Option<String>,
    pub transport: Option<String>,
    pub ticks: u64,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            mode: HostMode::Demo,
            config_path: None,
            allocator: None,
            scheduler: None,
            transport: None,
            ticks: DEFAULT_TICKS,
        }
    }
}

impl HostOptions {
    /// Parses the arguments after the program name.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, HostError> {
        let mut options = Self::default();
        let mut args = args.iter().map(AsRef::as_ref);

        while let Some(arg) = args.next() {
            let mut value = |flag: &'static str| args.next().ok_or(HostError::MissingValue(flag));
            match arg {
                "--config" | "-c" => options.config_path = Some(value("--config")?.into()),
                "--allocator" | "-a" => options.allocator = Some(value("--allocator")?.to_string()),
                "--scheduler" | "-s" => options.scheduler = Some(value("--scheduler")?.to_string()),
                "--ipc" | "-i" => options.transport = Some(value("--ipc")?.to_string()),
                "--ticks" | "-t" => {
                    let raw = value("--ticks")?;
                    options.ticks = raw.parse().map_err(|_| HostError::InvalidValue {
                        flag: "--ticks",
                        value: raw.to_string(),
                    })?;
                }
                "--compare" => {
                    let raw = value("--compare")?;
                    let category = parse_category(raw).ok_or_else(|| HostError::InvalidValue {
                        flag: "--compare",
                        value: raw.to_string(),
                    })?;
                    options.mode = HostMode::Compare(category);
                }
                "--help" | "-h" => options.mode = HostMode::Help,
                other => return Err(HostError::UnknownOption(other.to_string())),
            }
        }

        Ok(options)
    }

    /// Loads the config file, if any, applies the flag overrides and
    /// validates the result.
    pub fn kernel_config(&self) -> Result<KernelConfig, HostError> {
        let mut config = match &self.config_path {
            Some(path) => KernelConfig::load(path)?,
            None => KernelConfig::default(),
        };
        if let Some(name) = &self.allocator {
            config.components.allocator = name.clone();
        }
        if let Some(name) = &self.scheduler {
            config.components.scheduler = name.clone();
        }
        if let Some(name) = &self.transport {
            config.components.transport = name.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_category(raw: &str) -> Option<Category> {
    match raw {
        "allocator" | "alloc" | "physical_allocator" => Some(Category::PhysicalAllocator),
        "scheduler" | "sched" => Some(Category::Scheduler),
        "ipc" | "transport" | "ipc_transport" => Some(Category::IpcTransport),
        _ => None,
    }
}

pub fn usage(program: &str) -> String {
    format!(
        "Usage: {program} [OPTIONS]

Options:
  -c, --config <FILE>        Kernel configuration (JSON)
  -a, --allocator <NAME>     Physical allocator: bitmap, buddy
  -s, --scheduler <NAME>     Scheduler: round_robin, priority
  -i, --ipc <NAME>           IPC transport: message_queue, shared_memory
  -t, --ticks <N>            Timer ticks to run (default {DEFAULT_TICKS})
      --compare <CATEGORY>   Compare implementations: allocator, scheduler, ipc
  -h, --help                 Show this help message

Examples:
  {program} --allocator buddy --scheduler priority --ticks 500
  {program} --compare scheduler > scheduler.json"
    )
}
