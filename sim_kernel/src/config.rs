//! Boot configuration
//!
//! A [`KernelConfig`] names one implementation per category and carries the
//! few tunables the implementations take. It deserialises from JSON; every
//! field has a default, so `{}` is a valid configuration.
//!
//! ```json
//! {
//!   "components": { "allocator": "buddy", "scheduler": "priority" },
//!   "memory": { "start": 1048576, "end": 2097152 },
//!   "round_robin_quantum": 10
//! }
//! ```
//!
//! The default selection is bitmap, round_robin and message_queue. The
//! `buddy-allocator`, `priority-scheduler` and `shared-memory-ipc` cargo
//! features swap the respective default.

use core_types::PhysAddr;
use kernel_api::{Category, FailureClass, RegistryError};
use serde::{Deserialize, Serialize};
use services_registry::catalog;
use std::path::Path;
use thiserror::Error;

/// Accepted round-robin quantum, in ticks.
pub const QUANTUM_RANGE: std::ops::RangeInclusive<u32> = 1..=1000;

pub const DEFAULT_QUANTUM: u32 = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid memory range {start:#x}..{end:#x}")]
    InvalidMemoryRange { start: u64, end: u64 },

    #[error("Round-robin quantum {0} outside 1..=1000")]
    InvalidQuantum(u32),

    #[error(transparent)]
    Component(#[from] RegistryError),
}

impl ConfigError {
    pub fn class(&self) -> FailureClass {
        match self {
            ConfigError::Component(e) => e.class(),
            _ => FailureClass::Configuration,
        }
    }
}

/// Implementation name per category
///
/// Names may be abbreviated to any unambiguous prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentSelection {
    pub allocator: String,
    pub scheduler: String,
    pub transport: String,
}

impl Default for ComponentSelection {
    fn default() -> Self {
        let allocator = if cfg!(feature = "buddy-allocator") {
            "buddy"
        } else {
            "bitmap"
        };
        let scheduler = if cfg!(feature = "priority-scheduler") {
            "priority"
        } else {
            "round_robin"
        };
        let transport = if cfg!(feature = "shared-memory-ipc") {
            "shared_memory"
        } else {
            "message_queue"
        };
        Self {
            allocator: allocator.to_string(),
            scheduler: scheduler.to_string(),
            transport: transport.to_string(),
        }
    }
}

impl ComponentSelection {
    /// `(category, name)` for every selected component.
    pub fn entries(&self) -> [(Category, &str); 3] {
        [
            (Category::PhysicalAllocator, self.allocator.as_str()),
            (Category::Scheduler, self.scheduler.as_str()),
            (Category::IpcTransport, self.transport.as_str()),
        ]
    }
}

/// Physical range handed to the page allocator, `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryRange {
    pub start: u64,
    pub end: u64,
}

impl Default for MemoryRange {
    /// 1 MiB to 16 MiB.
    fn default() -> Self {
        Self {
            start: 0x10_0000,
            end: 0x100_0000,
        }
    }
}

impl MemoryRange {
    pub fn start_addr(&self) -> PhysAddr {
        PhysAddr::new(self.start)
    }

    pub fn end_addr(&self) -> PhysAddr {
        PhysAddr::new(self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub components: ComponentSelection,
    pub memory: MemoryRange,
    pub round_robin_quantum: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            components: ComponentSelection::default(),
            memory: MemoryRange::default(),
            round_robin_quantum: DEFAULT_QUANTUM,
        }
    }
}

impl KernelConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: KernelConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks the memory range, the quantum and that every selected name
    /// resolves to exactly one implementation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let MemoryRange { start, end } = self.memory;
        let page = core_types::PAGE_SIZE as u64;
        if end <= start || end / page <= start.div_ceil(page) {
            return Err(ConfigError::InvalidMemoryRange { start, end });
        }
        if !QUANTUM_RANGE.contains(&self.round_robin_quantum) {
            return Err(ConfigError::InvalidQuantum(self.round_robin_quantum));
        }
        for (category, name) in self.components.entries() {
            catalog::resolve(category, name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_object_is_default() {
        let config = KernelConfig::from_json("{}").unwrap();
        assert_eq!(config, KernelConfig::default());
        assert_eq!(config.round_robin_quantum, 20);
    }

    #[cfg(not(any(
        feature = "buddy-allocator",
        feature = "priority-scheduler",
        feature = "shared-memory-ipc"
    )))]
    #[test]
    fn test_default_selection() {
        let selection = ComponentSelection::default();
        assert_eq!(selection.allocator, "bitmap");
        assert_eq!(selection.scheduler, "round_robin");
        assert_eq!(selection.transport, "message_queue");
    }

    #[test]
    fn test_partial_selection_keeps_other_defaults() {
        let config =
            KernelConfig::from_json(r#"{"components": {"scheduler": "priority"}}"#).unwrap();
        assert_eq!(config.components.scheduler, "priority");
        assert_eq!(config.components.transport, ComponentSelection::default().transport);
    }

    #[test]
    fn test_rejects_inverted_memory() {
        let err = KernelConfig::from_json(r#"{"memory": {"start": 8192, "end": 4096}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMemoryRange { .. }));
        assert_eq!(err.class(), FailureClass::Configuration);
    }

    #[test]
    fn test_rejects_sub_page_memory() {
        let config = KernelConfig {
            memory: MemoryRange {
                start: 0x1001,
                end: 0x1fff,
            },
            ..KernelConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_quantum_out_of_range() {
        for quantum in [0, 1001] {
            let config = KernelConfig {
                round_robin_quantum: quantum,
                ..KernelConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidQuantum(q)) if q == quantum
            ));
        }
    }

    #[test]
    fn test_rejects_unknown_component() {
        let err = KernelConfig::from_json(r#"{"components": {"allocator": "slab"}}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Component(RegistryError::UnknownComponent { .. })
        ));
    }

    #[test]
    fn test_rejects_ambiguous_prefix() {
        let err =
            KernelConfig::from_json(r#"{"components": {"allocator": "b"}}"#).unwrap_err();
        assert_eq!(err.class(), FailureClass::Configuration);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            KernelConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"round_robin_quantum": 7}}"#).unwrap();
        let config = KernelConfig::load(file.path()).unwrap();
        assert_eq!(config.round_robin_quantum, 7);
    }

    #[test]
    fn test_json_round_trip() {
        let config = KernelConfig::default();
        assert_eq!(KernelConfig::from_json(&config.to_json().unwrap()).unwrap(), config);
    }
}
