//! Component identity and service categories

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity every pluggable component reports for introspection.
pub trait KernelComponent {
    /// Short selection name, e.g. `"buddy"`.
    fn name(&self) -> &'static str;

    /// One-line human readable description.
    fn description(&self) -> &'static str;
}

/// A service category with exactly one active implementation slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    PhysicalAllocator,
    VirtualMemory,
    HeapAllocator,
    Scheduler,
    ProcessLoader,
    IpcTransport,
    DeviceDriver,
}

impl Category {
    /// Every category, in registry listing order.
    pub const ALL: [Category; 7] = [
        Category::PhysicalAllocator,
        Category::VirtualMemory,
        Category::HeapAllocator,
        Category::Scheduler,
        Category::ProcessLoader,
        Category::IpcTransport,
        Category::DeviceDriver,
    ];

    /// The selection key used by `switch` and by configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::PhysicalAllocator => "physical_allocator",
            Category::VirtualMemory => "virtual_memory",
            Category::HeapAllocator => "heap_allocator",
            Category::Scheduler => "scheduler",
            Category::ProcessLoader => "process_loader",
            Category::IpcTransport => "ipc_transport",
            Category::DeviceDriver => "device_driver",
        }
    }

    /// Label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Category::PhysicalAllocator => "Physical Allocator",
            Category::VirtualMemory => "Virtual Memory",
            Category::HeapAllocator => "Heap Allocator",
            Category::Scheduler => "Scheduler",
            Category::ProcessLoader => "Process Loader",
            Category::IpcTransport => "IPC Transport",
            Category::DeviceDriver => "Device Driver",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_unique() {
        let mut keys: Vec<_> = Category::ALL.iter().map(|c| c.as_str()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), Category::ALL.len());
    }

    #[test]
    fn test_display_uses_key() {
        assert_eq!(Category::IpcTransport.to_string(), "ipc_transport");
    }
}
