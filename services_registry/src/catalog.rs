//! Implementations known to [`Registry::switch`](crate::Registry::switch)

use crate::registry::Registration;
use ipc_transport::{MessageQueueTransport, SharedMemoryTransport};
use kernel_api::{Category, RegistryError};
use page_alloc::{BitmapAllocator, BuddyAllocator};
use scheduler::{PriorityScheduler, RoundRobinScheduler};

/// A selectable implementation and its constructor
#[derive(Debug)]
pub struct CatalogEntry {
    pub category: Category,
    pub name: &'static str,
    build: fn() -> Registration,
}

impl CatalogEntry {
    /// Builds a fresh, uninitialised instance.
    pub fn build(&self) -> Registration {
        (self.build)()
    }
}

fn bitmap() -> Registration {
    Registration::PhysicalAllocator(Box::new(BitmapAllocator::new()))
}

fn buddy() -> Registration {
    Registration::PhysicalAllocator(Box::new(BuddyAllocator::new()))
}

fn round_robin() -> Registration {
    Registration::Scheduler(Box::new(RoundRobinScheduler::new()))
}

fn priority() -> Registration {
    Registration::Scheduler(Box::new(PriorityScheduler::new()))
}

fn message_queue() -> Registration {
    Registration::IpcTransport(Box::new(MessageQueueTransport::new()))
}

fn shared_memory() -> Registration {
    Registration::IpcTransport(Box::new(SharedMemoryTransport::new()))
}

pub static CATALOG: [CatalogEntry; 6] = [
    CatalogEntry {
        category: Category::PhysicalAllocator,
        name: "bitmap",
        build: bitmap,
    },
    CatalogEntry {
        category: Category::PhysicalAllocator,
        name: "buddy",
        build: buddy,
    },
    CatalogEntry {
        category: Category::Scheduler,
        name: "round_robin",
        build: round_robin,
    },
    CatalogEntry {
        category: Category::Scheduler,
        name: "priority",
        build: priority,
    },
    CatalogEntry {
        category: Category::IpcTransport,
        name: "message_queue",
        build: message_queue,
    },
    CatalogEntry {
        category: Category::IpcTransport,
        name: "shared_memory",
        build: shared_memory,
    },
];

/// Names selectable for `category`, in catalog order.
pub fn names(category: Category) -> Vec<&'static str> {
    CATALOG
        .iter()
        .filter(|e| e.category == category)
        .map(|e| e.name)
        .collect()
}

/// Finds the entry for `category` named by `name` or by an unambiguous
/// prefix of it.
pub fn resolve(category: Category, name: &str) -> Result<&'static CatalogEntry, RegistryError> {
    let candidates: Vec<&'static CatalogEntry> =
        CATALOG.iter().filter(|e| e.category == category).collect();
    if candidates.is_empty() {
        return Err(RegistryError::Unsupported(category));
    }
    if let Some(exact) = candidates.iter().copied().find(|e| e.name == name) {
        return Ok(exact);
    }

    let matches: Vec<&'static CatalogEntry> = candidates
        .into_iter()
        .filter(|e| !name.is_empty() && e.name.starts_with(name))
        .collect();
    match matches.as_slice() {
        [one] => Ok(*one),
        [] => Err(RegistryError::UnknownComponent {
            category,
            name: name.to_string(),
        }),
        many => Err(RegistryError::AmbiguousName {
            category,
            name: name.to_string(),
            candidates: many.iter().map(|e| e.name).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_entry_builds_its_category() {
        for entry in CATALOG.iter() {
            let reg = entry.build();
            assert_eq!(reg.category(), entry.category);
            assert_eq!(reg.name(), entry.name);
        }
    }

    #[test]
    fn test_names_per_category() {
        assert_eq!(names(Category::Scheduler), vec!["round_robin", "priority"]);
        assert!(names(Category::VirtualMemory).is_empty());
    }

    #[test]
    fn test_empty_name_is_unknown() {
        assert!(matches!(
            resolve(Category::Scheduler, ""),
            Err(RegistryError::UnknownComponent { .. })
        ));
    }

    #[test]
    fn test_exact_name_resolves() {
        assert_eq!(resolve(Category::IpcTransport, "message_queue").unwrap().name, "message_queue");
    }
}
