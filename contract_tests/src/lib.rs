//! # Component Contract Tests
//!
//! One suite per category, written against the contract trait only. Every
//! implementation in the registry catalog must pass its category's suite;
//! an implementation added to the catalog is picked up automatically.
//!
//! ## Philosophy
//!
//! - **Contracts, not algorithms**: a suite never names a concrete type
//! - **Interchangeability is tested**: if two implementations disagree on
//!   an observable behaviour, one of them fails here
//!
//! Suites panic with a message naming the implementation on the first
//! violated expectation.

pub mod allocator;
pub mod scheduler;
pub mod transport;

use kernel_api::{Category, IpcTransport, PhysicalAllocator, Scheduler};
use services_registry::{catalog, Registration};

/// Fresh, uninitialised instances of every catalog allocator.
pub fn allocators() -> Vec<Box<dyn PhysicalAllocator>> {
    catalog::CATALOG
        .iter()
        .filter(|e| e.category == Category::PhysicalAllocator)
        .filter_map(|e| match e.build() {
            Registration::PhysicalAllocator(a) => Some(a),
            _ => None,
        })
        .collect()
}

/// Fresh, uninitialised instances of every catalog scheduler.
pub fn schedulers() -> Vec<Box<dyn Scheduler>> {
    catalog::CATALOG
        .iter()
        .filter(|e| e.category == Category::Scheduler)
        .filter_map(|e| match e.build() {
            Registration::Scheduler(s) => Some(s),
            _ => None,
        })
        .collect()
}

/// Fresh, uninitialised instances of every catalog transport.
pub fn transports() -> Vec<Box<dyn IpcTransport>> {
    catalog::CATALOG
        .iter()
        .filter(|e| e.category == Category::IpcTransport)
        .filter_map(|e| match e.build() {
            Registration::IpcTransport(t) => Some(t),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_two_of_each() {
        assert_eq!(allocators().len(), 2);
        assert_eq!(schedulers().len(), 2);
        assert_eq!(transports().len(), 2);
    }
}
