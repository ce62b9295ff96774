//! # Capability Registry
//!
//! This crate binds each service category to its active implementation.
//!
//! ## Philosophy
//!
//! Callers never name an algorithm. They ask the registry for "the
//! scheduler" and get whatever implementation is registered, behind the
//! category's contract. Substitution replaces the boxed implementation
//! between calls; no call site changes.
//!
//! The registry does no locking. Substitution must happen at a quiescent
//! point, never while an operation on the same category is in flight. The
//! `&mut` receiver on [`Registry::switch`] makes that a compile-time rule.

pub mod catalog;
pub mod dispatch;
pub mod registry;

pub use catalog::CatalogEntry;
pub use dispatch::DispatchError;
pub use registry::{ComponentListing, ListedComponent, Registration, Registry};
