//! # Process Schedulers
//!
//! Two interchangeable implementations of [`kernel_api::Scheduler`]:
//!
//! - [`RoundRobinScheduler`]: one FIFO ready queue and a fixed quantum.
//! - [`PriorityScheduler`]: 32 ready queues with priority-dependent time
//!   slices and aging so low-priority work cannot starve.
//!
//! ## Design
//!
//! - **Determinism**: the same sequence of calls yields the same schedule.
//! - **Explicit time**: nothing happens between calls. The owner advances
//!   the clock with `timer_tick`.
//! - **Single residence**: each process record lives in a fixed-size pool
//!   and is linked into at most one list. The running process is on none.

pub mod audit;
pub mod priority;
pub mod round_robin;

pub use audit::{ScheduleEvent, ScheduleLog};
pub use priority::PriorityScheduler;
pub use round_robin::RoundRobinScheduler;

/// Process records each scheduler instance can hold.
pub const PROCESS_TABLE_SIZE: usize = 64;
