//! Process scheduler contract
//!
//! Scheduling is cooperative and simulated: nothing preempts the caller.
//! The owner drives time by calling [`Scheduler::timer_tick`] and the
//! scheduler decides, synchronously, which process holds the CPU.
//!
//! A process known to a scheduler is in exactly one place at a time: a ready
//! queue, the blocked list, or the CPU.

use crate::component::KernelComponent;
use crate::error::SchedError;
use core_types::Pid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest priority a process can hold. Priorities run from 0 (lowest).
pub const MAX_PRIORITY: u32 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Ready,
    Running,
    Blocked,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessState::Ready => "ready",
            ProcessState::Running => "running",
            ProcessState::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

/// Read-only view of a scheduled process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub state: ProcessState,
    pub priority: u32,
    /// Priority before any aging boost
    pub original_priority: u32,
    /// Ticks spent ready since last dispatch or boost
    pub age: u32,
    pub time_slice: u32,
    pub remaining: u32,
    pub wait_time: u64,
}

pub trait Scheduler: KernelComponent + Send {
    /// Resets all queues and counters. Must be called before first use.
    fn init(&mut self);

    /// Drops every process and returns to the uninitialised state.
    fn shutdown(&mut self);

    /// Adds `pid` to the tail of the ready queue for `priority`.
    fn add_process(&mut self, pid: Pid, priority: u32) -> Result<(), SchedError>;

    /// Removes `pid` from whichever structure holds it.
    fn remove_process(&mut self, pid: Pid) -> Result<(), SchedError>;

    /// The process `schedule` would dispatch next, without dequeuing it.
    fn peek_next(&self) -> Option<Pid>;

    /// Picks the process to run. Returns the running process, if any.
    fn schedule(&mut self) -> Option<Pid>;

    /// Gives up the CPU. The running process goes to the back of its queue.
    fn yield_now(&mut self) -> Option<Pid>;

    fn block(&mut self, pid: Pid) -> Result<(), SchedError>;

    fn unblock(&mut self, pid: Pid) -> Result<(), SchedError>;

    /// Advances the scheduler clock by one tick.
    fn timer_tick(&mut self);

    fn priority(&self, pid: Pid) -> Result<u32, SchedError>;

    fn set_priority(&mut self, pid: Pid, priority: u32) -> Result<(), SchedError>;

    /// Sets the tick budget every process gets. Schedulers that derive
    /// slices from priority refuse.
    fn set_time_quantum(&mut self, _quantum: u32) -> Result<(), SchedError> {
        Err(SchedError::FixedQuantum(self.name()))
    }

    /// Ticks the process may run before being preempted.
    fn time_slice(&self, pid: Pid) -> Result<u32, SchedError>;

    /// The running process.
    fn current(&self) -> Option<Pid>;

    fn process(&self, pid: Pid) -> Option<ProcessInfo>;

    fn context_switches(&self) -> u64;

    /// Total ready-queue wait divided by elapsed ticks.
    fn avg_wait_time(&self) -> f64;

    fn stats(&self) -> SchedulerStats;

    fn print_stats(&self) {
        log::info!("{}", self.stats());
    }
}

/// Algorithm-specific part of a scheduler report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchedulerDetail {
    RoundRobin {
        quantum: u32,
    },
    Priority {
        /// `(priority, ready count)` for every non-empty queue, highest first
        ready_by_priority: Vec<(u32, usize)>,
        aging_boosts: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerStats {
    pub name: &'static str,
    pub ticks: u64,
    pub context_switches: u64,
    pub avg_wait_time: f64,
    pub ready: usize,
    pub blocked: usize,
    pub running: Option<Pid>,
    pub detail: SchedulerDetail,
}

impl fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} scheduler statistics:", self.name)?;
        writeln!(f, "  Ticks: {}", self.ticks)?;
        writeln!(f, "  Context switches: {}", self.context_switches)?;
        writeln!(f, "  Average wait time: {:.2} ticks", self.avg_wait_time)?;
        writeln!(f, "  Ready: {}", self.ready)?;
        writeln!(f, "  Blocked: {}", self.blocked)?;
        match self.running {
            Some(pid) => write!(f, "  Running: {}", pid)?,
            None => write!(f, "  Running: idle")?,
        }
        match &self.detail {
            SchedulerDetail::RoundRobin { quantum } => {
                write!(f, "\n  Time quantum: {} ticks", quantum)?;
            }
            SchedulerDetail::Priority {
                ready_by_priority,
                aging_boosts,
            } => {
                write!(f, "\n  Aging boosts: {}", aging_boosts)?;
                for (priority, count) in ready_by_priority {
                    write!(f, "\n  Priority {:2}: {} ready", priority, count)?;
                }
            }
        }
        Ok(())
    }
}
