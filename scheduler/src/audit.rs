//! Dispatch audit trail
//!
//! Both schedulers record dispatch and preemption decisions so tests can
//! check fairness properties against the actual schedule. The log keeps the
//! most recent [`ScheduleLog::CAPACITY`] events.

use core_types::Pid;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleEvent {
    /// `pid` was given the CPU
    Dispatched { pid: Pid, tick: u64 },
    /// `pid` lost the CPU but stayed runnable
    Preempted { pid: Pid, tick: u64 },
    /// `pid` left the CPU for the blocked list
    Blocked { pid: Pid, tick: u64 },
    /// Aging raised `pid` to `priority`
    Boosted { pid: Pid, priority: u32, tick: u64 },
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleLog {
    events: VecDeque<ScheduleEvent>,
}

impl ScheduleLog {
    pub const CAPACITY: usize = 1024;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: ScheduleEvent) {
        if self.events.len() == Self::CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn events(&self) -> impl Iterator<Item = &ScheduleEvent> {
        self.events.iter()
    }

    /// Ticks at which `pid` was dispatched, oldest first.
    pub fn dispatch_ticks(&self, pid: Pid) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|event| match *event {
                ScheduleEvent::Dispatched { pid: p, tick } if p == pid => Some(tick),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
