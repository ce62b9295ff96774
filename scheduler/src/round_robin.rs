//! Round-robin scheduler
//!
//! A single FIFO ready queue. The running process keeps the CPU for one
//! quantum (default 20 ticks), then goes to the back of the queue and the
//! head takes over. Priorities are accepted but ignored.

use crate::audit::{ScheduleEvent, ScheduleLog};
use crate::PROCESS_TABLE_SIZE;
use core_types::{Handle, Link, Linked, ListHead, Pid, Pool};
use kernel_api::{
    KernelComponent, ProcessInfo, ProcessState, SchedError, Scheduler, SchedulerDetail,
    SchedulerStats, MAX_PRIORITY,
};
use std::collections::HashMap;

pub const DEFAULT_TIME_QUANTUM: u32 = 20;
pub const MIN_TIME_QUANTUM: u32 = 1;
pub const MAX_TIME_QUANTUM: u32 = 1000;

#[derive(Debug)]
struct RrProcess {
    pid: Pid,
    state: ProcessState,
    /// Ticks spent on the ready queue since last unblock
    wait_time: u64,
    link: Link,
}

impl Linked for RrProcess {
    fn link(&self) -> &Link {
        &self.link
    }

    fn link_mut(&mut self) -> &mut Link {
        &mut self.link
    }
}

#[derive(Debug)]
pub struct RoundRobinScheduler {
    table: Pool<RrProcess>,
    index: HashMap<Pid, Handle>,
    ready: ListHead,
    blocked: ListHead,
    current: Option<Handle>,
    quantum: u32,
    remaining: u32,
    ticks: u64,
    context_switches: u64,
    total_wait: u64,
    log: ScheduleLog,
    initialized: bool,
}

impl Default for RoundRobinScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundRobinScheduler {
    pub fn new() -> Self {
        Self {
            table: Pool::with_capacity(PROCESS_TABLE_SIZE),
            index: HashMap::new(),
            ready: ListHead::new(),
            blocked: ListHead::new(),
            current: None,
            quantum: DEFAULT_TIME_QUANTUM,
            remaining: 0,
            ticks: 0,
            context_switches: 0,
            total_wait: 0,
            log: ScheduleLog::new(),
            initialized: false,
        }
    }

    /// Creates a scheduler with a non-default quantum.
    pub fn with_quantum(quantum: u32) -> Result<Self, SchedError> {
        let mut scheduler = Self::new();
        scheduler.set_time_quantum(quantum)?;
        Ok(scheduler)
    }

    pub fn time_quantum(&self) -> u32 {
        self.quantum
    }

    /// Ticks left before the running process is preempted.
    pub fn remaining_quantum(&self) -> u32 {
        self.remaining
    }

    pub fn log(&self) -> &ScheduleLog {
        &self.log
    }

    fn lookup(&self, pid: Pid) -> Result<Handle, SchedError> {
        if !self.initialized {
            return Err(SchedError::NotInitialized);
        }
        self.index
            .get(&pid)
            .copied()
            .ok_or(SchedError::UnknownProcess(pid))
    }

    fn pid_of(&self, handle: Handle) -> Option<Pid> {
        self.table.get(handle).map(|p| p.pid)
    }

    fn set_state(&mut self, handle: Handle, state: ProcessState) {
        if let Some(p) = self.table.get_mut(handle) {
            p.state = state;
        }
    }

    /// Puts the head of the ready queue on the CPU. `previous` is the process
    /// that held the CPU before this decision, for context-switch accounting.
    fn dispatch(&mut self, previous: Option<Handle>) {
        let Some(next) = self.ready.pop_front(&mut self.table) else {
            self.current = None;
            self.remaining = 0;
            return;
        };
        self.set_state(next, ProcessState::Running);
        self.current = Some(next);
        self.remaining = self.quantum;

        if previous != Some(next) {
            self.context_switches += 1;
            if let Some(pid) = self.pid_of(next) {
                log::trace!("round_robin: dispatch {} at tick {}", pid, self.ticks);
                self.log.record(ScheduleEvent::Dispatched {
                    pid,
                    tick: self.ticks,
                });
            }
        }
    }

    /// Moves the running process to the back of the ready queue.
    fn requeue_current(&mut self) -> Option<Handle> {
        let current = self.current.take()?;
        self.set_state(current, ProcessState::Ready);
        self.ready.push_back(&mut self.table, current);
        if let Some(pid) = self.pid_of(current) {
            self.log.record(ScheduleEvent::Preempted {
                pid,
                tick: self.ticks,
            });
        }
        Some(current)
    }
}

impl KernelComponent for RoundRobinScheduler {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn description(&self) -> &'static str {
        "Classic time-sliced round-robin scheduler with configurable quantum"
    }
}

impl Scheduler for RoundRobinScheduler {
    /// Clears every queue and counter. The configured quantum is kept.
    fn init(&mut self) {
        self.table.clear();
        self.index.clear();
        self.ready.clear();
        self.blocked.clear();
        self.current = None;
        self.remaining = 0;
        self.ticks = 0;
        self.context_switches = 0;
        self.total_wait = 0;
        self.log.clear();
        self.initialized = true;
    }

    fn shutdown(&mut self) {
        self.init();
        self.initialized = false;
    }

    fn add_process(&mut self, pid: Pid, _priority: u32) -> Result<(), SchedError> {
        if !self.initialized {
            return Err(SchedError::NotInitialized);
        }
        if self.index.contains_key(&pid) {
            return Err(SchedError::DuplicateProcess(pid));
        }
        let handle = self
            .table
            .insert(RrProcess {
                pid,
                state: ProcessState::Ready,
                wait_time: 0,
                link: Link::default(),
            })
            .map_err(|_| SchedError::TableFull {
                capacity: PROCESS_TABLE_SIZE,
            })?;
        self.ready.push_back(&mut self.table, handle);
        self.index.insert(pid, handle);
        Ok(())
    }

    fn remove_process(&mut self, pid: Pid) -> Result<(), SchedError> {
        let handle = self.lookup(pid)?;
        match self.table.get(handle).map(|p| p.state) {
            Some(ProcessState::Running) => {
                self.current = None;
                self.remaining = 0;
            }
            Some(ProcessState::Ready) => {
                self.ready.unlink(&mut self.table, handle);
            }
            Some(ProcessState::Blocked) => {
                self.blocked.unlink(&mut self.table, handle);
            }
            None => {}
        }
        self.table.remove(handle);
        self.index.remove(&pid);
        Ok(())
    }

    fn peek_next(&self) -> Option<Pid> {
        if !self.initialized {
            return None;
        }
        match self.current {
            Some(current) if self.remaining > 0 => self.pid_of(current),
            current => self
                .ready
                .front()
                .or(current)
                .and_then(|h| self.pid_of(h)),
        }
    }

    fn schedule(&mut self) -> Option<Pid> {
        if !self.initialized {
            return None;
        }
        if self.current.is_none() || self.remaining == 0 {
            let previous = self.requeue_current();
            self.dispatch(previous);
        }
        self.current()
    }

    fn yield_now(&mut self) -> Option<Pid> {
        if !self.initialized {
            return None;
        }
        let previous = self.requeue_current();
        self.dispatch(previous);
        self.current()
    }

    fn block(&mut self, pid: Pid) -> Result<(), SchedError> {
        let handle = self.lookup(pid)?;
        match self.table.get(handle).map(|p| p.state) {
            Some(ProcessState::Running) => {
                self.current = None;
                self.remaining = 0;
                self.set_state(handle, ProcessState::Blocked);
                self.blocked.push_back(&mut self.table, handle);
                self.log.record(ScheduleEvent::Blocked {
                    pid,
                    tick: self.ticks,
                });
                self.dispatch(Some(handle));
            }
            Some(ProcessState::Ready) => {
                self.ready.unlink(&mut self.table, handle);
                self.set_state(handle, ProcessState::Blocked);
                self.blocked.push_back(&mut self.table, handle);
            }
            Some(state) => {
                return Err(SchedError::InvalidState {
                    pid,
                    state,
                    op: "block",
                })
            }
            None => return Err(SchedError::UnknownProcess(pid)),
        }
        Ok(())
    }

    fn unblock(&mut self, pid: Pid) -> Result<(), SchedError> {
        let handle = self.lookup(pid)?;
        match self.table.get(handle).map(|p| p.state) {
            Some(ProcessState::Blocked) => {}
            Some(state) => {
                return Err(SchedError::InvalidState {
                    pid,
                    state,
                    op: "unblock",
                })
            }
            None => return Err(SchedError::UnknownProcess(pid)),
        }
        self.blocked.unlink(&mut self.table, handle);
        if let Some(p) = self.table.get_mut(handle) {
            p.state = ProcessState::Ready;
            p.wait_time = 0;
        }
        self.ready.push_back(&mut self.table, handle);
        Ok(())
    }

    fn timer_tick(&mut self) {
        if !self.initialized {
            return;
        }
        self.ticks += 1;
        if self.current.is_some() && self.remaining > 0 {
            self.remaining -= 1;
        }

        let waiting: Vec<Handle> = self.ready.iter(&self.table).collect();
        for handle in &waiting {
            if let Some(p) = self.table.get_mut(*handle) {
                p.wait_time += 1;
            }
        }
        self.total_wait += waiting.len() as u64;

        if self.remaining == 0 {
            self.schedule();
        }
    }

    fn priority(&self, pid: Pid) -> Result<u32, SchedError> {
        self.lookup(pid).map(|_| 0)
    }

    fn set_priority(&mut self, pid: Pid, priority: u32) -> Result<(), SchedError> {
        self.lookup(pid)?;
        if priority > MAX_PRIORITY {
            return Err(SchedError::InvalidPriority(priority));
        }
        Ok(())
    }

    /// A running process restarts with the new quantum.
    fn set_time_quantum(&mut self, quantum: u32) -> Result<(), SchedError> {
        if !(MIN_TIME_QUANTUM..=MAX_TIME_QUANTUM).contains(&quantum) {
            return Err(SchedError::InvalidQuantum(quantum));
        }
        self.quantum = quantum;
        if self.current.is_some() && self.remaining > 0 {
            self.remaining = quantum;
        }
        Ok(())
    }

    fn time_slice(&self, pid: Pid) -> Result<u32, SchedError> {
        self.lookup(pid).map(|_| self.quantum)
    }

    fn current(&self) -> Option<Pid> {
        self.current.and_then(|h| self.pid_of(h))
    }

    fn process(&self, pid: Pid) -> Option<ProcessInfo> {
        let handle = self.index.get(&pid)?;
        let p = self.table.get(*handle)?;
        Some(ProcessInfo {
            pid: p.pid,
            state: p.state,
            priority: 0,
            original_priority: 0,
            age: 0,
            time_slice: self.quantum,
            remaining: if p.state == ProcessState::Running {
                self.remaining
            } else {
                0
            },
            wait_time: p.wait_time,
        })
    }

    fn context_switches(&self) -> u64 {
        self.context_switches
    }

    fn avg_wait_time(&self) -> f64 {
        if self.ticks == 0 {
            return 0.0;
        }
        self.total_wait as f64 / self.ticks as f64
    }

    fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            name: self.name(),
            ticks: self.ticks,
            context_switches: self.context_switches,
            avg_wait_time: self.avg_wait_time(),
            ready: self.ready.len(),
            blocked: self.blocked.len(),
            running: self.current(),
            detail: SchedulerDetail::RoundRobin {
                quantum: self.quantum,
            },
        }
    }
}
