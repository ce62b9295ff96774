//! Priority scheduler with aging
//!
//! 32 ready queues, priority 0 (lowest) to 31 (highest). Dispatch always
//! takes the head of the highest non-empty queue; equal priorities share
//! the CPU round-robin. A process at priority `p` runs for `10 + 2p` ticks
//! before being preempted.
//!
//! ## Aging
//!
//! Every tick, each ready process below [`MAX_PRIORITY`] grows one tick
//! older. When its age reaches [`AGING_INTERVAL`] it moves up by
//! [`AGING_BOOST`] and its age starts over, so a process that keeps waiting
//! climbs one level per interval until it reaches the top. Being dispatched
//! or unblocked resets the age; unblocking also drops any boost and restores
//! the priority the process was given explicitly.

use crate::audit::{ScheduleEvent, ScheduleLog};
use crate::PROCESS_TABLE_SIZE;
use core_types::{Handle, Link, Linked, ListHead, Pid, Pool};
use kernel_api::{
    KernelComponent, ProcessInfo, ProcessState, SchedError, Scheduler, SchedulerDetail,
    SchedulerStats,
};
use std::collections::HashMap;

pub use kernel_api::MAX_PRIORITY;

/// Priority given to processes added with an out-of-range priority.
pub const DEFAULT_PRIORITY: u32 = 15;
/// Ticks of waiting that earn one boost.
pub const AGING_INTERVAL: u32 = 100;
pub const AGING_BOOST: u32 = 1;

const LEVELS: usize = MAX_PRIORITY as usize + 1;

/// Ticks a process at `priority` may run before preemption.
pub fn time_slice_for(priority: u32) -> u32 {
    10 + priority * 2
}

#[derive(Debug)]
struct PrioProcess {
    pid: Pid,
    state: ProcessState,
    priority: u32,
    original_priority: u32,
    age: u32,
    time_slice: u32,
    remaining: u32,
    wait_time: u64,
    link: Link,
}

impl Linked for PrioProcess {
    fn link(&self) -> &Link {
        &self.link
    }

    fn link_mut(&mut self) -> &mut Link {
        &mut self.link
    }
}

#[derive(Debug)]
pub struct PriorityScheduler {
    table: Pool<PrioProcess>,
    index: HashMap<Pid, Handle>,
    ready: [ListHead; LEVELS],
    blocked: ListHead,
    current: Option<Handle>,
    ticks: u64,
    context_switches: u64,
    total_wait: u64,
    aging_boosts: u64,
    log: ScheduleLog,
    initialized: bool,
}

impl Default for PriorityScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityScheduler {
    pub fn new() -> Self {
        Self {
            table: Pool::with_capacity(PROCESS_TABLE_SIZE),
            index: HashMap::new(),
            ready: std::array::from_fn(|_| ListHead::new()),
            blocked: ListHead::new(),
            current: None,
            ticks: 0,
            context_switches: 0,
            total_wait: 0,
            aging_boosts: 0,
            log: ScheduleLog::new(),
            initialized: false,
        }
    }

    pub fn log(&self) -> &ScheduleLog {
        &self.log
    }

    /// Number of ready processes at `priority`.
    pub fn ready_at(&self, priority: u32) -> usize {
        self.ready
            .get(priority as usize)
            .map(ListHead::len)
            .unwrap_or(0)
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

    fn highest_ready(&self) -> Option<u32> {
        (0..LEVELS as u32)
            .rev()
            .find(|&priority| !self.ready[priority as usize].is_empty())
    }

    fn enqueue(&mut self, handle: Handle) {
        let Some(p) = self.table.get_mut(handle) else {
            return;
        };
        p.state = ProcessState::Ready;
        let level = p.priority as usize;
        self.ready[level].push_back(&mut self.table, handle);
    }

    fn dequeue(&mut self, handle: Handle) {
        if let Some(level) = self.table.get(handle).map(|p| p.priority as usize) {
            self.ready[level].unlink(&mut self.table, handle);
        }
    }

    /// Requeues the running process, then dispatches the best ready one.
    fn reschedule(&mut self) {
        let previous = self.current.take();
        if let Some(prev) = previous {
            self.enqueue(prev);
        }

        let next = self
            .highest_ready()
            .and_then(|level| self.ready[level as usize].pop_front(&mut self.table));
        self.current = next;

        if let Some(next) = next {
            if let Some(p) = self.table.get_mut(next) {
                p.state = ProcessState::Running;
                p.remaining = p.time_slice;
                p.age = 0;
            }
        }

        if previous != next {
            if let Some(pid) = previous.and_then(|h| self.pid_of(h)) {
                self.log.record(ScheduleEvent::Preempted {
                    pid,
                    tick: self.ticks,
                });
            }
            if let Some(pid) = next.and_then(|h| self.pid_of(h)) {
                self.context_switches += 1;
                log::trace!("priority: dispatch {} at tick {}", pid, self.ticks);
                self.log.record(ScheduleEvent::Dispatched {
                    pid,
                    tick: self.ticks,
                });
            }
        }
    }

    /// Ages every ready process below the top level by one tick.
    fn age_ready(&mut self) {
        let mut promote = Vec::new();
        for level in 0..MAX_PRIORITY as usize {
            let handles: Vec<Handle> = self.ready[level].iter(&self.table).collect();
            for handle in handles {
                if let Some(p) = self.table.get_mut(handle) {
                    p.age += 1;
                    if p.age >= AGING_INTERVAL {
                        promote.push(handle);
                    }
                }
            }
        }

        for handle in promote {
            self.dequeue(handle);
            let Some(p) = self.table.get_mut(handle) else {
                continue;
            };
            p.priority = (p.priority + AGING_BOOST).min(MAX_PRIORITY);
            p.age = 0;
            let (pid, priority) = (p.pid, p.priority);
            self.enqueue(handle);
            self.aging_boosts += 1;
            log::debug!("priority: aged {} to priority {}", pid, priority);
            self.log.record(ScheduleEvent::Boosted {
                pid,
                priority,
                tick: self.ticks,
            });
        }
    }

    fn ready_count(&self) -> usize {
        self.ready.iter().map(ListHead::len).sum()
    }
}

impl KernelComponent for PriorityScheduler {
    fn name(&self) -> &'static str {
        "priority"
    }

    fn description(&self) -> &'static str {
        "Multi-level priority scheduler with aging and dynamic time slices"
    }
}

impl Scheduler for PriorityScheduler {
    fn init(&mut self) {
        self.table.clear();
        self.index.clear();
        self.ready.iter_mut().for_each(ListHead::clear);
        self.blocked.clear();
        self.current = None;
        self.ticks = 0;
        self.context_switches = 0;
        self.total_wait = 0;
        self.aging_boosts = 0;
        self.log.clear();
        self.initialized = true;
    }

    fn shutdown(&mut self) {
        self.init();
        self.initialized = false;
    }

    /// Priorities above [`MAX_PRIORITY`] fall back to [`DEFAULT_PRIORITY`].
    fn add_process(&mut self, pid: Pid, priority: u32) -> Result<(), SchedError> {
        if !self.initialized {
            return Err(SchedError::NotInitialized);
        }
        if self.index.contains_key(&pid) {
            return Err(SchedError::DuplicateProcess(pid));
        }
        let priority = if priority > MAX_PRIORITY {
            DEFAULT_PRIORITY
        } else {
            priority
        };
        let time_slice = time_slice_for(priority);
        let handle = self
            .table
            .insert(PrioProcess {
                pid,
                state: ProcessState::Ready,
                priority,
                original_priority: priority,
                age: 0,
                time_slice,
                remaining: time_slice,
                wait_time: 0,
                link: Link::default(),
            })
            .map_err(|_| SchedError::TableFull {
                capacity: PROCESS_TABLE_SIZE,
            })?;
        self.index.insert(pid, handle);
        self.enqueue(handle);
        Ok(())
    }

    fn remove_process(&mut self, pid: Pid) -> Result<(), SchedError> {
        let handle = self.lookup(pid)?;
        match self.table.get(handle).map(|p| p.state) {
            Some(ProcessState::Running) => self.current = None,
            Some(ProcessState::Ready) => self.dequeue(handle),
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
        let best = self.highest_ready();
        let running = self
            .current
            .and_then(|h| self.table.get(h))
            .map(|p| p.priority);
        match (best, running) {
            (Some(level), Some(mine)) if mine > level => self.current(),
            (Some(level), _) => self.ready[level as usize]
                .front()
                .and_then(|h| self.pid_of(h)),
            (None, _) => self.current(),
        }
    }

    fn schedule(&mut self) -> Option<Pid> {
        if !self.initialized {
            return None;
        }
        self.reschedule();
        self.current()
    }

    fn yield_now(&mut self) -> Option<Pid> {
        self.schedule()
    }

    fn block(&mut self, pid: Pid) -> Result<(), SchedError> {
        let handle = self.lookup(pid)?;
        let state = self
            .table
            .get(handle)
            .map(|p| p.state)
            .ok_or(SchedError::UnknownProcess(pid))?;
        match state {
            ProcessState::Running => {
                self.current = None;
                self.log.record(ScheduleEvent::Blocked {
                    pid,
                    tick: self.ticks,
                });
            }
            ProcessState::Ready => self.dequeue(handle),
            ProcessState::Blocked => {
                return Err(SchedError::InvalidState {
                    pid,
                    state,
                    op: "block",
                })
            }
        }
        if let Some(p) = self.table.get_mut(handle) {
            p.state = ProcessState::Blocked;
        }
        self.blocked.push_back(&mut self.table, handle);
        if state == ProcessState::Running {
            self.reschedule();
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
            p.priority = p.original_priority;
            p.time_slice = time_slice_for(p.priority);
            p.age = 0;
            p.wait_time = 0;
        }
        self.enqueue(handle);
        Ok(())
    }

    fn timer_tick(&mut self) {
        if !self.initialized {
            return;
        }
        self.ticks += 1;

        let expired = match self.current {
            Some(running) => match self.table.get_mut(running) {
                Some(p) => {
                    p.remaining = p.remaining.saturating_sub(1);
                    p.remaining == 0
                }
                None => true,
            },
            None => self.ready_count() > 0,
        };
        if expired {
            self.reschedule();
        }

        let waiting: Vec<Handle> = self
            .ready
            .iter()
            .flat_map(|queue| queue.iter(&self.table))
            .collect();
        for handle in &waiting {
            if let Some(p) = self.table.get_mut(*handle) {
                p.wait_time += 1;
            }
        }
        self.total_wait += waiting.len() as u64;

        self.age_ready();
    }

    fn priority(&self, pid: Pid) -> Result<u32, SchedError> {
        let handle = self.lookup(pid)?;
        self.table
            .get(handle)
            .map(|p| p.priority)
            .ok_or(SchedError::UnknownProcess(pid))
    }

    /// Sets both the effective and the original priority. A ready process
    /// moves to the tail of its new queue.
    fn set_priority(&mut self, pid: Pid, priority: u32) -> Result<(), SchedError> {
        let handle = self.lookup(pid)?;
        if priority > MAX_PRIORITY {
            return Err(SchedError::InvalidPriority(priority));
        }
        let was_ready = self.table.get(handle).map(|p| p.state) == Some(ProcessState::Ready);
        if was_ready {
            self.dequeue(handle);
        }
        if let Some(p) = self.table.get_mut(handle) {
            p.priority = priority;
            p.original_priority = priority;
            p.time_slice = time_slice_for(priority);
        }
        if was_ready {
            self.enqueue(handle);
        }
        Ok(())
    }

    fn time_slice(&self, pid: Pid) -> Result<u32, SchedError> {
        let handle = self.lookup(pid)?;
        self.table
            .get(handle)
            .map(|p| p.time_slice)
            .ok_or(SchedError::UnknownProcess(pid))
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
            priority: p.priority,
            original_priority: p.original_priority,
            age: p.age,
            time_slice: p.time_slice,
            remaining: p.remaining,
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
        let ready_by_priority = (0..LEVELS as u32)
            .rev()
            .map(|level| (level, self.ready_at(level)))
            .filter(|(_, count)| *count > 0)
            .collect();
        SchedulerStats {
            name: self.name(),
            ticks: self.ticks,
            context_switches: self.context_switches,
            avg_wait_time: self.avg_wait_time(),
            ready: self.ready_count(),
            blocked: self.blocked.len(),
            running: self.current(),
            detail: SchedulerDetail::Priority {
                ready_by_priority,
                aging_boosts: self.aging_boosts,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> PriorityScheduler {
        let mut s = PriorityScheduler::new();
        s.init();
        s
    }

    fn run(s: &mut PriorityScheduler, ticks: u32) {
        for _ in 0..ticks {
            s.timer_tick();
        }
    }

    #[test]
    fn test_time_slice_formula() {
        assert_eq!(time_slice_for(0), 10);
        assert_eq!(time_slice_for(15), 40);
        assert_eq!(time_slice_for(31), 72);
    }

    #[test]
    fn test_quantum_is_not_adjustable() {
        let mut s = scheduler();
        assert_eq!(s.set_time_quantum(20), Err(SchedError::FixedQuantum("priority")));
    }

    #[test]
    fn test_highest_priority_wins() {
        let mut s = scheduler();
        s.add_process(Pid::new(1), 5).unwrap();
        s.add_process(Pid::new(2), 20).unwrap();
        s.add_process(Pid::new(3), 10).unwrap();
        assert_eq!(s.peek_next(), Some(Pid::new(2)));
        assert_eq!(s.schedule(), Some(Pid::new(2)));
        assert_eq!(s.time_slice(Pid::new(2)), Ok(50));
    }

    #[test]
    fn test_out_of_range_priority_defaults() {
        let mut s = scheduler();
        s.add_process(Pid::new(1), 99).unwrap();
        assert_eq!(s.priority(Pid::new(1)), Ok(DEFAULT_PRIORITY));
    }

    #[test]
    fn test_equal_priorities_share_round_robin() {
        let mut s = scheduler();
        s.add_process(Pid::new(1), 0).unwrap();
        s.add_process(Pid::new(2), 0).unwrap();
        s.schedule();
        assert_eq!(s.current(), Some(Pid::new(1)));
        run(&mut s, 10);
        assert_eq!(s.current(), Some(Pid::new(2)));
        run(&mut s, 10);
        assert_eq!(s.current(), Some(Pid::new(1)));
    }

    #[test]
    fn test_running_top_process_is_reselected_without_switch() {
        let mut s = scheduler();
        s.add_process(Pid::new(1), 31).unwrap();
        s.add_process(Pid::new(2), 0).unwrap();
        s.schedule();
        let switches = s.context_switches();
        run(&mut s, 72);
        assert_eq!(s.current(), Some(Pid::new(1)));
        assert_eq!(s.context_switches(), switches);
        assert_eq!(s.process(Pid::new(1)).unwrap().remaining, 72);
    }

    #[test]
    fn test_idle_tick_dispatches() {
        let mut s = scheduler();
        s.add_process(Pid::new(4), 3).unwrap();
        s.timer_tick();
        assert_eq!(s.current(), Some(Pid::new(4)));
    }

    #[test]
    fn test_aging_boosts_after_interval() {
        let mut s = scheduler();
        s.add_process(Pid::new(1), 31).unwrap();
        s.add_process(Pid::new(2), 10).unwrap();
        s.schedule();
        run(&mut s, AGING_INTERVAL - 1);
        assert_eq!(s.priority(Pid::new(2)), Ok(10));
        s.timer_tick();
        assert_eq!(s.priority(Pid::new(2)), Ok(11));
        assert_eq!(s.process(Pid::new(2)).unwrap().age, 0);
        assert_eq!(s.process(Pid::new(2)).unwrap().original_priority, 10);
    }

    #[test]
    fn test_starved_process_reaches_top() {
        let mut s = scheduler();
        s.add_process(Pid::new(1), 31).unwrap();
        s.add_process(Pid::new(2), 25).unwrap();
        s.schedule();
        run(&mut s, (31 - 25) * AGING_INTERVAL);
        assert_eq!(s.priority(Pid::new(2)), Ok(MAX_PRIORITY));
    }

    #[test]
    fn test_unblock_restores_original_priority() {
        let mut s = scheduler();
        s.add_process(Pid::new(1), 31).unwrap();
        s.add_process(Pid::new(2), 10).unwrap();
        s.schedule();
        run(&mut s, 3 * AGING_INTERVAL);
        assert_eq!(s.priority(Pid::new(2)), Ok(13));
        s.block(Pid::new(2)).unwrap();
        s.unblock(Pid::new(2)).unwrap();
        assert_eq!(s.priority(Pid::new(2)), Ok(10));
        assert_eq!(s.process(Pid::new(2)).unwrap().age, 0);
    }

    #[test]
    fn test_block_running_moves_to_blocked_and_dispatches() {
        let mut s = scheduler();
        s.add_process(Pid::new(1), 20).unwrap();
        s.add_process(Pid::new(2), 10).unwrap();
        s.schedule();
        s.block(Pid::new(1)).unwrap();
        assert_eq!(s.current(), Some(Pid::new(2)));
        assert_eq!(s.process(Pid::new(1)).unwrap().state, ProcessState::Blocked);
        assert_eq!(s.stats().blocked, 1);
        s.unblock(Pid::new(1)).unwrap();
        assert_eq!(s.peek_next(), Some(Pid::new(1)));
    }

    #[test]
    fn test_set_priority_requeues_ready_process() {
        let mut s = scheduler();
        s.add_process(Pid::new(1), 5).unwrap();
        s.add_process(Pid::new(2), 6).unwrap();
        s.set_priority(Pid::new(1), 30).unwrap();
        assert_eq!(s.ready_at(5), 0);
        assert_eq!(s.ready_at(30), 1);
        assert_eq!(s.time_slice(Pid::new(1)), Ok(70));
        assert_eq!(s.peek_next(), Some(Pid::new(1)));
        assert_eq!(
            s.set_priority(Pid::new(1), 32),
            Err(SchedError::InvalidPriority(32))
        );
    }

    #[test]
    fn test_remove_ready_process() {
        let mut s = scheduler();
        s.add_process(Pid::new(1), 5).unwrap();
        s.remove_process(Pid::new(1)).unwrap();
        assert_eq!(s.ready_at(5), 0);
        assert_eq!(
            s.priority(Pid::new(1)),
            Err(SchedError::UnknownProcess(Pid::new(1)))
        );
    }

    #[test]
    fn test_stats_group_ready_by_priority() {
        let mut s = scheduler();
        s.add_process(Pid::new(1), 5).unwrap();
        s.add_process(Pid::new(2), 5).unwrap();
        s.add_process(Pid::new(3), 9).unwrap();
        let stats = s.stats();
        assert_eq!(stats.ready, 3);
        assert_eq!(
            stats.detail,
            SchedulerDetail::Priority {
                ready_by_priority: vec![(9, 1), (5, 2)],
                aging_boosts: 0,
            }
        );
    }
}
