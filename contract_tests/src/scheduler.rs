//! Scheduler contract

use core_types::Pid;
use kernel_api::{ProcessState, SchedError, Scheduler};

/// Priority every process in these checks is added with.
const PRIORITY: u32 = 10;

/// Runs every scheduler check against `sched`, which must be uninitialised.
pub fn check_all(sched: &mut dyn Scheduler) {
    check_requires_init(sched);
    check_dispatch_order(sched);
    check_peek_matches_schedule(sched);
    check_block_and_unblock(sched);
    check_bad_references(sched);
    check_quantum_expiry(sched);
    check_remove_running(sched);
    check_table_capacity(sched);
    check_shutdown(sched);
}

fn pid(n: u32) -> Pid {
    Pid::new(n)
}

fn fresh_with(sched: &mut dyn Scheduler, count: u32) {
    sched.init();
    for n in 1..=count {
        sched
            .add_process(pid(n), PRIORITY)
            .unwrap_or_else(|e| panic!("{}: add {n}: {e}", sched.name()));
    }
}

/// Exactly the current process is running; every other known process is
/// ready or blocked.
pub fn assert_exclusive(sched: &dyn Scheduler, pids: &[Pid]) {
    let running: Vec<Pid> = pids
        .iter()
        .filter_map(|&p| sched.process(p))
        .filter(|info| info.state == ProcessState::Running)
        .map(|info| info.pid)
        .collect();
    assert_eq!(running, sched.current().into_iter().collect::<Vec<_>>(), "{}", sched.name());
}

pub fn check_requires_init(sched: &mut dyn Scheduler) {
    let name = sched.name();
    assert_eq!(
        sched.add_process(pid(1), PRIORITY),
        Err(SchedError::NotInitialized),
        "{name}"
    );
    assert_eq!(sched.schedule(), None, "{name}");
    assert_eq!(sched.peek_next(), None, "{name}");
    sched.timer_tick();
    assert_eq!(sched.stats().ticks, 0, "{name}");
}

pub fn check_dispatch_order(sched: &mut dyn Scheduler) {
    fresh_with(sched, 3);
    let name = sched.name();
    assert_eq!(
        sched.add_process(pid(1), PRIORITY),
        Err(SchedError::DuplicateProcess(pid(1))),
        "{name}"
    );
    assert_eq!(sched.current(), None, "{name}");
    assert_eq!(sched.schedule(), Some(pid(1)), "{name}");
    assert_eq!(sched.yield_now(), Some(pid(2)), "{name}");
    assert_eq!(sched.yield_now(), Some(pid(3)), "{name}");
    assert_eq!(sched.yield_now(), Some(pid(1)), "{name}");
    assert_exclusive(sched, &[pid(1), pid(2), pid(3)]);
    assert!(sched.context_switches() >= 4, "{name}");
}

pub fn check_peek_matches_schedule(sched: &mut dyn Scheduler) {
    fresh_with(sched, 3);
    let name = sched.name();
    for _ in 0..5 {
        let before = sched.current();
        let peeked = sched.peek_next();
        assert_eq!(sched.current(), before, "{name}: peek changed the CPU");
        assert_eq!(sched.schedule(), peeked, "{name}");
        sched.timer_tick();
    }
}

pub fn check_block_and_unblock(sched: &mut dyn Scheduler) {
    fresh_with(sched, 2);
    let name = sched.name();
    let pids = [pid(1), pid(2)];
    assert_eq!(sched.schedule(), Some(pid(1)), "{name}");

    sched.block(pid(1)).unwrap();
    assert_eq!(sched.current(), Some(pid(2)), "{name}: block did not hand over the CPU");
    assert_eq!(sched.process(pid(1)).map(|i| i.state), Some(ProcessState::Blocked));
    assert_exclusive(sched, &pids);
    assert!(matches!(
        sched.block(pid(1)),
        Err(SchedError::InvalidState { .. })
    ));

    sched.block(pid(2)).unwrap();
    assert_eq!(sched.current(), None, "{name}");
    assert_eq!(sched.schedule(), None, "{name}");

    sched.unblock(pid(1)).unwrap();
    let info = sched.process(pid(1)).unwrap();
    assert_eq!(info.state, ProcessState::Ready, "{name}");
    assert_eq!(info.wait_time, 0, "{name}");
    assert!(matches!(
        sched.unblock(pid(1)),
        Err(SchedError::InvalidState { .. })
    ));
    assert_eq!(sched.schedule(), Some(pid(1)), "{name}");
    assert_exclusive(sched, &pids);
}

pub fn check_bad_references(sched: &mut dyn Scheduler) {
    fresh_with(sched, 1);
    let name = sched.name();
    let ghost = pid(99);
    assert_eq!(sched.block(ghost), Err(SchedError::UnknownProcess(ghost)), "{name}");
    assert_eq!(sched.unblock(ghost), Err(SchedError::UnknownProcess(ghost)), "{name}");
    assert_eq!(sched.remove_process(ghost), Err(SchedError::UnknownProcess(ghost)), "{name}");
    assert_eq!(sched.priority(ghost), Err(SchedError::UnknownProcess(ghost)), "{name}");
    assert!(sched.process(ghost).is_none(), "{name}");
    assert_eq!(
        sched.set_priority(pid(1), 40),
        Err(SchedError::InvalidPriority(40)),
        "{name}"
    );
}

pub fn check_quantum_expiry(sched: &mut dyn Scheduler) {
    fresh_with(sched, 2);
    let name = sched.name();
    let slice = sched.time_slice(pid(1)).unwrap();
    assert!(slice > 0, "{name}");

    sched.timer_tick();
    assert_eq!(sched.current(), Some(pid(1)), "{name}: idle CPU not filled on tick");
    for _ in 1..slice {
        sched.timer_tick();
        assert_eq!(sched.current(), Some(pid(1)), "{name}: preempted early");
    }
    sched.timer_tick();
    assert_eq!(sched.current(), Some(pid(2)), "{name}: not preempted at slice end");
    assert_eq!(sched.stats().ticks, u64::from(slice) + 1, "{name}");
    assert!(sched.avg_wait_time() > 0.0, "{name}");
}

pub fn check_remove_running(sched: &mut dyn Scheduler) {
    fresh_with(sched, 2);
    let name = sched.name();
    sched.schedule();
    sched.remove_process(pid(1)).unwrap();
    assert_eq!(sched.current(), None, "{name}");
    assert!(sched.process(pid(1)).is_none(), "{name}");
    assert_eq!(sched.schedule(), Some(pid(2)), "{name}");
}

pub fn check_table_capacity(sched: &mut dyn Scheduler) {
    sched.init();
    let name = sched.name();
    let mut added = 0u32;
    let err = loop {
        match sched.add_process(pid(added + 1), PRIORITY) {
            Ok(()) => added += 1,
            Err(e) => break e,
        }
        assert!(added <= 1024, "{name}: table never fills");
    };
    assert!(matches!(err, SchedError::TableFull { .. }), "{name}: {err}");
    assert_eq!(added, 64, "{name}");

    sched.remove_process(pid(1)).unwrap();
    sched.add_process(pid(1000), PRIORITY).unwrap();
}

pub fn check_shutdown(sched: &mut dyn Scheduler) {
    fresh_with(sched, 2);
    let name = sched.name();
    sched.schedule();
    sched.shutdown();
    assert_eq!(sched.current(), None, "{name}");
    assert!(sched.process(pid(1)).is_none(), "{name}");
    assert_eq!(
        sched.add_process(pid(1), PRIORITY),
        Err(SchedError::NotInitialized),
        "{name}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_scheduler_meets_contract() {
        for mut sched in crate::schedulers() {
            check_all(sched.as_mut());
        }
    }
}
