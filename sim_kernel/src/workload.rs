//! Component comparison workloads
//!
//! Each category has one fixed, deterministic workload. [`compare`] boots a
//! kernel, runs the workload once per catalog implementation of the
//! category, and collects the results into a serialisable [`Comparison`].

use crate::{KernelConfig, KernelError, SimulatedKernel};
use core_types::{EndpointId, Pid, PhysAddr};
use ipc::IpcMessage;
use kernel_api::{Category, RegistryError, TransportStats};
use serde::Serialize;
use services_registry::{catalog, dispatch};
use std::collections::BTreeMap;

/// Request sizes, in pages, cycled through by the allocator workload.
const ALLOC_PATTERN: [usize; 8] = [1, 3, 8, 2, 16, 5, 1, 4];
const ALLOC_REQUESTS: usize = 32;
const REFILL_REQUESTS: usize = 16;
const REFILL_PAGES: usize = 6;

const SCHED_PRIORITIES: [u32; 4] = [2, 8, 16, 24];

const IPC_ROUNDS: usize = 8;
const IPC_BURST: u32 = 20;
const OUTSIDER: u32 = 42;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocatorRun {
    pub name: &'static str,
    pub total_pages: usize,
    pub requests: usize,
    pub failed_requests: usize,
    /// Pages the caller asked for and still holds
    pub requested_pages: usize,
    /// Pages the allocator reports in use
    pub used_pages: usize,
    pub free_pages: usize,
    /// Largest power-of-two request that still succeeds
    pub largest_request: usize,
    /// Share of free pages outside the largest satisfiable request
    pub fragmentation_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerRun {
    pub name: &'static str,
    pub ticks: u64,
    pub context_switches: u64,
    pub avg_wait_time: f64,
    /// Ticks each process spent on the CPU
    pub cpu_ticks: BTreeMap<u32, u64>,
    pub idle_ticks: u64,
    /// Jain's fairness index over `cpu_ticks`, 1.0 is perfectly fair
    pub fairness_index: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportRun {
    pub name: &'static str,
    pub attempted: u64,
    pub delivered: u64,
    pub rejected: u64,
    /// Whether an endpoint outside the channel could send on it
    pub outsider_accepted: bool,
    pub stats: TransportStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "category", content = "results", rename_all = "snake_case")]
pub enum Comparison {
    PhysicalAllocator(Vec<AllocatorRun>),
    Scheduler(Vec<SchedulerRun>),
    IpcTransport(Vec<TransportRun>),
}

/// Runs the workload for `category` against every implementation.
///
/// `ticks` only applies to the scheduler workload.
pub fn compare(
    category: Category,
    config: &KernelConfig,
    ticks: u64,
) -> Result<Comparison, KernelError> {
    let names = catalog::names(category);
    if names.is_empty() {
        return Err(RegistryError::Unsupported(category).into());
    }

    let mut kernel = SimulatedKernel::boot(config.clone())?;
    let comparison = match category {
        Category::PhysicalAllocator => Comparison::PhysicalAllocator(
            names
                .iter()
                .map(|name| {
                    kernel.switch_component(category, name)?;
                    allocator_workload(&mut kernel)
                })
                .collect::<Result<_, _>>()?,
        ),
        Category::Scheduler => Comparison::Scheduler(
            names
                .iter()
                .map(|name| {
                    kernel.switch_component(category, name)?;
                    scheduler_workload(&mut kernel, ticks)
                })
                .collect::<Result<_, _>>()?,
        ),
        Category::IpcTransport => Comparison::IpcTransport(
            names
                .iter()
                .map(|name| {
                    kernel.switch_component(category, name)?;
                    transport_workload(&mut kernel)
                })
                .collect::<Result<_, _>>()?,
        ),
        other => return Err(RegistryError::Unsupported(other).into()),
    };
    kernel.shutdown();
    Ok(comparison)
}

/// Mixed-size allocations, every other one freed, then a refill of
/// medium-sized requests into the holes.
pub fn allocator_workload(kernel: &mut SimulatedKernel) -> Result<AllocatorRun, KernelError> {
    let mut live: Vec<(PhysAddr, usize)> = Vec::new();
    let mut failed = 0;

    for i in 0..ALLOC_REQUESTS {
        let pages = ALLOC_PATTERN[i % ALLOC_PATTERN.len()];
        match kernel.alloc_pages(pages) {
            Ok(addr) => live.push((addr, pages)),
            Err(_) => failed += 1,
        }
    }
    let mut kept = Vec::with_capacity(live.len() / 2 + 1);
    for (i, (addr, pages)) in live.into_iter().enumerate() {
        if i % 2 == 0 {
            kernel.free_pages(addr, pages)?;
        } else {
            kept.push((addr, pages));
        }
    }
    for _ in 0..REFILL_REQUESTS {
        match kernel.alloc_pages(REFILL_PAGES) {
            Ok(addr) => kept.push((addr, REFILL_PAGES)),
            Err(_) => failed += 1,
        }
    }

    let stats = dispatch::allocator_stats(kernel.registry())?;
    let free = stats.free_pages;
    let mut largest = 0;
    let mut request = stats.total_pages.next_power_of_two();
    while request > 0 {
        if request <= free {
            if let Ok(addr) = kernel.alloc_pages(request) {
                kernel.free_pages(addr, request)?;
                largest = request;
                break;
            }
        }
        request /= 2;
    }

    let fragmentation_pct = if free == 0 {
        0.0
    } else {
        (free - largest) as f64 * 100.0 / free as f64
    };
    Ok(AllocatorRun {
        name: stats.name,
        total_pages: stats.total_pages,
        requests: ALLOC_REQUESTS + REFILL_REQUESTS,
        failed_requests: failed,
        requested_pages: kept.iter().map(|(_, pages)| pages).sum(),
        used_pages: stats.used_pages,
        free_pages: free,
        largest_request: largest,
        fragmentation_pct,
    })
}

/// Four always-ready processes at spread priorities, run for `ticks`.
pub fn scheduler_workload(
    kernel: &mut SimulatedKernel,
    ticks: u64,
) -> Result<SchedulerRun, KernelError> {
    let mut cpu_ticks = BTreeMap::new();
    for priority in SCHED_PRIORITIES {
        let pid = kernel.spawn(priority)?;
        cpu_ticks.insert(pid.as_u32(), 0u64);
    }

    let mut idle_ticks = 0;
    for _ in 0..ticks {
        kernel.timer_tick()?;
        match kernel.current_process() {
            Some(pid) => *cpu_ticks.entry(pid.as_u32()).or_insert(0) += 1,
            None => idle_ticks += 1,
        }
    }

    let stats = dispatch::scheduler_stats(kernel.registry())?;
    let run = SchedulerRun {
        name: stats.name,
        ticks,
        context_switches: stats.context_switches,
        avg_wait_time: stats.avg_wait_time,
        fairness_index: jain_index(cpu_ticks.values().copied()),
        cpu_ticks,
        idle_ticks,
    };
    for pid in run.cpu_ticks.keys() {
        kernel.exit(Pid::new(*pid))?;
    }
    Ok(run)
}

/// Bursts larger than a queue can hold, each drained before the next, plus
/// one send from an endpoint that was never granted access.
pub fn transport_workload(kernel: &mut SimulatedKernel) -> Result<TransportRun, KernelError> {
    let (sender, receiver) = (EndpointId::new(1), EndpointId::new(2));
    let channel = kernel.create_channel(sender, receiver)?;

    let mut attempted = 0;
    let mut delivered = 0;
    let mut rejected = 0;
    for round in 0..IPC_ROUNDS as u32 {
        for i in 0..IPC_BURST {
            let msg = IpcMessage::new(sender, receiver).with_id(round * IPC_BURST + i);
            attempted += 1;
            if kernel.send(channel, &msg).is_err() {
                rejected += 1;
            }
        }
        while kernel.receive(channel).is_ok() {
            delivered += 1;
        }
        kernel.timer_tick()?;
    }

    let outsider = IpcMessage::new(EndpointId::new(OUTSIDER), receiver);
    let outsider_accepted = kernel.send(channel, &outsider).is_ok();
    if outsider_accepted {
        kernel.receive(channel)?;
    }

    let stats = dispatch::transport_stats(kernel.registry())?;
    Ok(TransportRun {
        name: stats.name,
        attempted,
        delivered,
        rejected,
        outsider_accepted,
        stats,
    })
}

/// `(sum x)^2 / (n * sum x^2)`, 1.0 for an empty or all-zero sample.
fn jain_index(samples: impl Iterator<Item = u64>) -> f64 {
    let (mut n, mut sum, mut sum_sq) = (0f64, 0f64, 0f64);
    for x in samples {
        let x = x as f64;
        n += 1.0;
        sum += x;
        sum_sq += x * x;
    }
    if sum_sq == 0.0 {
        return 1.0;
    }
    sum * sum / (n * sum_sq)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_memory() -> KernelConfig {
        let mut config = KernelConfig::default();
        config.memory.start = 0x10_0000;
        config.memory.end = 0x20_0000;
        config
    }

    #[test]
    fn test_jain_index() {
        assert_eq!(jain_index([5, 5, 5, 5].into_iter()), 1.0);
        assert_eq!(jain_index([4, 0, 0, 0].into_iter()), 0.25);
        assert_eq!(jain_index(std::iter::empty()), 1.0);
    }

    #[test]
    fn test_allocator_comparison_covers_both() {
        let Comparison::PhysicalAllocator(runs) =
            compare(Category::PhysicalAllocator, &small_memory(), 0).unwrap()
        else {
            panic!("wrong category");
        };
        let names: Vec<_> = runs.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["bitmap", "buddy"]);
        for run in &runs {
            assert_eq!(run.total_pages, 256);
            assert_eq!(run.failed_requests, 0);
            assert_eq!(run.free_pages + run.used_pages, run.total_pages);
        }
        // Buddy rounds every request up to a power of two.
        assert_eq!(runs[0].used_pages, runs[0].requested_pages);
        assert!(runs[1].used_pages > runs[1].requested_pages);
    }

    #[test]
    fn test_round_robin_is_fair() {
        let Comparison::Scheduler(runs) =
            compare(Category::Scheduler, &KernelConfig::default(), 800).unwrap()
        else {
            panic!("wrong category");
        };
        let rr = runs.iter().find(|r| r.name == "round_robin").unwrap();
        assert!(rr.fairness_index > 0.99, "{}", rr.fairness_index);
        assert_eq!(rr.idle_ticks, 0);
        let prio = runs.iter().find(|r| r.name == "priority").unwrap();
        assert!(prio.fairness_index < rr.fairness_index);
    }

    #[test]
    fn test_transport_comparison() {
        let Comparison::IpcTransport(runs) =
            compare(Category::IpcTransport, &KernelConfig::default(), 0).unwrap()
        else {
            panic!("wrong category");
        };
        let mq = &runs[0];
        assert_eq!(mq.name, "message_queue");
        assert_eq!(mq.delivered, 16 * IPC_ROUNDS as u64);
        assert!(mq.outsider_accepted);

        let shm = &runs[1];
        assert_eq!(shm.name, "shared_memory");
        assert_eq!(shm.delivered, IPC_ROUNDS as u64);
        assert_eq!(shm.rejected, shm.attempted - shm.delivered);
        assert!(!shm.outsider_accepted);
    }

    #[test]
    fn test_comparison_serializes_with_category_tag() {
        let comparison = compare(Category::IpcTransport, &KernelConfig::default(), 0).unwrap();
        let json = serde_json::to_value(&comparison).unwrap();
        assert_eq!(json["category"], "ipc_transport");
        assert_eq!(json["results"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_declared_only_category_has_no_workload() {
        assert!(compare(Category::DeviceDriver, &KernelConfig::default(), 0).is_err());
    }
}
