//! # Host Runtime
//!
//! Boots the kernel from the resolved options and drives it.

use crate::options::{HostMode, HostOptions};
use crate::HostError;
use core_types::{EndpointId, PhysAddr};
use ipc::IpcMessage;
use serde::{Deserialize, Serialize};
use sim_kernel::{workload, KernelConfig, SimulatedKernel};

/// Priorities of the demo processes
const DEMO_PRIORITIES: [u32; 4] = [4, 10, 16, 24];
/// Page requests made up front by the demo
const DEMO_REQUESTS: [usize; 4] = [1, 4, 8, 2];
/// The demo exchanges one message every this many ticks.
const MESSAGE_INTERVAL: u64 = 10;

const PRODUCER: EndpointId = EndpointId::new(1);
const CONSUMER: EndpointId = EndpointId::new(2);

/// Heartbeat carried by demo messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Heartbeat {
    tick: u64,
}

/// What the demo workload did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemoReport {
    pub ticks: u64,
    pub processes: usize,
    pub pages_held: usize,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub context_switches: u64,
}

/// Output of one host run
#[derive(Debug, Clone, PartialEq)]
pub enum HostOutput {
    Demo(DemoReport),
    /// Pretty-printed comparison report
    Comparison(String),
    Help,
}

pub struct HostRuntime {
    options: HostOptions,
    config: KernelConfig,
}

impl HostRuntime {
    pub fn new(options: HostOptions) -> Result<Self, HostError> {
        let config = options.kernel_config()?;
        Ok(Self { options, config })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn run(&self) -> Result<HostOutput, HostError> {
        match self.options.mode {
            HostMode::Help => Ok(HostOutput::Help),
            HostMode::Compare(category) => {
                log::info!("Comparing {} implementations", category);
                let report = workload::compare(category, &self.config, self.options.ticks)?;
                Ok(HostOutput::Comparison(serde_json::to_string_pretty(&report)?))
            }
            HostMode::Demo => {
                let mut kernel = SimulatedKernel::boot(self.config.clone())?;
                let report = run_demo(&mut kernel, self.options.ticks)?;
                kernel.print_stats();
                kernel.shutdown();
                Ok(HostOutput::Demo(report))
            }
        }
    }
}

/// Spawns a handful of processes, holds some memory and has a producer and
/// a consumer exchange heartbeats while the clock runs.
pub fn run_demo(kernel: &mut SimulatedKernel, ticks: u64) -> Result<DemoReport, HostError> {
    for priority in DEMO_PRIORITIES {
        let pid = kernel.spawn(priority)?;
        log::debug!("demo: spawned {} at priority {}", pid, priority);
    }

    let mut held: Vec<(PhysAddr, usize)> = Vec::new();
    for count in DEMO_REQUESTS {
        match kernel.alloc_pages(count) {
            Ok(addr) => held.push((addr, count)),
            Err(e) => log::warn!("demo: {} page request failed: {}", count, e),
        }
    }

    let channel = kernel.create_channel(PRODUCER, CONSUMER)?;
    let (mut sent, mut received) = (0u64, 0u64);
    for _ in 0..ticks {
        kernel.timer_tick()?;
        let now = kernel.ticks();
        if now % MESSAGE_INTERVAL != 0 {
            continue;
        }
        let msg = IpcMessage::new(PRODUCER, CONSUMER)
            .with_id(now as u32)
            .with_json(&Heartbeat { tick: now })?;
        kernel.send(channel, &msg)?;
        sent += 1;

        let reply = kernel.receive(channel)?;
        let beat: Heartbeat = reply.payload_json()?;
        log::trace!("demo: heartbeat from tick {}", beat.tick);
        received += 1;
    }

    let pages_held = held.iter().map(|&(_, count)| count).sum();
    let context_switches = kernel.stats()?.scheduler.context_switches;
    for (addr, count) in held {
        kernel.free_pages(addr, count)?;
    }

    Ok(DemoReport {
        ticks: kernel.ticks(),
        processes: DEMO_PRIORITIES.len(),
        pages_held,
        messages_sent: sent,
        messages_received: received,
        context_switches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_on_default_kernel() {
        let mut kernel = SimulatedKernel::boot_default().unwrap();
        let report = run_demo(&mut kernel, 100).unwrap();
        assert_eq!(report.ticks, 100);
        assert_eq!(report.messages_sent, 10);
        assert_eq!(report.messages_received, 10);
        assert_eq!(report.pages_held, 15);
        assert!(report.context_switches > 0);

        let allocator = kernel.registry().allocator().unwrap();
        assert_eq!(allocator.free_page_count(), allocator.total_pages());
    }

    #[test]
    fn test_help_does_not_boot() {
        let options = HostOptions {
            mode: HostMode::Help,
            ..HostOptions::default()
        };
        let runtime = HostRuntime::new(options).unwrap();
        assert_eq!(runtime.run().unwrap(), HostOutput::Help);
    }
}
