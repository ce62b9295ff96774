//! # Simulated Kernel
//!
//! The kernel context: one [`Registry`] holding the active allocator,
//! scheduler and transport, plus the simulated clock that drives them.
//!
//! ## Purpose
//!
//! The simulated kernel lets the component algorithms run without hardware:
//! - Runs under `cargo test`
//! - Deterministic (time only advances through [`SimulatedKernel::timer_tick`])
//! - Inspectable (every component reports its statistics)
//!
//! ## Lifecycle
//!
//! [`SimulatedKernel::boot`] validates a [`KernelConfig`], installs the
//! selected implementations and initialises them. Components can be
//! substituted at any point between calls with
//! [`SimulatedKernel::switch_component`]; the displaced instance is dropped
//! along with every process, page and channel it tracked.
//! [`SimulatedKernel::shutdown`] tears everything down again.

pub mod config;
pub mod workload;

pub use config::{ComponentSelection, ConfigError, KernelConfig, MemoryRange};

use core_types::{ChannelId, EndpointId, Pid, PhysAddr};
use ipc::{IpcMessage, Rights};
use kernel_api::{AllocError, Category, FailureClass, RegistryError, SchedError};
use kernel_api::{AllocatorStats, SchedulerStats, TransportStats};
use scheduler::RoundRobinScheduler;
use serde::Serialize;
use services_registry::{catalog, dispatch, DispatchError, Registration, Registry};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A component failed to initialise over the configured memory range
    #[error(transparent)]
    Alloc(#[from] AllocError),

    /// The configured scheduler tuning was refused
    #[error(transparent)]
    Sched(#[from] SchedError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl KernelError {
    pub fn class(&self) -> FailureClass {
        match self {
            KernelError::Config(e) => e.class(),
            KernelError::Registry(e) => e.class(),
            KernelError::Alloc(e) => e.class(),
            KernelError::Sched(e) => e.class(),
            KernelError::Dispatch(e) => e.class(),
        }
    }
}

/// Statistics of every active component at one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KernelStats {
    pub ticks: u64,
    pub allocator: AllocatorStats,
    pub scheduler: SchedulerStats,
    pub transport: TransportStats,
}

/// Simulated kernel state
///
/// Component operations go through [`dispatch`]; the kernel only touches
/// the registry slots directly to initialise and shut components down.
pub struct SimulatedKernel {
    registry: Registry,
    config: KernelConfig,
    /// Timer ticks since boot
    ticks: u64,
    next_pid: u32,
}

impl SimulatedKernel {
    /// Validates `config`, registers the selected components and
    /// initialises them.
    pub fn boot(config: KernelConfig) -> Result<Self, KernelError> {
        config.validate()?;
        let mut kernel = Self {
            registry: Registry::new(),
            config,
            ticks: 0,
            next_pid: 1,
        };
        let selection = kernel.config.components.clone();
        for (category, name) in selection.entries() {
            kernel.install(category, name)?;
        }
        log::info!(
            "Booted with {} + {} + {}",
            kernel.registry.active_name(Category::PhysicalAllocator).unwrap_or("-"),
            kernel.registry.active_name(Category::Scheduler).unwrap_or("-"),
            kernel.registry.active_name(Category::IpcTransport).unwrap_or("-"),
        );
        Ok(kernel)
    }

    /// Boots with [`KernelConfig::default`].
    pub fn boot_default() -> Result<Self, KernelError> {
        Self::boot(KernelConfig::default())
    }

    /// Builds `name` for `category` with the configured tuning, registers
    /// it and initialises it.
    fn install(&mut self, category: Category, name: &str) -> Result<&'static str, KernelError> {
        let entry = catalog::resolve(category, name)?;
        let registration = match (category, entry.name) {
            (Category::Scheduler, "round_robin") => Registration::Scheduler(Box::new(
                RoundRobinScheduler::with_quantum(self.config.round_robin_quantum)?,
            )),
            _ => entry.build(),
        };
        let resolved = self.registry.replace(category, registration)?;
        match category {
            Category::PhysicalAllocator => {
                let memory = self.config.memory;
                self.registry
                    .allocator_mut()?
                    .init(memory.start_addr(), memory.end_addr())?;
            }
            Category::Scheduler => self.registry.scheduler_mut()?.init(),
            Category::IpcTransport => self.registry.transport_mut()?.init(),
            other => return Err(RegistryError::Unsupported(other).into()),
        }
        Ok(resolved)
    }

    /// Replaces the active implementation of `category` with a fresh,
    /// initialised instance of `name`.
    ///
    /// State held by the displaced implementation is not carried over.
    pub fn switch_component(
        &mut self,
        category: Category,
        name: &str,
    ) -> Result<&'static str, KernelError> {
        let resolved = self.install(category, name)?;
        match category {
            Category::PhysicalAllocator => self.config.components.allocator = resolved.to_string(),
            Category::Scheduler => self.config.components.scheduler = resolved.to_string(),
            Category::IpcTransport => self.config.components.transport = resolved.to_string(),
            _ => {}
        }
        Ok(resolved)
    }

    /// Advances simulated time by one tick.
    pub fn timer_tick(&mut self) -> Result<(), KernelError> {
        dispatch::timer_tick(&mut self.registry)?;
        dispatch::transport_tick(&mut self.registry)?;
        self.ticks += 1;
        Ok(())
    }

    pub fn run_ticks(&mut self, ticks: u64) -> Result<(), KernelError> {
        for _ in 0..ticks {
            self.timer_tick()?;
        }
        Ok(())
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Creates a process with a fresh pid and hands it to the scheduler.
    pub fn spawn(&mut self, priority: u32) -> Result<Pid, KernelError> {
        let pid = Pid::new(self.next_pid);
        dispatch::add_process(&mut self.registry, pid, priority)?;
        self.next_pid += 1;
        log::debug!("Spawned {} at priority {}", pid, priority);
        Ok(pid)
    }

    pub fn exit(&mut self, pid: Pid) -> Result<(), KernelError> {
        Ok(dispatch::remove_process(&mut self.registry, pid)?)
    }

    pub fn block(&mut self, pid: Pid) -> Result<(), KernelError> {
        Ok(dispatch::block(&mut self.registry, pid)?)
    }

    pub fn unblock(&mut self, pid: Pid) -> Result<(), KernelError> {
        Ok(dispatch::unblock(&mut self.registry, pid)?)
    }

    pub fn priority(&self, pid: Pid) -> Result<u32, KernelError> {
        Ok(dispatch::priority(&self.registry, pid)?)
    }

    pub fn set_priority(&mut self, pid: Pid, priority: u32) -> Result<(), KernelError> {
        Ok(dispatch::set_priority(&mut self.registry, pid, priority)?)
    }

    /// Retunes the active scheduler and remembers the quantum for later
    /// round-robin installs.
    pub fn set_time_quantum(&mut self, quantum: u32) -> Result<(), KernelError> {
        dispatch::set_time_quantum(&mut self.registry, quantum)?;
        self.config.round_robin_quantum = quantum;
        Ok(())
    }

    pub fn current_process(&self) -> Option<Pid> {
        dispatch::current_process(&self.registry).ok().flatten()
    }

    pub fn alloc_pages(&mut self, count: usize) -> Result<PhysAddr, KernelError> {
        Ok(dispatch::alloc_pages(&mut self.registry, count)?)
    }

    pub fn alloc_aligned(&mut self, size: usize, align: usize) -> Result<PhysAddr, KernelError> {
        Ok(dispatch::alloc_aligned(&mut self.registry, size, align)?)
    }

    pub fn free_pages(&mut self, addr: PhysAddr, count: usize) -> Result<(), KernelError> {
        Ok(dispatch::free_pages(&mut self.registry, addr, count)?)
    }

    pub fn create_channel(
        &mut self,
        sender: EndpointId,
        receiver: EndpointId,
    ) -> Result<ChannelId, KernelError> {
        Ok(dispatch::create_channel(&mut self.registry, sender, receiver)?)
    }

    pub fn send(&mut self, id: ChannelId, msg: &IpcMessage) -> Result<(), KernelError> {
        Ok(dispatch::send_message(&mut self.registry, id, msg)?)
    }

    pub fn receive(&mut self, id: ChannelId) -> Result<IpcMessage, KernelError> {
        Ok(dispatch::receive_message(&mut self.registry, id)?)
    }

    pub fn try_receive(&mut self, id: ChannelId) -> Result<IpcMessage, KernelError> {
        Ok(dispatch::try_receive(&mut self.registry, id)?)
    }

    pub fn grant_capability(
        &mut self,
        grantor: EndpointId,
        grantee: EndpointId,
        rights: Rights,
    ) -> Result<(), KernelError> {
        Ok(dispatch::grant_capability(&mut self.registry, grantor, grantee, rights)?)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The configuration in effect, including any substitutions since boot.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn stats(&self) -> Result<KernelStats, KernelError> {
        Ok(KernelStats {
            ticks: self.ticks,
            allocator: dispatch::allocator_stats(&self.registry)?,
            scheduler: dispatch::scheduler_stats(&self.registry)?,
            transport: dispatch::transport_stats(&self.registry)?,
        })
    }

    /// Logs the component listing and every component's statistics.
    pub fn print_stats(&self) {
        self.registry.print_registered_components();
        dispatch::print_stats(&self.registry);
    }

    /// Shuts every component down and empties the registry.
    pub fn shutdown(&mut self) {
        if let Ok(scheduler) = self.registry.scheduler_mut() {
            scheduler.shutdown();
        }
        if let Ok(transport) = self.registry.transport_mut() {
            transport.shutdown();
        }
        for category in Category::ALL {
            self.registry.unregister(category);
        }
        log::info!("Shut down after {} ticks", self.ticks);
    }
}
