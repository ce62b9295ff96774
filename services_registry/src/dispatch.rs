//! Convenience dispatch
//!
//! Shorthands that resolve the active implementation and forward one call
//! to it. A missing implementation surfaces as
//! [`DispatchError::Registry`] instead of a null dereference.

use crate::registry::Registry;
use core_types::{ChannelId, EndpointId, Pid, PhysAddr};
use ipc::{IpcMessage, Rights};
use kernel_api::{
    AllocError, AllocatorStats, FailureClass, IpcError, RegistryError, SchedError,
    SchedulerStats, TransportStats,
};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Alloc(#[from] AllocError),

    #[error(transparent)]
    Sched(#[from] SchedError),

    #[error(transparent)]
    Ipc(#[from] IpcError),
}

impl DispatchError {
    pub fn class(&self) -> FailureClass {
        match self {
            DispatchError::Registry(e) => e.class(),
            DispatchError::Alloc(e) => e.class(),
            DispatchError::Sched(e) => e.class(),
            DispatchError::Ipc(e) => e.class(),
        }
    }
}

pub fn alloc_page(registry: &mut Registry) -> Result<PhysAddr, DispatchError> {
    Ok(registry.allocator_mut()?.alloc_page()?)
}

pub fn alloc_pages(registry: &mut Registry, count: usize) -> Result<PhysAddr, DispatchError> {
    Ok(registry.allocator_mut()?.alloc_pages(count)?)
}

pub fn free_page(registry: &mut Registry, addr: PhysAddr) -> Result<(), DispatchError> {
    registry.allocator_mut()?.free_page(addr);
    Ok(())
}

pub fn free_pages(registry: &mut Registry, addr: PhysAddr, count: usize) -> Result<(), DispatchError> {
    registry.allocator_mut()?.free_pages(addr, count);
    Ok(())
}

pub fn alloc_aligned(
    registry: &mut Registry,
    size: usize,
    align: usize,
) -> Result<PhysAddr, DispatchError> {
    Ok(registry.allocator_mut()?.alloc_aligned(size, align)?)
}

pub fn is_available(registry: &Registry, addr: PhysAddr) -> Result<bool, DispatchError> {
    Ok(registry.allocator()?.is_available(addr))
}

pub fn allocator_stats(registry: &Registry) -> Result<AllocatorStats, DispatchError> {
    Ok(registry.allocator()?.stats())
}

pub fn add_process(registry: &mut Registry, pid: Pid, priority: u32) -> Result<(), DispatchError> {
    Ok(registry.scheduler_mut()?.add_process(pid, priority)?)
}

pub fn remove_process(registry: &mut Registry, pid: Pid) -> Result<(), DispatchError> {
    Ok(registry.scheduler_mut()?.remove_process(pid)?)
}

pub fn schedule(registry: &mut Registry) -> Result<Option<Pid>, DispatchError> {
    Ok(registry.scheduler_mut()?.schedule())
}

pub fn yield_now(registry: &mut Registry) -> Result<Option<Pid>, DispatchError> {
    Ok(registry.scheduler_mut()?.yield_now())
}

pub fn block(registry: &mut Registry, pid: Pid) -> Result<(), DispatchError> {
    Ok(registry.scheduler_mut()?.block(pid)?)
}

pub fn unblock(registry: &mut Registry, pid: Pid) -> Result<(), DispatchError> {
    Ok(registry.scheduler_mut()?.unblock(pid)?)
}

pub fn current_process(registry: &Registry) -> Result<Option<Pid>, DispatchError> {
    Ok(registry.scheduler()?.current())
}

pub fn peek_next(registry: &Registry) -> Result<Option<Pid>, DispatchError> {
    Ok(registry.scheduler()?.peek_next())
}

pub fn timer_tick(registry: &mut Registry) -> Result<(), DispatchError> {
    registry.scheduler_mut()?.timer_tick();
    Ok(())
}

pub fn priority(registry: &Registry, pid: Pid) -> Result<u32, DispatchError> {
    Ok(registry.scheduler()?.priority(pid)?)
}

pub fn set_priority(registry: &mut Registry, pid: Pid, priority: u32) -> Result<(), DispatchError> {
    Ok(registry.scheduler_mut()?.set_priority(pid, priority)?)
}

pub fn set_time_quantum(registry: &mut Registry, quantum: u32) -> Result<(), DispatchError> {
    Ok(registry.scheduler_mut()?.set_time_quantum(quantum)?)
}

pub fn scheduler_stats(registry: &Registry) -> Result<SchedulerStats, DispatchError> {
    Ok(registry.scheduler()?.stats())
}

pub fn create_channel(
    registry: &mut Registry,
    sender: EndpointId,
    receiver: EndpointId,
) -> Result<ChannelId, DispatchError> {
    Ok(registry.transport_mut()?.create_channel(sender, receiver)?)
}

pub fn destroy_channel(registry: &mut Registry, id: ChannelId) -> Result<(), DispatchError> {
    registry.transport_mut()?.destroy_channel(id);
    Ok(())
}

pub fn send_message(
    registry: &mut Registry,
    id: ChannelId,
    msg: &IpcMessage,
) -> Result<(), DispatchError> {
    Ok(registry.transport_mut()?.send_message(id, msg)?)
}

pub fn receive_message(registry: &mut Registry, id: ChannelId) -> Result<IpcMessage, DispatchError> {
    Ok(registry.transport_mut()?.receive_message(id)?)
}

pub fn try_receive(registry: &mut Registry, id: ChannelId) -> Result<IpcMessage, DispatchError> {
    Ok(registry.transport_mut()?.try_receive(id)?)
}

pub fn can_send(registry: &Registry, id: ChannelId) -> Result<bool, DispatchError> {
    Ok(registry.transport()?.can_send(id))
}

pub fn has_messages(registry: &Registry, id: ChannelId) -> Result<bool, DispatchError> {
    Ok(registry.transport()?.has_messages(id))
}

pub fn check_permission(
    registry: &Registry,
    sender: EndpointId,
    receiver: EndpointId,
) -> Result<bool, DispatchError> {
    Ok(registry.transport()?.check_permission(sender, receiver))
}

pub fn grant_capability(
    registry: &mut Registry,
    grantor: EndpointId,
    grantee: EndpointId,
    rights: Rights,
) -> Result<(), DispatchError> {
    registry.transport_mut()?.grant_capability(grantor, grantee, rights);
    Ok(())
}

/// Advances the transport clock used to stamp messages.
pub fn transport_tick(registry: &mut Registry) -> Result<(), DispatchError> {
    registry.transport_mut()?.tick();
    Ok(())
}

pub fn transport_stats(registry: &Registry) -> Result<TransportStats, DispatchError> {
    Ok(registry.transport()?.stats())
}

/// Logs the statistics of every filled allocator, scheduler and transport
/// slot. Empty slots are skipped.
pub fn print_stats(registry: &Registry) {
    if let Ok(allocator) = registry.allocator() {
        allocator.print_stats();
    }
    if let Ok(scheduler) = registry.scheduler() {
        scheduler.print_stats();
    }
    if let Ok(transport) = registry.transport() {
        transport.print_stats();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::PAGE_SIZE;
    use kernel_api::Category;

    fn booted() -> Registry {
        let mut registry = Registry::new();
        registry.switch(Category::PhysicalAllocator, "buddy").unwrap();
        registry.switch(Category::Scheduler, "round_robin").unwrap();
        registry.switch(Category::IpcTransport, "message_queue").unwrap();
        registry
            .allocator_mut()
            .unwrap()
            .init(PhysAddr::new(0x10_0000), PhysAddr::new(0x20_0000))
            .unwrap();
        registry.scheduler_mut().unwrap().init();
        registry.transport_mut().unwrap().init();
        registry
    }

    #[test]
    fn test_missing_slot_is_reported() {
        let mut registry = Registry::new();
        let err = alloc_page(&mut registry).unwrap_err();
        assert_eq!(
            err,
            DispatchError::Registry(RegistryError::NotRegistered(Category::PhysicalAllocator))
        );
        assert_eq!(err.class(), FailureClass::InvalidReference);
    }

    #[test]
    fn test_uninitialised_component_is_reported() {
        let mut registry = Registry::new();
        registry.switch(Category::Scheduler, "priority").unwrap();
        assert_eq!(
            add_process(&mut registry, Pid::new(1), 3),
            Err(DispatchError::Sched(SchedError::NotInitialized))
        );
    }

    #[test]
    fn test_page_round_trip() {
        let mut registry = booted();
        let before = registry.allocator().unwrap().free_page_count();
        let addr = alloc_pages(&mut registry, 4).unwrap();
        free_pages(&mut registry, addr, 4).unwrap();
        assert_eq!(registry.allocator().unwrap().free_page_count(), before);
    }

    #[test]
    fn test_schedule_through_registry() {
        let mut registry = booted();
        add_process(&mut registry, Pid::new(7), 0).unwrap();
        assert_eq!(schedule(&mut registry).unwrap(), Some(Pid::new(7)));
        assert_eq!(current_process(&registry).unwrap(), Some(Pid::new(7)));
    }

    #[test]
    fn test_message_through_registry() {
        let mut registry = booted();
        let (a, b) = (EndpointId::new(1), EndpointId::new(2));
        let ch = create_channel(&mut registry, a, b).unwrap();
        send_message(&mut registry, ch, &IpcMessage::new(a, b).with_id(5)).unwrap();
        assert_eq!(receive_message(&mut registry, ch).unwrap().message_id, 5);
        destroy_channel(&mut registry, ch).unwrap();
        assert!(matches!(
            receive_message(&mut registry, ch),
            Err(DispatchError::Ipc(IpcError::UnknownChannel(_)))
        ));
    }

    #[test]
    fn test_error_class_passes_through() {
        let mut registry = booted();
        let err = alloc_pages(&mut registry, 1 << 20).unwrap_err();
        assert_eq!(err.class(), FailureClass::OutOfResource);
    }

    #[test]
    fn test_aligned_allocation_through_registry() {
        let mut registry = booted();
        let addr = alloc_aligned(&mut registry, PAGE_SIZE, 8 * PAGE_SIZE).unwrap();
        assert!(addr.is_aligned(8 * PAGE_SIZE as u64));
        assert!(!is_available(&registry, addr).unwrap());
        assert_eq!(allocator_stats(&registry).unwrap().used_pages, 8);
    }

    #[test]
    fn test_scheduler_tuning_through_registry() {
        let mut registry = booted();
        add_process(&mut registry, Pid::new(1), 0).unwrap();
        add_process(&mut registry, Pid::new(2), 0).unwrap();
        assert_eq!(peek_next(&registry).unwrap(), Some(Pid::new(1)));
        assert_eq!(priority(&registry, Pid::new(1)).unwrap(), 0);
        assert_eq!(
            set_priority(&mut registry, Pid::new(1), 99),
            Err(DispatchError::Sched(SchedError::InvalidPriority(99)))
        );

        set_time_quantum(&mut registry, 2).unwrap();
        timer_tick(&mut registry).unwrap();
        assert_eq!(current_process(&registry).unwrap(), Some(Pid::new(1)));
        timer_tick(&mut registry).unwrap();
        timer_tick(&mut registry).unwrap();
        assert_eq!(current_process(&registry).unwrap(), Some(Pid::new(2)));
        assert_eq!(scheduler_stats(&registry).unwrap().ticks, 3);
    }

    #[test]
    fn test_fixed_quantum_scheduler_refuses_tuning() {
        let mut registry = booted();
        registry.switch(Category::Scheduler, "priority").unwrap();
        registry.scheduler_mut().unwrap().init();
        let err = set_time_quantum(&mut registry, 5).unwrap_err();
        assert_eq!(err.class(), FailureClass::Configuration);
    }

    #[test]
    fn test_channel_queries_through_registry() {
        let mut registry = booted();
        let (a, b) = (EndpointId::new(1), EndpointId::new(2));
        let ch = create_channel(&mut registry, a, b).unwrap();
        assert!(can_send(&registry, ch).unwrap());
        assert!(!has_messages(&registry, ch).unwrap());
        assert_eq!(
            try_receive(&mut registry, ch),
            Err(DispatchError::Ipc(IpcError::Empty(ch)))
        );

        transport_tick(&mut registry).unwrap();
        send_message(&mut registry, ch, &IpcMessage::new(a, b)).unwrap();
        assert!(has_messages(&registry, ch).unwrap());
        assert_eq!(try_receive(&mut registry, ch).unwrap().timestamp, 1);
        assert_eq!(transport_stats(&registry).unwrap().messages_received, 1);
    }

    #[test]
    fn test_capabilities_through_registry() {
        let mut registry = booted();
        registry.switch(Category::IpcTransport, "shared_memory").unwrap();
        registry.transport_mut().unwrap().init();
        let (a, b, c) = (EndpointId::new(1), EndpointId::new(2), EndpointId::new(3));
        create_channel(&mut registry, a, b).unwrap();

        assert!(check_permission(&registry, a, b).unwrap());
        assert!(!check_permission(&registry, c, b).unwrap());
        grant_capability(&mut registry, a, c, Rights::WRITE).unwrap();
        assert!(check_permission(&registry, c, b).unwrap());
    }

    #[test]
    fn test_print_stats_tolerates_empty_slots() {
        print_stats(&Registry::new());
        print_stats(&booted());
    }
}
