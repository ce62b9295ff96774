//! End-to-end scenarios through the kernel context.

use core_types::{EndpointId, PhysAddr};
use ipc::{IpcMessage, Rights};
use kernel_api::{Category, FailureClass, IpcError, ProcessState};
use services_registry::DispatchError;
use sim_kernel::{ComponentSelection, KernelConfig, KernelError, MemoryRange, SimulatedKernel};

fn boot(allocator: &str, scheduler: &str, transport: &str) -> SimulatedKernel {
    let config = KernelConfig {
        components: ComponentSelection {
            allocator: allocator.to_string(),
            scheduler: scheduler.to_string(),
            transport: transport.to_string(),
        },
        memory: MemoryRange {
            start: 0x10_0000,
            end: 0x20_0000,
        },
        ..KernelConfig::default()
    };
    SimulatedKernel::boot(config).unwrap()
}

#[test]
fn test_buddy_boot_over_one_mebibyte() {
    let mut kernel = boot("buddy", "round_robin", "message_queue");
    assert_eq!(kernel.registry().allocator().unwrap().total_pages(), 256);

    let addr = kernel.alloc_pages(3).unwrap();
    assert!(addr.is_aligned((4 * core_types::PAGE_SIZE) as u64));
    assert!(!kernel.registry().allocator().unwrap().is_available(addr));
}

#[test]
fn test_same_call_sites_work_with_either_allocator() {
    for name in ["bitmap", "buddy"] {
        let mut kernel = boot(name, "round_robin", "message_queue");
        let total = kernel.registry().allocator().unwrap().total_pages();
        let a = kernel.alloc_pages(1).unwrap();
        let b = kernel.alloc_pages(4).unwrap();
        assert_ne!(a, b);
        kernel.free_pages(a, 1).unwrap();
        kernel.free_pages(b, 4).unwrap();
        assert_eq!(kernel.registry().allocator().unwrap().free_page_count(), total, "{name}");
    }
}

#[test]
fn test_exhaustion_is_out_of_resource() {
    let mut kernel = boot("bitmap", "round_robin", "message_queue");
    let err = kernel.alloc_pages(257).unwrap_err();
    assert_eq!(err.class(), FailureClass::OutOfResource);
}

#[test]
fn test_channel_for_same_pair_is_reused() {
    for transport in ["message_queue", "shared_memory"] {
        let mut kernel = boot("bitmap", "round_robin", transport);
        let (a, b) = (EndpointId::new(5), EndpointId::new(9));
        let first = kernel.create_channel(a, b).unwrap();
        let second = kernel.create_channel(a, b).unwrap();
        assert_eq!(first, second);
        assert_eq!(kernel.registry().transport().unwrap().channel_count(), 1);
    }
}

#[test]
fn test_outsider_send_is_policy_denied() {
    let mut kernel = boot("bitmap", "round_robin", "shared_memory");
    let ch = kernel
        .create_channel(EndpointId::new(5), EndpointId::new(9))
        .unwrap();
    let err = kernel
        .send(ch, &IpcMessage::new(EndpointId::new(42), EndpointId::new(9)))
        .unwrap_err();
    assert!(matches!(
        err,
        KernelError::Dispatch(DispatchError::Ipc(IpcError::PermissionDenied { .. }))
    ));
    assert_eq!(err.class(), FailureClass::PolicyDenied);
    assert_eq!(kernel.stats().unwrap().transport.messages_sent, 0);

    kernel
        .grant_capability(EndpointId::new(5), EndpointId::new(42), Rights::WRITE)
        .unwrap();
    kernel
        .send(ch, &IpcMessage::new(EndpointId::new(42), EndpointId::new(9)))
        .unwrap();
}

#[test]
fn test_blocked_process_leaves_cpu_until_unblocked() {
    for scheduler in ["round_robin", "priority"] {
        let mut kernel = boot("bitmap", scheduler, "message_queue");
        let a = kernel.spawn(10).unwrap();
        let b = kernel.spawn(10).unwrap();
        kernel.timer_tick().unwrap();
        assert_eq!(kernel.current_process(), Some(a), "{scheduler}");

        kernel.block(a).unwrap();
        assert_eq!(kernel.current_process(), Some(b), "{scheduler}");
        kernel.run_ticks(200).unwrap();
        let info = kernel.registry().scheduler().unwrap().process(a).unwrap();
        assert_eq!(info.state, ProcessState::Blocked);

        kernel.unblock(a).unwrap();
        kernel.run_ticks(200).unwrap();
        let ran = kernel.registry().scheduler().unwrap().process(a).unwrap();
        assert_ne!(ran.state, ProcessState::Blocked);
    }
}

#[test]
fn test_substitution_mid_run_keeps_kernel_usable() {
    let mut kernel = boot("bitmap", "round_robin", "message_queue");
    kernel.spawn(4).unwrap();
    kernel.run_ticks(10).unwrap();

    kernel.switch_component(Category::PhysicalAllocator, "bu").unwrap();
    kernel.switch_component(Category::Scheduler, "pr").unwrap();
    kernel.switch_component(Category::IpcTransport, "sh").unwrap();

    let names: Vec<_> = kernel
        .registry()
        .list()
        .components
        .iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["buddy", "priority", "shared_memory"]);

    let pid = kernel.spawn(31).unwrap();
    kernel.timer_tick().unwrap();
    assert_eq!(kernel.current_process(), Some(pid));
    assert_eq!(
        kernel.alloc_pages(1).unwrap(),
        PhysAddr::new(0x10_0000)
    );
}

#[test]
fn test_ambiguous_switch_reports_candidates() {
    let mut kernel = boot("bitmap", "round_robin", "message_queue");
    let err = kernel
        .switch_component(Category::PhysicalAllocator, "b")
        .unwrap_err();
    assert!(err.to_string().contains("bitmap, buddy"), "{err}");
    assert_eq!(kernel.config().components.allocator, "bitmap");
}
