//! Declared-only contracts
//!
//! These categories have a registry slot but no implementation in this
//! workspace. The signatures fix what a future implementation must provide.

use crate::component::KernelComponent;
use crate::error::FailureClass;
use core_types::{PhysAddr, Pid};
use thiserror::Error;

/// Failure reported by a declared-only contract
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("Out of resources: {0}")]
    Exhausted(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ServiceError {
    pub fn class(&self) -> FailureClass {
        match self {
            ServiceError::Exhausted(_) => FailureClass::OutOfResource,
            ServiceError::InvalidArgument(_) => FailureClass::InvalidReference,
            ServiceError::Unsupported(_) => FailureClass::Configuration,
        }
    }
}

/// Page-table management
pub trait VirtualMemory: KernelComponent + Send {
    fn init(&mut self) -> Result<(), ServiceError>;
    fn create_address_space(&mut self) -> Result<PhysAddr, ServiceError>;
    fn destroy_address_space(&mut self, root: PhysAddr);
    fn switch_address_space(&mut self, root: PhysAddr);
    fn map_page(&mut self, vaddr: u64, paddr: PhysAddr, flags: u32) -> Result<(), ServiceError>;
    fn unmap_page(&mut self, vaddr: u64) -> Result<(), ServiceError>;
    fn translate(&self, vaddr: u64) -> Option<PhysAddr>;
    fn handle_page_fault(&mut self, fault_addr: u64, error_code: u32) -> Result<(), ServiceError>;
}

/// Kernel heap
pub trait HeapAllocator: KernelComponent + Send {
    fn init(&mut self, start: PhysAddr, size: usize) -> Result<(), ServiceError>;
    fn alloc(&mut self, size: usize, align: usize) -> Result<PhysAddr, ServiceError>;
    fn free(&mut self, addr: PhysAddr);
    fn free_size(&self) -> usize;
    fn used_size(&self) -> usize;
    fn validate(&self) -> bool;
}

/// Executable image loader
pub trait ProcessLoader: KernelComponent + Send {
    fn can_load(&self, image: &[u8]) -> bool;
    fn load(&mut self, image: &[u8], pid: Pid) -> Result<PhysAddr, ServiceError>;
    fn unload(&mut self, pid: Pid);
    fn entry_point(&self, image: &[u8]) -> Option<u64>;
}

/// Block or character device
pub trait DeviceDriver: KernelComponent + Send {
    fn probe(&mut self, device: u32) -> Result<(), ServiceError>;
    fn init(&mut self, device: u32) -> Result<(), ServiceError>;
    fn shutdown(&mut self, device: u32);
    fn read(&mut self, device: u32, buf: &mut [u8], offset: u64) -> Result<usize, ServiceError>;
    fn write(&mut self, device: u32, buf: &[u8], offset: u64) -> Result<usize, ServiceError>;
    fn status(&self, device: u32) -> u32;
}
