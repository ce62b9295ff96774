//! Category slots and substitution

use crate::catalog;
use kernel_api::{
    Category, DeviceDriver, HeapAllocator, IpcTransport, PhysicalAllocator, ProcessLoader,
    RegistryError, Scheduler, VirtualMemory,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// An implementation offered for one category slot
pub enum Registration {
    PhysicalAllocator(Box<dyn PhysicalAllocator>),
    VirtualMemory(Box<dyn VirtualMemory>),
    HeapAllocator(Box<dyn HeapAllocator>),
    Scheduler(Box<dyn Scheduler>),
    ProcessLoader(Box<dyn ProcessLoader>),
    IpcTransport(Box<dyn IpcTransport>),
    DeviceDriver(Box<dyn DeviceDriver>),
}

macro_rules! each_component {
    ($reg:expr, $c:ident => $body:expr) => {
        match $reg {
            Registration::PhysicalAllocator($c) => $body,
            Registration::VirtualMemory($c) => $body,
            Registration::HeapAllocator($c) => $body,
            Registration::Scheduler($c) => $body,
            Registration::ProcessLoader($c) => $body,
            Registration::IpcTransport($c) => $body,
            Registration::DeviceDriver($c) => $body,
        }
    };
}

impl Registration {
    /// The slot this implementation belongs in.
    pub fn category(&self) -> Category {
        match self {
            Registration::PhysicalAllocator(_) => Category::PhysicalAllocator,
            Registration::VirtualMemory(_) => Category::VirtualMemory,
            Registration::HeapAllocator(_) => Category::HeapAllocator,
            Registration::Scheduler(_) => Category::Scheduler,
            Registration::ProcessLoader(_) => Category::ProcessLoader,
            Registration::IpcTransport(_) => Category::IpcTransport,
            Registration::DeviceDriver(_) => Category::DeviceDriver,
        }
    }

    pub fn name(&self) -> &'static str {
        each_component!(self, c => c.name())
    }

    pub fn description(&self) -> &'static str {
        each_component!(self, c => c.description())
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("category", &self.category())
            .field("name", &self.name())
            .finish()
    }
}

/// One active implementation in a [`ComponentListing`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedComponent {
    pub category: Category,
    pub name: &'static str,
    pub description: &'static str,
}

/// Snapshot of every filled slot, in [`Category::ALL`] order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComponentListing {
    pub components: Vec<ListedComponent>,
}

impl ComponentListing {
    pub fn get(&self, category: Category) -> Option<&ListedComponent> {
        self.components.iter().find(|c| c.category == category)
    }
}

impl fmt::Display for ComponentListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Registered components:")?;
        if self.components.is_empty() {
            write!(f, "\n  (none)")?;
        }
        for c in &self.components {
            write!(f, "\n  {}: {} - {}", c.category.label(), c.name, c.description)?;
        }
        Ok(())
    }
}

/// Active implementation per category
///
/// Holds at most one implementation per [`Category`]. Registering into a
/// filled slot drops the previous implementation.
#[derive(Debug, Default)]
pub struct Registry {
    slots: HashMap<Category, Registration>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    /// Makes `registration` the active implementation for `category`.
    ///
    /// Returns the displaced implementation, if any.
    pub fn register(
        &mut self,
        category: Category,
        registration: Registration,
    ) -> Result<Option<Registration>, RegistryError> {
        if registration.category() != category {
            return Err(RegistryError::CategoryMismatch {
                category,
                component: registration.name(),
            });
        }
        log::info!("Registered {} as {}", registration.name(), category);
        Ok(self.slots.insert(category, registration))
    }

    /// Empties the slot for `category`.
    pub fn unregister(&mut self, category: Category) -> Option<Registration> {
        self.slots.remove(&category)
    }

    /// Replaces the implementation for `category` with a fresh instance of
    /// the catalog entry matching `name`.
    ///
    /// `name` may be any unambiguous prefix of a catalog name. An exact name
    /// always wins over prefix matches. The new instance is installed
    /// uninitialised; the owner calls its `init` before the next operation.
    pub fn switch(&mut self, category: Category, name: &str) -> Result<&'static str, RegistryError> {
        let entry = catalog::resolve(category, name)?;
        self.replace(category, entry.build())
    }

    /// Registers an already built instance, such as a catalog entry
    /// constructed with non-default tuning, in place of the active one.
    pub fn replace(
        &mut self,
        category: Category,
        registration: Registration,
    ) -> Result<&'static str, RegistryError> {
        let name = registration.name();
        if let Some(old) = self.register(category, registration)? {
            log::info!("Switched {} from {} to {}", category, old.name(), name);
        }
        Ok(name)
    }

    pub fn is_registered(&self, category: Category) -> bool {
        self.slots.contains_key(&category)
    }

    /// Name of the active implementation for `category`.
    pub fn active_name(&self, category: Category) -> Option<&'static str> {
        self.slots.get(&category).map(Registration::name)
    }

    pub fn list(&self) -> ComponentListing {
        let components = Category::ALL
            .iter()
            .filter_map(|category| self.slots.get(category))
            .map(|reg| ListedComponent {
                category: reg.category(),
                name: reg.name(),
                description: reg.description(),
            })
            .collect();
        ComponentListing { components }
    }

    pub fn print_registered_components(&self) {
        log::info!("{}", self.list());
    }

    pub fn allocator(&self) -> Result<&dyn PhysicalAllocator, RegistryError> {
        match self.slots.get(&Category::PhysicalAllocator) {
            Some(Registration::PhysicalAllocator(a)) => Ok(&**a),
            _ => Err(RegistryError::NotRegistered(Category::PhysicalAllocator)),
        }
    }

    pub fn allocator_mut(&mut self) -> Result<&mut dyn PhysicalAllocator, RegistryError> {
        match self.slots.get_mut(&Category::PhysicalAllocator) {
            Some(Registration::PhysicalAllocator(a)) => Ok(&mut **a),
            _ => Err(RegistryError::NotRegistered(Category::PhysicalAllocator)),
        }
    }

    pub fn scheduler(&self) -> Result<&dyn Scheduler, RegistryError> {
        match self.slots.get(&Category::Scheduler) {
            Some(Registration::Scheduler(s)) => Ok(&**s),
            _ => Err(RegistryError::NotRegistered(Category::Scheduler)),
        }
    }

    pub fn scheduler_mut(&mut self) -> Result<&mut dyn Scheduler, RegistryError> {
        match self.slots.get_mut(&Category::Scheduler) {
            Some(Registration::Scheduler(s)) => Ok(&mut **s),
            _ => Err(RegistryError::NotRegistered(Category::Scheduler)),
        }
    }

    pub fn transport(&self) -> Result<&dyn IpcTransport, RegistryError> {
        match self.slots.get(&Category::IpcTransport) {
            Some(Registration::IpcTransport(t)) => Ok(&**t),
            _ => Err(RegistryError::NotRegistered(Category::IpcTransport)),
        }
    }

    pub fn transport_mut(&mut self) -> Result<&mut dyn IpcTransport, RegistryError> {
        match self.slots.get_mut(&Category::IpcTransport) {
            Some(Registration::IpcTransport(t)) => Ok(&mut **t),
            _ => Err(RegistryError::NotRegistered(Category::IpcTransport)),
        }
    }

    pub fn virtual_memory_mut(&mut self) -> Result<&mut dyn VirtualMemory, RegistryError> {
        match self.slots.get_mut(&Category::VirtualMemory) {
            Some(Registration::VirtualMemory(v)) => Ok(&mut **v),
            _ => Err(RegistryError::NotRegistered(Category::VirtualMemory)),
        }
    }

    pub fn heap_allocator_mut(&mut self) -> Result<&mut dyn HeapAllocator, RegistryError> {
        match self.slots.get_mut(&Category::HeapAllocator) {
            Some(Registration::HeapAllocator(h)) => Ok(&mut **h),
            _ => Err(RegistryError::NotRegistered(Category::HeapAllocator)),
        }
    }

    pub fn process_loader_mut(&mut self) -> Result<&mut dyn ProcessLoader, RegistryError> {
        match self.slots.get_mut(&Category::ProcessLoader) {
            Some(Registration::ProcessLoader(l)) => Ok(&mut **l),
            _ => Err(RegistryError::NotRegistered(Category::ProcessLoader)),
        }
    }

    pub fn device_driver_mut(&mut self) -> Result<&mut dyn DeviceDriver, RegistryError> {
        match self.slots.get_mut(&Category::DeviceDriver) {
            Some(Registration::DeviceDriver(d)) => Ok(&mut **d),
            _ => Err(RegistryError::NotRegistered(Category::DeviceDriver)),
        }
    }
}
