//! Fixed-capacity arena with generation-checked handles.
//!
//! All slots are allocated up front. Releasing a slot bumps its generation,
//! so a [`Handle`] kept past the release no longer resolves instead of
//! aliasing whatever object reuses the slot.

use std::fmt;
use thiserror::Error;

/// Errors returned by [`Pool`] operations.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PoolError {
    /// Every slot is in use.
    #[error("pool exhausted ({capacity} slots in use)")]
    Exhausted { capacity: usize },
}

/// Reference to an object stored in a [`Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Slot index inside the owning pool.
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Preallocated object pool.
#[derive(Debug)]
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    /// Free slot indices, popped last-in-first-out. A fresh or cleared pool
    /// hands out indices in ascending order.
    free: Vec<u32>,
    live: usize,
}

impl<T> Pool<T> {
    /// Creates a pool holding at most `capacity` objects.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot {
            generation: 0,
            value: None,
        });
        Self {
            slots,
            free: (0..capacity as u32).rev().collect(),
            live: 0,
        }
    }

    /// Stores `value` in a free slot.
    pub fn insert(&mut self, value: T) -> Result<Handle, PoolError> {
        let index = self.free.pop().ok_or(PoolError::Exhausted {
            capacity: self.slots.len(),
        })?;
        let slot = &mut self.slots[index as usize];
        slot.value = Some(value);
        self.live += 1;
        Ok(Handle {
            index,
            generation: slot.generation,
        })
    }

    /// Releases the slot named by `handle`, returning its object.
    ///
    /// Returns `None` for stale or foreign handles.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(value)
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    /// Iterates over live objects in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    Handle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }

    /// Finds the first live object matching `predicate`.
    pub fn find<F>(&self, mut predicate: F) -> Option<Handle>
    where
        F: FnMut(&T) -> bool,
    {
        self.iter()
            .find(|(_, value)| predicate(value))
            .map(|(handle, _)| handle)
    }

    /// Releases every live object; outstanding handles become stale.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.free = (0..self.slots.len() as u32).rev().collect();
        self.live = 0;
    }
}
