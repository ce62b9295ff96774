//! Intrusive doubly linked list threaded through a [`Pool`].
//!
//! Each element embeds a [`Link`]; the list itself only stores the head,
//! tail and length. Insert, unlink and pop are O(1). A handle must be on at
//! most one list at a time: the owner of the pool tracks which.

use crate::pool::{Handle, Pool};

/// Neighbour links embedded in a pooled element.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    prev: Option<Handle>,
    next: Option<Handle>,
}

impl Link {
    pub fn next(&self) -> Option<Handle> {
        self.next
    }

    pub fn prev(&self) -> Option<Handle> {
        self.prev
    }

    pub fn is_detached(&self) -> bool {
        self.prev.is_none() && self.next.is_none()
    }
}

/// Access to the [`Link`] embedded in a pooled element.
pub trait Linked {
    fn link(&self) -> &Link;
    fn link_mut(&mut self) -> &mut Link;
}

/// Head of an index-linked list.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListHead {
    head: Option<Handle>,
    tail: Option<Handle>,
    len: usize,
}

impl ListHead {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn front(&self) -> Option<Handle> {
        self.head
    }

    pub fn back(&self) -> Option<Handle> {
        self.tail
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends `handle` at the tail. Returns `false` for a stale handle.
    pub fn push_back<T: Linked>(&mut self, pool: &mut Pool<T>, handle: Handle) -> bool {
        let tail = self.tail;
        match pool.get_mut(handle) {
            Some(node) => {
                *node.link_mut() = Link {
                    prev: tail,
                    next: None,
                };
            }
            None => return false,
        }
        match tail.and_then(|t| pool.get_mut(t)) {
            Some(tail_node) => tail_node.link_mut().next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
        self.len += 1;
        true
    }

    /// Inserts `handle` at the head. Returns `false` for a stale handle.
    pub fn push_front<T: Linked>(&mut self, pool: &mut Pool<T>, handle: Handle) -> bool {
        let head = self.head;
        match pool.get_mut(handle) {
            Some(node) => {
                *node.link_mut() = Link {
                    prev: None,
                    next: head,
                };
            }
            None => return false,
        }
        match head.and_then(|h| pool.get_mut(h)) {
            Some(head_node) => head_node.link_mut().prev = Some(handle),
            None => self.tail = Some(handle),
        }
        self.head = Some(handle);
        self.len += 1;
        true
    }

    /// Detaches and returns the head element.
    pub fn pop_front<T: Linked>(&mut self, pool: &mut Pool<T>) -> Option<Handle> {
        let head = self.head?;
        self.unlink(pool, head);
        Some(head)
    }

    /// Detaches `handle` from this list. Returns `false` for a stale handle.
    pub fn unlink<T: Linked>(&mut self, pool: &mut Pool<T>, handle: Handle) -> bool {
        let link = match pool.get_mut(handle) {
            Some(node) => std::mem::take(node.link_mut()),
            None => return false,
        };

        match link.prev.and_then(|p| pool.get_mut(p)) {
            Some(prev) => prev.link_mut().next = link.next,
            None => self.head = link.next,
        }
        match link.next.and_then(|n| pool.get_mut(n)) {
            Some(next) => next.link_mut().prev = link.prev,
            None => self.tail = link.prev,
        }
        self.len = self.len.saturating_sub(1);
        true
    }

    /// Iterates from head to tail.
    pub fn iter<'a, T: Linked>(&self, pool: &'a Pool<T>) -> Iter<'a, T> {
        Iter {
            pool,
            cursor: self.head,
        }
    }

    pub fn contains<T: Linked>(&self, pool: &Pool<T>, handle: Handle) -> bool {
        self.iter(pool).any(|h| h == handle)
    }

    /// Forgets every element without touching the pool.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

/// Iterator over the handles of a [`ListHead`].
pub struct Iter<'a, T> {
    pool: &'a Pool<T>,
    cursor: Option<Handle>,
}

impl<'a, T: Linked> Iterator for Iter<'a, T> {
    type Item = Handle;

    fn next(&mut self) -> Option<Handle> {
        let current = self.cursor?;
        self.cursor = self.pool.get(current).and_then(|node| node.link().next);
        Some(current)
    }
}
