//! Physical addresses and page geometry

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of a physical page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// A physical address inside the range managed by a page allocator
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PhysAddr(u64);

impl PhysAddr {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns `self + pages * PAGE_SIZE`, or `None` on overflow.
    pub fn add_pages(&self, pages: usize) -> Option<Self> {
        (pages as u64)
            .checked_mul(PAGE_SIZE as u64)
            .and_then(|offset| self.0.checked_add(offset))
            .map(Self)
    }

    /// Number of whole pages between `base` and `self`, if `self >= base`.
    pub fn pages_since(&self, base: PhysAddr) -> Option<usize> {
        self.0
            .checked_sub(base.0)
            .map(|delta| (delta / PAGE_SIZE as u64) as usize)
    }

    pub fn is_aligned(&self, align: u64) -> bool {
        align != 0 && self.0 % align == 0
    }
}

impl From<u64> for PhysAddr {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Number of pages needed to hold `bytes`.
pub fn pages_for_bytes(bytes: usize) -> usize {
    bytes.div_ceil(PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_pages() {
        let base = PhysAddr::new(0x10_0000);
        assert_eq!(base.add_pages(2), Some(PhysAddr::new(0x10_2000)));
        assert_eq!(PhysAddr::new(u64::MAX).add_pages(1), None);
    }

    #[test]
    fn test_pages_since() {
        let base = PhysAddr::new(0x10_0000);
        assert_eq!(PhysAddr::new(0x10_3000).pages_since(base), Some(3));
        assert_eq!(PhysAddr::new(0x0f_f000).pages_since(base), None);
    }

    #[test]
    fn test_pages_for_bytes() {
        assert_eq!(pages_for_bytes(0), 0);
        assert_eq!(pages_for_bytes(1), 1);
        assert_eq!(pages_for_bytes(PAGE_SIZE), 1);
        assert_eq!(pages_for_bytes(PAGE_SIZE + 1), 2);
    }

    #[test]
    fn test_display_is_hex() {
        assert_eq!(format!("{}", PhysAddr::new(0x1000)), "0x1000");
    }
}
