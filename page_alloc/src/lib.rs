//! # Physical Page Allocators
//!
//! Two interchangeable implementations of [`kernel_api::PhysicalAllocator`]:
//!
//! - [`BitmapAllocator`]: one bit per page, next-fit for single pages and
//!   first-fit for contiguous runs. Simple, but fragments freely.
//! - [`BuddyAllocator`]: power-of-two blocks with split on allocation and
//!   merge on free. Every block is naturally aligned to its size.
//!
//! Both keep their bookkeeping outside the managed range, so every page in
//! `[start, end)` is available to callers.

pub mod bitmap;
pub mod buddy;

pub use bitmap::BitmapAllocator;
pub use buddy::{BuddyAllocator, MAX_ORDER};

use core_types::{PhysAddr, PAGE_SIZE};
use kernel_api::AllocError;

/// Page-aligns `[start, end)` inward and returns the first page and the page count.
pub(crate) fn page_range(start: PhysAddr, end: PhysAddr) -> Result<(PhysAddr, usize), AllocError> {
    let page = PAGE_SIZE as u64;
    let first = start.as_u64().div_ceil(page) * page;
    let last = end.as_u64() / page * page;
    if last <= first {
        return Err(AllocError::InvalidRange { start, end });
    }
    let pages = ((last - first) / page) as usize;
    Ok((PhysAddr::new(first), pages))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_range_exact() {
        let (base, pages) = page_range(PhysAddr::new(0x10_0000), PhysAddr::new(0x20_0000)).unwrap();
        assert_eq!(base, PhysAddr::new(0x10_0000));
        assert_eq!(pages, 256);
    }

    #[test]
    fn test_page_range_rounds_inward() {
        let (base, pages) = page_range(PhysAddr::new(0x1001), PhysAddr::new(0x4fff)).unwrap();
        assert_eq!(base, PhysAddr::new(0x2000));
        assert_eq!(pages, 2);
    }

    #[test]
    fn test_page_range_rejects_empty_and_inverted() {
        assert!(page_range(PhysAddr::new(0x2000), PhysAddr::new(0x2000)).is_err());
        assert!(page_range(PhysAddr::new(0x3000), PhysAddr::new(0x1000)).is_err());
        assert!(page_range(PhysAddr::new(0x1001), PhysAddr::new(0x1fff)).is_err());
    }
}
