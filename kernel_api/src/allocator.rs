//! Physical page allocator contract

use crate::component::KernelComponent;
use crate::error::AllocError;
use core_types::PhysAddr;
use serde::Serialize;
use std::fmt;

/// Hands out 4 KiB physical pages from a half-open range `[start, end)`.
///
/// Addresses returned are always page aligned and inside the managed range.
/// Freeing a page that is out of range or already free is a silent no-op.
pub trait PhysicalAllocator: KernelComponent + Send {
    /// Takes ownership of `[start, end)`. Re-initialising discards all state.
    fn init(&mut self, start: PhysAddr, end: PhysAddr) -> Result<(), AllocError>;

    /// Allocates a single page.
    fn alloc_page(&mut self) -> Result<PhysAddr, AllocError>;

    /// Allocates `count` physically contiguous pages.
    fn alloc_pages(&mut self, count: usize) -> Result<PhysAddr, AllocError>;

    fn free_page(&mut self, addr: PhysAddr) {
        self.free_pages(addr, 1);
    }

    /// Returns `count` pages starting at `addr`.
    fn free_pages(&mut self, addr: PhysAddr, count: usize);

    /// Allocates at least `size` bytes starting on an `align`-byte boundary.
    /// Fails with `InvalidAlignment` when the boundary cannot be honored.
    fn alloc_aligned(&mut self, size: usize, align: usize) -> Result<PhysAddr, AllocError>;

    /// Number of pages currently free.
    fn free_page_count(&self) -> usize;

    /// Number of pages under management.
    fn total_pages(&self) -> usize;

    /// True when `addr` is inside the range and its page is free.
    fn is_available(&self, addr: PhysAddr) -> bool;

    fn stats(&self) -> AllocatorStats;

    fn print_stats(&self) {
        log::info!("{}", self.stats());
    }
}

/// Algorithm-specific part of an allocator report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllocatorDetail {
    Bitmap {
        /// Page index the next single-page scan starts from
        next_fit_cursor: usize,
    },
    Buddy {
        /// `(order, free block count)` for every order with free blocks
        free_blocks_by_order: Vec<(u8, usize)>,
        allocations: u64,
    },
}

/// Snapshot of an allocator's accounting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocatorStats {
    pub name: &'static str,
    pub start: PhysAddr,
    pub end: PhysAddr,
    pub total_pages: usize,
    pub free_pages: usize,
    pub used_pages: usize,
    pub detail: AllocatorDetail,
}

impl AllocatorStats {
    /// Used pages as a percentage of total, 0 when nothing is managed.
    pub fn utilization(&self) -> f64 {
        if self.total_pages == 0 {
            return 0.0;
        }
        self.used_pages as f64 * 100.0 / self.total_pages as f64
    }
}

impl fmt::Display for AllocatorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} allocator statistics:", self.name)?;
        writeln!(f, "  Range: {} - {}", self.start, self.end)?;
        writeln!(f, "  Total pages: {}", self.total_pages)?;
        writeln!(f, "  Free pages: {}", self.free_pages)?;
        writeln!(f, "  Used pages: {}", self.used_pages)?;
        write!(f, "  Utilization: {:.1}%", self.utilization())?;
        match &self.detail {
            AllocatorDetail::Bitmap { next_fit_cursor } => {
                write!(f, "\n  Next-fit cursor: {}", next_fit_cursor)?;
            }
            AllocatorDetail::Buddy {
                free_blocks_by_order,
                allocations,
            } => {
                write!(f, "\n  Allocations: {}", allocations)?;
                for (order, count) in free_blocks_by_order {
                    write!(
                        f,
                        "\n  Order {:2} ({:7} pages): {} free blocks",
                        order,
                        1usize << order,
                        count
                    )?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(used: usize, total: usize) -> AllocatorStats {
        AllocatorStats {
            name: "bitmap",
            start: PhysAddr::new(0x10_0000),
            end: PhysAddr::new(0x20_0000),
            total_pages: total,
            free_pages: total - used,
            used_pages: used,
            detail: AllocatorDetail::Bitmap { next_fit_cursor: 3 },
        }
    }

    #[test]
    fn test_utilization() {
        assert_eq!(stats(64, 256).utilization(), 25.0);
        assert_eq!(stats(0, 0).utilization(), 0.0);
    }

    #[test]
    fn test_display_mentions_cursor() {
        let text = stats(1, 256).to_string();
        assert!(text.starts_with("bitmap allocator statistics:"));
        assert!(text.contains("Next-fit cursor: 3"));
    }

    #[test]
    fn test_buddy_detail_lists_orders() {
        let s = AllocatorStats {
            detail: AllocatorDetail::Buddy {
                free_blocks_by_order: vec![(2, 1), (8, 3)],
                allocations: 7,
            },
            ..stats(4, 256)
        };
        let text = s.to_string();
        assert!(text.contains("Allocations: 7"));
        assert!(text.contains("Order  8 (    256 pages): 3 free blocks"));
    }
}
