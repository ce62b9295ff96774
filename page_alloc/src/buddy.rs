//! Binary buddy allocator
//!
//! Memory is tracked as power-of-two blocks of pages. A block of order `k`
//! spans `2^k` pages and its buddy starts at `index ^ (1 << k)`.
//!
//! Allocation takes the first free block at or above the needed order and
//! splits it down, returning each upper half to the free list of its new
//! order. Freeing merges a block with its buddy for as long as the buddy is
//! free at the same order, so the free lists never hold two mergeable
//! buddies.
//!
//! Per-page metadata lives in a side table. Free lists are doubly linked
//! through page indices in that table, so insert and removal are O(1).

use core_types::{pages_for_bytes, PhysAddr, PAGE_SIZE};
use kernel_api::{AllocError, AllocatorDetail, AllocatorStats, KernelComponent, PhysicalAllocator};

/// Largest block order: `2^20` pages.
pub const MAX_ORDER: u8 = 20;

const ORDERS: usize = MAX_ORDER as usize + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageState {
    /// Not the first page of any block
    Interior,
    /// First page of a free block on the list for `order`
    Free { order: u8 },
    /// First page of a block handed out to a caller
    Allocated { order: u8 },
}

#[derive(Debug, Clone, Copy)]
struct PageMeta {
    state: PageState,
    prev: Option<usize>,
    next: Option<usize>,
}

impl PageMeta {
    const INTERIOR: PageMeta = PageMeta {
        state: PageState::Interior,
        prev: None,
        next: None,
    };
}

#[derive(Debug, Clone, Copy, Default)]
struct FreeList {
    head: Option<usize>,
    len: usize,
}

/// Smallest order whose block holds `pages` pages.
pub fn order_for_pages(pages: usize) -> Option<u8> {
    let order = pages.max(1).next_power_of_two().trailing_zeros();
    u8::try_from(order).ok().filter(|&o| o <= MAX_ORDER)
}

#[derive(Debug, Default)]
pub struct BuddyAllocator {
    start: PhysAddr,
    end: PhysAddr,
    pages: Vec<PageMeta>,
    free_lists: [FreeList; ORDERS],
    allocated_pages: usize,
    /// Live allocations
    allocations: u64,
    initialized: bool,
}

impl BuddyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_initialized(&self) -> Result<(), AllocError> {
        if self.initialized {
            Ok(())
        } else {
            Err(AllocError::NotInitialized)
        }
    }

    fn total(&self) -> usize {
        self.pages.len()
    }

    /// Pushes the block at `index` onto the head of the `order` list.
    fn push_free(&mut self, index: usize, order: u8) {
        let list = &mut self.free_lists[order as usize];
        let old_head = list.head;
        list.head = Some(index);
        list.len += 1;

        if let Some(h) = old_head {
            self.pages[h].prev = Some(index);
        }
        self.pages[index] = PageMeta {
            state: PageState::Free { order },
            prev: None,
            next: old_head,
        };
    }

    /// Unlinks the free block at `index` from the `order` list.
    fn remove_free(&mut self, index: usize, order: u8) {
        let PageMeta { prev, next, .. } = self.pages[index];
        match prev {
            Some(p) => self.pages[p].next = next,
            None => self.free_lists[order as usize].head = next,
        }
        if let Some(n) = next {
            self.pages[n].prev = prev;
        }
        self.free_lists[order as usize].len -= 1;
        self.pages[index] = PageMeta::INTERIOR;
    }

    fn buddy_of(&self, index: usize, order: u8) -> Option<usize> {
        let buddy = index ^ (1usize << order);
        (buddy < self.total()).then_some(buddy)
    }

    /// Takes a block of exactly `order`, splitting a larger one if needed.
    fn take_block(&mut self, order: u8) -> Option<usize> {
        let found = (order..=MAX_ORDER).find(|&o| self.free_lists[o as usize].head.is_some())?;
        let index = self.free_lists[found as usize].head?;
        self.remove_free(index, found);

        let mut current = found;
        while current > order {
            current -= 1;
            if let Some(upper) = self.buddy_of(index, current) {
                self.push_free(upper, current);
            }
        }
        Some(index)
    }

    fn allocate_order(&mut self, order: u8) -> Result<PhysAddr, AllocError> {
        let pages = 1usize << order;
        let index = self
            .take_block(order)
            .ok_or(AllocError::OutOfMemory { pages })?;
        self.pages[index].state = PageState::Allocated { order };
        self.allocated_pages += pages;
        self.allocations += 1;
        self.start
            .add_pages(index)
            .ok_or(AllocError::OutOfMemory { pages })
    }

    fn page_index(&self, addr: PhysAddr) -> Option<usize> {
        if !self.initialized {
            return None;
        }
        addr.pages_since(self.start)
            .filter(|&page| page < self.total())
    }

    /// Free blocks as sorted `(address, order)` pairs.
    pub fn free_blocks(&self) -> Vec<(PhysAddr, u8)> {
        let mut blocks: Vec<(PhysAddr, u8)> = self
            .pages
            .iter()
            .enumerate()
            .filter_map(|(index, meta)| match meta.state {
                PageState::Free { order } => self.start.add_pages(index).map(|a| (a, order)),
                _ => None,
            })
            .collect();
        blocks.sort_unstable();
        blocks
    }

    /// Pages held by every free list, counted by walking the lists.
    pub fn free_list_pages(&self) -> usize {
        (0..ORDERS)
            .map(|order| {
                let mut count = 0;
                let mut cursor = self.free_lists[order].head;
                while let Some(index) = cursor {
                    count += 1;
                    cursor = self.pages[index].next;
                }
                count << order
            })
            .sum()
    }

    pub fn allocated_pages(&self) -> usize {
        self.allocated_pages
    }
}

impl KernelComponent for BuddyAllocator {
    fn name(&self) -> &'static str {
        "buddy"
    }

    fn description(&self) -> &'static str {
        "Buddy system allocator with power-of-2 block sizes"
    }
}

impl PhysicalAllocator for BuddyAllocator {
    fn init(&mut self, start: PhysAddr, end: PhysAddr) -> Result<(), AllocError> {
        let (base, total) = crate::page_range(start, end)?;
        self.start = base;
        self.end = PhysAddr::new(base.as_u64() + (total * PAGE_SIZE) as u64);
        self.pages = vec![PageMeta::INTERIOR; total];
        self.free_lists = [FreeList::default(); ORDERS];
        self.allocated_pages = 0;
        self.allocations = 0;

        // Carve the range greedily into the largest blocks that fit
        let mut index = 0;
        while index < total {
            let remaining = total - index;
            let order = (usize::BITS - 1 - remaining.leading_zeros()).min(MAX_ORDER as u32) as u8;
            self.push_free(index, order);
            index += 1 << order;
        }

        self.initialized = true;
        log::debug!(
            "buddy: managing {} pages at {}..{}",
            total,
            self.start,
            self.end
        );
        Ok(())
    }

    fn alloc_page(&mut self) -> Result<PhysAddr, AllocError> {
        self.alloc_pages(1)
    }

    /// Rounds `count` up to the next power of two.
    fn alloc_pages(&mut self, count: usize) -> Result<PhysAddr, AllocError> {
        self.ensure_initialized()?;
        if count == 0 {
            return Err(AllocError::ZeroPages);
        }
        let order = order_for_pages(count).ok_or(AllocError::TooLarge {
            pages: count,
            max: 1 << MAX_ORDER,
        })?;
        self.allocate_order(order)
    }

    /// Frees the whole block whose first page is `addr`; `count` is not
    /// consulted because the block remembers its own order. Addresses that
    /// are not the start of an allocated block are ignored.
    fn free_pages(&mut self, addr: PhysAddr, _count: usize) {
        let Some(mut index) = self.page_index(addr) else {
            return;
        };
        let PageState::Allocated { order } = self.pages[index].state else {
            return;
        };

        self.allocated_pages -= 1 << order;
        self.allocations -= 1;
        self.pages[index] = PageMeta::INTERIOR;

        let mut order = order;
        while order < MAX_ORDER {
            let Some(buddy) = self.buddy_of(index, order) else {
                break;
            };
            if self.pages[buddy].state != (PageState::Free { order }) {
                break;
            }
            self.remove_free(buddy, order);
            index = index.min(buddy);
            order += 1;
        }
        self.push_free(index, order);
    }

    /// Blocks are aligned to their size relative to the range start, so the
    /// request is rounded up to a block at least as large as `align`. That
    /// only yields an absolute boundary when `align` is a power of two the
    /// start itself sits on; anything else is rejected.
    fn alloc_aligned(&mut self, size: usize, align: usize) -> Result<PhysAddr, AllocError> {
        self.ensure_initialized()?;
        if !align.is_power_of_two() || !self.start.is_aligned(align as u64) {
            return Err(AllocError::InvalidAlignment(align));
        }
        let pages = pages_for_bytes(size);
        if pages == 0 {
            return Err(AllocError::ZeroPages);
        }
        let wanted = pages.max(pages_for_bytes(align));
        let order = order_for_pages(wanted).ok_or(AllocError::TooLarge {
            pages: wanted,
            max: 1 << MAX_ORDER,
        })?;
        self.allocate_order(order)
    }

    fn free_page_count(&self) -> usize {
        self.total() - self.allocated_pages
    }

    fn total_pages(&self) -> usize {
        self.total()
    }

    /// True when the page lies inside some free block.
    fn is_available(&self, addr: PhysAddr) -> bool {
        let Some(page) = self.page_index(addr) else {
            return false;
        };
        (0..=MAX_ORDER).any(|order| {
            let head = page & !((1usize << order) - 1);
            self.pages[head].state == PageState::Free { order }
        })
    }

    fn stats(&self) -> AllocatorStats {
        let free_blocks_by_order = self
            .free_lists
            .iter()
            .enumerate()
            .filter(|(_, list)| list.len > 0)
            .map(|(order, list)| (order as u8, list.len))
            .collect();
        AllocatorStats {
            name: self.name(),
            start: self.start,
            end: self.end,
            total_pages: self.total(),
            free_pages: self.free_page_count(),
            used_pages: self.allocated_pages,
            detail: AllocatorDetail::Buddy {
                free_blocks_by_order,
                allocations: self.allocations,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: PhysAddr = PhysAddr::new(0x10_0000);
    const END: PhysAddr = PhysAddr::new(0x20_0000);

    fn allocator() -> BuddyAllocator {
        let mut alloc = BuddyAllocator::new();
        alloc.init(START, END).unwrap();
        alloc
    }

    fn page(n: usize) -> PhysAddr {
        START.add_pages(n).unwrap()
    }

    #[test]
    fn test_order_for_pages() {
        assert_eq!(order_for_pages(1), Some(0));
        assert_eq!(order_for_pages(2), Some(1));
        assert_eq!(order_for_pages(3), Some(2));
        assert_eq!(order_for_pages(4), Some(2));
        assert_eq!(order_for_pages(5), Some(3));
        assert_eq!(order_for_pages(1 << 20), Some(20));
        assert_eq!(order_for_pages((1 << 20) + 1), None);
    }

    #[test]
    fn test_init_one_mebibyte() {
        let alloc = allocator();
        assert_eq!(alloc.total_pages(), 256);
        assert_eq!(alloc.free_page_count(), 256);
        assert_eq!(alloc.free_blocks(), vec![(START, 8)]);
    }

    #[test]
    fn test_init_carves_non_power_of_two() {
        let mut alloc = BuddyAllocator::new();
        alloc
            .init(START, START.add_pages(7).unwrap())
            .unwrap();
        assert_eq!(
            alloc.free_blocks(),
            vec![(page(0), 2), (page(4), 1), (page(6), 0)]
        );
        assert_eq!(alloc.free_list_pages(), 7);
    }

    #[test]
    fn test_three_pages_round_to_order_two() {
        let mut alloc = allocator();
        let addr = alloc.alloc_pages(3).unwrap();
        assert!(addr.is_aligned(4 * PAGE_SIZE as u64));
        assert_eq!(alloc.free_page_count(), 252);
    }

    #[test]
    fn test_split_leaves_one_buddy_per_order() {
        let mut alloc = allocator();
        let addr = alloc.alloc_page().unwrap();
        assert_eq!(addr, START);
        let orders: Vec<u8> = alloc.free_blocks().iter().map(|(_, o)| *o).collect();
        assert_eq!(orders, vec![0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(alloc.free_list_pages(), 255);
    }

    #[test]
    fn test_free_merges_back_to_single_block() {
        let mut alloc = allocator();
        let a = alloc.alloc_page().unwrap();
        let b = alloc.alloc_pages(2).unwrap();
        let c = alloc.alloc_page().unwrap();
        alloc.free_page(a);
        alloc.free_pages(b, 2);
        alloc.free_page(c);
        assert_eq!(alloc.free_blocks(), vec![(START, 8)]);
        assert_eq!(alloc.allocated_pages(), 0);
    }

    #[test]
    fn test_merge_stops_at_allocated_buddy() {
        let mut alloc = allocator();
        let a = alloc.alloc_page().unwrap();
        let b = alloc.alloc_page().unwrap();
        assert_eq!(b, page(1));
        alloc.free_page(b);
        assert!(alloc.free_blocks().contains(&(page(1), 0)));
        alloc.free_page(a);
        assert_eq!(alloc.free_blocks(), vec![(START, 8)]);
    }

    #[test]
    fn test_free_of_interior_page_is_noop() {
        let mut alloc = allocator();
        let addr = alloc.alloc_pages(4).unwrap();
        alloc.free_page(addr.add_pages(1).unwrap());
        assert_eq!(alloc.free_page_count(), 252);
        alloc.free_page(addr);
        assert_eq!(alloc.free_page_count(), 256);
    }

    #[test]
    fn test_double_free_is_noop() {
        let mut alloc = allocator();
        let addr = alloc.alloc_pages(2).unwrap();
        alloc.free_pages(addr, 2);
        alloc.free_pages(addr, 2);
        assert_eq!(alloc.free_page_count(), 256);
        assert_eq!(alloc.free_blocks(), vec![(START, 8)]);
    }

    #[test]
    fn test_exhaustion() {
        let mut alloc = allocator();
        alloc.alloc_pages(256).unwrap();
        assert_eq!(alloc.alloc_page(), Err(AllocError::OutOfMemory { pages: 1 }));
        assert_eq!(
            alloc.alloc_pages(512),
            Err(AllocError::OutOfMemory { pages: 512 })
        );
    }

    #[test]
    fn test_too_large() {
        let mut alloc = allocator();
        assert!(matches!(
            alloc.alloc_pages((1 << 20) + 1),
            Err(AllocError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_is_available_covers_block_interiors() {
        let mut alloc = allocator();
        assert!(alloc.is_available(page(200)));
        let addr = alloc.alloc_pages(4).unwrap();
        assert!(!alloc.is_available(addr));
        assert!(!alloc.is_available(addr.add_pages(3).unwrap()));
        assert!(alloc.is_available(addr.add_pages(4).unwrap()));
        assert!(!alloc.is_available(END));
    }

    #[test]
    fn test_alloc_aligned_uses_alignment_order() {
        let mut alloc = allocator();
        alloc.alloc_page().unwrap();
        let addr = alloc.alloc_aligned(PAGE_SIZE, 16 * PAGE_SIZE).unwrap();
        assert!(addr.is_aligned(16 * PAGE_SIZE as u64));
        assert_eq!(alloc.free_page_count(), 256 - 1 - 16);
    }

    #[test]
    fn test_alloc_aligned_beyond_base_alignment_is_rejected() {
        let base = PhysAddr::new(0x10_1000);
        let mut alloc = BuddyAllocator::new();
        alloc.init(base, base.add_pages(64).unwrap()).unwrap();

        let addr = alloc.alloc_aligned(PAGE_SIZE, PAGE_SIZE).unwrap();
        assert!(addr.is_aligned(PAGE_SIZE as u64));
        assert_eq!(
            alloc.alloc_aligned(PAGE_SIZE, 4 * PAGE_SIZE),
            Err(AllocError::InvalidAlignment(4 * PAGE_SIZE))
        );
        assert_eq!(
            alloc.alloc_aligned(PAGE_SIZE, 3 * PAGE_SIZE),
            Err(AllocError::InvalidAlignment(3 * PAGE_SIZE))
        );
        assert_eq!(alloc.free_page_count(), 63);
    }

    #[test]
    fn test_stats_report_orders() {
        let mut alloc = allocator();
        alloc.alloc_pages(64).unwrap();
        let stats = alloc.stats();
        assert_eq!(stats.used_pages, 64);
        assert_eq!(
            stats.detail,
            AllocatorDetail::Buddy {
                free_blocks_by_order: vec![(6, 1), (7, 1)],
                allocations: 1,
            }
        );
    }
}
