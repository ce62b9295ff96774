//! Bitmap page allocator
//!
//! One occupancy bit per page (set = used). Single pages are handed out
//! next-fit from the last allocation, wrapping once; contiguous runs are
//! found first-fit from the bottom of the range.

use core_types::{pages_for_bytes, PhysAddr, PAGE_SIZE};
use kernel_api::{AllocError, AllocatorDetail, AllocatorStats, KernelComponent, PhysicalAllocator};

const BITS_PER_WORD: usize = u64::BITS as usize;

#[derive(Debug, Default)]
pub struct BitmapAllocator {
    start: PhysAddr,
    end: PhysAddr,
    words: Vec<u64>,
    total_pages: usize,
    free_pages: usize,
    /// Next-fit cursor: index of the most recent single-page allocation
    last_allocated: usize,
    initialized: bool,
}

impl BitmapAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_free(&self, page: usize) -> bool {
        self.words[page / BITS_PER_WORD] & (1 << (page % BITS_PER_WORD)) == 0
    }

    fn set_used(&mut self, page: usize) {
        self.words[page / BITS_PER_WORD] |= 1 << (page % BITS_PER_WORD);
    }

    fn set_free(&mut self, page: usize) {
        self.words[page / BITS_PER_WORD] &= !(1 << (page % BITS_PER_WORD));
    }

    fn ensure_initialized(&self) -> Result<(), AllocError> {
        if self.initialized {
            Ok(())
        } else {
            Err(AllocError::NotInitialized)
        }
    }

    fn page_index(&self, addr: PhysAddr) -> Option<usize> {
        if !self.initialized {
            return None;
        }
        addr.pages_since(self.start)
            .filter(|&page| page < self.total_pages)
    }

    fn address_of(&self, page: usize) -> Result<PhysAddr, AllocError> {
        self.start
            .add_pages(page)
            .ok_or(AllocError::OutOfMemory { pages: 1 })
    }

    fn run_is_free(&self, first: usize, count: usize) -> bool {
        (first..first + count).all(|page| self.is_free(page))
    }

    fn claim_run(&mut self, first: usize, count: usize) {
        for page in first..first + count {
            self.set_used(page);
        }
        self.free_pages -= count;
    }

    /// Index of the first free run of `count` pages among `candidates`.
    fn find_run(&self, count: usize, candidates: impl Iterator<Item = usize>) -> Option<usize> {
        let last_start = self.total_pages.checked_sub(count)?;
        candidates
            .take_while(|&first| first <= last_start)
            .find(|&first| self.run_is_free(first, count))
    }
}

impl KernelComponent for BitmapAllocator {
    fn name(&self) -> &'static str {
        "bitmap"
    }

    fn description(&self) -> &'static str {
        "Simple bitmap-based page allocator with linear search"
    }
}

impl PhysicalAllocator for BitmapAllocator {
    fn init(&mut self, start: PhysAddr, end: PhysAddr) -> Result<(), AllocError> {
        let (base, pages) = crate::page_range(start, end)?;
        self.start = base;
        self.end = PhysAddr::new(base.as_u64() + (pages * PAGE_SIZE) as u64);
        self.words = vec![0; pages.div_ceil(BITS_PER_WORD)];
        self.total_pages = pages;
        self.free_pages = pages;
        self.last_allocated = 0;
        self.initialized = true;
        log::debug!(
            "bitmap: managing {} pages at {}..{}",
            pages,
            self.start,
            self.end
        );
        Ok(())
    }

    fn alloc_page(&mut self) -> Result<PhysAddr, AllocError> {
        self.ensure_initialized()?;
        if self.free_pages == 0 {
            return Err(AllocError::OutOfMemory { pages: 1 });
        }

        let cursor = self.last_allocated;
        let page = (cursor..self.total_pages)
            .chain(0..cursor)
            .find(|&page| self.is_free(page))
            .ok_or(AllocError::OutOfMemory { pages: 1 })?;

        self.claim_run(page, 1);
        self.last_allocated = page;
        self.address_of(page)
    }

    fn alloc_pages(&mut self, count: usize) -> Result<PhysAddr, AllocError> {
        self.ensure_initialized()?;
        if count == 0 {
            return Err(AllocError::ZeroPages);
        }
        if count > self.free_pages {
            return Err(AllocError::OutOfMemory { pages: count });
        }

        let first = self
            .find_run(count, 0..)
            .ok_or(AllocError::OutOfMemory { pages: count })?;
        self.claim_run(first, count);
        self.address_of(first)
    }

    fn free_pages(&mut self, addr: PhysAddr, count: usize) {
        for offset in 0..count {
            let Some(page) = addr.add_pages(offset).and_then(|a| self.page_index(a)) else {
                continue;
            };
            if !self.is_free(page) {
                self.set_free(page);
                self.free_pages += 1;
            }
        }
    }

    /// Alignment is rounded up to whole pages and applied to the physical
    /// address, not to the page index.
    fn alloc_aligned(&mut self, size: usize, align: usize) -> Result<PhysAddr, AllocError> {
        self.ensure_initialized()?;
        if align == 0 {
            return Err(AllocError::InvalidAlignment(align));
        }
        let count = pages_for_bytes(size);
        if count == 0 {
            return Err(AllocError::ZeroPages);
        }
        if count > self.free_pages {
            return Err(AllocError::OutOfMemory { pages: count });
        }

        let align_pages = pages_for_bytes(align);
        let align_bytes = align_pages
            .checked_mul(PAGE_SIZE)
            .ok_or(AllocError::InvalidAlignment(align))? as u64;
        let first_aligned = (0..align_pages.min(self.total_pages))
            .find(|&page| (self.start.as_u64() + page as u64 * PAGE_SIZE as u64) % align_bytes == 0)
            .ok_or(AllocError::OutOfMemory { pages: count })?;

        let first = self
            .find_run(count, (first_aligned..).step_by(align_pages))
            .ok_or(AllocError::OutOfMemory { pages: count })?;
        self.claim_run(first, count);
        self.address_of(first)
    }

    fn free_page_count(&self) -> usize {
        self.free_pages
    }

    fn total_pages(&self) -> usize {
        self.total_pages
    }

    fn is_available(&self, addr: PhysAddr) -> bool {
        self.page_index(addr).is_some_and(|page| self.is_free(page))
    }

    fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            name: self.name(),
            start: self.start,
            end: self.end,
            total_pages: self.total_pages,
            free_pages: self.free_pages,
            used_pages: self.total_pages - self.free_pages,
            detail: AllocatorDetail::Bitmap {
                next_fit_cursor: self.last_allocated,
            },
        }
    }
}
