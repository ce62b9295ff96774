//! Physical allocator contract

use core_types::{PhysAddr, PAGE_SIZE};
use kernel_api::{AllocError, PhysicalAllocator};

pub const START: PhysAddr = PhysAddr::new(0x10_0000);
pub const END: PhysAddr = PhysAddr::new(0x20_0000);
pub const PAGES: usize = 256;

/// Runs every allocator check against `alloc`, which must be uninitialised.
pub fn check_all(alloc: &mut dyn PhysicalAllocator) {
    check_requires_init(alloc);
    check_rejects_bad_range(alloc);
    check_single_pages(alloc);
    check_runs_do_not_overlap(alloc);
    check_exhaustion_and_recovery(alloc);
    check_bad_frees_are_ignored(alloc);
    check_aligned(alloc);
    check_stats_accounting(alloc);
}

fn init(alloc: &mut dyn PhysicalAllocator) {
    alloc
        .init(START, END)
        .unwrap_or_else(|e| panic!("{}: init failed: {e}", alloc.name()));
}

pub fn check_requires_init(alloc: &mut dyn PhysicalAllocator) {
    let name = alloc.name();
    assert_eq!(alloc.alloc_page(), Err(AllocError::NotInitialized), "{name}");
    assert!(!alloc.is_available(START), "{name}");
    alloc.free_page(START);
    assert_eq!(alloc.free_page_count(), 0, "{name}");
}

pub fn check_rejects_bad_range(alloc: &mut dyn PhysicalAllocator) {
    let name = alloc.name();
    assert!(
        matches!(alloc.init(END, START), Err(AllocError::InvalidRange { .. })),
        "{name}"
    );
    assert!(
        matches!(
            alloc.init(START, PhysAddr::new(START.as_u64() + 100)),
            Err(AllocError::InvalidRange { .. })
        ),
        "{name}"
    );
}

pub fn check_single_pages(alloc: &mut dyn PhysicalAllocator) {
    init(alloc);
    let name = alloc.name();
    assert_eq!(alloc.total_pages(), PAGES, "{name}");
    assert_eq!(alloc.free_page_count(), PAGES, "{name}");

    let page = alloc.alloc_page().unwrap();
    assert!(page >= START && page < END, "{name}: {page} out of range");
    assert!(page.is_aligned(PAGE_SIZE as u64), "{name}");
    assert!(!alloc.is_available(page), "{name}");
    assert_eq!(alloc.free_page_count(), PAGES - 1, "{name}");

    alloc.free_page(page);
    assert!(alloc.is_available(page), "{name}");
    assert_eq!(alloc.free_page_count(), PAGES, "{name}");
    assert_eq!(alloc.alloc_pages(0), Err(AllocError::ZeroPages), "{name}");
}

pub fn check_runs_do_not_overlap(alloc: &mut dyn PhysicalAllocator) {
    init(alloc);
    let name = alloc.name();
    let sizes = [1, 2, 3, 4, 7, 8, 16];
    let mut runs: Vec<(u64, u64, usize)> = Vec::new();
    for n in sizes {
        let addr = alloc.alloc_pages(n).unwrap();
        let (lo, hi) = (addr.as_u64(), addr.as_u64() + (n * PAGE_SIZE) as u64);
        assert!(hi <= END.as_u64(), "{name}: run past end");
        for &(other_lo, other_hi, _) in &runs {
            assert!(hi <= other_lo || lo >= other_hi, "{name}: runs overlap");
        }
        runs.push((lo, hi, n));
    }
    for (lo, _, n) in runs {
        alloc.free_pages(PhysAddr::new(lo), n);
    }
    assert_eq!(alloc.free_page_count(), PAGES, "{name}");
}

pub fn check_exhaustion_and_recovery(alloc: &mut dyn PhysicalAllocator) {
    init(alloc);
    let name = alloc.name();
    let mut pages = Vec::new();
    while let Ok(page) = alloc.alloc_page() {
        pages.push(page);
        assert!(pages.len() <= PAGES, "{name}: handed out more pages than exist");
    }
    assert_eq!(pages.len(), PAGES, "{name}");
    assert_eq!(alloc.free_page_count(), 0, "{name}");
    assert!(
        matches!(alloc.alloc_page(), Err(AllocError::OutOfMemory { .. })),
        "{name}"
    );

    for page in pages {
        alloc.free_page(page);
    }
    assert_eq!(alloc.free_page_count(), PAGES, "{name}");
    assert!(alloc.alloc_pages(PAGES).is_ok(), "{name}: no full-range run after recovery");
}

pub fn check_bad_frees_are_ignored(alloc: &mut dyn PhysicalAllocator) {
    init(alloc);
    let name = alloc.name();
    let page = alloc.alloc_page().unwrap();
    alloc.free_page(page);
    alloc.free_page(page);
    assert_eq!(alloc.free_page_count(), PAGES, "{name}: double free changed accounting");

    alloc.free_page(END);
    alloc.free_page(PhysAddr::new(0));
    assert_eq!(alloc.free_page_count(), PAGES, "{name}: out-of-range free changed accounting");
}

pub fn check_aligned(alloc: &mut dyn PhysicalAllocator) {
    init(alloc);
    let name = alloc.name();
    alloc.alloc_page().unwrap();

    let align = 16 * PAGE_SIZE;
    let addr = alloc.alloc_aligned(2 * PAGE_SIZE, align).unwrap();
    assert!(addr.is_aligned(align as u64), "{name}: {addr} not aligned");
    assert_eq!(
        alloc.alloc_aligned(PAGE_SIZE, 0),
        Err(AllocError::InvalidAlignment(0)),
        "{name}"
    );
}

pub fn check_stats_accounting(alloc: &mut dyn PhysicalAllocator) {
    init(alloc);
    let name = alloc.name();
    alloc.alloc_pages(4).unwrap();
    alloc.alloc_page().unwrap();
    let stats = alloc.stats();
    assert_eq!(stats.name, name);
    assert_eq!(stats.total_pages, PAGES, "{name}");
    assert_eq!(stats.used_pages + stats.free_pages, stats.total_pages, "{name}");
    assert_eq!(stats.free_pages, alloc.free_page_count(), "{name}");
    assert!(stats.to_string().contains("Total pages: 256"), "{name}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_allocator_meets_contract() {
        for mut alloc in crate::allocators() {
            check_all(alloc.as_mut());
        }
    }
}
