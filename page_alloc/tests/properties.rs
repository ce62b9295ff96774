//! Property tests for page accounting under arbitrary alloc/free sequences.

use core_types::{PhysAddr, PAGE_SIZE};
use kernel_api::PhysicalAllocator;
use page_alloc::{BitmapAllocator, BuddyAllocator};
use proptest::prelude::*;

const START: PhysAddr = PhysAddr::new(0x10_0000);
const END: PhysAddr = PhysAddr::new(0x20_0000);

#[derive(Debug, Clone)]
enum Op {
    Alloc(usize),
    /// Free the n-th live allocation (modulo the live count)
    Free(usize),
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            (1usize..=40).prop_map(Op::Alloc),
            any::<usize>().prop_map(Op::Free),
        ],
        1..80,
    )
}

proptest! {
    #[test]
    fn buddy_free_lists_match_accounting(ops in arb_ops()) {
        let mut alloc = BuddyAllocator::new();
        alloc.init(START, END).unwrap();
        let mut live: Vec<(PhysAddr, usize)> = Vec::new();

        for op in ops {
            match op {
                Op::Alloc(n) => {
                    if let Ok(addr) = alloc.alloc_pages(n) {
                        live.push((addr, n));
                    }
                }
                Op::Free(i) if !live.is_empty() => {
                    let (addr, n) = live.swap_remove(i % live.len());
                    alloc.free_pages(addr, n);
                }
                Op::Free(_) => {}
            }
            prop_assert_eq!(
                alloc.allocated_pages() + alloc.free_list_pages(),
                alloc.total_pages()
            );
            prop_assert_eq!(alloc.free_page_count(), alloc.free_list_pages());
        }

        for (addr, n) in live.drain(..) {
            alloc.free_pages(addr, n);
        }
        prop_assert_eq!(alloc.free_blocks(), vec![(START, 8)]);
    }

    #[test]
    fn buddy_isolated_round_trip_restores_free_lists(ops in arb_ops(), n in 1usize..=64) {
        let mut alloc = BuddyAllocator::new();
        alloc.init(START, END).unwrap();
        for op in ops {
            if let Op::Alloc(pages) = op {
                let _ = alloc.alloc_pages(pages);
            }
        }

        let before = alloc.free_blocks();
        if let Ok(addr) = alloc.alloc_pages(n) {
            alloc.free_pages(addr, n);
        }
        prop_assert_eq!(alloc.free_blocks(), before);
    }

    #[test]
    fn buddy_blocks_are_naturally_aligned(n in 1usize..=128) {
        let mut alloc = BuddyAllocator::new();
        alloc.init(START, END).unwrap();
        let addr = alloc.alloc_pages(n).unwrap();
        let block_bytes = (n.next_power_of_two() * PAGE_SIZE) as u64;
        prop_assert_eq!((addr.as_u64() - START.as_u64()) % block_bytes, 0);
    }

    #[test]
    fn bitmap_free_count_matches_live_pages(ops in arb_ops()) {
        let mut alloc = BitmapAllocator::new();
        alloc.init(START, END).unwrap();
        let mut live: Vec<(PhysAddr, usize)> = Vec::new();

        for op in ops {
            match op {
                Op::Alloc(n) => {
                    if let Ok(addr) = alloc.alloc_pages(n) {
                        live.push((addr, n));
                    }
                }
                Op::Free(i) if !live.is_empty() => {
                    let (addr, n) = live.swap_remove(i % live.len());
                    alloc.free_pages(addr, n);
                }
                Op::Free(_) => {}
            }
            let used: usize = live.iter().map(|(_, n)| n).sum();
            prop_assert_eq!(alloc.free_page_count() + used, alloc.total_pages());
        }
    }
}

#[test]
fn test_buddy_one_mebibyte_scenario() {
    let mut alloc = BuddyAllocator::new();
    alloc.init(START, END).unwrap();
    assert_eq!(alloc.total_pages(), 256);
    let addr = alloc.alloc_pages(3).unwrap();
    assert_eq!(addr.as_u64() % (4 * PAGE_SIZE as u64), 0);
}
