//! SparseSet generational handle tests.
//!
//! These tests verify generation counter increments, stale slot detection
//! and slot reuse, which the atlas arena relies on.

use ember_core::alloc::sparse_set::{IndexSlot, SparseSet};

#[test]
fn test_get_mut() {
    let mut set = SparseSet::new();

    let idx = set.push(42);
    if let Some(value) = set.get_mut(idx) {
        *value = 100;
    }

    assert_eq!(set.get(idx), Some(&100));
}

#[test]
fn test_invalid_index_returns_none() {
    let set = SparseSet::<i32>::new();

    let invalid = IndexSlot::new(0, 999);
    assert_eq!(set.get(invalid), None);
    assert!(!set.contains(invalid));
}

#[test]
fn test_multiple_generation_increments() {
    let mut set = SparseSet::new();

    let idx0 = set.push(0);
    set.remove(idx0);
    let idx1 = set.push(1);
    assert_eq!(idx1.generation(), 1);

    set.remove(idx1);
    let idx2 = set.push(2);
    assert_eq!(idx2.generation(), 2);

    // Only the latest generation should work
    assert_eq!(set.get(idx0), None);
    assert_eq!(set.get(idx1), None);
    assert_eq!(set.get(idx2), Some(&2));
}

#[test]
fn test_slot_reuse() {
    let mut set = SparseSet::new();

    let idx1 = set.push(1);
    let idx2 = set.push(2);
    let idx3 = set.push(3);
    assert_eq!((idx1.index(), idx2.index(), idx3.index()), (0, 1, 2));

    set.remove(idx2);

    let idx4 = set.push(4);
    assert_eq!(idx4.index(), 1);
    assert_eq!(idx4.generation(), 1);
    assert_eq!(set.len(), 3);
}

#[test]
fn test_iter_mut_reports_slots() {
    let mut set = SparseSet::new();
    let a = set.push(1);
    let b = set.push(2);

    for (_, value) in set.iter_mut() {
        *value *= 10;
    }

    let collected: Vec<_> = set.iter().map(|(slot, value)| (slot, *value)).collect();
    assert_eq!(collected, vec![(a, 10), (b, 20)]);
}
