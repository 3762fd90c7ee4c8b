use crate::profiling::profile_function;
use std::num::NonZeroU64;

/// Generational index into a [`SparseSet`].
///
/// A slot stays valid until its entry is removed; reusing the storage bumps the
/// generation so stale slots never alias the new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexSlot(NonZeroU64);

impl IndexSlot {
    pub fn new(generation: u32, idx: u32) -> Self {
        let raw = ((generation as u64) << 32) | (idx as u64 + 1);
        // idx + 1 never overflows into the generation half and is never zero
        match NonZeroU64::new(raw) {
            Some(value) => Self(value),
            None => unreachable!("index slot is offset by one"),
        }
    }

    pub fn generation(&self) -> u32 {
        (self.0.get() >> 32) as u32
    }

    pub fn index(&self) -> u32 {
        (self.0.get() & u32::MAX as u64) as u32 - 1
    }
}

struct Entry<T> {
    generation: u32,
    data: Option<T>,
}

/// Generational arena with slot reuse.
pub struct SparseSet<T> {
    vec: Vec<Entry<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for SparseSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SparseSet<T> {
    pub const fn new() -> Self {
        Self {
            vec: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn push(&mut self, data: T) -> IndexSlot {
        profile_function!();
        self.len += 1;
        if let Some(idx) = self.free.pop() {
            let entry = &mut self.vec[idx as usize];
            entry.data = Some(data);
            IndexSlot::new(entry.generation, idx)
        } else {
            let idx = self.vec.len() as u32;
            self.vec.push(Entry {
                generation: 0,
                data: Some(data),
            });
            IndexSlot::new(0, idx)
        }
    }

    fn entry(&self, idx: IndexSlot) -> Option<&Entry<T>> {
        self.vec
            .get(idx.index() as usize)
            .filter(|entry| entry.generation == idx.generation())
    }

    pub fn contains(&self, idx: IndexSlot) -> bool {
        self.get(idx).is_some()
    }

    /// Returns `None` for removed or stale slots.
    pub fn get(&self, idx: IndexSlot) -> Option<&T> {
        self.entry(idx).and_then(|entry| entry.data.as_ref())
    }

    pub fn get_mut(&mut self, idx: IndexSlot) -> Option<&mut T> {
        self.vec
            .get_mut(idx.index() as usize)
            .filter(|entry| entry.generation == idx.generation())
            .and_then(|entry| entry.data.as_mut())
    }

    pub fn remove(&mut self, idx: IndexSlot) -> Option<T> {
        profile_function!();
        let index = idx.index();
        let entry = self
            .vec
            .get_mut(index as usize)
            .filter(|entry| entry.generation == idx.generation())?;
        let data = entry.data.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        Some(data)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop every entry. Slots handed out before the call stay invalid.
    pub fn clear(&mut self) {
        for (idx, entry) in self.vec.iter_mut().enumerate() {
            if entry.data.take().is_some() {
                entry.generation = entry.generation.wrapping_add(1);
                self.free.push(idx as u32);
            }
        }
        self.len = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = (IndexSlot, &T)> {
        self.vec.iter().enumerate().filter_map(|(idx, entry)| {
            entry
                .data
                .as_ref()
                .map(|data| (IndexSlot::new(entry.generation, idx as u32), data))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (IndexSlot, &mut T)> {
        self.vec.iter_mut().enumerate().filter_map(|(idx, entry)| {
            let generation = entry.generation;
            entry
                .data
                .as_mut()
                .map(|data| (IndexSlot::new(generation, idx as u32), data))
        })
    }
}

static_assertions::assert_eq_size!(IndexSlot, Option<IndexSlot>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_set_push() {
        let mut set = SparseSet::<u8>::new();
        let idx = set.push(15);
        assert_eq!(idx.generation(), 0);
        assert_eq!(idx.index(), 0);
        assert_eq!(set.get(idx), Some(&15));
    }

    #[test]
    fn test_sparse_set_stale_slot() {
        let mut set = SparseSet::<u8>::new();
        let _ = set.push(15);
        let idx = IndexSlot::new(1, 0);
        assert_eq!(set.get(idx), None);
    }

    #[test]
    fn test_sparse_set_remove_reuses_storage() {
        let mut set = SparseSet::<u8>::new();
        let idx = set.push(15);
        assert_eq!(set.remove(idx), Some(15));
        assert_eq!(set.remove(idx), None);
        let new_idx = set.push(45);
        assert_eq!(idx.index(), new_idx.index());
        assert_ne!(idx.generation(), new_idx.generation());
        assert_eq!(set.get(idx), None);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_sparse_set_iter_skips_removed() {
        let mut set = SparseSet::<u8>::new();

        for i in 0..100 {
            set.push(i);
        }
        set.remove(IndexSlot::new(0, 0));
        set.remove(IndexSlot::new(0, 1));
        let iter_collected: Vec<_> = set.iter().map(|(_, value)| *value).collect();
        assert_eq!(iter_collected.len(), 98);
        for i in 2..100 {
            assert_eq!(iter_collected[i - 2], i as u8);
        }
    }

    #[test]
    fn test_sparse_set_clear() {
        let mut set = SparseSet::<u8>::new();
        let a = set.push(1);
        set.push(2);
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.get(a), None);
        assert_eq!(set.iter().count(), 0);
    }
}
