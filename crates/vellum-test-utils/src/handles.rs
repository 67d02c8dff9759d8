//! Slot+generation handle table for the fake engine's objects.
//!
//! Handles are non-zero `u32`s: the upper 20 bits hold `slot + 1`, the lower
//! 12 bits the generation. Removing a value bumps its slot's generation, so
//! a stale handle resolves to `None` instead of aliasing a newer object.

const GENERATION_BITS: u32 = 12;
const GENERATION_MASK: u32 = (1 << GENERATION_BITS) - 1;

fn encode(slot: u32, generation: u32) -> u32 {
    ((slot + 1) << GENERATION_BITS) | (generation & GENERATION_MASK)
}

fn decode(handle: u32) -> Option<(u32, u32)> {
    let slot = (handle >> GENERATION_BITS).checked_sub(1)?;
    Some((slot, handle & GENERATION_MASK))
}

struct Slot<T> {
    generation: u32,
    data: Option<T>,
}

/// Maps non-zero `u32` handles to owned values.
pub(crate) struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
}

impl<T> HandleTable<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    pub fn insert(&mut self, value: T) -> u32 {
        if let Some(slot_idx) = self.free_list.pop() {
            let slot = &mut self.slots[slot_idx as usize];
            slot.data = Some(value);
            encode(slot_idx, slot.generation)
        } else {
            let slot_idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                data: Some(value),
            });
            encode(slot_idx, 0)
        }
    }

    pub fn get(&self, handle: u32) -> Option<&T> {
        let (slot_idx, generation) = decode(handle)?;
        let slot = self.slots.get(slot_idx as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.data.as_ref()
    }

    pub fn get_mut(&mut self, handle: u32) -> Option<&mut T> {
        let (slot_idx, generation) = decode(handle)?;
        let slot = self.slots.get_mut(slot_idx as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.data.as_mut()
    }

    /// Removing a stale handle returns `None`. A slot whose generation would
    /// wrap is retired rather than recycled.
    pub fn remove(&mut self, handle: u32) -> Option<T> {
        let (slot_idx, generation) = decode(handle)?;
        let slot = self.slots.get_mut(slot_idx as usize)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.data.take()?;
        slot.generation = (slot.generation + 1) & GENERATION_MASK;
        if slot.generation != 0 {
            self.free_list.push(slot_idx);
        }
        Some(value)
    }

    /// Iterate live `(handle, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.data
                .as_ref()
                .map(|data| (encode(i as u32, slot.generation), data))
        })
    }

    /// Remove and return every live value matching `pred`.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> Vec<T> {
        let doomed: Vec<u32> = self
            .iter()
            .filter(|(_, v)| pred(v))
            .map(|(h, _)| h)
            .collect();
        doomed
            .into_iter()
            .filter_map(|handle| self.remove(handle))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_never_zero() {
        let mut table = HandleTable::new();
        for i in 0..100 {
            assert_ne!(table.insert(i), 0);
        }
        assert_eq!(decode(0), None);
    }

    #[test]
    fn insert_get_round_trip() {
        let mut table = HandleTable::new();
        let h = table.insert(42i32);
        assert_eq!(table.get(h), Some(&42));
    }

    #[test]
    fn stale_generation_returns_none() {
        let mut table = HandleTable::new();
        let h = table.insert(1i32);
        table.remove(h);
        assert_eq!(table.get(h), None);
        assert_eq!(table.get_mut(h), None);
        assert_eq!(table.remove(h), None);
    }

    #[test]
    fn free_list_reuses_slots_with_new_generation() {
        let mut table = HandleTable::new();
        let h1 = table.insert(1i32);
        table.remove(h1);
        let h2 = table.insert(2i32);
        let (slot1, gen1) = decode(h1).unwrap();
        let (slot2, gen2) = decode(h2).unwrap();
        assert_eq!(slot1, slot2);
        assert_eq!(gen2, gen1 + 1);
        assert_eq!(table.get(h1), None);
    }

    #[test]
    fn generation_exhaustion_retires_slot() {
        let mut table = HandleTable::new();
        let h = table.insert(1i32);
        table.remove(h);
        table.slots[0].generation = GENERATION_MASK;
        table.free_list.clear();
        table.free_list.push(0);
        let h2 = table.insert(2i32);
        table.remove(h2);
        assert!(table.free_list.is_empty());
        let h3 = table.insert(3i32);
        assert_eq!(decode(h3).unwrap().0, 1);
    }

    #[test]
    fn remove_where_counts_and_invalidates() {
        let mut table = HandleTable::new();
        let a = table.insert(1i32);
        let b = table.insert(2i32);
        let c = table.insert(3i32);
        assert_eq!(table.remove_where(|v| *v % 2 == 1), vec![1, 3]);
        assert_eq!(table.get(a), None);
        assert_eq!(table.get(b), Some(&2));
        assert_eq!(table.get(c), None);
    }
}
