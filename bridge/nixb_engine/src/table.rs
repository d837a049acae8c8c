//! Generational handle tables.
//!
//! Every opaque handle the engine hands out is an index into one of these
//! tables plus the generation of the slot at the time of insertion. Removing
//! an entry bumps the slot's generation, so a stale handle (double free, use
//! after free) is detected instead of aliasing a newer entry.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct RawId {
    index: u32,
    generation: u32,
}

struct Slot<T> {
    generation: u32,
    entry: Option<T>,
}

pub(crate) struct Table<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Table<T> {
    pub(crate) fn new() -> Self {
        Table {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub(crate) fn insert(&mut self, entry: T) -> RawId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            return RawId {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(self.slots.len()).unwrap_or_else(|_| {
            panic!("handle table exhausted ({} slots)", self.slots.len())
        });
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        RawId {
            index,
            generation: 0,
        }
    }

    pub(crate) fn get(&self, id: RawId) -> Option<&T> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: RawId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    /// Remove an entry. Stale or unknown ids are ignored.
    pub(crate) fn remove(&mut self, id: RawId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(entry)
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::Table;

    #[test]
    fn stale_ids_do_not_alias_reused_slots() {
        let mut table = Table::new();
        let first = table.insert("first");
        assert_eq!(table.remove(first), Some("first"));
        let second = table.insert("second");
        assert_eq!(table.get(first), None);
        assert_eq!(table.get(second), Some(&"second"));
        assert_eq!(table.remove(first), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn double_remove_is_ignored() {
        let mut table = Table::new();
        let id = table.insert(1);
        assert_eq!(table.remove(id), Some(1));
        assert_eq!(table.remove(id), None);
        assert_eq!(table.len(), 0);
    }
}
