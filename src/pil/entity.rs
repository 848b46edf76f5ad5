//! Generation-checked arenas backing the instruction graph.
//!
//! Every entity of a [`Function`](crate::pil::Function) (values, instructions, blocks and
//! operands) lives in an [`Arena`] and is referred to by a small `Copy` handle holding the
//! slot index and the slot generation at the time the entity was created. Erasing an
//! entity bumps the generation of its slot, so stale handles are detected instead of
//! silently aliasing whatever reuses the slot later.
//!
//! Free slots are recycled in LIFO order which keeps handle assignment a pure function of
//! the sequence of edits, an important property for reproducible pass output.

/// Trait implemented by all handle types produced by `entity_id!`.
pub trait EntityId: Copy + Eq {
    /// Builds a handle from its raw parts.
    fn from_parts(index: u32, generation: u32) -> Self;

    /// Slot index inside the arena.
    fn slot(self) -> usize;

    /// Generation of the slot this handle was issued for.
    fn generation(self) -> u32;
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    item: Option<T>,
}

/// An arena of `T` addressed by generation-checked handles `I`.
#[derive(Debug, Clone)]
pub struct Arena<I, T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
    _marker: std::marker::PhantomData<I>,
}

impl<I: EntityId, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: EntityId, T> Arena<I, T> {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            _marker: std::marker::PhantomData,
        }
    }

    /// Stores `item` and returns its handle.
    pub fn alloc(&mut self, item: T) -> I {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.item = Some(item);
            return I::from_parts(index, slot.generation);
        }

        let index = u32::try_from(self.slots.len()).expect("arena exceeded u32::MAX entries");
        self.slots.push(Slot {
            generation: 0,
            item: Some(item),
        });
        I::from_parts(index, 0)
    }

    /// Removes the entity behind `id`, returning it if the handle was live.
    pub fn free(&mut self, id: I) -> Option<T> {
        let slot = self.slots.get_mut(id.slot())?;
        if slot.generation != id.generation() {
            return None;
        }

        let item = slot.item.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.slot() as u32);
        self.live -= 1;
        Some(item)
    }

    /// Returns `true` if `id` refers to a live entity.
    #[must_use]
    pub fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    /// Looks up a live entity.
    #[must_use]
    pub fn get(&self, id: I) -> Option<&T> {
        self.slots
            .get(id.slot())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.item.as_ref())
    }

    /// Looks up a live entity mutably.
    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots
            .get_mut(id.slot())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.item.as_mut())
    }

    /// Number of live entities.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if no entity is live.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterates live entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.item
                .as_ref()
                .map(|item| (I::from_parts(index as u32, slot.generation), item))
        })
    }
}

impl<I: EntityId, T> std::ops::Index<I> for Arena<I, T> {
    type Output = T;

    fn index(&self, id: I) -> &T {
        match self.get(id) {
            Some(item) => item,
            None => panic!("use of erased entity (slot {})", id.slot()),
        }
    }
}

impl<I: EntityId, T> std::ops::IndexMut<I> for Arena<I, T> {
    fn index_mut(&mut self, id: I) -> &mut T {
        let slot = id.slot();
        match self.get_mut(id) {
            Some(item) => item,
            None => panic!("use of erased entity (slot {slot})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pil::ValueId;

    #[test]
    fn test_stale_handle_is_rejected() {
        let mut arena: Arena<ValueId, &str> = Arena::new();
        let a = arena.alloc("a");
        assert_eq!(arena.free(a), Some("a"));

        let b = arena.alloc("b");
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_double_free_is_noop() {
        let mut arena: Arena<ValueId, u32> = Arena::new();
        let a = arena.alloc(1);
        assert!(arena.free(a).is_some());
        assert!(arena.free(a).is_none());
        assert!(arena.is_empty());
    }

    #[test]
    #[should_panic(expected = "use of erased entity")]
    fn test_index_erased_panics() {
        let mut arena: Arena<ValueId, u32> = Arena::new();
        let a = arena.alloc(1);
        arena.free(a);
        let _ = arena[a];
    }
}
