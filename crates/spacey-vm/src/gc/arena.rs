//! Generational arena storage for heap cells.
//!
//! Cells are addressed by a [`Handle`] holding a slot index and the
//! generation of the slot when the cell was allocated. Freeing a cell bumps
//! the generation, so a handle that outlived its cell is detected on access
//! instead of aliasing whatever reuses the slot.
//!
//! ```text
//! slots:  [ gen 0 | A ][ gen 3 | free ][ gen 1 | C ]
//!                             ^
//!                      free list head
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::error::{Error, Result};

/// A checked reference to a cell of an [`Arena`].
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Returns the slot index of this handle.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the generation this handle was issued for.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    marked: bool,
    value: Option<T>,
}

/// Slot storage with free-list reuse.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Stores `value` and returns its handle.
    pub fn alloc(&mut self, value: T) -> Handle<T> {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            slot.marked = false;
            return Handle::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            marked: false,
            value: Some(value),
        });
        Handle::new(index, 0)
    }

    fn slot(&self, handle: Handle<T>) -> Option<&Slot<T>> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.value.is_some())
    }

    /// Whether `handle` still refers to a live cell.
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.slot(handle).is_some()
    }

    /// Borrows a cell.
    #[inline]
    pub fn get(&self, handle: Handle<T>) -> Result<&T> {
        self.slot(handle)
            .and_then(|slot| slot.value.as_ref())
            .ok_or_else(|| stale(handle))
    }

    /// Mutably borrows a cell.
    #[inline]
    pub fn get_mut(&mut self, handle: Handle<T>) -> Result<&mut T> {
        match self.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation => {
                slot.value.as_mut().ok_or_else(|| stale(handle))
            }
            _ => Err(stale(handle)),
        }
    }

    /// Number of live cells.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether the arena holds no live cells.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Sets the mark bit of a live cell. Returns `true` the first time.
    pub(crate) fn mark(&mut self, handle: Handle<T>) -> bool {
        match self.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation && slot.value.is_some() && !slot.marked => {
                slot.marked = true;
                true
            }
            _ => false,
        }
    }

    /// Whether a live cell was marked in the current collection.
    pub(crate) fn is_marked(&self, handle: Handle<T>) -> bool {
        self.slot(handle).is_some_and(|slot| slot.marked)
    }

    /// Frees every unmarked cell and clears the marks of the rest.
    /// Returns the number of cells freed.
    pub(crate) fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.is_none() {
                continue;
            }
            if slot.marked {
                slot.marked = false;
                continue;
            }
            slot.value = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index as u32);
            freed += 1;
        }
        self.live -= freed;
        freed
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn stale<T>(handle: Handle<T>) -> Error {
    Error::InternalError(format!("stale heap handle {handle:?}"))
}
