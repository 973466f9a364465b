//! Typed Handles and Fixed-Capacity Arenas
//!
//! Every thing and control block lives in a pre-sized arena and is referred
//! to by a `Handle<T>`: a slot index plus the generation the slot had when
//! the handle was issued. Freeing a slot bumps its generation, so handles
//! held by companions, targets or familiars go stale instead of silently
//! aliasing whatever is allocated next.
//!
//! ```text
//! slots:  [ gen 3 | Some(a) ][ gen 1 | None ][ gen 7 | Some(c) ] ...
//!                               ^ free list head
//! Handle { index: 2, generation: 7 }  -> live
//! Handle { index: 2, generation: 6 }  -> stale
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use serde::{Serialize, Deserialize};

/// Generation-counted reference into an `Arena<T>`.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Handle<T> {
    index: u32,
    generation: u32,
    #[serde(skip)]
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Build a handle from raw parts.
    pub const fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation, _marker: PhantomData }
    }

    /// Slot index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation this handle was issued for.
    #[inline]
    pub const fn generation(self) -> u32 {
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

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.index, self.generation).cmp(&(other.index, other.generation))
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Fixed-capacity slot storage.
///
/// Slots are reused lowest-index-first so allocation order is reproducible.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    capacity: usize,
    live: usize,
}

impl<T> Arena<T> {
    /// Create an empty arena that will hold at most `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity.min(4096)),
            capacity,
            live: 0,
        }
    }

    /// Maximum number of live values.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.live
    }

    /// True when nothing is allocated.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Store a value, returning `None` when the arena is full.
    pub fn insert(&mut self, value: T) -> Option<Handle<T>> {
        if let Some(index) = self.slots.iter().position(|s| s.value.is_none()) {
            let slot = &mut self.slots[index];
            slot.value = Some(value);
            self.live += 1;
            return Some(Handle::from_raw(index as u32, slot.generation));
        }
        if self.slots.len() >= self.capacity {
            return None;
        }
        self.slots.push(Slot { generation: 0, value: Some(value) });
        self.live += 1;
        Some(Handle::from_raw((self.slots.len() - 1) as u32, 0))
    }

    /// Remove a value. Stale handles remove nothing.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.live -= 1;
        Some(value)
    }

    /// True if the handle still refers to a live value.
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Borrow a live value.
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_ref())
    }

    /// Mutably borrow a live value.
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_mut())
    }

    /// Handles of all live values, in slot order.
    pub fn handles(&self) -> Vec<Handle<T>> {
        self.iter().map(|(h, _)| h).collect()
    }

    /// Iterate live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.value
                .as_ref()
                .map(|v| (Handle::from_raw(i as u32, s.generation), v))
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
