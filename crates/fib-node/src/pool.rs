//! Generational object pool.
//!
//! A [`Pool`] hands out [`Index`] handles made of a slot number and the
//! slot's generation. Freeing an object bumps the generation, so an old
//! handle to a reused slot no longer resolves.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use thiserror::Error;

/// Error type for pool operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("{pool} pool exhausted (capacity {capacity})")]
    Exhausted { pool: &'static str, capacity: usize },
}

/// An untyped generational handle, used where objects of several kinds
/// are referenced together (graph children).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex {
    slot: u32,
    generation: u32,
}

impl NodeIndex {
    pub const fn slot(&self) -> u32 {
        self.slot
    }

    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slot)
    }
}

/// A typed generational handle into a `Pool<T>`.
pub struct Index<T> {
    raw: NodeIndex,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Index<T> {
    const fn new(slot: u32, generation: u32) -> Self {
        Self {
            raw: NodeIndex { slot, generation },
            _marker: PhantomData,
        }
    }

    /// Re-types an untyped handle. The pool still validates it on use.
    pub const fn from_untyped(raw: NodeIndex) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub const fn untyped(&self) -> NodeIndex {
        self.raw
    }

    /// The slot number, which is what the object is shown as.
    pub const fn slot(&self) -> u32 {
        self.raw.slot
    }
}

impl<T> Clone for Index<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Index<T> {}

impl<T> PartialEq for Index<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Index<T> {}

impl<T> PartialOrd for Index<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Index<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T> Hash for Index<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> fmt::Debug for Index<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Index({}v{})", self.raw.slot, self.raw.generation)
    }
}

impl<T> fmt::Display for Index<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw.slot)
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// A bounded arena of `T` addressed by generational handles.
#[derive(Debug, Clone)]
pub struct Pool<T> {
    name: &'static str,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
    capacity: usize,
}

impl<T> Pool<T> {
    /// Creates a pool that holds at most `capacity` live objects.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            capacity,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots ever allocated, live or free.
    pub fn allocated(&self) -> usize {
        self.slots.len()
    }

    /// Stores `value` and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Exhausted` when the pool is at capacity.
    pub fn alloc(&mut self, value: T) -> Result<Index<T>, PoolError> {
        if self.len >= self.capacity {
            return Err(PoolError::Exhausted {
                pool: self.name,
                capacity: self.capacity,
            });
        }

        self.len += 1;
        if let Some(slot) = self.free.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.value = Some(value);
            return Ok(Index::new(slot, entry.generation));
        }

        let slot = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Ok(Index::new(slot, 0))
    }

    /// Removes the object, invalidating every handle to it.
    pub fn free(&mut self, index: Index<T>) -> Option<T> {
        let entry = self.slots.get_mut(index.raw.slot as usize)?;
        if entry.generation != index.raw.generation {
            return None;
        }
        let value = entry.value.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(index.raw.slot);
        self.len -= 1;
        Some(value)
    }

    pub fn get(&self, index: Index<T>) -> Option<&T> {
        self.slots
            .get(index.raw.slot as usize)
            .filter(|entry| entry.generation == index.raw.generation)
            .and_then(|entry| entry.value.as_ref())
    }

    pub fn get_mut(&mut self, index: Index<T>) -> Option<&mut T> {
        self.slots
            .get_mut(index.raw.slot as usize)
            .filter(|entry| entry.generation == index.raw.generation)
            .and_then(|entry| entry.value.as_mut())
    }

    pub fn contains(&self, index: Index<T>) -> bool {
        self.get(index).is_some()
    }

    /// Iterates live objects in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Index<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(slot, entry)| {
            entry
                .value
                .as_ref()
                .map(|value| (Index::new(slot as u32, entry.generation), value))
        })
    }

    /// Handles of all live objects, in slot order.
    pub fn indices(&self) -> Vec<Index<T>> {
        self.iter().map(|(index, _)| index).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_alloc_get_free() {
        let mut pool: Pool<&str> = Pool::new("test", 4);
        let a = pool.alloc("a").unwrap();
        let b = pool.alloc("b").unwrap();

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(a), Some(&"a"));
        assert_eq!(pool.free(a), Some("a"));
        assert_eq!(pool.get(a), None);
        assert_eq!(pool.free(a), None);
        assert_eq!(pool.get(b), Some(&"b"));
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut pool: Pool<u32> = Pool::new("test", 4);
        let old = pool.alloc(1).unwrap();
        pool.free(old);
        let new = pool.alloc(2).unwrap();

        assert_eq!(old.slot(), new.slot());
        assert_ne!(old, new);
        assert_eq!(pool.get(old), None);
        assert_eq!(pool.get(new), Some(&2));
    }

    #[test]
    fn test_exhaustion() {
        let mut pool: Pool<u32> = Pool::new("entry", 1);
        let first = pool.alloc(1).unwrap();
        assert_eq!(
            pool.alloc(2),
            Err(PoolError::Exhausted {
                pool: "entry",
                capacity: 1
            })
        );
        pool.free(first);
        assert!(pool.alloc(3).is_ok());
    }

    #[test]
    fn test_untyped_round_trip() {
        let mut pool: Pool<u32> = Pool::new("test", 2);
        let index = pool.alloc(9).unwrap();
        let back: Index<u32> = Index::from_untyped(index.untyped());
        assert_eq!(pool.get(back), Some(&9));
    }

    #[test]
    fn test_iter_skips_free_slots() {
        let mut pool: Pool<u32> = Pool::new("test", 3);
        let a = pool.alloc(10).unwrap();
        let _b = pool.alloc(20).unwrap();
        pool.free(a);
        let live: Vec<u32> = pool.iter().map(|(_, v)| *v).collect();
        assert_eq!(live, vec![20]);
        assert_eq!(pool.allocated(), 2);
    }
}
