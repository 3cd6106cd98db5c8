use std::fmt;

use serde::{Deserialize, Serialize};

/// A generational entity handle. Compact u32 index + generation.
///
/// Handles never own the entity they point at. A handle to a despawned entity
/// simply stops resolving, which is what status effects rely on to remember
/// who applied them without keeping that entity around.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    index: u32,
    generation: u32,
}

impl EntityId {
    /// Create an entity handle from raw parts (mainly for testing).
    pub fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The slot index of this entity.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The generation of this entity (incremented on reuse).
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Allocates and recycles entity slots with generational tracking.
#[derive(Debug, Clone, Default)]
pub struct EntityAllocator {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_list: Vec<u32>,
    len: usize,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new entity, reusing a freed slot if available.
    pub fn allocate(&mut self) -> EntityId {
        self.len += 1;
        if let Some(index) = self.free_list.pop() {
            self.alive[index as usize] = true;
            EntityId {
                index,
                generation: self.generations[index as usize],
            }
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            EntityId {
                index,
                generation: 0,
            }
        }
    }

    /// Deallocate an entity. Returns `true` if it was allocated.
    pub fn deallocate(&mut self, entity: EntityId) -> bool {
        if !self.is_allocated(entity) {
            return false;
        }
        let idx = entity.index as usize;
        self.alive[idx] = false;
        self.generations[idx] += 1;
        self.free_list.push(entity.index);
        self.len -= 1;
        true
    }

    /// Check if a handle still refers to a live slot.
    pub fn is_allocated(&self, entity: EntityId) -> bool {
        let idx = entity.index as usize;
        idx < self.alive.len() && self.alive[idx] && self.generations[idx] == entity.generation
    }

    /// Number of currently allocated entities.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no allocated entities.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots ever created (allocated or free).
    pub fn capacity(&self) -> usize {
        self.generations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_sequential() {
        let mut alloc = EntityAllocator::new();
        let e0 = alloc.allocate();
        let e1 = alloc.allocate();
        assert_eq!(e0.index(), 0);
        assert_eq!(e1.index(), 1);
        assert_eq!(e0.generation(), 0);
        assert_eq!(alloc.len(), 2);
    }

    #[test]
    fn test_deallocate_and_reuse() {
        let mut alloc = EntityAllocator::new();
        let e0 = alloc.allocate();
        assert!(alloc.deallocate(e0));
        let reused = alloc.allocate();
        assert_eq!(reused.index(), 0);
        assert_eq!(reused.generation(), 1);
        assert_ne!(e0, reused);
        assert_eq!(alloc.capacity(), 1);
    }

    #[test]
    fn test_double_deallocate_fails() {
        let mut alloc = EntityAllocator::new();
        let e = alloc.allocate();
        assert!(alloc.deallocate(e));
        assert!(!alloc.deallocate(e));
        assert!(alloc.is_empty());
    }

    #[test]
    fn test_stale_handle_not_allocated() {
        let mut alloc = EntityAllocator::new();
        let e0 = alloc.allocate();
        alloc.deallocate(e0);
        assert!(!alloc.is_allocated(e0));
        let fresh = alloc.allocate();
        assert!(alloc.is_allocated(fresh));
    }

    #[test]
    fn test_display_format() {
        let e = EntityId::from_raw(3, 2);
        assert_eq!(e.to_string(), "3v2");
        assert_eq!(format!("{e:?}"), "Entity(3v2)");
    }
}
