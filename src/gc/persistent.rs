//! Persistent handles
//!
//! A persistent handle pins one heap object across execution scopes until
//! it is dropped. The registry is shared between the heap, which reads it
//! as a root set, and every handle, which may be released from any thread
//! without taking the execution lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::ObjectRef;

#[derive(Default)]
struct Slots {
    entries: Vec<Option<ObjectRef>>,
    free: Vec<usize>,
    live: usize,
}

/// Slot table of pinned objects
#[derive(Default)]
pub struct PersistentRegistry {
    slots: Mutex<Slots>,
}

impl PersistentRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        // A panic while holding the lock leaves the table consistent
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pin(&self, target: ObjectRef) -> usize {
        let mut slots = self.slots();
        slots.live += 1;
        match slots.free.pop() {
            Some(slot) => {
                slots.entries[slot] = Some(target);
                slot
            }
            None => {
                slots.entries.push(Some(target));
                slots.entries.len() - 1
            }
        }
    }

    fn release(&self, slot: usize) {
        let mut slots = self.slots();
        if let Some(entry) = slots.entries.get_mut(slot) {
            if entry.take().is_some() {
                slots.live -= 1;
                slots.free.push(slot);
            }
        }
    }

    /// Every pinned object
    pub fn roots(&self) -> Vec<ObjectRef> {
        self.slots().entries.iter().flatten().copied().collect()
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.slots().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A strong, scope-independent reference to a heap object
pub struct Persistent {
    target: ObjectRef,
    slot: usize,
    registry: Arc<PersistentRegistry>,
}

impl Persistent {
    pub fn new(registry: &Arc<PersistentRegistry>, target: ObjectRef) -> Self {
        Persistent {
            target,
            slot: registry.pin(target),
            registry: Arc::clone(registry),
        }
    }

    /// The pinned object
    #[inline]
    pub fn target(&self) -> ObjectRef {
        self.target
    }

    /// Whether this handle was issued by `registry`
    pub fn is_from(&self, registry: &Arc<PersistentRegistry>) -> bool {
        Arc::ptr_eq(&self.registry, registry)
    }
}

impl Clone for Persistent {
    fn clone(&self) -> Self {
        Persistent::new(&self.registry, self.target)
    }
}

impl Drop for Persistent {
    fn drop(&mut self) {
        self.registry.release(self.slot);
    }
}

impl std::fmt::Debug for Persistent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Persistent(#{})", self.target.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_and_release() {
        let registry = PersistentRegistry::new();
        let a = Persistent::new(&registry, ObjectRef::from_index(3));
        let b = a.clone();
        assert_eq!(registry.len(), 2);
        assert_eq!(b.target(), ObjectRef::from_index(3));

        drop(a);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.roots(), vec![ObjectRef::from_index(3)]);

        drop(b);
        assert!(registry.is_empty());
        assert!(registry.roots().is_empty());
    }

    #[test]
    fn test_slots_are_reused() {
        let registry = PersistentRegistry::new();
        let a = Persistent::new(&registry, ObjectRef::from_index(1));
        drop(a);
        let _b = Persistent::new(&registry, ObjectRef::from_index(2));
        assert_eq!(registry.slots().entries.len(), 1);
    }

    #[test]
    fn test_registry_identity() {
        let first = PersistentRegistry::new();
        let second = PersistentRegistry::new();
        let handle = Persistent::new(&first, ObjectRef::from_index(0));
        assert!(handle.is_from(&first));
        assert!(!handle.is_from(&second));
    }

    #[test]
    fn test_release_from_another_thread() {
        let registry = PersistentRegistry::new();
        let handle = Persistent::new(&registry, ObjectRef::from_index(7));
        std::thread::spawn(move || drop(handle)).join().unwrap();
        assert!(registry.is_empty());
    }
}
