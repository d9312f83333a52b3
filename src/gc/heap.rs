//! Object heap
//!
//! Objects live in an index-addressed slot table. A slot is reused only
//! after the collector has proven its previous occupant unreachable, so an
//! `ObjectRef` held by any root stays valid.
//!
//! Root sets:
//! ```text
//! realm roots        intrinsics and the global object
//! handle arenas      locals opened by execution scopes (stack discipline)
//! persistent table   handles held by the host, any thread
//! ```

use std::sync::Arc;

use super::persistent::PersistentRegistry;
use crate::runtime::object::JsObject;
use crate::runtime::value::JsValue;

/// Index of an object in the heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef(u32);

impl ObjectRef {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[cfg(test)]
    pub(crate) fn from_index(index: usize) -> Self {
        ObjectRef(index as u32)
    }
}

pub(super) struct Slot {
    pub(super) object: Option<JsObject>,
    pub(super) marked: bool,
}

/// One-shot callback fired when its target is collected
pub(super) struct WeakRef {
    pub(super) target: ObjectRef,
    pub(super) finalizer: Box<dyn FnOnce()>,
}

pub struct Heap {
    pub(super) slots: Vec<Slot>,
    pub(super) free: Vec<u32>,
    pub(super) live: usize,
    /// Allocations since the last collection
    pub(super) allocated: usize,
    pub(super) collections: usize,
    /// Handle arena storage, shared by all open arenas
    pub(super) locals: Vec<JsValue>,
    /// Start offset of each open arena in `locals`
    arenas: Vec<usize>,
    pub(super) weak: Vec<WeakRef>,
    pub(super) roots: Vec<ObjectRef>,
    pub(super) persistent: Arc<PersistentRegistry>,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            slots: Vec::with_capacity(256),
            free: Vec::new(),
            live: 0,
            allocated: 0,
            collections: 0,
            locals: Vec::new(),
            arenas: Vec::new(),
            weak: Vec::new(),
            roots: Vec::new(),
            persistent: PersistentRegistry::new(),
        }
    }

    /// Allocate a new object
    pub fn alloc(&mut self, object: JsObject) -> ObjectRef {
        self.live += 1;
        self.allocated += 1;
        let slot = Slot {
            object: Some(object),
            marked: false,
        };
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = slot;
                ObjectRef(index)
            }
            None => {
                self.slots.push(slot);
                ObjectRef((self.slots.len() - 1) as u32)
            }
        }
    }

    pub fn try_get(&self, r: ObjectRef) -> Option<&JsObject> {
        self.slots.get(r.index()).and_then(|slot| slot.object.as_ref())
    }

    /// Access a live object
    ///
    /// A reference reachable from any root is never collected, so a miss
    /// here is an engine bug.
    pub fn get(&self, r: ObjectRef) -> &JsObject {
        match self.try_get(r) {
            Some(object) => object,
            None => unreachable!("object #{} used after collection", r.0),
        }
    }

    pub fn get_mut(&mut self, r: ObjectRef) -> &mut JsObject {
        match self.slots.get_mut(r.index()).and_then(|slot| slot.object.as_mut()) {
            Some(object) => object,
            None => unreachable!("object #{} used after collection", r.0),
        }
    }

    /// Replace the realm root set
    pub fn set_roots(&mut self, roots: Vec<ObjectRef>) {
        self.roots = roots;
    }

    /// Open a handle arena; returns its mark
    pub fn open_arena(&mut self) -> usize {
        let mark = self.locals.len();
        self.arenas.push(mark);
        mark
    }

    /// Drain an arena and every arena opened after it
    pub fn close_arena(&mut self, mark: usize) {
        while let Some(top) = self.arenas.pop() {
            if top <= mark {
                break;
            }
        }
        self.locals.truncate(mark);
    }

    /// Root a value in the innermost open arena
    pub fn push_local(&mut self, value: JsValue) {
        if value.as_object().is_some() && !self.arenas.is_empty() {
            self.locals.push(value);
        }
    }

    /// Register a finalizer that runs once `target` is collected
    pub fn make_weak(&mut self, target: ObjectRef, finalizer: Box<dyn FnOnce()>) {
        self.weak.push(WeakRef { target, finalizer });
    }

    pub fn persistent(&self) -> &Arc<PersistentRegistry> {
        &self.persistent
    }

    pub fn live_objects(&self) -> usize {
        self.live
    }

    pub fn allocated_since_collection(&self) -> usize {
        self.allocated
    }

    pub fn collections(&self) -> usize {
        self.collections
    }

    pub fn local_handles(&self) -> usize {
        self.locals.len()
    }

    pub fn weak_handles(&self) -> usize {
        self.weak.len()
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::object::JsObject;

    #[test]
    fn test_alloc_and_access() {
        let mut heap = Heap::new();
        let a = heap.alloc(JsObject::ordinary(None));
        let b = heap.alloc(JsObject::ordinary(Some(a)));

        assert_ne!(a, b);
        assert_eq!(heap.get(b).proto, Some(a));
        assert_eq!(heap.live_objects(), 2);
        assert!(heap.try_get(ObjectRef(99)).is_none());
    }

    #[test]
    fn test_arena_stack() {
        let mut heap = Heap::new();
        let object = heap.alloc(JsObject::ordinary(None));

        let outer = heap.open_arena();
        heap.push_local(JsValue::Object(object));
        let inner = heap.open_arena();
        heap.push_local(JsValue::Object(object));
        heap.push_local(JsValue::Number(1.0)); // primitives need no rooting
        assert_eq!(heap.local_handles(), 2);

        heap.close_arena(inner);
        assert_eq!(heap.local_handles(), 1);
        heap.close_arena(outer);
        assert_eq!(heap.local_handles(), 0);
    }
}
