//! Mark-sweep garbage collector
//!
//! The GC works in three phases:
//! 1. Mark: traverse every object reachable from the roots
//! 2. Weak processing: detach finalizers whose targets stayed unmarked
//! 3. Sweep: free unmarked slots and push them on the free list
//!
//! Finalizers and external freers are host code. They are handed back in
//! a `Garbage` value and run by the caller once the heap is no longer
//! borrowed.

use std::ffi::c_void;

use super::heap::{Heap, ObjectRef};
use crate::runtime::object::{JsObject, ObjectKind};

/// Statistics of one collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    pub marked: usize,
    pub freed: usize,
    pub finalizers: usize,
}

type Freer = Box<dyn FnOnce(*mut c_void)>;

/// Work left over from a collection
#[must_use = "finalizers only run when the garbage is released"]
pub struct Garbage {
    pub stats: GcStats,
    finalizers: Vec<Box<dyn FnOnce()>>,
    freers: Vec<(Freer, *mut c_void)>,
    objects: Vec<JsObject>,
}

impl Garbage {
    /// Run finalizers, then freers, then drop the swept objects
    pub fn release(self) {
        for finalizer in self.finalizers {
            finalizer();
        }
        for (free, pointer) in self.freers {
            free(pointer);
        }
        drop(self.objects);
    }

    fn sweep_object(&mut self, mut object: JsObject) {
        if let ObjectKind::External(data) = &mut object.kind {
            if let Some(free) = data.freer.take() {
                self.freers.push((free, data.pointer));
            }
        }
        self.objects.push(object);
    }
}

impl Heap {
    /// Run a full collection
    pub fn collect(&mut self) -> Garbage {
        let marked = self.mark();
        let mut garbage = Garbage {
            stats: GcStats {
                marked,
                ..GcStats::default()
            },
            finalizers: Vec::new(),
            freers: Vec::new(),
            objects: Vec::new(),
        };

        // Weak references to unmarked targets fire exactly once
        let slots = &self.slots;
        let (dead, alive): (Vec<_>, Vec<_>) = std::mem::take(&mut self.weak)
            .into_iter()
            .partition(|weak| !slots.get(weak.target.index()).is_some_and(|s| s.marked));
        self.weak = alive;
        garbage.stats.finalizers = dead.len();
        garbage.finalizers = dead.into_iter().map(|weak| weak.finalizer).collect();

        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.marked {
                slot.marked = false;
                continue;
            }
            if let Some(object) = slot.object.take() {
                garbage.sweep_object(object);
                self.free.push(index as u32);
                garbage.stats.freed += 1;
            }
        }

        self.live -= garbage.stats.freed;
        self.allocated = 0;
        self.collections += 1;
        log::trace!(
            "gc #{}: {} live, {} freed, {} finalizers",
            self.collections,
            marked,
            garbage.stats.freed,
            garbage.stats.finalizers
        );
        garbage
    }

    /// Release everything: used when the engine is torn down
    pub fn teardown(&mut self) -> Garbage {
        self.roots.clear();
        self.locals.clear();
        let mut garbage = Garbage {
            stats: GcStats::default(),
            finalizers: self.weak.drain(..).map(|weak| weak.finalizer).collect(),
            freers: Vec::new(),
            objects: Vec::new(),
        };
        garbage.stats.finalizers = garbage.finalizers.len();
        for slot in &mut self.slots {
            if let Some(object) = slot.object.take() {
                garbage.sweep_object(object);
                garbage.stats.freed += 1;
            }
        }
        self.live = 0;
        garbage
    }

    fn mark(&mut self) -> usize {
        let mut worklist: Vec<ObjectRef> = self.roots.clone();
        worklist.extend(self.locals.iter().filter_map(|v| v.as_object()));
        worklist.extend(self.persistent.roots());

        let mut marked = 0;
        let mut children = Vec::new();
        while let Some(r) = worklist.pop() {
            let Some(slot) = self.slots.get_mut(r.index()) else {
                continue;
            };
            if slot.marked {
                continue;
            }
            let Some(object) = slot.object.as_ref() else {
                continue;
            };
            slot.marked = true;
            marked += 1;
            object.trace(&mut children);
            worklist.append(&mut children);
        }
        marked
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::gc::{Heap, Persistent};
    use crate::runtime::object::{ClassId, ExternalData, JsObject, ObjectKind};
    use crate::runtime::value::JsValue;

    #[test]
    fn test_unreachable_objects_are_freed() {
        let mut heap = Heap::new();
        let root = heap.alloc(JsObject::ordinary(None));
        let child = heap.alloc(JsObject::ordinary(None));
        heap.alloc(JsObject::ordinary(None)); // garbage
        heap.get_mut(root).set_own("child", JsValue::Object(child)).unwrap();
        heap.set_roots(vec![root]);

        let garbage = heap.collect();
        assert_eq!(garbage.stats.marked, 2);
        assert_eq!(garbage.stats.freed, 1);
        garbage.release();
        assert_eq!(heap.live_objects(), 2);
        assert!(heap.try_get(child).is_some());
    }

    #[test]
    fn test_cycles_are_collected() {
        let mut heap = Heap::new();
        let a = heap.alloc(JsObject::ordinary(None));
        let b = heap.alloc(JsObject::ordinary(Some(a)));
        heap.get_mut(a).set_own("b", JsValue::Object(b)).unwrap();

        heap.collect().release();
        assert_eq!(heap.live_objects(), 0);
    }

    #[test]
    fn test_locals_and_persistents_are_roots() {
        let mut heap = Heap::new();
        let local = heap.alloc(JsObject::ordinary(None));
        let pinned = heap.alloc(JsObject::ordinary(None));

        let mark = heap.open_arena();
        heap.push_local(JsValue::Object(local));
        let handle = Persistent::new(heap.persistent(), pinned);

        heap.collect().release();
        assert_eq!(heap.live_objects(), 2);

        heap.close_arena(mark);
        drop(handle);
        heap.collect().release();
        assert_eq!(heap.live_objects(), 0);
    }

    #[test]
    fn test_weak_finalizer_runs_once() {
        let mut heap = Heap::new();
        let target = heap.alloc(JsObject::ordinary(None));
        let handle = Persistent::new(heap.persistent(), target);
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        heap.make_weak(target, Box::new(move || counter.set(counter.get() + 1)));

        heap.collect().release();
        assert_eq!(fired.get(), 0);

        drop(handle);
        heap.collect().release();
        heap.collect().release();
        assert_eq!(fired.get(), 1);
        assert_eq!(heap.weak_handles(), 0);
    }

    #[test]
    fn test_external_freer_on_sweep_and_teardown() {
        let freed = Rc::new(Cell::new(0usize));
        let mut heap = Heap::new();
        for pointer in [0x10usize, 0x20] {
            let counter = Rc::clone(&freed);
            heap.alloc(JsObject::new(
                ClassId::External,
                None,
                ObjectKind::External(ExternalData {
                    pointer: pointer as *mut _,
                    freer: Some(Box::new(move |p| counter.set(counter.get() + p as usize))),
                    payload: None,
                }),
            ));
        }
        let kept = Persistent::new(heap.persistent(), crate::gc::ObjectRef::from_index(1));

        heap.collect().release();
        assert_eq!(freed.get(), 0x10);

        heap.teardown().release();
        assert_eq!(freed.get(), 0x30);
        drop(kept);
    }
}
