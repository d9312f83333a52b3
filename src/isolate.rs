//! Engine instance
//!
//! An `Isolate` owns the heap, the realm and the call stack. Every method
//! takes `&self` so that host code re-entered from a native function can
//! keep using the same instance. Mutable state sits behind `RefCell`s that
//! are never held across a call into script or host code.
//!
//! Collections only happen while no script is running. A request made
//! during a call is remembered and served when the outermost scope exits.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::ffi::c_void;
use std::rc::Rc;

use crate::builtins;
use crate::config::Config;
use crate::debug::DebugAgent;
use crate::gc::{GcStats, Heap, ObjectRef};
use crate::parser::Source;
use crate::runtime::object::JsObject;
use crate::runtime::realm::Realm;
use crate::runtime::value::JsValue;
use crate::vm::stack::CallStack;
use crate::vm::{ErrorKind, JsResult};

/// Engine version reported to hosts and debuggers
pub const VERSION: &str = concat!("mquickjs-simple ", env!("CARGO_PKG_VERSION"));

/// Heap counters, mostly for leak tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub live_objects: usize,
    pub persistent_handles: usize,
    pub weak_handles: usize,
    pub local_handles: usize,
    pub collections: usize,
}

pub struct Isolate {
    heap: RefCell<Heap>,
    realm: Realm,
    pub(crate) frames: RefCell<CallStack>,
    config: Config,
    /// Nesting of open execution scopes
    entered: Cell<usize>,
    /// Nesting of calls into functions and scripts
    call_depth: Cell<usize>,
    gc_requested: Cell<bool>,
    embedder: Cell<*const c_void>,
    scripts: RefCell<Vec<Rc<Source>>>,
    debugger: DebugAgent,
}

/// Decrements the call depth when a call returns or unwinds
pub(crate) struct CallGuard<'a> {
    isolate: &'a Isolate,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        let depth = self.isolate.call_depth.get();
        self.isolate.call_depth.set(depth.saturating_sub(1));
    }
}

impl Isolate {
    pub fn new(config: Config) -> Self {
        let mut heap = Heap::new();
        let realm = Realm::new(&mut heap);
        let isolate = Isolate {
            heap: RefCell::new(heap),
            realm,
            frames: RefCell::new(CallStack::new()),
            config,
            entered: Cell::new(0),
            call_depth: Cell::new(0),
            gc_requested: Cell::new(false),
            embedder: Cell::new(std::ptr::null()),
            scripts: RefCell::new(Vec::new()),
            debugger: DebugAgent::new(),
        };
        builtins::install(&isolate);
        log::debug!(
            "isolate created with {} intrinsic objects",
            isolate.heap().live_objects()
        );
        isolate
    }

    #[inline]
    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn global(&self) -> ObjectRef {
        self.realm.global
    }

    pub fn heap(&self) -> Ref<'_, Heap> {
        self.heap.borrow()
    }

    pub fn heap_mut(&self) -> RefMut<'_, Heap> {
        self.heap.borrow_mut()
    }

    pub fn alloc(&self, object: JsObject) -> ObjectRef {
        self.heap.borrow_mut().alloc(object)
    }

    /// Run `f` on a live object
    pub fn with_object<R>(&self, r: ObjectRef, f: impl FnOnce(&JsObject) -> R) -> R {
        f(self.heap.borrow().get(r))
    }

    pub fn with_object_mut<R>(&self, r: ObjectRef, f: impl FnOnce(&mut JsObject) -> R) -> R {
        f(self.heap.borrow_mut().get_mut(r))
    }

    // ----- scopes -----

    /// Enter the isolate and open a handle arena; returns the arena mark
    pub fn enter(&self) -> usize {
        self.entered.set(self.entered.get() + 1);
        self.heap.borrow_mut().open_arena()
    }

    /// Close the arena opened by `enter`
    ///
    /// Leaving the outermost scope is where pending or threshold-driven
    /// collections run.
    pub fn exit(&self, mark: usize) {
        self.heap.borrow_mut().close_arena(mark);
        let entered = self.entered.get().saturating_sub(1);
        self.entered.set(entered);
        if entered > 0 || self.call_depth.get() > 0 {
            return;
        }
        let due = self.gc_requested.get()
            || cfg!(feature = "debug-gc")
            || self.heap().allocated_since_collection() >= self.config.gc_threshold;
        if due {
            self.collect();
        }
    }

    pub fn is_entered(&self) -> bool {
        self.entered.get() > 0
    }

    /// Root a value in the innermost open arena
    pub fn local(&self, value: &JsValue) {
        self.heap.borrow_mut().push_local(value.clone());
    }

    #[inline]
    pub fn call_depth(&self) -> usize {
        self.call_depth.get()
    }

    pub(crate) fn enter_call(&self) -> JsResult<CallGuard<'_>> {
        let depth = self.call_depth.get();
        if depth >= self.config.max_call_depth {
            return Err(self.error(ErrorKind::RangeError, "Maximum call stack size exceeded"));
        }
        self.call_depth.set(depth + 1);
        Ok(CallGuard { isolate: self })
    }

    // ----- garbage collection -----

    /// Collect now, or at the outermost scope exit if a call is running
    pub fn collect_garbage(&self) -> Option<GcStats> {
        if self.call_depth.get() > 0 {
            self.gc_requested.set(true);
            return None;
        }
        Some(self.collect())
    }

    fn collect(&self) -> GcStats {
        self.gc_requested.set(false);
        let garbage = self.heap.borrow_mut().collect();
        let stats = garbage.stats;
        // Finalizers are host code and may re-enter the engine
        garbage.release();
        stats
    }

    /// Idle-time hint; returns true when no further work is pending
    pub fn idle_notification(&self, deadline_ms: u64) -> bool {
        let heap = self.heap();
        let pending = heap.allocated_since_collection() > 0 || self.gc_requested.get();
        drop(heap);
        if pending && deadline_ms > 0 && self.call_depth.get() == 0 {
            self.collect();
        }
        !self.gc_requested.get()
    }

    pub fn make_weak(&self, target: ObjectRef, finalizer: Box<dyn FnOnce()>) {
        self.heap.borrow_mut().make_weak(target, finalizer);
    }

    pub fn memory_stats(&self) -> MemoryStats {
        let heap = self.heap();
        MemoryStats {
            live_objects: heap.live_objects(),
            persistent_handles: heap.persistent().len(),
            weak_handles: heap.weak_handles(),
            local_handles: heap.local_handles(),
            collections: heap.collections(),
        }
    }

    // ----- embedder state -----

    pub fn set_embedder_data(&self, data: *const c_void) {
        self.embedder.set(data);
    }

    pub fn embedder_data(&self) -> *const c_void {
        self.embedder.get()
    }

    pub(crate) fn register_script(&self, source: &Rc<Source>) {
        self.scripts.borrow_mut().push(Rc::clone(source));
    }

    /// Names and line counts of every script compiled so far
    pub fn scripts(&self) -> Vec<(Rc<str>, usize)> {
        self.scripts
            .borrow()
            .iter()
            .map(|s| (Rc::clone(&s.name), s.line_count()))
            .collect()
    }

    pub fn debugger(&self) -> &DebugAgent {
        &self.debugger
    }
}

impl Drop for Isolate {
    fn drop(&mut self) {
        let garbage = self.heap.get_mut().teardown();
        log::debug!(
            "isolate torn down: {} objects, {} finalizers",
            garbage.stats.freed,
            garbage.stats.finalizers
        );
        garbage.release();
    }
}
