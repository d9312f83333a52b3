//! Execution scopes
//!
//! Every operation that touches the engine runs inside an `ExecutionScope`.
//! Opening one takes the context's execution lock and enters the isolate,
//! which opens a handle arena. Dropping it leaves the isolate (closing the
//! arena, and collecting garbage if this was the outermost scope) and then
//! releases the lock, whichever way the operation ended.
//!
//! The lock is reentrant for the thread that holds it: a host callback
//! invoked from script runs its own operations in nested scopes.

use std::sync::{Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use crate::context::Context;
use crate::error::{Error, RuntimeError};
use crate::gc::{ObjectRef, Persistent};
use crate::isolate::Isolate;
use crate::runtime::value::JsValue;
use crate::vm::JsResult;

#[derive(Default)]
struct LockState {
    owner: Option<ThreadId>,
    depth: usize,
}

/// Process-wide execution lock, reentrant per thread
#[derive(Default)]
pub(crate) struct ExecutionLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl ExecutionLock {
    pub fn acquire(&self) -> LockGuard<'_> {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while state.owner.is_some_and(|owner| owner != me) {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.owner = Some(me);
        state.depth += 1;
        LockGuard { lock: self }
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).depth
    }
}

pub(crate) struct LockGuard<'a> {
    lock: &'a ExecutionLock,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.lock.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.lock.released.notify_one();
        }
    }
}

/// Scoped access to the engine
pub struct ExecutionScope<'a> {
    context: &'a Context,
    mark: usize,
    // Dropped after `Drop::drop` has left the isolate
    _lock: LockGuard<'a>,
}

impl<'a> ExecutionScope<'a> {
    pub fn new(context: &'a Context) -> Self {
        let lock = context.lock.acquire();
        let mark = context.isolate().enter();
        ExecutionScope {
            context,
            mark,
            _lock: lock,
        }
    }

    #[inline]
    pub fn context(&self) -> &'a Context {
        self.context
    }

    #[inline]
    pub fn isolate(&self) -> &'a Isolate {
        self.context.isolate()
    }

    /// Keep `value` alive until the scope closes
    pub fn local(&self, value: &JsValue) {
        if value.as_object().is_some() {
            self.isolate().local(value);
        }
    }

    /// The object behind a persistent handle of this context
    pub fn resolve(&self, handle: &Persistent) -> Result<ObjectRef, Error> {
        if !handle.is_from(self.isolate().heap().persistent()) {
            return Err(RuntimeError::ForeignValue.into());
        }
        Ok(handle.target())
    }

    /// Pin `target` beyond this scope
    pub fn persist(&self, target: ObjectRef) -> Persistent {
        Persistent::new(self.isolate().heap().persistent(), target)
    }

    /// Trap an engine failure as a script exception
    pub fn catch<T>(&self, result: JsResult<T>) -> Result<T, Error> {
        result.map_err(|exception| Error::Script(self.translate(exception)))
    }
}

impl Drop for ExecutionScope<'_> {
    fn drop(&mut self) {
        self.context.isolate().exit(self.mark);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::error::RuntimeError;
    use crate::test_support;

    #[test]
    fn test_lock_is_reentrant() {
        let lock = ExecutionLock::default();
        let outer = lock.acquire();
        let inner = lock.acquire();
        assert_eq!(lock.depth(), 2);
        drop(inner);
        drop(outer);
        assert_eq!(lock.depth(), 0);
    }

    #[test]
    fn test_lock_excludes_other_threads() {
        let lock = Arc::new(ExecutionLock::default());
        let entered = Arc::new(AtomicBool::new(false));
        let guard = lock.acquire();

        let waiter = {
            let lock = Arc::clone(&lock);
            let entered = Arc::clone(&entered);
            std::thread::spawn(move || {
                let _guard = lock.acquire();
                entered.store(true, Ordering::SeqCst);
            })
        };
        std::thread::sleep(Duration::from_millis(20));
        assert!(!entered.load(Ordering::SeqCst));
        drop(guard);
        waiter.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_scope_enters_and_exits() {
        let context = test_support::context();
        let isolate = context.isolate();
        assert!(!isolate.is_entered());
        {
            let outer = ExecutionScope::new(&context);
            let _inner = ExecutionScope::new(&context);
            assert!(outer.isolate().is_entered());
            assert_eq!(context.lock.depth(), 2);
        }
        assert!(!isolate.is_entered());
        assert_eq!(context.lock.depth(), 0);
    }

    #[test]
    fn test_locals_are_released_on_exit() {
        let context = test_support::context();
        {
            let scope = ExecutionScope::new(&context);
            let r = scope.isolate().new_object();
            scope.local(&JsValue::Object(r));
            assert_eq!(context.memory_stats().local_handles, 1);
        }
        assert_eq!(context.memory_stats().local_handles, 0);
    }

    #[test]
    fn test_catch_translates() {
        let context = test_support::context();
        let scope = ExecutionScope::new(&context);
        let result = scope.catch(scope.isolate().run_script("c.js", "null.x"));
        match result {
            Err(Error::Script(e)) => assert_eq!(e.file_name(), "c.js"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_foreign_handles_are_rejected() {
        let context = test_support::context();
        let registry = crate::gc::PersistentRegistry::new();
        let stray = Persistent::new(&registry, context.isolate().global());
        let scope = ExecutionScope::new(&context);
        assert!(matches!(
            scope.resolve(&stray),
            Err(Error::Runtime(RuntimeError::ForeignValue))
        ));
    }
}
