//! Host handlers
//!
//! Handlers are implemented by the host and called by the context. Each
//! carries a `retain`/`release` pair: the context retains a handler when it
//! is installed and releases it when it is replaced or the context goes
//! away. Hosts with their own reference counting hook in there; everybody
//! else can rely on the no-op defaults and the closure impls below.

use std::ffi::c_void;
use std::sync::{Arc, Mutex, PoisonError};

use crate::exception::ScriptException;

/// Receives every trapped script failure
pub trait ScriptExceptionHandler: Send + Sync {
    fn handle(&self, exception: ScriptException);
    fn retain(&self) {}
    fn release(&self) {}
}

/// Receives every contract violation, as a plain message
pub trait RuntimeExceptionHandler: Send + Sync {
    fn handle(&self, message: &str);
    fn retain(&self) {}
    fn release(&self) {}
}

/// Receives debug protocol responses and events (JSON text)
pub trait DebugMessageHandler: Send + Sync {
    fn handle(&self, message: &str);
    fn retain(&self) {}
    fn release(&self) {}
}

/// Frees the host pointer of a collected `External`
pub trait ExternalFreer: Send + Sync {
    fn free(&self, pointer: *mut c_void);
    fn retain(&self) {}
    fn release(&self) {}
}

impl<F> ScriptExceptionHandler for F
where
    F: Fn(ScriptException) + Send + Sync,
{
    fn handle(&self, exception: ScriptException) {
        self(exception)
    }
}

impl<F> RuntimeExceptionHandler for F
where
    F: Fn(&str) + Send + Sync,
{
    fn handle(&self, message: &str) {
        self(message)
    }
}

impl<F> DebugMessageHandler for F
where
    F: Fn(&str) + Send + Sync,
{
    fn handle(&self, message: &str) {
        self(message)
    }
}

impl<F> ExternalFreer for F
where
    F: Fn(*mut c_void) + Send + Sync,
{
    fn free(&self, pointer: *mut c_void) {
        self(pointer)
    }
}

/// Reference counting hooks shared by every handler trait object
pub(crate) trait Retained {
    fn retain_handler(&self);
    fn release_handler(&self);
}

macro_rules! retained {
    ($($handler:ident),*) => {
        $(
            impl Retained for dyn $handler {
                fn retain_handler(&self) {
                    $handler::retain(self)
                }

                fn release_handler(&self) {
                    $handler::release(self)
                }
            }
        )*
    };
}

retained!(ScriptExceptionHandler, RuntimeExceptionHandler, DebugMessageHandler);

/// One installed handler
pub(crate) struct HandlerSlot<T: ?Sized + Retained> {
    slot: Mutex<Option<Arc<T>>>,
}

impl<T: ?Sized + Retained> HandlerSlot<T> {
    pub fn new(handler: Option<Arc<T>>) -> Self {
        if let Some(handler) = &handler {
            handler.retain_handler();
        }
        HandlerSlot {
            slot: Mutex::new(handler),
        }
    }

    /// Install `handler`, releasing the previous one
    pub fn set(&self, handler: Option<Arc<T>>) {
        if let Some(handler) = &handler {
            handler.retain_handler();
        }
        let previous = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *slot, handler)
        };
        if let Some(previous) = previous {
            previous.release_handler();
        }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[cfg(test)]
    pub fn is_set(&self) -> bool {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

impl<T: ?Sized + Retained> Drop for HandlerSlot<T> {
    fn drop(&mut self) {
        let slot = self.slot.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handler) = slot.take() {
            handler.release_handler();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};

    use super::*;

    #[derive(Default)]
    struct Counted {
        refs: AtomicI32,
        messages: Mutex<Vec<String>>,
    }

    impl RuntimeExceptionHandler for Counted {
        fn handle(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }

        fn retain(&self) {
            self.refs.fetch_add(1, Ordering::SeqCst);
        }

        fn release(&self) {
            self.refs.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_slot_retains_and_releases() {
        let first = Arc::new(Counted::default());
        let second = Arc::new(Counted::default());

        let handler: Arc<dyn RuntimeExceptionHandler> = first.clone();
        let slot = HandlerSlot::new(Some(handler));
        assert_eq!(first.refs.load(Ordering::SeqCst), 1);

        let handler: Arc<dyn RuntimeExceptionHandler> = second.clone();
        slot.set(Some(handler));
        assert_eq!(first.refs.load(Ordering::SeqCst), 0);
        assert_eq!(second.refs.load(Ordering::SeqCst), 1);

        if let Some(handler) = slot.get() {
            handler.handle("hello");
        }
        assert_eq!(*second.messages.lock().unwrap(), vec!["hello".to_string()]);

        drop(slot);
        assert_eq!(second.refs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_closure_handlers() {
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&seen);
        let handler: Arc<dyn DebugMessageHandler> = Arc::new(move |message: &str| {
            sink.lock().unwrap().push_str(message);
        });
        let slot = HandlerSlot::new(Some(handler));
        assert!(slot.is_set());
        slot.get().unwrap().handle("{}");
        assert_eq!(*seen.lock().unwrap(), "{}");
        slot.set(None);
        assert!(!slot.is_set());
    }
}
