//! Helpers for tests that need an engine context
//!
//! Only one context may be live per process, so tests take a process-wide
//! lock for as long as their context exists.

use std::ops::Deref;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::context::{ContextOptions, EngineContext};

static SERIAL: Mutex<()> = Mutex::new(());

/// Hold while a test owns the process's context
pub(crate) fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct TestContext {
    // Dropped before the guard
    context: EngineContext,
    _serial: MutexGuard<'static, ()>,
}

impl Deref for TestContext {
    type Target = EngineContext;

    fn deref(&self) -> &EngineContext {
        &self.context
    }
}

pub(crate) fn context() -> TestContext {
    context_with(ContextOptions::default())
}

pub(crate) fn context_with(options: ContextOptions) -> TestContext {
    let serial = serial();
    let context = EngineContext::with_options(options).expect("no other context is live");
    TestContext {
        context,
        _serial: serial,
    }
}
