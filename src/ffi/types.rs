//! C-compatible types of the ABI
//!
//! Host callbacks and handlers are plain structs of a data pointer and
//! function pointers. The `Foreign*` adapters below turn them into the
//! Rust traits the context works with.

use std::ffi::c_void;
use std::ptr;

use crate::callback::{Arguments, Callback, CallbackError, CallbackResult};
use crate::context::Context;
use crate::error::RuntimeErrorCode;
use crate::exception::ScriptException;
use crate::handler::{
    DebugMessageHandler, ExternalFreer, RuntimeExceptionHandler, ScriptExceptionHandler,
};
use crate::value::Value;

use super::handles;

/// Borrowed UTF-8 (or raw) bytes with an explicit length
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MqjsStr {
    pub data: *const u8,
    pub len: usize,
}

impl MqjsStr {
    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        MqjsStr {
            data: bytes.as_ptr(),
            len: bytes.len(),
        }
    }

    pub(crate) fn empty() -> Self {
        MqjsStr {
            data: ptr::null(),
            len: 0,
        }
    }

    /// The bytes, or `None` for a null pointer with a non-zero length
    ///
    /// # Safety
    /// `data` must point to `len` readable bytes that outlive `'a`.
    pub(crate) unsafe fn as_bytes<'a>(self) -> Option<&'a [u8]> {
        if self.data.is_null() {
            return (self.len == 0).then_some(&[][..]);
        }
        // SAFETY: guaranteed by the caller
        Some(unsafe { std::slice::from_raw_parts(self.data, self.len) })
    }
}

/// Failure details written by ABI functions that take an `MqjsError *`
#[repr(C)]
#[derive(Debug)]
pub struct MqjsError {
    pub code: RuntimeErrorCode,
    /// Set with `code == ScriptException`; release with `mqjs_exception_release`
    pub exception: *mut ScriptException,
}

/// Object keys returned by `mqjs_object_keys`
pub struct KeyList(pub(crate) Vec<String>);

pub type MqjsRefFn = extern "C" fn(data: *mut c_void);

/// Returns an owned value (or null); may store an owned value in `*thrown`
/// to throw it instead
pub type MqjsCallFn = extern "C" fn(
    data: *mut c_void,
    context: *const Context,
    args: *mut Arguments,
    thrown: *mut *mut Value,
) -> *mut Value;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct MqjsCallback {
    pub data: *mut c_void,
    pub call: Option<MqjsCallFn>,
    pub retain: Option<MqjsRefFn>,
    pub release: Option<MqjsRefFn>,
}

/// Receives ownership of each diagnostic
#[repr(C)]
#[derive(Clone, Copy)]
pub struct MqjsScriptExceptionHandler {
    pub data: *mut c_void,
    pub handle: Option<extern "C" fn(data: *mut c_void, exception: *mut ScriptException)>,
    pub retain: Option<MqjsRefFn>,
    pub release: Option<MqjsRefFn>,
}

/// Runtime-error and debug messages; the string is only valid during the call
#[repr(C)]
#[derive(Clone, Copy)]
pub struct MqjsMessageHandler {
    pub data: *mut c_void,
    pub handle: Option<extern "C" fn(data: *mut c_void, message: MqjsStr)>,
    pub retain: Option<MqjsRefFn>,
    pub release: Option<MqjsRefFn>,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct MqjsExternalFreer {
    pub data: *mut c_void,
    pub free: Option<extern "C" fn(data: *mut c_void, pointer: *mut c_void)>,
    pub retain: Option<MqjsRefFn>,
    pub release: Option<MqjsRefFn>,
}

/// Host struct behind a Rust trait object
pub(crate) struct Foreign<T>(pub T);

// SAFETY: the host promises that its data pointer may be used from
// whichever thread the engine runs on.
unsafe impl<T> Send for Foreign<T> {}
unsafe impl<T> Sync for Foreign<T> {}

macro_rules! ref_counting {
    () => {
        fn retain(&self) {
            if let Some(retain) = self.0.retain {
                retain(self.0.data);
            }
        }

        fn release(&self) {
            if let Some(release) = self.0.release {
                release(self.0.data);
            }
        }
    };
}

impl Callback for Foreign<MqjsCallback> {
    fn call(&self, context: &Context, args: &mut Arguments) -> CallbackResult {
        let Some(call) = self.0.call else {
            return Ok(None);
        };
        let mut thrown: *mut Value = ptr::null_mut();
        let result = call(self.0.data, context, args, &mut thrown);
        // Both handles are reclaimed before either error is reported.
        let result = handles::adopt(result);
        let thrown = handles::adopt(thrown).map_err(|e| CallbackError::Message(e.to_string()))?;
        if let Some(thrown) = thrown {
            return Err(CallbackError::Throw(Some(thrown)));
        }
        result.map_err(|e| CallbackError::Message(e.to_string()))
    }

    ref_counting!();
}

impl ScriptExceptionHandler for Foreign<MqjsScriptExceptionHandler> {
    fn handle(&self, exception: ScriptException) {
        if let Some(handle) = self.0.handle {
            handle(self.0.data, Box::into_raw(Box::new(exception)));
        }
    }

    ref_counting!();
}

impl RuntimeExceptionHandler for Foreign<MqjsMessageHandler> {
    fn handle(&self, message: &str) {
        if let Some(handle) = self.0.handle {
            handle(self.0.data, MqjsStr::from_bytes(message.as_bytes()));
        }
    }

    ref_counting!();
}

impl DebugMessageHandler for Foreign<MqjsMessageHandler> {
    fn handle(&self, message: &str) {
        if let Some(handle) = self.0.handle {
            handle(self.0.data, MqjsStr::from_bytes(message.as_bytes()));
        }
    }

    ref_counting!();
}

impl ExternalFreer for Foreign<MqjsExternalFreer> {
    fn free(&self, pointer: *mut c_void) {
        if let Some(free) = self.0.free {
            free(self.0.data, pointer);
        }
    }

    ref_counting!();
}

/// Copy a host struct out of a possibly null pointer
///
/// # Safety
/// `ptr` must be null or point to a valid `T`.
pub(crate) unsafe fn read_struct<T: Copy>(ptr: *const T) -> Option<T> {
    // SAFETY: guaranteed by the caller
    (!ptr.is_null()).then(|| unsafe { *ptr })
}
