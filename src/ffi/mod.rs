//! C ABI
//!
//! Opaque handles: `Context *` for the engine context, `Value *` for owned
//! values, `ScriptException *`, `KeyList *` and `Arguments *`. `NULL` is
//! the absent value (script `null`/`undefined`).
//!
//! Ownership follows one rule: a returned handle belongs to the caller and
//! is freed with its `*_release` function; a handle passed as an argument is
//! only borrowed. Value handles are tracked, so releasing one twice (or one
//! that was never issued) is reported as `DoubleRelease` instead of
//! corrupting memory.
//!
//! Functions that can fail take an optional `MqjsError *`. When it is
//! given, failures are written there and the caller owns any
//! `ScriptException` in it. When it is `NULL`, failures go to the
//! context's handlers. No panic unwinds out of this module.
//!
//! # Safety
//!
//! Every pointer argument must be `NULL` or point to a live object of the
//! documented type obtained from this library, and `MqjsStr` arguments must
//! describe readable memory. All calls for one context must come from the
//! thread that created it, except `mqjs_send_debug_command*`.

mod types;

pub use types::{
    KeyList, MqjsCallFn, MqjsCallback, MqjsError, MqjsExternalFreer, MqjsMessageHandler, MqjsRefFn,
    MqjsScriptExceptionHandler, MqjsStr,
};

use std::ffi::c_void;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;
use std::sync::Arc;

use crate::callback::Arguments;
use crate::context::{Context, ContextOptions, EngineContext};
use crate::error::{Error, RuntimeError, RuntimeErrorCode};
use crate::exception::ScriptException;
use crate::handler::{
    DebugMessageHandler, ExternalFreer, RuntimeExceptionHandler, ScriptExceptionHandler,
};
use crate::object::{Array, Function, Object};
use crate::value::{ByteString, Value, ValueType};
use types::{Foreign, read_struct};

/// Registry of value handles owned by the host
mod handles {
    use std::collections::BTreeSet;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use crate::error::RuntimeError;
    use crate::value::Value;

    static LIVE: Mutex<BTreeSet<usize>> = Mutex::new(BTreeSet::new());

    fn live() -> MutexGuard<'static, BTreeSet<usize>> {
        LIVE.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand ownership of `value` to the host
    pub fn export(value: Option<Value>) -> *mut Value {
        match value {
            Some(value) => {
                let raw = Box::into_raw(Box::new(value));
                live().insert(raw as usize);
                raw
            }
            None => std::ptr::null_mut(),
        }
    }

    /// Take ownership back from the host
    pub fn adopt(raw: *mut Value) -> Result<Option<Value>, RuntimeError> {
        if raw.is_null() {
            return Ok(None);
        }
        if !live().remove(&(raw as usize)) {
            return Err(RuntimeError::DoubleRelease);
        }
        // SAFETY: the address was produced by `export` and not adopted since
        Ok(Some(*unsafe { Box::from_raw(raw) }))
    }

    /// Borrow a host-owned value
    pub fn borrow<'a>(raw: *const Value) -> Result<Option<&'a Value>, RuntimeError> {
        if raw.is_null() {
            return Ok(None);
        }
        if !live().contains(&(raw as usize)) {
            return Err(RuntimeError::DoubleRelease);
        }
        // SAFETY: live handles point to boxed values that stay put until adopted
        Ok(Some(unsafe { &*raw }))
    }

    #[cfg(test)]
    pub fn count() -> usize {
        live().len()
    }
}

// ----- plumbing -----

fn guard<T>(fallback: T, f: impl FnOnce() -> T) -> T {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        log::error!("panic caught at the C boundary");
        fallback
    })
}

/// # Safety
/// `context` must be null or come from `mqjs_context_new` and still be live.
unsafe fn context_ref<'a>(context: *const Context) -> Result<&'a Context, Error> {
    // SAFETY: guaranteed by the caller
    unsafe { context.as_ref() }.ok_or(Error::Runtime(RuntimeError::NullArgument("context")))
}

fn required<'a>(value: *const Value, name: &'static str) -> Result<&'a Value, Error> {
    handles::borrow(value)?.ok_or(Error::Runtime(RuntimeError::NullArgument(name)))
}

fn cast<T>(
    value: &Value,
    expected: ValueType,
    pick: impl FnOnce(&Value) -> Option<T>,
) -> Result<T, Error> {
    pick(value).ok_or(Error::Runtime(RuntimeError::InvalidCast {
        expected,
        found: value.value_type(),
    }))
}

fn object_arg(value: *const Value) -> Result<Object, Error> {
    cast(required(value, "object")?, ValueType::Object, Value::as_object)
}

fn array_arg(value: *const Value) -> Result<Array, Error> {
    cast(required(value, "array")?, ValueType::Array, |v| v.as_array().cloned())
}

fn function_arg(value: *const Value) -> Result<Function, Error> {
    cast(required(value, "function")?, ValueType::Function, |v| v.as_function().cloned())
}

/// # Safety
/// `s` must describe readable memory.
unsafe fn text(s: MqjsStr, name: &'static str) -> Result<String, Error> {
    // SAFETY: guaranteed by the caller
    let bytes = unsafe { s.as_bytes() }.ok_or(Error::Runtime(RuntimeError::NullArgument(name)))?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// # Safety
/// `args` must be null or point to `argc` value handles.
unsafe fn argument_list(
    args: *const *const Value,
    argc: usize,
) -> Result<Vec<Option<Value>>, Error> {
    if args.is_null() {
        return if argc == 0 {
            Ok(Vec::new())
        } else {
            Err(RuntimeError::NullArgument("args").into())
        };
    }
    // SAFETY: guaranteed by the caller
    let raw = unsafe { std::slice::from_raw_parts(args, argc) };
    raw.iter()
        .map(|arg| -> Result<Option<Value>, Error> { Ok(handles::borrow(*arg)?.cloned()) })
        .collect()
}

/// Write `result` into `error`, or report it when `error` is null
///
/// # Safety
/// `error` must be null or point to writable memory.
unsafe fn finish<T>(
    context: Option<&Context>,
    error: *mut MqjsError,
    result: Result<T, Error>,
) -> Option<T> {
    // SAFETY: guaranteed by the caller
    let slot = unsafe { error.as_mut() };
    match (result, slot) {
        (Ok(value), slot) => {
            if let Some(slot) = slot {
                slot.code = RuntimeErrorCode::Ok;
                slot.exception = ptr::null_mut();
            }
            Some(value)
        }
        (Err(e), Some(slot)) => {
            slot.code = e.code();
            slot.exception = match e {
                Error::Script(exception) => Box::into_raw(Box::new(exception)),
                Error::Runtime(_) => ptr::null_mut(),
            };
            None
        }
        (Err(e), None) => {
            match context {
                Some(context) => context.report_error(e),
                None => log::warn!("dropped error without context: {}", e),
            }
            None
        }
    }
}

/// Run `f` against a live context and finish its result
///
/// # Safety
/// See the module documentation.
unsafe fn with_context<T>(
    context: *const Context,
    error: *mut MqjsError,
    f: impl FnOnce(&Context) -> Result<T, Error>,
) -> Option<T> {
    // SAFETY: guaranteed by the caller
    let context = match unsafe { context_ref(context) } {
        Ok(context) => context,
        Err(e) => return unsafe { finish(None, error, Err::<T, _>(e)) },
    };
    let result = f(context);
    // SAFETY: guaranteed by the caller
    unsafe { finish(Some(context), error, result) }
}

// ----- context -----

/// Engine version string; static, never released
#[unsafe(no_mangle)]
pub extern "C" fn mqjs_version() -> MqjsStr {
    MqjsStr::from_bytes(Context::version().as_bytes())
}

/// Create the process's engine context, or null if one is live
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_context_new(
    script_handler: *const MqjsScriptExceptionHandler,
    runtime_handler: *const MqjsMessageHandler,
    error: *mut MqjsError,
) -> *mut Context {
    guard(ptr::null_mut(), || {
        // SAFETY: guaranteed by the caller
        let (script, runtime) =
            unsafe { (read_struct(script_handler), read_struct(runtime_handler)) };
        let options = ContextOptions {
            script_exception_handler: script
                .map(|h| Arc::new(Foreign(h)) as Arc<dyn ScriptExceptionHandler>),
            runtime_exception_handler: runtime
                .map(|h| Arc::new(Foreign(h)) as Arc<dyn RuntimeExceptionHandler>),
            ..ContextOptions::default()
        };
        // Construction failures already went to the runtime handler
        let (code, context) = match EngineContext::with_options(options) {
            Ok(context) => (RuntimeErrorCode::Ok, context.into_raw()),
            Err(e) => (e.code(), ptr::null_mut()),
        };
        // SAFETY: guaranteed by the caller
        if let Some(slot) = unsafe { error.as_mut() } {
            slot.code = code;
            slot.exception = ptr::null_mut();
        }
        context
    })
}

/// Destroy a context made by `mqjs_context_new`
///
/// # Safety
/// See the module documentation. `context` must not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_context_free(context: *mut Context) {
    if context.is_null() {
        return;
    }
    guard((), || {
        // SAFETY: produced by `EngineContext::into_raw` in `mqjs_context_new`
        drop(unsafe { EngineContext::from_raw(context) });
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_evaluate(
    context: *const Context,
    file_name: MqjsStr,
    code: MqjsStr,
    error: *mut MqjsError,
) -> *mut Value {
    guard(ptr::null_mut(), || {
        // SAFETY: guaranteed by the caller
        let value = unsafe {
            with_context(context, error, |context| {
                let file_name = text(file_name, "file_name")?;
                let code = text(code, "code")?;
                context.try_evaluate(&file_name, &code)
            })
        };
        handles::export(value.flatten())
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_global_object(
    context: *const Context,
    error: *mut MqjsError,
) -> *mut Value {
    guard(ptr::null_mut(), || {
        // SAFETY: guaranteed by the caller
        let global = unsafe { with_context(context, error, |context| context.try_global_object()) };
        handles::export(global.map(Value::Object))
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_idle_notification(context: *const Context, deadline_ms: u64) -> bool {
    // SAFETY: guaranteed by the caller
    guard(false, || unsafe { context.as_ref() }.is_some_and(|c| c.idle_notification(deadline_ms)))
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_collect_garbage(context: *const Context) {
    guard((), || {
        // SAFETY: guaranteed by the caller
        if let Some(context) = unsafe { context.as_ref() } {
            context.collect_garbage();
        }
    })
}

// ----- values -----

/// Type tag of `value`, or -1 for null
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_value_type(value: *const Value) -> i32 {
    match handles::borrow(value) {
        Ok(Some(value)) => value.value_type() as i32,
        _ => -1,
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn mqjs_value_new_int(value: i32) -> *mut Value {
    handles::export(Some(Value::Int(value)))
}

#[unsafe(no_mangle)]
pub extern "C" fn mqjs_value_new_double(value: f64) -> *mut Value {
    handles::export(Some(Value::Double(value)))
}

#[unsafe(no_mangle)]
pub extern "C" fn mqjs_value_new_bool(value: bool) -> *mut Value {
    handles::export(Some(Value::Bool(value)))
}

/// Copies the bytes, embedded NULs included
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_value_new_string(value: MqjsStr) -> *mut Value {
    // SAFETY: guaranteed by the caller
    match unsafe { value.as_bytes() } {
        Some(bytes) => handles::export(Some(Value::String(ByteString::from(bytes)))),
        None => ptr::null_mut(),
    }
}

/// A callback value; the engine retains it when it first crosses over
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_value_new_callback(callback: *const MqjsCallback) -> *mut Value {
    // SAFETY: guaranteed by the caller
    match unsafe { read_struct(callback) } {
        Some(callback) => handles::export(Some(Value::Callback(Arc::new(Foreign(callback))))),
        None => ptr::null_mut(),
    }
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_value_new_external(
    context: *const Context,
    pointer: *mut c_void,
    freer: *const MqjsExternalFreer,
    error: *mut MqjsError,
) -> *mut Value {
    guard(ptr::null_mut(), || {
        // SAFETY: guaranteed by the caller
        let freer = unsafe { read_struct(freer) }
            .map(|f| Arc::new(Foreign(f)) as Arc<dyn ExternalFreer>);
        let external = unsafe {
            with_context(context, error, |context| context.try_create_external(pointer, freer))
        };
        handles::export(external.map(Value::External))
    })
}

/// A new handle to the same value
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_value_copy(value: *const Value) -> *mut Value {
    match handles::borrow(value) {
        Ok(value) => handles::export(value.cloned()),
        Err(_) => ptr::null_mut(),
    }
}

/// Release a value handle; a second release is reported, not fatal
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_value_release(
    context: *const Context,
    value: *mut Value,
) -> RuntimeErrorCode {
    guard(RuntimeErrorCode::Fatal, || match handles::adopt(value) {
        Ok(_) => RuntimeErrorCode::Ok,
        Err(e) => {
            let code = e.code();
            // SAFETY: guaranteed by the caller
            match unsafe { context.as_ref() } {
                Some(context) => context.report_error(e.into()),
                None => log::warn!("{}", e),
            }
            code
        }
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_value_as_int(value: *const Value, error: *mut MqjsError) -> i32 {
    let result = required(value, "value").and_then(|v| cast(v, ValueType::Int, Value::as_int));
    // SAFETY: guaranteed by the caller
    unsafe { finish(None, error, result) }.unwrap_or(0)
}

/// `Int` values convert to double as well
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_value_as_double(value: *const Value, error: *mut MqjsError) -> f64 {
    let result =
        required(value, "value").and_then(|v| cast(v, ValueType::Double, Value::as_double));
    // SAFETY: guaranteed by the caller
    unsafe { finish(None, error, result) }.unwrap_or(f64::NAN)
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_value_as_bool(value: *const Value, error: *mut MqjsError) -> bool {
    let result = required(value, "value").and_then(|v| cast(v, ValueType::Bool, Value::as_bool));
    // SAFETY: guaranteed by the caller
    unsafe { finish(None, error, result) }.unwrap_or(false)
}

/// Bytes of a string value, valid until the value is released
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_value_as_string(
    value: *const Value,
    error: *mut MqjsError,
) -> MqjsStr {
    let result = required(value, "value").and_then(|v| {
        cast(v, ValueType::String, |v| v.as_string().map(|s| MqjsStr::from_bytes(s.as_bytes())))
    });
    // SAFETY: guaranteed by the caller
    unsafe { finish(None, error, result) }.unwrap_or_else(MqjsStr::empty)
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_value_as_external(
    value: *const Value,
    error: *mut MqjsError,
) -> *mut c_void {
    let result = required(value, "value")
        .and_then(|v| cast(v, ValueType::External, |v| v.as_external().map(|e| e.pointer())));
    // SAFETY: guaranteed by the caller
    unsafe { finish(None, error, result) }.unwrap_or(ptr::null_mut())
}

/// Script `===`
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_strict_equals(
    context: *const Context,
    a: *const Value,
    b: *const Value,
    error: *mut MqjsError,
) -> bool {
    guard(false, || {
        // SAFETY: guaranteed by the caller
        unsafe {
            with_context(context, error, |context| {
                let a = handles::borrow(a)?;
                let b = handles::borrow(b)?;
                context.try_strict_equals(a, b)
            })
        }
        .unwrap_or(false)
    })
}

// ----- objects -----

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_object_get(
    context: *const Context,
    object: *const Value,
    key: MqjsStr,
    error: *mut MqjsError,
) -> *mut Value {
    guard(ptr::null_mut(), || {
        // SAFETY: guaranteed by the caller
        let value = unsafe {
            with_context(context, error, |context| {
                object_arg(object)?.try_get(context, &text(key, "key")?)
            })
        };
        handles::export(value.flatten())
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_object_set(
    context: *const Context,
    object: *const Value,
    key: MqjsStr,
    value: *const Value,
    error: *mut MqjsError,
) -> bool {
    guard(false, || {
        // SAFETY: guaranteed by the caller
        unsafe {
            with_context(context, error, |context| {
                let value = handles::borrow(value)?;
                object_arg(object)?.try_set(context, &text(key, "key")?, value)
            })
        }
        .is_some()
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_object_has(
    context: *const Context,
    object: *const Value,
    key: MqjsStr,
    error: *mut MqjsError,
) -> bool {
    guard(false, || {
        // SAFETY: guaranteed by the caller
        unsafe {
            with_context(context, error, |context| {
                object_arg(object)?.try_has(context, &text(key, "key")?)
            })
        }
        .unwrap_or(false)
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_object_keys(
    context: *const Context,
    object: *const Value,
    error: *mut MqjsError,
) -> *mut KeyList {
    guard(ptr::null_mut(), || {
        // SAFETY: guaranteed by the caller
        let keys = unsafe {
            with_context(context, error, |context| object_arg(object)?.try_keys(context))
        };
        keys.map_or(ptr::null_mut(), |keys| Box::into_raw(Box::new(KeyList(keys))))
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_object_instance_of(
    context: *const Context,
    object: *const Value,
    constructor: *const Value,
    error: *mut MqjsError,
) -> bool {
    guard(false, || {
        // SAFETY: guaranteed by the caller
        unsafe {
            with_context(context, error, |context| {
                object_arg(object)?.try_instance_of(context, &function_arg(constructor)?)
            })
        }
        .unwrap_or(false)
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_object_call_method(
    context: *const Context,
    object: *const Value,
    name: MqjsStr,
    args: *const *const Value,
    argc: usize,
    error: *mut MqjsError,
) -> *mut Value {
    guard(ptr::null_mut(), || {
        // SAFETY: guaranteed by the caller
        let value = unsafe {
            with_context(context, error, |context| {
                let args = argument_list(args, argc)?;
                object_arg(object)?.try_call_method(context, &text(name, "name")?, &args)
            })
        };
        handles::export(value.flatten())
    })
}

/// Whether two values pin the same script object
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_object_equals(
    context: *const Context,
    a: *const Value,
    b: *const Value,
    error: *mut MqjsError,
) -> bool {
    guard(false, || {
        // SAFETY: guaranteed by the caller
        let equals = unsafe {
            with_context(context, error, |context| {
                object_arg(a)?.try_equals(context, &object_arg(b)?)
            })
        };
        equals.unwrap_or(false)
    })
}

// ----- arrays -----

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_array_length(
    context: *const Context,
    array: *const Value,
    error: *mut MqjsError,
) -> u32 {
    guard(0, || {
        // SAFETY: guaranteed by the caller
        let length = unsafe {
            with_context(context, error, |context| array_arg(array)?.try_length(context))
        };
        length.unwrap_or(0)
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_array_get(
    context: *const Context,
    array: *const Value,
    index: u32,
    error: *mut MqjsError,
) -> *mut Value {
    guard(ptr::null_mut(), || {
        // SAFETY: guaranteed by the caller
        let value = unsafe {
            with_context(context, error, |context| array_arg(array)?.try_get(context, index))
        };
        handles::export(value.flatten())
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_array_set(
    context: *const Context,
    array: *const Value,
    index: u32,
    value: *const Value,
    error: *mut MqjsError,
) -> bool {
    guard(false, || {
        // SAFETY: guaranteed by the caller
        unsafe {
            with_context(context, error, |context| {
                let value = handles::borrow(value)?;
                array_arg(array)?.try_set(context, index, value)
            })
        }
        .is_some()
    })
}

// ----- functions -----

/// Call with `this` (null for `undefined`)
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_function_call(
    context: *const Context,
    function: *const Value,
    this: *const Value,
    args: *const *const Value,
    argc: usize,
    error: *mut MqjsError,
) -> *mut Value {
    guard(ptr::null_mut(), || {
        // SAFETY: guaranteed by the caller
        let value = unsafe {
            with_context(context, error, |context| {
                let function = function_arg(function)?;
                let args = argument_list(args, argc)?;
                match handles::borrow(this)? {
                    Some(this) => function.try_call_with_this(context, Some(this), &args),
                    None => function.try_call(context, &args),
                }
            })
        };
        handles::export(value.flatten())
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_function_construct(
    context: *const Context,
    function: *const Value,
    args: *const *const Value,
    argc: usize,
    error: *mut MqjsError,
) -> *mut Value {
    guard(ptr::null_mut(), || {
        // SAFETY: guaranteed by the caller
        let value = unsafe {
            with_context(context, error, |context| {
                let args = argument_list(args, argc)?;
                function_arg(function)?.try_construct(context, &args)
            })
        };
        handles::export(value.flatten())
    })
}

// ----- diagnostics -----

/// The thrown value; null after the first call
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_exception_take_value(exception: *mut ScriptException) -> *mut Value {
    // SAFETY: guaranteed by the caller
    match unsafe { exception.as_mut() } {
        Some(exception) => handles::export(exception.take_exception()),
        None => ptr::null_mut(),
    }
}

macro_rules! exception_text {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            /// Valid until the exception is released
            ///
            /// # Safety
            /// See the module documentation.
            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn $name(exception: *const ScriptException) -> MqjsStr {
                // SAFETY: guaranteed by the caller
                match unsafe { exception.as_ref() } {
                    Some(exception) => MqjsStr::from_bytes(exception.$field().as_bytes()),
                    None => MqjsStr::empty(),
                }
            }
        )*
    };
}

exception_text! {
    mqjs_exception_message => message,
    mqjs_exception_file_name => file_name,
    mqjs_exception_stack_trace => stack_trace,
    mqjs_exception_source_line => source_line,
}

/// 1-based line, or -1
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_exception_line_number(exception: *const ScriptException) -> i32 {
    // SAFETY: guaranteed by the caller
    unsafe { exception.as_ref() }.map_or(-1, ScriptException::line_number)
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_exception_release(exception: *mut ScriptException) {
    if !exception.is_null() {
        // SAFETY: produced by `Box::into_raw` in this module
        drop(unsafe { Box::from_raw(exception) });
    }
}

// ----- key lists and arguments -----

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_keys_len(keys: *const KeyList) -> usize {
    // SAFETY: guaranteed by the caller
    unsafe { keys.as_ref() }.map_or(0, |keys| keys.0.len())
}

/// Key `index`, valid until the list is released
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_keys_get(keys: *const KeyList, index: usize) -> MqjsStr {
    // SAFETY: guaranteed by the caller
    unsafe { keys.as_ref() }
        .and_then(|keys| keys.0.get(index))
        .map_or_else(MqjsStr::empty, |key| MqjsStr::from_bytes(key.as_bytes()))
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_keys_release(keys: *mut KeyList) {
    if !keys.is_null() {
        // SAFETY: produced by `Box::into_raw` in `mqjs_object_keys`
        drop(unsafe { Box::from_raw(keys) });
    }
}

/// # Safety
/// `args` must be the container passed to the running callback.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_arguments_len(args: *const Arguments) -> usize {
    // SAFETY: guaranteed by the caller
    unsafe { args.as_ref() }.map_or(0, Arguments::len)
}

/// Take argument `index`; null on every later read
///
/// # Safety
/// `args` must be the container passed to the running callback.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_arguments_take(args: *mut Arguments, index: usize) -> *mut Value {
    // SAFETY: guaranteed by the caller
    match unsafe { args.as_mut() } {
        Some(args) => handles::export(args.take(index)),
        None => ptr::null_mut(),
    }
}

// ----- debugging -----

/// Install (or clear, with null) the debug message handler
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_set_debug_message_handler(
    context: *const Context,
    handler: *const MqjsMessageHandler,
) {
    guard((), || {
        // SAFETY: guaranteed by the caller
        if let Some(context) = unsafe { context.as_ref() } {
            let handler = unsafe { read_struct(handler) }
                .map(|h| Arc::new(Foreign(h)) as Arc<dyn DebugMessageHandler>);
            context.set_debug_message_handler(handler);
        }
    })
}

/// Queue a UTF-8 debug command
///
/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_send_debug_command(context: *const Context, command: MqjsStr) {
    guard((), || {
        // SAFETY: guaranteed by the caller
        let command = unsafe { text(command, "command") };
        if let (Some(context), Ok(command)) = (unsafe { context.as_ref() }, command) {
            context.send_debug_command(&command);
        }
    })
}

/// Queue a UTF-16 debug command of `len` code units
///
/// # Safety
/// See the module documentation; `command` must point to `len` code units.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_send_debug_command_utf16(
    context: *const Context,
    command: *const u16,
    len: usize,
) {
    guard((), || {
        // SAFETY: guaranteed by the caller
        let Some(context) = (unsafe { context.as_ref() }) else {
            return;
        };
        if command.is_null() {
            return;
        }
        let units = unsafe { std::slice::from_raw_parts(command, len) };
        context.send_debug_command(&String::from_utf16_lossy(units));
    })
}

/// # Safety
/// See the module documentation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mqjs_process_debug_messages(context: *const Context) {
    guard((), || {
        // SAFETY: guaranteed by the caller
        if let Some(context) = unsafe { context.as_ref() } {
            context.process_debug_messages();
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};

    use super::*;
    use crate::test_support;

    fn s(text: &str) -> MqjsStr {
        MqjsStr::from_bytes(text.as_bytes())
    }

    fn no_error() -> MqjsError {
        MqjsError {
            code: RuntimeErrorCode::Ok,
            exception: ptr::null_mut(),
        }
    }

    unsafe fn read(s: MqjsStr) -> String {
        String::from_utf8(unsafe { s.as_bytes() }.unwrap().to_vec()).unwrap()
    }

    struct Fixture {
        context: *mut Context,
        _serial: std::sync::MutexGuard<'static, ()>,
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            unsafe { mqjs_context_free(self.context) };
        }
    }

    fn fixture() -> Fixture {
        let serial = test_support::serial();
        let mut error = no_error();
        let context = unsafe { mqjs_context_new(ptr::null(), ptr::null(), &mut error) };
        assert!(!context.is_null());
        assert_eq!(error.code, RuntimeErrorCode::Ok);
        Fixture {
            context,
            _serial: serial,
        }
    }

    #[test]
    fn test_evaluate_and_read() {
        let f = fixture();
        unsafe {
            let mut error = no_error();
            let value = mqjs_evaluate(f.context, s("a.js"), s("'ab' + 1"), &mut error);
            assert_eq!(mqjs_value_type(value), ValueType::String as i32);
            let bytes = mqjs_value_as_string(value, &mut error);
            assert_eq!(bytes.as_bytes().unwrap(), b"ab1");

            mqjs_value_as_int(value, &mut error);
            assert_eq!(error.code, RuntimeErrorCode::InvalidCast);

            assert_eq!(mqjs_value_release(f.context, value), RuntimeErrorCode::Ok);
            assert_eq!(mqjs_value_release(f.context, value), RuntimeErrorCode::DoubleRelease);
        }
    }

    #[test]
    fn test_script_exception_out_parameter() {
        let f = fixture();
        unsafe {
            let mut error = no_error();
            let source = s("\nthrow new Error('boom')");
            let value = mqjs_evaluate(f.context, s("boom.js"), source, &mut error);
            assert!(value.is_null());
            assert_eq!(error.code, RuntimeErrorCode::ScriptException);
            let exception = error.exception;
            assert_eq!(read(mqjs_exception_message(exception)), "Error: boom");
            assert_eq!(mqjs_exception_line_number(exception), 2);
            assert_eq!(read(mqjs_exception_file_name(exception)), "boom.js");

            let thrown = mqjs_exception_take_value(exception);
            assert_eq!(mqjs_value_type(thrown), ValueType::Object as i32);
            assert!(mqjs_exception_take_value(exception).is_null());
            mqjs_value_release(f.context, thrown);
            mqjs_exception_release(exception);
        }
    }

    #[test]
    fn test_objects_and_arrays() {
        let f = fixture();
        unsafe {
            let mut error = no_error();
            let global = mqjs_global_object(f.context, &mut error);
            let five = mqjs_value_new_int(5);
            assert!(mqjs_object_set(f.context, global, s("five"), five, &mut error));
            assert!(mqjs_object_has(f.context, global, s("five"), &mut error));

            let list = mqjs_evaluate(f.context, s("l.js"), s("[five, 'x']"), &mut error);
            assert_eq!(mqjs_array_length(f.context, list, &mut error), 2);
            let first = mqjs_array_get(f.context, list, 0, &mut error);
            assert_eq!(mqjs_value_as_int(first, &mut error), 5);

            let object = mqjs_evaluate(f.context, s("o.js"), s("({ b: 1, a: 2 })"), &mut error);
            let keys = mqjs_object_keys(f.context, object, &mut error);
            assert_eq!(mqjs_keys_len(keys), 2);
            assert_eq!(read(mqjs_keys_get(keys, 0)), "b");
            mqjs_keys_release(keys);

            let copy = mqjs_value_copy(object);
            assert!(mqjs_object_equals(f.context, object, copy, &mut error));
            assert!(!mqjs_object_equals(f.context, object, global, &mut error));

            for handle in [global, five, list, first, object, copy] {
                assert_eq!(mqjs_value_release(f.context, handle), RuntimeErrorCode::Ok);
            }
        }
    }

    static REFS: AtomicI32 = AtomicI32::new(0);

    extern "C" fn retain(_data: *mut c_void) {
        REFS.fetch_add(1, Ordering::SeqCst);
    }

    extern "C" fn release(_data: *mut c_void) {
        REFS.fetch_sub(1, Ordering::SeqCst);
    }

    extern "C" fn double_it(
        _data: *mut c_void,
        _context: *const Context,
        args: *mut Arguments,
        thrown: *mut *mut Value,
    ) -> *mut Value {
        unsafe {
            assert_eq!(mqjs_arguments_len(args), 1);
            let arg = mqjs_arguments_take(args, 0);
            assert!(mqjs_arguments_take(args, 0).is_null());
            let mut error = no_error();
            let n = mqjs_value_as_double(arg, &mut error);
            mqjs_value_release(ptr::null(), arg);
            if n < 0.0 {
                *thrown = mqjs_value_new_string(s("negative"));
                return ptr::null_mut();
            }
            mqjs_value_new_double(n * 2.0)
        }
    }

    #[test]
    fn test_callbacks() {
        let f = fixture();
        unsafe {
            let spec = MqjsCallback {
                data: ptr::null_mut(),
                call: Some(double_it),
                retain: Some(retain),
                release: Some(release),
            };
            let callback = mqjs_value_new_callback(&spec);
            let mut error = no_error();
            let global = mqjs_global_object(f.context, &mut error);
            mqjs_object_set(f.context, global, s("twice"), callback, &mut error);
            assert_eq!(REFS.load(Ordering::SeqCst), 1);

            let result = mqjs_evaluate(f.context, s("cb.js"), s("twice(21)"), &mut error);
            assert_eq!(mqjs_value_as_int(result, &mut error), 42);

            let caught = mqjs_evaluate(
                f.context,
                s("cb2.js"),
                s("try { twice(-1) } catch (e) { 'caught ' + e }"),
                &mut error,
            );
            assert_eq!(read(mqjs_value_as_string(caught, &mut error)), "caught negative");

            for handle in [callback, global, result, caught] {
                mqjs_value_release(f.context, handle);
            }
        }
        drop(f);
        assert_eq!(REFS.load(Ordering::SeqCst), 0);
    }

    extern "C" fn stale_result(
        _data: *mut c_void,
        _context: *const Context,
        _args: *mut Arguments,
        thrown: *mut *mut Value,
    ) -> *mut Value {
        unsafe {
            *thrown = mqjs_value_new_string(s("oops"));
        }
        // never exported, so adopting it fails without a dereference
        std::ptr::NonNull::<Value>::dangling().as_ptr()
    }

    #[test]
    fn test_thrown_handle_reclaimed_when_result_is_stale() {
        let f = fixture();
        let before = handles::count();
        unsafe {
            let spec = MqjsCallback {
                data: ptr::null_mut(),
                call: Some(stale_result),
                retain: None,
                release: None,
            };
            let callback = mqjs_value_new_callback(&spec);
            let mut error = no_error();
            let global = mqjs_global_object(f.context, &mut error);
            mqjs_object_set(f.context, global, s("stale"), callback, &mut error);

            let caught = mqjs_evaluate(
                f.context,
                s("stale.js"),
                s("try { stale() } catch (e) { 'caught ' + e }"),
                &mut error,
            );
            assert_eq!(read(mqjs_value_as_string(caught, &mut error)), "caught oops");

            for handle in [callback, global, caught] {
                mqjs_value_release(f.context, handle);
            }
        }
        assert_eq!(handles::count(), before);
    }

    #[test]
    fn test_handle_count_returns_to_zero() {
        let f = fixture();
        let before = handles::count();
        unsafe {
            let mut error = no_error();
            let value = mqjs_evaluate(f.context, s("n.js"), s("[1, 2, 3]"), &mut error);
            let element = mqjs_array_get(f.context, value, 1, &mut error);
            assert_eq!(handles::count(), before + 2);
            mqjs_value_release(f.context, element);
            mqjs_value_release(f.context, value);
        }
        assert_eq!(handles::count(), before);
    }

    #[test]
    fn test_null_arguments() {
        let f = fixture();
        unsafe {
            let mut error = no_error();
            mqjs_object_get(f.context, ptr::null(), s("x"), &mut error);
            assert_eq!(error.code, RuntimeErrorCode::NullArgument);
            mqjs_evaluate(ptr::null(), s("x.js"), s("1"), &mut error);
            assert_eq!(error.code, RuntimeErrorCode::NullArgument);
            assert_eq!(mqjs_value_type(ptr::null()), -1);
        }
    }

    #[test]
    fn test_second_context_is_refused() {
        let f = fixture();
        unsafe {
            let mut error = no_error();
            let second = mqjs_context_new(ptr::null(), ptr::null(), &mut error);
            assert!(second.is_null());
            assert_eq!(error.code, RuntimeErrorCode::ContextAlreadyExists);
            let value = mqjs_evaluate(f.context, s("ok.js"), s("1"), &mut error);
            assert_eq!(mqjs_value_as_int(value, &mut error), 1);
            mqjs_value_release(f.context, value);
        }
    }

    #[test]
    fn test_version() {
        let version = unsafe { read(mqjs_version()) };
        assert!(version.starts_with("mquickjs-simple"));
    }
}
