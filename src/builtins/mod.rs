//! JavaScript built-in objects
//!
//! Each submodule fills in the intrinsic prototypes allocated by the realm
//! and publishes its constructor on the global object. Builtin properties
//! are non-enumerable so that `for-in` over user objects only sees user
//! data.

pub mod array;
pub mod boolean;
pub mod error;
pub mod function;
pub mod global;
pub mod json;
pub mod math;
pub mod number;
pub mod object;
pub mod regexp;
pub mod string;

use crate::gc::ObjectRef;
use crate::isolate::Isolate;
use crate::runtime::function::NativeFunction;
use crate::runtime::value::JsValue;

/// Populate the realm of a fresh isolate
pub fn install(isolate: &Isolate) {
    object::install(isolate);
    function::install(isolate);
    array::install(isolate);
    string::install(isolate);
    number::install(isolate);
    boolean::install(isolate);
    error::install(isolate);
    math::install(isolate);
    json::install(isolate);
    regexp::install(isolate);
    global::install(isolate);
}

/// Define a native method on `target`
pub(crate) fn method(
    isolate: &Isolate,
    target: ObjectRef,
    name: &str,
    call: NativeFunction,
    length: usize,
) {
    let f = isolate.new_native(name, call, length);
    isolate.define_property(target, name, JsValue::Object(f), false);
}

/// Create a native constructor and publish it as a global
pub(crate) fn constructor(
    isolate: &Isolate,
    name: &str,
    call: NativeFunction,
    length: usize,
    prototype: ObjectRef,
) -> ObjectRef {
    let f = isolate.new_constructor(name, call, length, prototype);
    isolate.define_property(isolate.global(), name, JsValue::Object(f), false);
    f
}

/// Resolve a relative index argument (negative counts from the end)
pub(crate) fn relative_index(
    isolate: &Isolate,
    value: &JsValue,
    len: usize,
    default: usize,
) -> crate::vm::JsResult<usize> {
    if value.is_undefined() {
        return Ok(default);
    }
    let n = isolate.to_integer(value)?;
    let len = len as f64;
    Ok(if n < 0.0 { (len + n).max(0.0) } else { n.min(len) } as usize)
}
