//! Object wrappers
//!
//! `Object`, `Array`, `Function` and `External` each pin one engine object
//! through a persistent handle. Their operations take the owning context
//! and come in two forms: `try_x` returns the tagged result, `x` reports a
//! failure to the context's handlers and returns the absent value.

use std::ffi::c_void;
use std::fmt;

use crate::context::Context;
use crate::error::{Error, RuntimeError};
use crate::gc::Persistent;
use crate::runtime::value::JsValue;
use crate::value::Value;

/// A script object
#[derive(Clone)]
pub struct Object {
    handle: Persistent,
}

impl Object {
    pub(crate) fn from_handle(handle: Persistent) -> Self {
        Object { handle }
    }

    pub(crate) fn handle(&self) -> &Persistent {
        &self.handle
    }

    pub fn try_get(&self, context: &Context, key: &str) -> Result<Option<Value>, Error> {
        context.run(|scope| {
            let target = JsValue::Object(scope.resolve(&self.handle)?);
            let value = scope.catch(scope.isolate().get(&target, key))?;
            scope.wrap(value)
        })
    }

    pub fn get(&self, context: &Context, key: &str) -> Option<Value> {
        context.report(self.try_get(context, key)).flatten()
    }

    /// Assign `key`; `None` stores `null`
    pub fn try_set(
        &self,
        context: &Context,
        key: &str,
        value: Option<&Value>,
    ) -> Result<(), Error> {
        context.run(|scope| {
            let target = JsValue::Object(scope.resolve(&self.handle)?);
            let value = scope.unwrap(value)?;
            scope.catch(scope.isolate().set(&target, key, value))
        })
    }

    pub fn set(&self, context: &Context, key: &str, value: Option<&Value>) -> bool {
        context.report(self.try_set(context, key, value)).is_some()
    }

    /// `key in object`
    pub fn try_has(&self, context: &Context, key: &str) -> Result<bool, Error> {
        context.run(|scope| {
            let target = scope.resolve(&self.handle)?;
            Ok(scope.isolate().has_property(target, key))
        })
    }

    pub fn has(&self, context: &Context, key: &str) -> bool {
        context.report(self.try_has(context, key)).unwrap_or(false)
    }

    /// Enumerable keys in `for-in` order, inherited ones included
    pub fn try_keys(&self, context: &Context) -> Result<Vec<String>, Error> {
        context.run(|scope| {
            let target = scope.resolve(&self.handle)?;
            let keys = scope.isolate().for_in_keys(target);
            Ok(keys.iter().map(|key| key.to_string()).collect())
        })
    }

    pub fn keys(&self, context: &Context) -> Vec<String> {
        context.report(self.try_keys(context)).unwrap_or_default()
    }

    /// `object instanceof constructor`
    pub fn try_instance_of(
        &self,
        context: &Context,
        constructor: &Function,
    ) -> Result<bool, Error> {
        let args = [
            Some(Value::Object(self.clone())),
            Some(Value::Function(constructor.clone())),
        ];
        let result = context.instance_of_function()?.try_call(context, &args)?;
        Ok(matches!(result, Some(Value::Bool(true))))
    }

    pub fn instance_of(&self, context: &Context, constructor: &Function) -> bool {
        context.report(self.try_instance_of(context, constructor)).unwrap_or(false)
    }

    /// Call the function stored at `name` with this object as receiver
    pub fn try_call_method(
        &self,
        context: &Context,
        name: &str,
        args: &[Option<Value>],
    ) -> Result<Option<Value>, Error> {
        context.run(|scope| {
            let isolate = scope.isolate();
            let this = JsValue::Object(scope.resolve(&self.handle)?);
            let method = scope.catch(isolate.get(&this, name))?;
            if !isolate.is_callable(&method) {
                return Err(RuntimeError::NotAFunction(name.to_string()).into());
            }
            let args = scope.unwrap_vector(args)?;
            let result = scope.catch(isolate.call(&method, this, &args))?;
            scope.wrap(result)
        })
    }

    pub fn call_method(
        &self,
        context: &Context,
        name: &str,
        args: &[Option<Value>],
    ) -> Option<Value> {
        context.report(self.try_call_method(context, name, args)).flatten()
    }

    /// Whether both wrappers pin the same script object
    pub fn try_equals(&self, context: &Context, other: &Object) -> Result<bool, Error> {
        context.run(|scope| Ok(scope.resolve(&self.handle)? == scope.resolve(&other.handle)?))
    }

    pub fn equals(&self, context: &Context, other: &Object) -> bool {
        context.report(self.try_equals(context, other)).unwrap_or(false)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({:?})", self.handle)
    }
}

/// A script array
#[derive(Clone)]
pub struct Array {
    handle: Persistent,
}

impl Array {
    pub(crate) fn from_handle(handle: Persistent) -> Self {
        Array { handle }
    }

    pub(crate) fn handle(&self) -> &Persistent {
        &self.handle
    }

    pub fn as_object(&self) -> Object {
        Object::from_handle(self.handle.clone())
    }

    pub fn try_length(&self, context: &Context) -> Result<u32, Error> {
        context.run(|scope| {
            let target = scope.resolve(&self.handle)?;
            let len = scope
                .isolate()
                .with_object(target, |object| object.elements().map_or(0, Vec::len));
            Ok(u32::try_from(len).unwrap_or(u32::MAX))
        })
    }

    pub fn length(&self, context: &Context) -> u32 {
        context.report(self.try_length(context)).unwrap_or(0)
    }

    pub fn try_get(&self, context: &Context, index: u32) -> Result<Option<Value>, Error> {
        self.as_object().try_get(context, &index.to_string())
    }

    pub fn get(&self, context: &Context, index: u32) -> Option<Value> {
        context.report(self.try_get(context, index)).flatten()
    }

    /// Store at `index`, growing the array as needed
    pub fn try_set(
        &self,
        context: &Context,
        index: u32,
        value: Option<&Value>,
    ) -> Result<(), Error> {
        self.as_object().try_set(context, &index.to_string(), value)
    }

    pub fn set(&self, context: &Context, index: u32, value: Option<&Value>) -> bool {
        context.report(self.try_set(context, index, value)).is_some()
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Array({:?})", self.handle)
    }
}

/// A script function
#[derive(Clone)]
pub struct Function {
    handle: Persistent,
}

impl Function {
    pub(crate) fn from_handle(handle: Persistent) -> Self {
        Function { handle }
    }

    pub(crate) fn handle(&self) -> &Persistent {
        &self.handle
    }

    pub fn as_object(&self) -> Object {
        Object::from_handle(self.handle.clone())
    }

    /// Call with an `undefined` receiver
    pub fn try_call(
        &self,
        context: &Context,
        args: &[Option<Value>],
    ) -> Result<Option<Value>, Error> {
        self.call_inner(context, None, args)
    }

    pub fn call(&self, context: &Context, args: &[Option<Value>]) -> Option<Value> {
        context.report(self.try_call(context, args)).flatten()
    }

    pub fn try_call_with_this(
        &self,
        context: &Context,
        this: Option<&Value>,
        args: &[Option<Value>],
    ) -> Result<Option<Value>, Error> {
        self.call_inner(context, Some(this), args)
    }

    pub fn call_with_this(
        &self,
        context: &Context,
        this: Option<&Value>,
        args: &[Option<Value>],
    ) -> Option<Value> {
        context.report(self.try_call_with_this(context, this, args)).flatten()
    }

    fn call_inner(
        &self,
        context: &Context,
        this: Option<Option<&Value>>,
        args: &[Option<Value>],
    ) -> Result<Option<Value>, Error> {
        context.run(|scope| {
            let function = JsValue::Object(scope.resolve(&self.handle)?);
            let this = match this {
                Some(this) => scope.unwrap(this)?,
                None => JsValue::Undefined,
            };
            let args = scope.unwrap_vector(args)?;
            let result = scope.catch(scope.isolate().call(&function, this, &args))?;
            scope.wrap(result)
        })
    }

    /// `new function(...args)`
    pub fn try_construct(
        &self,
        context: &Context,
        args: &[Option<Value>],
    ) -> Result<Option<Value>, Error> {
        context.run(|scope| {
            let function = JsValue::Object(scope.resolve(&self.handle)?);
            let args = scope.unwrap_vector(args)?;
            let result = scope.catch(scope.isolate().construct(&function, &args))?;
            scope.wrap(result)
        })
    }

    pub fn construct(&self, context: &Context, args: &[Option<Value>]) -> Option<Value> {
        context.report(self.try_construct(context, args)).flatten()
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({:?})", self.handle)
    }
}

/// A host pointer owned by a script object
#[derive(Clone)]
pub struct External {
    handle: Persistent,
    pointer: *mut c_void,
}

// SAFETY: the pointer is opaque to this crate and never dereferenced here;
// what it points to is the host's business.
unsafe impl Send for External {}
unsafe impl Sync for External {}

impl External {
    pub(crate) fn from_handle(handle: Persistent, pointer: *mut c_void) -> Self {
        External { handle, pointer }
    }

    pub(crate) fn handle(&self) -> &Persistent {
        &self.handle
    }

    #[inline]
    pub fn pointer(&self) -> *mut c_void {
        self.pointer
    }

    pub fn as_object(&self) -> Object {
        Object::from_handle(self.handle.clone())
    }
}

impl fmt::Debug for External {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "External({:?}, {:p})", self.handle, self.pointer)
    }
}
