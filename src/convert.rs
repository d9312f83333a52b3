//! Conversion between engine values and portable values
//!
//! `wrap` classifies an engine value in a fixed order, first match wins:
//! integer, number or boxed number, boolean or boxed boolean, string or
//! boxed string, array, function, external, object, and finally `null` /
//! `undefined` which become `None`. Boxed primitives are objects too, so
//! the order decides that `new Number(1)` comes out as a `Double`.
//!
//! `unwrap` is the inverse. Object-like values hand back their pinned
//! object; a callback is turned into a host function the first time it
//! crosses (see `callback`).

use std::ffi::c_void;

use crate::callback;
use crate::error::{Error, RuntimeError};
use crate::object::{Array, External, Function, Object};
use crate::runtime::object::{ClassId, ObjectKind};
use crate::runtime::value::JsValue;
use crate::scope::ExecutionScope;
use crate::value::{ByteString, Value};

/// What an engine object looks like from the boundary
enum Shape {
    Boxed(JsValue),
    Array,
    Function,
    External(*mut c_void),
    Object,
    Unhandled(&'static str),
}

impl ExecutionScope<'_> {
    /// Engine value to portable value
    pub fn wrap(&self, value: JsValue) -> Result<Option<Value>, Error> {
        let r = match value {
            JsValue::Undefined | JsValue::Null => return Ok(None),
            JsValue::Number(n) => return Ok(Some(number(n))),
            JsValue::Bool(b) => return Ok(Some(Value::Bool(b))),
            JsValue::String(s) => return Ok(Some(Value::String(ByteString::from(&*s)))),
            JsValue::Object(r) => r,
        };

        let shape = self.isolate().with_object(r, |object| match &object.kind {
            ObjectKind::Primitive(inner) => Shape::Boxed(inner.clone()),
            ObjectKind::Array(_) if object.class == ClassId::Array => Shape::Array,
            ObjectKind::Function(_) => Shape::Function,
            ObjectKind::External(data) => Shape::External(data.pointer),
            ObjectKind::Environment(_) => Shape::Unhandled("environment"),
            _ => Shape::Object,
        });

        let wrapped = match shape {
            Shape::Boxed(JsValue::Number(n)) => Value::Double(n),
            Shape::Boxed(JsValue::Bool(b)) => Value::Bool(b),
            Shape::Boxed(JsValue::String(s)) => Value::String(ByteString::from(&*s)),
            Shape::Boxed(_) => return Err(RuntimeError::UnhandledType("boxed value").into()),
            Shape::Array => Value::Array(Array::from_handle(self.persist(r))),
            Shape::Function => Value::Function(Function::from_handle(self.persist(r))),
            Shape::External(pointer) => {
                Value::External(External::from_handle(self.persist(r), pointer))
            }
            Shape::Object => Value::Object(Object::from_handle(self.persist(r))),
            Shape::Unhandled(kind) => return Err(RuntimeError::UnhandledType(kind).into()),
        };
        Ok(Some(wrapped))
    }

    /// Portable value to engine value; `None` is `null`
    pub fn unwrap(&self, value: Option<&Value>) -> Result<JsValue, Error> {
        let Some(value) = value else {
            return Ok(JsValue::Null);
        };
        let unwrapped = match value {
            Value::Int(i) => JsValue::Number(f64::from(*i)),
            Value::Double(d) => JsValue::Number(*d),
            Value::Bool(b) => JsValue::Bool(*b),
            Value::String(s) => {
                if s.len() > self.isolate().config().max_string_length {
                    return Err(RuntimeError::StringTooLong(s.len()).into());
                }
                JsValue::from(s.to_str_lossy().into_owned())
            }
            Value::Object(o) => JsValue::Object(self.resolve(o.handle())?),
            Value::Array(a) => JsValue::Object(self.resolve(a.handle())?),
            Value::Function(f) => JsValue::Object(self.resolve(f.handle())?),
            Value::External(e) => JsValue::Object(self.resolve(e.handle())?),
            Value::Callback(cb) => {
                let function = callback::unwrap_callback(self, cb);
                self.local(&function);
                function
            }
        };
        Ok(unwrapped)
    }

    /// Element-wise `unwrap`, keeping order
    pub fn unwrap_vector(&self, values: &[Option<Value>]) -> Result<Vec<JsValue>, Error> {
        values.iter().map(|value| self.unwrap(value.as_ref())).collect()
    }
}

fn number(n: f64) -> Value {
    match JsValue::Number(n).as_int32() {
        Some(i) => Value::Int(i),
        None => Value::Double(n),
    }
}
