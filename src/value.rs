//! Portable values
//!
//! `Value` is what crosses the boundary: a closed set of variants that a
//! host can inspect without touching the engine. Numbers, booleans and
//! strings are plain data. Objects, arrays, functions and externals pin
//! one engine object each through a persistent handle, so they stay valid
//! across execution scopes until dropped.
//!
//! Absence (`Option::None`) stands for script `null` and `undefined`.

use std::fmt;
use std::sync::Arc;

use crate::callback::Callback;
use crate::context::Context;
use crate::object::{Array, External, Function, Object};

/// Kind of a `Value`, readable without engine access
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int = 0,
    Double = 1,
    Bool = 2,
    String = 3,
    Object = 4,
    Array = 5,
    Function = 6,
    Callback = 7,
    External = 8,
}

/// Owned byte buffer; may hold embedded NULs and need not be UTF-8
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteString(Vec<u8>);

impl ByteString {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        ByteString(bytes.into())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// UTF-8 view, with invalid sequences replaced
    pub fn to_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_str_lossy())
    }
}

impl fmt::Display for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str_lossy())
    }
}

impl From<&str> for ByteString {
    fn from(s: &str) -> Self {
        ByteString(s.as_bytes().to_vec())
    }
}

impl From<String> for ByteString {
    fn from(s: String) -> Self {
        ByteString(s.into_bytes())
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(bytes: Vec<u8>) -> Self {
        ByteString(bytes)
    }
}

impl From<&[u8]> for ByteString {
    fn from(bytes: &[u8]) -> Self {
        ByteString(bytes.to_vec())
    }
}

/// A value exchanged with the engine
///
/// Cloning a string copies its bytes; cloning an object-like value pins the
/// same engine object again through a new handle.
#[derive(Clone)]
pub enum Value {
    Int(i32),
    Double(f64),
    Bool(bool),
    String(ByteString),
    Object(Object),
    Array(Array),
    Function(Function),
    /// Host function, not yet handed to the engine
    Callback(Arc<dyn Callback>),
    External(External),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Int(_) => ValueType::Int,
            Value::Double(_) => ValueType::Double,
            Value::Bool(_) => ValueType::Bool,
            Value::String(_) => ValueType::String,
            Value::Object(_) => ValueType::Object,
            Value::Array(_) => ValueType::Array,
            Value::Function(_) => ValueType::Function,
            Value::Callback(_) => ValueType::Callback,
            Value::External(_) => ValueType::External,
        }
    }

    pub fn callback(callback: impl Callback + 'static) -> Value {
        Value::Callback(Arc::new(callback))
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The number, for `Int` as well as `Double`
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(f64::from(*i)),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&ByteString> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Object view of any object-like value
    pub fn as_object(&self) -> Option<Object> {
        match self {
            Value::Object(o) => Some(o.clone()),
            Value::Array(a) => Some(a.as_object()),
            Value::Function(f) => Some(f.as_object()),
            Value::External(e) => Some(e.as_object()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_external(&self) -> Option<&External> {
        match self {
            Value::External(e) => Some(e),
            _ => None,
        }
    }

    /// Script `===` over two optional values
    pub fn strict_equals(context: &Context, a: Option<&Value>, b: Option<&Value>) -> bool {
        context.strict_equals(a, b)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Double(d) => write!(f, "Double({})", d),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Object(o) => write!(f, "{:?}", o),
            Value::Array(a) => write!(f, "{:?}", a),
            Value::Function(func) => write!(f, "{:?}", func),
            Value::Callback(_) => write!(f, "Callback"),
            Value::External(e) => write!(f, "{:?}", e),
        }
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(ByteString::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(ByteString::from(s))
    }
}

impl From<ByteString> for Value {
    fn from(s: ByteString) -> Self {
        Value::String(s)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<External> for Value {
    fn from(e: External) -> Self {
        Value::External(e)
    }
}

impl From<Arc<dyn Callback>> for Value {
    fn from(callback: Arc<dyn Callback>) -> Self {
        Value::Callback(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{Arguments, CallbackResult};
    use crate::test_support;

    #[test]
    fn test_primitive_accessors() {
        assert_eq!(Value::from(7).value_type(), ValueType::Int);
        assert_eq!(Value::from(7).as_double(), Some(7.0));
        assert_eq!(Value::from(2.5).as_int(), None);
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from("hi").as_string().map(ByteString::as_bytes), Some(&b"hi"[..]));
        assert!(Value::from(1).as_object().is_none());
    }

    #[test]
    fn test_strings_keep_embedded_nul() {
        let s = ByteString::new(b"a\0b".to_vec());
        assert_eq!(s.len(), 3);
        let copy = Value::from(s.clone());
        assert_eq!(copy.as_string(), Some(&s));
        assert_eq!(format!("{:?}", s), "\"a\\0b\"");
    }

    #[test]
    fn test_callback_type_needs_no_engine() {
        let value = Value::callback(|_: &Context, _: &mut Arguments| -> CallbackResult {
            Ok(None)
        });
        assert_eq!(value.value_type(), ValueType::Callback);
    }

    #[test]
    fn test_strict_equals() {
        let context = test_support::context();
        let a = context.evaluate("eq.js", "({})");
        let b = a.clone();
        assert!(Value::strict_equals(&context, a.as_ref(), b.as_ref()));
        assert!(Value::strict_equals(&context, None, None));
        assert!(Value::strict_equals(&context, Some(&Value::Int(1)), Some(&Value::Double(1.0))));
        assert!(!Value::strict_equals(&context, Some(&Value::from("1")), Some(&Value::Int(1))));
    }
}
