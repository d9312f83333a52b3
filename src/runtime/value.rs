//! Engine values
//!
//! `JsValue` is what running scripts compute with. Objects live in the heap
//! and are referenced by `ObjectRef`; every other kind is stored inline.

use std::fmt;
use std::rc::Rc;

use crate::gc::ObjectRef;
use crate::util::dtoa;

/// A script value
#[derive(Clone, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(ObjectRef),
}

impl JsValue {
    /// Build a string value
    pub fn string(s: &str) -> JsValue {
        JsValue::String(Rc::from(s))
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, JsValue::Null)
    }

    /// `null` or `undefined`
    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self, JsValue::Undefined | JsValue::Null)
    }

    #[inline]
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            JsValue::Object(r) => Some(*r),
            _ => None,
        }
    }

    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            JsValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The number as an `i32` when it is integral, in range and not `-0`
    pub fn as_int32(&self) -> Option<i32> {
        let n = self.as_number()?;
        if n.fract() != 0.0 || n < i32::MIN as f64 || n > i32::MAX as f64 {
            return None;
        }
        if n == 0.0 && n.is_sign_negative() {
            return None;
        }
        Some(n as i32)
    }

    /// ToBoolean
    pub fn truthy(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Bool(b) => *b,
            JsValue::Number(n) => !(*n == 0.0 || n.is_nan()),
            JsValue::String(s) => !s.is_empty(),
            JsValue::Object(_) => true,
        }
    }

    /// Strict equality (`===`)
    pub fn strict_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) | (JsValue::Null, JsValue::Null) => true,
            (JsValue::Bool(a), JsValue::Bool(b)) => a == b,
            (JsValue::Number(a), JsValue::Number(b)) => a == b,
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => a == b,
            _ => false,
        }
    }

    /// ToString for primitives; objects need the interpreter
    pub fn primitive_to_string(&self) -> Option<Rc<str>> {
        Some(match self {
            JsValue::Undefined => Rc::from("undefined"),
            JsValue::Null => Rc::from("null"),
            JsValue::Bool(true) => Rc::from("true"),
            JsValue::Bool(false) => Rc::from("false"),
            JsValue::Number(n) => Rc::from(dtoa::number_to_string(*n)),
            JsValue::String(s) => s.clone(),
            JsValue::Object(_) => return None,
        })
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Bool(b) => write!(f, "{}", b),
            JsValue::Number(n) => write!(f, "{}", dtoa::number_to_string(*n)),
            JsValue::String(s) => write!(f, "{:?}", s),
            JsValue::Object(r) => write!(f, "[object #{}]", r.index()),
        }
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::Number(n)
    }
}

impl From<i32> for JsValue {
    fn from(n: i32) -> Self {
        JsValue::Number(n as f64)
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Bool(b)
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        JsValue::string(s)
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        JsValue::String(Rc::from(s))
    }
}

impl From<Rc<str>> for JsValue {
    fn from(s: Rc<str>) -> Self {
        JsValue::String(s)
    }
}

impl From<ObjectRef> for JsValue {
    fn from(r: ObjectRef) -> Self {
        JsValue::Object(r)
    }
}
