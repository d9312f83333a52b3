//! JavaScript object representation
//!
//! This module implements the JSObject struct and related types for
//! representing JavaScript objects in the engine.

use std::any::Any;
use std::collections::HashMap;
use std::ffi::c_void;
use std::rc::Rc;

use crate::gc::ObjectRef;
use crate::runtime::function::Function;
use crate::runtime::property::PropertyTable;
use crate::runtime::string::array_index;
use crate::runtime::value::JsValue;
use crate::util::unicode;

/// Largest gap an index store may open past the end of a dense array
const MAX_DENSE_GROWTH: usize = 1 << 20;

/// JavaScript class IDs
///
/// These identify the type of a JavaScript object and determine its behavior.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassId {
    /// Plain object
    Object = 0,
    /// Array
    Array = 1,
    /// Any callable
    Function = 2,
    /// Boxed Number
    Number = 3,
    /// Boxed Boolean
    Boolean = 4,
    /// Boxed String
    String = 5,
    /// RegExp object
    RegExp = 6,

    /// Error types
    Error = 7,
    RangeError = 8,
    ReferenceError = 9,
    SyntaxError = 10,
    TypeError = 11,

    /// Opaque host pointer
    External = 12,
    /// Function activation record
    Environment = 13,
    /// `arguments` object
    Arguments = 14,
}

impl ClassId {
    /// Check if this is an error class
    #[inline]
    pub fn is_error(self) -> bool {
        (self as u8) >= (ClassId::Error as u8) && (self as u8) <= (ClassId::TypeError as u8)
    }

    /// Tag used by `Object.prototype.toString`
    pub fn tag(self) -> &'static str {
        match self {
            ClassId::Object | ClassId::External | ClassId::Environment => "Object",
            ClassId::Array => "Array",
            ClassId::Function => "Function",
            ClassId::Number => "Number",
            ClassId::Boolean => "Boolean",
            ClassId::String => "String",
            ClassId::RegExp => "RegExp",
            ClassId::Arguments => "Arguments",
            _ => "Error",
        }
    }
}

/// Variable bindings of one function activation
#[derive(Debug, Default)]
pub struct Environment {
    pub vars: HashMap<Rc<str>, JsValue>,
    /// Enclosing scope; `None` is the global scope
    pub parent: Option<ObjectRef>,
}

/// Host pointer carried by an External object
pub struct ExternalData {
    pub pointer: *mut c_void,
    /// Run once when the object is swept
    pub freer: Option<Box<dyn FnOnce(*mut c_void)>>,
    /// Host-side payload, e.g. the callback behind a host function
    pub payload: Option<Box<dyn Any>>,
}

pub struct RegExpData {
    pub regex: regex::Regex,
    pub source: Rc<str>,
    pub flags: Rc<str>,
}

impl RegExpData {
    pub fn global(&self) -> bool {
        self.flags.contains('g')
    }
}

/// Per-class payload
pub enum ObjectKind {
    Ordinary,
    Array(Vec<JsValue>),
    Function(Function),
    /// Boxed Number/Boolean/String
    Primitive(JsValue),
    RegExp(Box<RegExpData>),
    External(ExternalData),
    Environment(Environment),
}

/// A heap object
pub struct JsObject {
    pub class: ClassId,
    pub proto: Option<ObjectRef>,
    pub properties: PropertyTable,
    pub kind: ObjectKind,
}

impl JsObject {
    pub fn new(class: ClassId, proto: Option<ObjectRef>, kind: ObjectKind) -> Self {
        JsObject {
            class,
            proto,
            properties: PropertyTable::new(),
            kind,
        }
    }

    /// Plain object with the given prototype
    pub fn ordinary(proto: Option<ObjectRef>) -> Self {
        Self::new(ClassId::Object, proto, ObjectKind::Ordinary)
    }

    pub fn function(&self) -> Option<&Function> {
        match &self.kind {
            ObjectKind::Function(f) => Some(f),
            _ => None,
        }
    }

    #[inline]
    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }

    pub fn elements(&self) -> Option<&Vec<JsValue>> {
        match &self.kind {
            ObjectKind::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn elements_mut(&mut self) -> Option<&mut Vec<JsValue>> {
        match &mut self.kind {
            ObjectKind::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn environment(&self) -> Option<&Environment> {
        match &self.kind {
            ObjectKind::Environment(env) => Some(env),
            _ => None,
        }
    }

    pub fn environment_mut(&mut self) -> Option<&mut Environment> {
        match &mut self.kind {
            ObjectKind::Environment(env) => Some(env),
            _ => None,
        }
    }

    /// Own property lookup, including virtual array and string properties
    pub fn get_own(&self, key: &str) -> Option<JsValue> {
        match &self.kind {
            ObjectKind::Array(items) => {
                if key == "length" {
                    return Some(JsValue::Number(items.len() as f64));
                }
                if let Some(index) = array_index(key) {
                    if let Some(value) = items.get(index as usize) {
                        return Some(value.clone());
                    }
                }
            }
            ObjectKind::Primitive(JsValue::String(s)) => {
                if key == "length" {
                    return Some(JsValue::Number(unicode::utf16_len(s) as f64));
                }
                if let Some(index) = array_index(key) {
                    if let Some(c) = unicode::char_at_utf16(s, index as usize) {
                        return Some(JsValue::from(c.to_string()));
                    }
                }
            }
            _ => {}
        }
        self.properties.get(key).map(|p| p.value.clone())
    }

    pub fn has_own(&self, key: &str) -> bool {
        match &self.kind {
            ObjectKind::Array(items) => {
                if key == "length" || array_index(key).is_some_and(|i| (i as usize) < items.len()) {
                    return true;
                }
            }
            ObjectKind::Primitive(JsValue::String(s)) => {
                if key == "length"
                    || array_index(key).is_some_and(|i| (i as usize) < unicode::utf16_len(s))
                {
                    return true;
                }
            }
            _ => {}
        }
        self.properties.has(key)
    }

    /// Store an own property
    ///
    /// Fails only for an invalid array `length`.
    pub fn set_own(&mut self, key: &str, value: JsValue) -> Result<(), &'static str> {
        if let ObjectKind::Array(items) = &mut self.kind {
            if key == "length" {
                let len = value.as_number().unwrap_or(f64::NAN);
                if len.fract() != 0.0 || !(0.0..=u32::MAX as f64).contains(&len) {
                    return Err("Invalid array length");
                }
                let len = len as usize;
                if len > items.len() + MAX_DENSE_GROWTH {
                    return Err("Invalid array length");
                }
                items.resize(len, JsValue::Undefined);
                return Ok(());
            }
            if let Some(index) = array_index(key) {
                let index = index as usize;
                if index < items.len() {
                    items[index] = value;
                    return Ok(());
                }
                if index <= items.len() + MAX_DENSE_GROWTH {
                    items.resize(index, JsValue::Undefined);
                    items.push(value);
                    return Ok(());
                }
            }
        }
        self.properties.set(key, value);
        Ok(())
    }

    /// Define a builtin-style property
    pub fn define(&mut self, key: &str, value: JsValue, enumerable: bool) {
        self.properties.define(key, value, enumerable);
    }

    pub fn delete_own(&mut self, key: &str) -> bool {
        if let ObjectKind::Array(items) = &mut self.kind {
            if let Some(index) = array_index(key) {
                let index = index as usize;
                if index < items.len() {
                    // Holes read back as undefined
                    items[index] = JsValue::Undefined;
                    return true;
                }
            }
        }
        self.properties.delete(key)
    }

    /// Own enumerable keys: indices first, then named properties
    pub fn own_enumerable_keys(&self) -> Vec<Rc<str>> {
        let mut keys: Vec<Rc<str>> = match &self.kind {
            ObjectKind::Array(items) => (0..items.len()).map(|i| Rc::from(i.to_string())).collect(),
            ObjectKind::Primitive(JsValue::String(s)) => (0..unicode::utf16_len(s))
                .map(|i| Rc::from(i.to_string()))
                .collect(),
            _ => Vec::new(),
        };
        keys.extend(self.properties.enumerable_keys().cloned());
        keys
    }

    /// Collect every heap reference this object holds
    pub fn trace(&self, out: &mut Vec<ObjectRef>) {
        out.extend(self.proto);
        for prop in self.properties.iter() {
            out.extend(prop.value.as_object());
        }
        match &self.kind {
            ObjectKind::Array(items) => out.extend(items.iter().filter_map(JsValue::as_object)),
            ObjectKind::Function(f) => f.trace(out),
            ObjectKind::Environment(env) => {
                out.extend(env.parent);
                out.extend(env.vars.values().filter_map(JsValue::as_object));
            }
            ObjectKind::Ordinary
            | ObjectKind::Primitive(_)
            | ObjectKind::RegExp(_)
            | ObjectKind::External(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_id_is_error() {
        assert!(ClassId::Error.is_error());
        assert!(ClassId::TypeError.is_error());
        assert!(!ClassId::Object.is_error());
        assert!(!ClassId::External.is_error());
    }

    #[test]
    fn test_array_virtual_properties() {
        let mut array = JsObject::new(
            ClassId::Array,
            None,
            ObjectKind::Array(vec![JsValue::Number(1.0), JsValue::Number(2.0)]),
        );

        assert_eq!(array.get_own("length").and_then(|v| v.as_number()), Some(2.0));
        assert_eq!(array.get_own("1").and_then(|v| v.as_number()), Some(2.0));
        assert!(array.get_own("2").is_none());

        array.set_own("4", JsValue::Bool(true)).unwrap();
        assert_eq!(array.elements().map(Vec::len), Some(5));
        assert!(array.get_own("3").is_some_and(|v| v.is_undefined()));

        array.set_own("length", JsValue::Number(1.0)).unwrap();
        assert_eq!(array.elements().map(Vec::len), Some(1));
        assert!(array.set_own("length", JsValue::Number(-1.0)).is_err());
    }

    #[test]
    fn test_boxed_string_indices() {
        let boxed = JsObject::new(
            ClassId::String,
            None,
            ObjectKind::Primitive(JsValue::string("hey")),
        );
        assert_eq!(boxed.get_own("length").and_then(|v| v.as_number()), Some(3.0));
        assert_eq!(boxed.get_own("1").as_ref().and_then(JsValue::as_str), Some("e"));
        assert!(boxed.has_own("2"));
        assert!(!boxed.has_own("3"));
        assert_eq!(boxed.own_enumerable_keys().len(), 3);
    }

    #[test]
    fn test_trace_collects_references() {
        let mut object = JsObject::ordinary(Some(ObjectRef::from_index(1)));
        object.set_own("child", JsValue::Object(ObjectRef::from_index(2))).unwrap();
        object.set_own("n", JsValue::Number(3.0)).unwrap();

        let mut refs = Vec::new();
        object.trace(&mut refs);
        assert_eq!(refs, vec![ObjectRef::from_index(1), ObjectRef::from_index(2)]);
    }
}
