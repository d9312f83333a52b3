//! Object model operations
//!
//! Property access along prototype chains, type conversions, equality and
//! the call/construct protocol. These are shared by the interpreter, the
//! builtins and the host boundary.

use std::collections::HashSet;
use std::ffi::c_void;
use std::rc::Rc;

use crate::gc::ObjectRef;
use crate::isolate::Isolate;
use crate::runtime::function::{CallInfo, Function, NativeFunction};
use crate::runtime::object::{ClassId, ExternalData, JsObject, ObjectKind, RegExpData};
use crate::runtime::string::{array_index, string_to_number};
use crate::runtime::value::JsValue;
use crate::util::{dtoa, unicode};
use crate::vm::exception::{ErrorKind, Exception, JsResult, ThrowSite};

/// Preferred type for `ToPrimitive`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Number,
    String,
}

impl Isolate {
    // ----- object creation -----

    pub fn new_object(&self) -> ObjectRef {
        self.alloc(JsObject::ordinary(Some(self.realm().object_proto)))
    }

    pub fn new_array(&self, items: Vec<JsValue>) -> ObjectRef {
        self.alloc(JsObject::new(
            ClassId::Array,
            Some(self.realm().array_proto),
            ObjectKind::Array(items),
        ))
    }

    /// Wrap a function, adding `name` and `length`
    ///
    /// Script closures also get a fresh `prototype` object.
    pub fn new_function(&self, function: Function, name: &str, length: usize) -> ObjectRef {
        let is_closure = matches!(function, Function::Closure { .. });
        let f = self.alloc(JsObject::new(
            ClassId::Function,
            Some(self.realm().function_proto),
            ObjectKind::Function(function),
        ));
        self.with_object_mut(f, |object| {
            object.define("name", JsValue::string(name), false);
            object.define("length", JsValue::Number(length as f64), false);
        });
        if is_closure {
            let prototype = self.new_object();
            self.define_property(prototype, "constructor", JsValue::Object(f), false);
            self.define_property(f, "prototype", JsValue::Object(prototype), false);
        }
        f
    }

    pub fn new_native(&self, name: &str, call: NativeFunction, length: usize) -> ObjectRef {
        let function = Function::Native {
            call,
            data: JsValue::Undefined,
            constructor: false,
        };
        self.new_function(function, name, length)
    }

    /// Native constructor wired to `prototype`
    pub fn new_constructor(
        &self,
        name: &str,
        call: NativeFunction,
        length: usize,
        prototype: ObjectRef,
    ) -> ObjectRef {
        let function = Function::Native {
            call,
            data: JsValue::Undefined,
            constructor: true,
        };
        let f = self.new_function(function, name, length);
        self.define_property(f, "prototype", JsValue::Object(prototype), false);
        self.define_property(prototype, "constructor", JsValue::Object(f), false);
        f
    }

    /// Host function: `call` receives `data` on every invocation
    pub fn new_host_function(&self, call: NativeFunction, data: JsValue) -> ObjectRef {
        let function = Function::Native {
            call,
            data,
            constructor: true,
        };
        self.new_function(function, "", 0)
    }

    pub fn new_external(
        &self,
        pointer: *mut c_void,
        freer: Option<Box<dyn FnOnce(*mut c_void)>>,
        payload: Option<Box<dyn std::any::Any>>,
    ) -> ObjectRef {
        self.alloc(JsObject::new(
            ClassId::External,
            Some(self.realm().object_proto),
            ObjectKind::External(ExternalData {
                pointer,
                freer,
                payload,
            }),
        ))
    }

    /// Box a primitive (`ToObject` for non-nullish primitives)
    pub fn new_primitive_wrapper(&self, value: JsValue) -> ObjectRef {
        let realm = self.realm();
        let (class, proto) = match value {
            JsValue::Bool(_) => (ClassId::Boolean, realm.boolean_proto),
            JsValue::String(_) => (ClassId::String, realm.string_proto),
            _ => (ClassId::Number, realm.number_proto),
        };
        self.alloc(JsObject::new(class, Some(proto), ObjectKind::Primitive(value)))
    }

    /// Error object with `message` and a `stack` captured from the call stack
    pub fn new_error(&self, kind: ErrorKind, message: &str) -> ObjectRef {
        let class = match kind {
            ErrorKind::Error => ClassId::Error,
            ErrorKind::TypeError => ClassId::TypeError,
            ErrorKind::ReferenceError => ClassId::ReferenceError,
            ErrorKind::SyntaxError => ClassId::SyntaxError,
            ErrorKind::RangeError => ClassId::RangeError,
        };
        let error = self.alloc(JsObject::new(
            class,
            Some(self.realm().error_proto(kind)),
            ObjectKind::Ordinary,
        ));
        let mut stack = if message.is_empty() {
            kind.name().to_string()
        } else {
            format!("{}: {}", kind.name(), message)
        };
        let trace = self.frames.borrow().trace();
        if !trace.is_empty() {
            stack.push('\n');
            stack.push_str(&trace);
        }
        self.with_object_mut(error, |object| {
            if !message.is_empty() {
                object.define("message", JsValue::string(message), false);
            }
            object.define("stack", JsValue::from(stack), false);
        });
        error
    }

    pub fn new_regexp(&self, pattern: &str, flags: &str) -> JsResult<ObjectRef> {
        let mut seen = HashSet::new();
        if !flags.chars().all(|c| "gimsuy".contains(c) && seen.insert(c)) {
            return Err(self.error(
                ErrorKind::SyntaxError,
                &format!("Invalid flags supplied to RegExp constructor '{}'", flags),
            ));
        }
        let regex = regex::RegexBuilder::new(&translate_pattern(pattern))
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'))
            .size_limit(1 << 20)
            .build()
            .map_err(|e| {
                let detail = e.to_string();
                let reason = detail.lines().last().unwrap_or("invalid pattern").trim();
                self.error(
                    ErrorKind::SyntaxError,
                    &format!("Invalid regular expression: /{}/: {}", pattern, reason),
                )
            })?;
        let source: Rc<str> = if pattern.is_empty() {
            Rc::from("(?:)")
        } else {
            Rc::from(pattern)
        };
        let data = RegExpData {
            regex,
            source: Rc::clone(&source),
            flags: Rc::from(flags),
        };
        let global = data.global();
        let r = self.alloc(JsObject::new(
            ClassId::RegExp,
            Some(self.realm().regexp_proto),
            ObjectKind::RegExp(Box::new(data)),
        ));
        self.with_object_mut(r, |object| {
            object.define("lastIndex", JsValue::Number(0.0), false);
            object.define("source", JsValue::String(source), false);
            object.define("flags", JsValue::string(flags), false);
            object.define("global", JsValue::Bool(global), false);
        });
        Ok(r)
    }

    /// String value, or `RangeError` past the configured limit
    pub fn checked_string(&self, s: String) -> JsResult<JsValue> {
        if s.len() > self.config().max_string_length {
            return Err(self.error(ErrorKind::RangeError, "Invalid string length"));
        }
        Ok(JsValue::from(s))
    }

    // ----- exceptions -----

    /// Location and trace of the innermost script frame
    pub fn capture_site(&self) -> Option<Rc<ThrowSite>> {
        let frames = self.frames.borrow();
        let top = frames.top()?;
        Some(Rc::new(ThrowSite {
            file: Rc::clone(&top.source.name),
            line: top.line,
            source_line: top.source.line(top.line as usize).to_string(),
            stack: frames.trace(),
        }))
    }

    /// Throw `value` from the current position
    pub fn exception(&self, value: JsValue) -> Exception {
        Exception::new(value, self.capture_site())
    }

    /// A fresh native error, ready to be returned as `Err`
    pub fn error(&self, kind: ErrorKind, message: &str) -> Exception {
        let error = self.new_error(kind, message);
        self.exception(JsValue::Object(error))
    }

    pub fn type_error(&self, message: &str) -> Exception {
        self.error(ErrorKind::TypeError, message)
    }

    // ----- property access -----

    /// Lookup along the prototype chain
    pub fn get_property(&self, r: ObjectRef, key: &str) -> JsValue {
        let heap = self.heap();
        let mut current = Some(r);
        while let Some(r) = current {
            let object = heap.get(r);
            if let Some(value) = object.get_own(key) {
                return value;
            }
            current = object.proto;
        }
        JsValue::Undefined
    }

    /// `target[key]` for any value
    pub fn get(&self, target: &JsValue, key: &str) -> JsResult<JsValue> {
        let realm = self.realm();
        let proto = match target {
            JsValue::Object(r) => return Ok(self.get_property(*r, key)),
            JsValue::Undefined | JsValue::Null => {
                return Err(self.type_error(&format!(
                    "Cannot read properties of {} (reading '{}')",
                    if target.is_null() { "null" } else { "undefined" },
                    key
                )));
            }
            JsValue::String(s) => {
                if key == "length" {
                    return Ok(JsValue::Number(unicode::utf16_len(s) as f64));
                }
                if let Some(index) = array_index(key) {
                    if let Some(c) = unicode::char_at_utf16(s, index as usize) {
                        return Ok(JsValue::from(c.to_string()));
                    }
                }
                realm.string_proto
            }
            JsValue::Number(_) => realm.number_proto,
            JsValue::Bool(_) => realm.boolean_proto,
        };
        Ok(self.get_property(proto, key))
    }

    pub fn set_property(&self, r: ObjectRef, key: &str, value: JsValue) -> JsResult<()> {
        let result = self.with_object_mut(r, |object| object.set_own(key, value));
        result.map_err(|message| self.error(ErrorKind::RangeError, message))
    }

    /// `target[key] = value`; stores on primitives are dropped
    pub fn set(&self, target: &JsValue, key: &str, value: JsValue) -> JsResult<()> {
        match target {
            JsValue::Object(r) => self.set_property(*r, key, value),
            JsValue::Undefined | JsValue::Null => Err(self.type_error(&format!(
                "Cannot set properties of {} (setting '{}')",
                if target.is_null() { "null" } else { "undefined" },
                key
            ))),
            _ => Ok(()),
        }
    }

    pub fn define_property(&self, r: ObjectRef, key: &str, value: JsValue, enumerable: bool) {
        self.with_object_mut(r, |object| object.define(key, value, enumerable));
    }

    pub fn has_own_property(&self, r: ObjectRef, key: &str) -> bool {
        self.with_object(r, |object| object.has_own(key))
    }

    /// The `in` operator
    pub fn has_property(&self, r: ObjectRef, key: &str) -> bool {
        let heap = self.heap();
        let mut current = Some(r);
        while let Some(r) = current {
            let object = heap.get(r);
            if object.has_own(key) {
                return true;
            }
            current = object.proto;
        }
        false
    }

    pub fn delete_property(&self, r: ObjectRef, key: &str) -> bool {
        self.with_object_mut(r, |object| {
            object.delete_own(key);
            true
        })
    }

    pub fn own_keys(&self, r: ObjectRef) -> Vec<Rc<str>> {
        self.with_object(r, JsObject::own_enumerable_keys)
    }

    /// Keys visited by `for-in`: own enumerable keys, then inherited ones
    /// not shadowed by anything closer
    pub fn for_in_keys(&self, r: ObjectRef) -> Vec<Rc<str>> {
        let heap = self.heap();
        let mut seen: HashSet<Rc<str>> = HashSet::new();
        let mut keys = Vec::new();
        let mut current = Some(r);
        while let Some(r) = current {
            let object = heap.get(r);
            for key in object.own_enumerable_keys() {
                if seen.insert(Rc::clone(&key)) {
                    keys.push(key);
                }
            }
            seen.extend(object.properties.iter().map(|p| Rc::clone(&p.key)));
            current = object.proto;
        }
        keys
    }

    pub fn class_of(&self, r: ObjectRef) -> ClassId {
        self.with_object(r, |object| object.class)
    }

    pub fn is_callable(&self, value: &JsValue) -> bool {
        value
            .as_object()
            .is_some_and(|r| self.with_object(r, JsObject::is_callable))
    }

    pub fn is_array(&self, value: &JsValue) -> bool {
        value
            .as_object()
            .is_some_and(|r| self.class_of(r) == ClassId::Array)
    }

    /// Copy of an array's elements
    pub fn array_elements(&self, r: ObjectRef) -> Option<Vec<JsValue>> {
        self.with_object(r, |object| object.elements().cloned())
    }

    // ----- conversions -----

    pub fn type_of(&self, value: &JsValue) -> &'static str {
        match value {
            JsValue::Undefined => "undefined",
            JsValue::Null => "object",
            JsValue::Bool(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Object(_) if self.is_callable(value) => "function",
            JsValue::Object(_) => "object",
        }
    }

    pub fn to_primitive(&self, value: &JsValue, hint: Hint) -> JsResult<JsValue> {
        let JsValue::Object(r) = value else {
            return Ok(value.clone());
        };
        let order = match hint {
            Hint::Number => ["valueOf", "toString"],
            Hint::String => ["toString", "valueOf"],
        };
        for name in order {
            let method = self.get_property(*r, name);
            if self.is_callable(&method) {
                let result = self.call(&method, value.clone(), &[])?;
                if result.as_object().is_none() {
                    return Ok(result);
                }
            }
        }
        Err(self.type_error("Cannot convert object to primitive value"))
    }

    pub fn to_number(&self, value: &JsValue) -> JsResult<f64> {
        Ok(match value {
            JsValue::Undefined => f64::NAN,
            JsValue::Null => 0.0,
            JsValue::Bool(b) => *b as u8 as f64,
            JsValue::Number(n) => *n,
            JsValue::String(s) => string_to_number(s),
            JsValue::Object(_) => {
                let primitive = self.to_primitive(value, Hint::Number)?;
                return self.to_number(&primitive);
            }
        })
    }

    pub fn to_string(&self, value: &JsValue) -> JsResult<Rc<str>> {
        if let Some(s) = value.primitive_to_string() {
            return Ok(s);
        }
        let primitive = self.to_primitive(value, Hint::String)?;
        self.to_string(&primitive)
    }

    /// ToString without running script; objects show their class tag
    pub fn display_string(&self, value: &JsValue) -> String {
        match value {
            JsValue::Object(r) => {
                if self.is_callable(value) {
                    return "function".to_string();
                }
                format!("[object {}]", self.class_of(*r).tag())
            }
            _ => value.primitive_to_string().map(|s| s.to_string()).unwrap_or_default(),
        }
    }

    /// Property key for an index expression
    pub fn to_property_key(&self, value: &JsValue) -> JsResult<Rc<str>> {
        match value {
            JsValue::Number(n) => Ok(Rc::from(dtoa::number_to_string(*n))),
            _ => self.to_string(value),
        }
    }

    pub fn to_int32(&self, value: &JsValue) -> JsResult<i32> {
        Ok(to_int32(self.to_number(value)?))
    }

    pub fn to_uint32(&self, value: &JsValue) -> JsResult<u32> {
        Ok(to_int32(self.to_number(value)?) as u32)
    }

    /// Integer conversion used by index arguments (`NaN` is 0)
    pub fn to_integer(&self, value: &JsValue) -> JsResult<f64> {
        let n = self.to_number(value)?;
        Ok(if n.is_nan() { 0.0 } else { n.trunc() })
    }

    pub fn to_object(&self, value: &JsValue) -> JsResult<ObjectRef> {
        match value {
            JsValue::Object(r) => Ok(*r),
            JsValue::Undefined | JsValue::Null => {
                Err(self.type_error("Cannot convert undefined or null to object"))
            }
            _ => Ok(self.new_primitive_wrapper(value.clone())),
        }
    }

    /// Abstract equality (`==`)
    pub fn loose_equals(&self, a: &JsValue, b: &JsValue) -> JsResult<bool> {
        Ok(match (a, b) {
            (JsValue::Undefined | JsValue::Null, JsValue::Undefined | JsValue::Null) => true,
            (JsValue::Undefined | JsValue::Null, _) | (_, JsValue::Undefined | JsValue::Null) => {
                false
            }
            (JsValue::Number(_), JsValue::String(_)) | (JsValue::String(_), JsValue::Number(_)) => {
                self.to_number(a)? == self.to_number(b)?
            }
            (JsValue::Bool(_), _) => {
                let n = JsValue::Number(self.to_number(a)?);
                return self.loose_equals(&n, b);
            }
            (_, JsValue::Bool(_)) => {
                let n = JsValue::Number(self.to_number(b)?);
                return self.loose_equals(a, &n);
            }
            (JsValue::Object(_), JsValue::Object(_)) => a.strict_equals(b),
            (JsValue::Object(_), _) => {
                let primitive = self.to_primitive(a, Hint::Number)?;
                return self.loose_equals(&primitive, b);
            }
            (_, JsValue::Object(_)) => {
                let primitive = self.to_primitive(b, Hint::Number)?;
                return self.loose_equals(a, &primitive);
            }
            _ => a.strict_equals(b),
        })
    }

    /// `value instanceof constructor`
    pub fn instance_of(&self, value: &JsValue, constructor: &JsValue) -> JsResult<bool> {
        let Some(mut ctor) = constructor.as_object().filter(|_| self.is_callable(constructor))
        else {
            return Err(self.type_error("Right-hand side of 'instanceof' is not callable"));
        };
        // Bound functions test against their target
        while let Some(Function::Bound { target, .. }) =
            self.with_object(ctor, |o| o.function().cloned())
        {
            ctor = target;
        }
        let Some(mut current) = value.as_object() else {
            return Ok(false);
        };
        let Some(prototype) = self.get_property(ctor, "prototype").as_object() else {
            return Err(self.type_error(
                "Function has non-object prototype 'undefined' in instanceof check",
            ));
        };
        loop {
            match self.with_object(current, |object| object.proto) {
                Some(proto) if proto == prototype => return Ok(true),
                Some(proto) => current = proto,
                None => return Ok(false),
            }
        }
    }

    // ----- calls -----

    /// Call `function` with an explicit receiver
    pub fn call(&self, function: &JsValue, this: JsValue, args: &[JsValue]) -> JsResult<JsValue> {
        match function.as_object() {
            Some(r) if self.is_callable(function) => self.call_function(r, this, args, false),
            _ => Err(self.type_error(&format!(
                "{} is not a function",
                self.display_string(function)
            ))),
        }
    }

    /// Invoke a method found on `this`
    pub fn call_method(&self, this: &JsValue, name: &str, args: &[JsValue]) -> JsResult<JsValue> {
        let method = self.get(this, name)?;
        if !self.is_callable(&method) {
            return Err(self.type_error(&format!("{} is not a function", name)));
        }
        self.call(&method, this.clone(), args)
    }

    pub(crate) fn call_function(
        &self,
        r: ObjectRef,
        this: JsValue,
        args: &[JsValue],
        construct: bool,
    ) -> JsResult<JsValue> {
        let _call = self.enter_call()?;
        let Some(function) = self.with_object(r, |object| object.function().cloned()) else {
            return Err(self.type_error("object is not a function"));
        };
        match function {
            Function::Closure { node, scope } => self.call_closure(r, &node, scope, this, args),
            Function::Native { call, data, .. } => call(
                self,
                &CallInfo {
                    this,
                    args,
                    data: &data,
                    construct,
                    callee: r,
                },
            ),
            Function::Bound {
                target,
                this: bound_this,
                args: bound_args,
            } => {
                let mut all = bound_args.to_vec();
                all.extend_from_slice(args);
                if construct {
                    self.construct_function(target, &all)
                } else {
                    self.call_function(target, bound_this, &all, false)
                }
            }
        }
    }

    /// `new constructor(...args)`
    pub fn construct(&self, constructor: &JsValue, args: &[JsValue]) -> JsResult<JsValue> {
        let is_constructor = constructor.as_object().is_some_and(|r| {
            self.with_object(r, |object| object.function().is_some_and(Function::is_constructor))
        });
        match constructor.as_object() {
            Some(r) if is_constructor => self.construct_function(r, args),
            _ => Err(self.type_error(&format!(
                "{} is not a constructor",
                self.display_string(constructor)
            ))),
        }
    }

    fn construct_function(&self, r: ObjectRef, args: &[JsValue]) -> JsResult<JsValue> {
        if let Some(Function::Bound { target, args: bound, .. }) =
            self.with_object(r, |object| object.function().cloned())
        {
            let mut all = bound.to_vec();
            all.extend_from_slice(args);
            return self.construct_function(target, &all);
        }
        let proto = self
            .get_property(r, "prototype")
            .as_object()
            .unwrap_or(self.realm().object_proto);
        let this = JsValue::Object(self.alloc(JsObject::ordinary(Some(proto))));
        let result = self.call_function(r, this.clone(), args, true)?;
        Ok(if result.as_object().is_some() { result } else { this })
    }
}

/// ECMAScript ToInt32 on a number
pub fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    let n = n.trunc() % 4294967296.0;
    let n = if n < 0.0 { n + 4294967296.0 } else { n };
    n as u32 as i32
}

/// Adapt JS pattern syntax to the `regex` crate
fn translate_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('/') => out.push('/'),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            // JS `[^]` matches anything
            '[' if pattern_rest_starts(&chars, "^]") => {
                chars.next();
                chars.next();
                out.push_str("(?s:.)");
            }
            _ => out.push(c),
        }
    }
    out
}

fn pattern_rest_starts(chars: &std::iter::Peekable<std::str::Chars<'_>>, prefix: &str) -> bool {
    chars.clone().take(prefix.len()).eq(prefix.chars())
}
