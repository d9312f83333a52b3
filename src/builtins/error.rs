//! `Error` and the native error constructors
//!
//! Calling a constructor with or without `new` yields a fresh error whose
//! `stack` is captured from the script call stack at that point.

use crate::builtins::{constructor, method};
use crate::isolate::Isolate;
use crate::runtime::function::{CallInfo, NativeFunction};
use crate::runtime::value::JsValue;
use crate::vm::{ErrorKind, JsResult};

pub(super) fn install(isolate: &Isolate) {
    let realm = *isolate.realm();
    let error_ctor = constructor(
        isolate,
        "Error",
        constructor_for(ErrorKind::Error),
        1,
        realm.error_proto,
    );
    for kind in ErrorKind::ALL {
        let proto = realm.error_proto(kind);
        isolate.define_property(proto, "name", JsValue::string(kind.name()), false);
        isolate.define_property(proto, "message", JsValue::string(""), false);
        if kind != ErrorKind::Error {
            let ctor = constructor(isolate, kind.name(), constructor_for(kind), 1, proto);
            // TypeError.__proto__ === Error
            isolate.with_object_mut(ctor, |o| o.proto = Some(error_ctor));
        }
    }
    method(isolate, realm.error_proto, "toString", to_string, 0);
}

fn constructor_for(kind: ErrorKind) -> NativeFunction {
    match kind {
        ErrorKind::Error => |isolate: &Isolate, info: &CallInfo<'_>| {
            construct(isolate, info, ErrorKind::Error)
        },
        ErrorKind::TypeError => |isolate: &Isolate, info: &CallInfo<'_>| {
            construct(isolate, info, ErrorKind::TypeError)
        },
        ErrorKind::ReferenceError => |isolate: &Isolate, info: &CallInfo<'_>| {
            construct(isolate, info, ErrorKind::ReferenceError)
        },
        ErrorKind::SyntaxError => |isolate: &Isolate, info: &CallInfo<'_>| {
            construct(isolate, info, ErrorKind::SyntaxError)
        },
        ErrorKind::RangeError => |isolate: &Isolate, info: &CallInfo<'_>| {
            construct(isolate, info, ErrorKind::RangeError)
        },
    }
}

fn construct(isolate: &Isolate, info: &CallInfo<'_>, kind: ErrorKind) -> JsResult<JsValue> {
    let message = match info.arg(0) {
        JsValue::Undefined => None,
        message => Some(isolate.to_string(&message)?),
    };
    let error = isolate.new_error(kind, message.as_deref().unwrap_or(""));
    if let Some(message) = message.filter(|m| m.is_empty()) {
        // new_error skips empty messages; an explicit '' is still own
        isolate.define_property(error, "message", JsValue::String(message), false);
    }
    Ok(JsValue::Object(error))
}

fn to_string(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    if info.this.as_object().is_none() {
        return Err(isolate.type_error("Error.prototype.toString called on non-object"));
    }
    let name = match isolate.get(&info.this, "name")? {
        JsValue::Undefined => "Error".into(),
        name => isolate.to_string(&name)?,
    };
    let message = match isolate.get(&info.this, "message")? {
        JsValue::Undefined => "".into(),
        message => isolate.to_string(&message)?,
    };
    Ok(JsValue::from(match (name.is_empty(), message.is_empty()) {
        (_, true) => name.to_string(),
        (true, false) => message.to_string(),
        (false, false) => format!("{}: {}", name, message),
    }))
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::isolate::Isolate;

    fn eval(code: &str) -> String {
        let isolate = Isolate::new(Config::default());
        let value = isolate.run_script("error.js", code).unwrap();
        isolate.to_string(&value).unwrap().to_string()
    }

    #[test]
    fn test_error_properties() {
        assert_eq!(
            eval("var e = new TypeError('bad'); e.name + '|' + e.message + '|' + String(e)"),
            "TypeError|bad|TypeError: bad"
        );
        assert_eq!(eval("String(Error())"), "Error");
        assert_eq!(
            eval("var e = RangeError('r'); (e instanceof RangeError) + ',' + (e instanceof Error)"),
            "true,true"
        );
        assert_eq!(eval("Object.keys(new Error('x')).length"), "0");
    }

    #[test]
    fn test_stack_property() {
        assert_eq!(
            eval("function make() {\n  return new Error('here');\n}\nmake().stack"),
            "Error: here\n    at make (error.js:2)\n    at error.js:4"
        );
    }

    #[test]
    fn test_custom_error_subclass() {
        assert_eq!(
            eval(
                "function MyError(m) { this.message = m; } \
                 MyError.prototype = new Error(); MyError.prototype.name = 'MyError'; \
                 String(new MyError('boom'))"
            ),
            "MyError: boom"
        );
    }
}
