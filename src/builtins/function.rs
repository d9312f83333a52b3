//! `Function.prototype`: `call`, `apply`, `bind` and `toString`

use std::rc::Rc;

use crate::builtins::{constructor, method};
use crate::isolate::Isolate;
use crate::runtime::function::{CallInfo, Function};
use crate::runtime::value::JsValue;
use crate::vm::JsResult;

pub(super) fn install(isolate: &Isolate) {
    let proto = isolate.realm().function_proto;
    constructor(isolate, "Function", function_constructor, 1, proto);
    method(isolate, proto, "call", call, 1);
    method(isolate, proto, "apply", apply, 2);
    method(isolate, proto, "bind", bind, 1);
    method(isolate, proto, "toString", to_string, 0);
}

fn function_constructor(isolate: &Isolate, _info: &CallInfo<'_>) -> JsResult<JsValue> {
    Err(isolate.type_error("Function constructor is not supported"))
}

fn call(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let args = info.args.get(1..).unwrap_or_default();
    isolate.call(&info.this, info.arg(0), args)
}

fn apply(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let args = match info.arg(1) {
        JsValue::Undefined | JsValue::Null => Vec::new(),
        JsValue::Object(r) => match isolate.with_object(r, |o| o.elements().cloned()) {
            Some(items) => items,
            None => return Err(isolate.type_error("CreateListFromArrayLike called on non-array")),
        },
        _ => return Err(isolate.type_error("CreateListFromArrayLike called on non-object")),
    };
    isolate.call(&info.this, info.arg(0), &args)
}

fn bind(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let Some(target) = info.this.as_object().filter(|_| isolate.is_callable(&info.this)) else {
        return Err(isolate.type_error("Bind must be called on a function"));
    };
    let bound_args: Rc<[JsValue]> = Rc::from(info.args.get(1..).unwrap_or_default());
    let name = isolate.get_property(target, "name");
    let name = format!("bound {}", name.as_str().unwrap_or(""));
    let length = isolate.get_property(target, "length").as_number().unwrap_or(0.0);
    let length = (length as usize).saturating_sub(bound_args.len());
    let function = Function::Bound {
        target,
        this: info.arg(0),
        args: bound_args,
    };
    Ok(JsValue::Object(isolate.new_function(function, &name, length)))
}

fn to_string(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let function = info
        .this
        .as_object()
        .and_then(|r| isolate.with_object(r, |o| o.function().cloned()));
    let text = match function {
        Some(Function::Closure { node, .. }) => node.text().to_string(),
        Some(_) => {
            let name = isolate.get(&info.this, "name")?;
            format!("function {}() {{ [native code] }}", name.as_str().unwrap_or(""))
        }
        None => {
            return Err(isolate.type_error(
                "Function.prototype.toString requires that 'this' be a Function",
            ));
        }
    };
    Ok(JsValue::from(text))
}
