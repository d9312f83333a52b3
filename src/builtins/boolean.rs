use crate::builtins::{constructor, method};
use crate::isolate::Isolate;
use crate::runtime::function::CallInfo;
use crate::runtime::object::ObjectKind;
use crate::runtime::value::JsValue;
use crate::vm::JsResult;

pub(super) fn install(isolate: &Isolate) {
    let proto = isolate.realm().boolean_proto;
    isolate.with_object_mut(proto, |o| o.kind = ObjectKind::Primitive(JsValue::Bool(false)));
    constructor(isolate, "Boolean", boolean_constructor, 1, proto);
    method(isolate, proto, "toString", to_string, 0);
    method(isolate, proto, "valueOf", value_of, 0);
}

fn this_bool(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<bool> {
    let boxed = match &info.this {
        JsValue::Bool(b) => return Ok(*b),
        JsValue::Object(r) => isolate.with_object(*r, |o| match o.kind {
            ObjectKind::Primitive(JsValue::Bool(b)) => Some(b),
            _ => None,
        }),
        _ => None,
    };
    boxed.ok_or_else(|| {
        isolate.type_error("Boolean.prototype method called on incompatible receiver")
    })
}

fn boolean_constructor(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let b = info.arg(0).truthy();
    if info.construct {
        return Ok(JsValue::Object(isolate.new_primitive_wrapper(JsValue::Bool(b))));
    }
    Ok(JsValue::Bool(b))
}

fn to_string(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    Ok(JsValue::string(if this_bool(isolate, info)? { "true" } else { "false" }))
}

fn value_of(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    Ok(JsValue::Bool(this_bool(isolate, info)?))
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::isolate::Isolate;

    #[test]
    fn test_boolean() {
        let isolate = Isolate::new(Config::default());
        let value = isolate
            .run_script(
                "boolean.js",
                "[Boolean(''), Boolean('x'), new Boolean(false) ? 'boxed' : 'no', \
                 true.toString()].join()",
            )
            .unwrap();
        assert_eq!(value.as_str(), Some("false,true,boxed,true"));
    }
}
