//! `Object` constructor and `Object.prototype`

use crate::builtins::{constructor, method};
use crate::isolate::Isolate;
use crate::runtime::function::CallInfo;
use crate::runtime::object::JsObject;
use crate::runtime::value::JsValue;
use crate::vm::JsResult;

pub(super) fn install(isolate: &Isolate) {
    let proto = isolate.realm().object_proto;
    let ctor = constructor(isolate, "Object", object_constructor, 1, proto);
    method(isolate, ctor, "keys", object_keys, 1);
    method(isolate, ctor, "getPrototypeOf", object_get_prototype_of, 1);
    method(isolate, ctor, "create", object_create, 2);

    method(isolate, proto, "hasOwnProperty", has_own_property, 1);
    method(isolate, proto, "toString", to_string, 0);
    method(isolate, proto, "valueOf", value_of, 0);
}

fn object_constructor(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let value = info.arg(0);
    if value.is_nullish() {
        return Ok(JsValue::Object(isolate.new_object()));
    }
    Ok(JsValue::Object(isolate.to_object(&value)?))
}

fn object_keys(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let object = isolate.to_object(&info.arg(0))?;
    let keys = isolate
        .own_keys(object)
        .into_iter()
        .map(JsValue::String)
        .collect();
    Ok(JsValue::Object(isolate.new_array(keys)))
}

fn object_get_prototype_of(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let object = isolate.to_object(&info.arg(0))?;
    Ok(isolate
        .with_object(object, |o| o.proto)
        .map_or(JsValue::Null, JsValue::Object))
}

fn object_create(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let proto = match info.arg(0) {
        JsValue::Null => None,
        JsValue::Object(r) => Some(r),
        other => {
            return Err(isolate.type_error(&format!(
                "Object prototype may only be an Object or null: {}",
                isolate.display_string(&other)
            )));
        }
    };
    let object = isolate.alloc(JsObject::ordinary(proto));
    if let JsValue::Object(props) = info.arg(1) {
        for key in isolate.own_keys(props) {
            // Descriptors are reduced to their value
            let descriptor = isolate.get_property(props, &key);
            let value = isolate.get(&descriptor, "value")?;
            isolate.set_property(object, &key, value)?;
        }
    }
    Ok(JsValue::Object(object))
}

fn has_own_property(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let key = isolate.to_property_key(&info.arg(0))?;
    let object = isolate.to_object(&info.this)?;
    Ok(JsValue::Bool(isolate.has_own_property(object, &key)))
}

fn to_string(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let tag = match &info.this {
        JsValue::Undefined => "Undefined",
        JsValue::Null => "Null",
        JsValue::Bool(_) => "Boolean",
        JsValue::Number(_) => "Number",
        JsValue::String(_) => "String",
        JsValue::Object(r) => isolate.class_of(*r).tag(),
    };
    Ok(JsValue::from(format!("[object {}]", tag)))
}

fn value_of(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    Ok(JsValue::Object(isolate.to_object(&info.this)?))
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::isolate::Isolate;

    fn eval(code: &str) -> String {
        let isolate = Isolate::new(Config::default());
        let value = isolate.run_script("object.js", code).unwrap();
        isolate.to_string(&value).unwrap().to_string()
    }

    #[test]
    fn test_keys_and_prototypes() {
        assert_eq!(eval("Object.keys({b: 1, a: 2}).join()"), "b,a");
        assert_eq!(eval("Object.keys([5, 6]).join()"), "0,1");
        assert_eq!(
            eval(
                "var p = {x: 1}; var o = Object.create(p); \
                 o.x + ',' + (Object.getPrototypeOf(o) === p)"
            ),
            "1,true"
        );
        assert_eq!(eval("Object.getPrototypeOf(Object.create(null))"), "null");
    }

    #[test]
    fn test_has_own_property_and_to_string() {
        assert_eq!(
            eval(
                "var o = Object.create({a: 1}); o.b = 2; \
                 o.hasOwnProperty('a') + ',' + o.hasOwnProperty('b')"
            ),
            "false,true"
        );
        assert_eq!(eval("Object.prototype.toString.call([])"), "[object Array]");
        assert_eq!(eval("Object.prototype.toString.call(null)"), "[object Null]");
        assert_eq!(eval("String({})"), "[object Object]");
    }

    #[test]
    fn test_create_rejects_primitive_prototype() {
        let isolate = Isolate::new(Config::default());
        assert!(isolate.run_script("object.js", "Object.create(1)").is_err());
    }
}
