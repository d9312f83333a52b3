//! `Number` constructor and `Number.prototype`

use crate::builtins::{constructor, method};
use crate::isolate::Isolate;
use crate::runtime::function::CallInfo;
use crate::runtime::object::ObjectKind;
use crate::runtime::value::JsValue;
use crate::util::dtoa;
use crate::vm::{ErrorKind, JsResult};

pub(super) fn install(isolate: &Isolate) {
    let proto = isolate.realm().number_proto;
    isolate.with_object_mut(proto, |o| o.kind = ObjectKind::Primitive(JsValue::Number(0.0)));
    let ctor = constructor(isolate, "Number", number_constructor, 1, proto);
    let constants = [
        ("MAX_VALUE", f64::MAX),
        ("MIN_VALUE", 5e-324),
        ("NaN", f64::NAN),
        ("POSITIVE_INFINITY", f64::INFINITY),
        ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
        ("MAX_SAFE_INTEGER", 9007199254740991.0),
        ("MIN_SAFE_INTEGER", -9007199254740991.0),
        ("EPSILON", f64::EPSILON),
    ];
    for (name, value) in constants {
        isolate.define_property(ctor, name, JsValue::Number(value), false);
    }

    method(isolate, proto, "toString", to_string, 1);
    method(isolate, proto, "toFixed", to_fixed, 1);
    method(isolate, proto, "valueOf", value_of, 0);
}

fn this_number(isolate: &Isolate, info: &CallInfo<'_>, name: &str) -> JsResult<f64> {
    let boxed = match &info.this {
        JsValue::Number(n) => return Ok(*n),
        JsValue::Object(r) => isolate.with_object(*r, |o| match o.kind {
            ObjectKind::Primitive(JsValue::Number(n)) => Some(n),
            _ => None,
        }),
        _ => None,
    };
    boxed.ok_or_else(|| {
        isolate.type_error(&format!(
            "Number.prototype.{} requires that 'this' be a Number",
            name
        ))
    })
}

fn number_constructor(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let n = match info.args.first() {
        Some(value) => isolate.to_number(value)?,
        None => 0.0,
    };
    if info.construct {
        return Ok(JsValue::Object(isolate.new_primitive_wrapper(JsValue::Number(n))));
    }
    Ok(JsValue::Number(n))
}

fn to_string(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let n = this_number(isolate, info, "toString")?;
    let radix = match info.arg(0) {
        JsValue::Undefined => 10.0,
        radix => isolate.to_integer(&radix)?,
    };
    if !(2.0..=36.0).contains(&radix) {
        return Err(isolate.error(
            ErrorKind::RangeError,
            "toString() radix must be between 2 and 36",
        ));
    }
    Ok(JsValue::from(dtoa::number_to_radix_string(n, radix as u32)))
}

fn to_fixed(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let n = this_number(isolate, info, "toFixed")?;
    let digits = isolate.to_integer(&info.arg(0))?;
    if !(0.0..=100.0).contains(&digits) {
        return Err(isolate.error(
            ErrorKind::RangeError,
            "toFixed() digits argument must be between 0 and 100",
        ));
    }
    Ok(JsValue::from(dtoa::number_to_fixed(n, digits as usize)))
}

fn value_of(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    Ok(JsValue::Number(this_number(isolate, info, "valueOf")?))
}
