//! Global functions and value properties

use crate::builtins::method;
use crate::isolate::Isolate;
use crate::runtime::function::CallInfo;
use crate::runtime::string;
use crate::runtime::value::JsValue;
use crate::vm::JsResult;

pub(super) fn install(isolate: &Isolate) {
    let global = isolate.global();
    isolate.define_property(global, "NaN", JsValue::Number(f64::NAN), false);
    isolate.define_property(global, "Infinity", JsValue::Number(f64::INFINITY), false);
    isolate.define_property(global, "undefined", JsValue::Undefined, false);
    isolate.define_property(global, "globalThis", JsValue::Object(global), false);

    method(isolate, global, "parseInt", parse_int, 2);
    method(isolate, global, "parseFloat", parse_float, 1);
    method(isolate, global, "isNaN", is_nan, 1);
    method(isolate, global, "isFinite", is_finite, 1);
}

fn parse_int(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let s = isolate.to_string(&info.arg(0))?;
    let radix = match isolate.to_int32(&info.arg(1))? {
        0 => None,
        r if (2..=36).contains(&r) => Some(r as u32),
        _ => return Ok(JsValue::Number(f64::NAN)),
    };
    Ok(JsValue::Number(string::parse_int(&s, radix)))
}

fn parse_float(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let s = isolate.to_string(&info.arg(0))?;
    Ok(JsValue::Number(string::parse_float(&s)))
}

fn is_nan(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    Ok(JsValue::Bool(isolate.to_number(&info.arg(0))?.is_nan()))
}

fn is_finite(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    Ok(JsValue::Bool(isolate.to_number(&info.arg(0))?.is_finite()))
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::isolate::Isolate;

    fn eval(code: &str) -> String {
        let isolate = Isolate::new(Config::default());
        let value = isolate.run_script("global.js", code).unwrap();
        isolate.to_string(&value).unwrap().to_string()
    }

    #[test]
    fn test_number_parsing() {
        assert_eq!(eval("parseInt('42px')"), "42");
        assert_eq!(eval("parseInt('ff', 16)"), "255");
        assert_eq!(eval("parseInt('0x1A')"), "26");
        assert_eq!(eval("parseInt('9', 1)"), "NaN");
        assert_eq!(eval("parseFloat('3.5e2 apples')"), "350");
    }

    #[test]
    fn test_predicates() {
        assert_eq!(
            eval("[isNaN('x'), isNaN('12'), isFinite(1 / 0), isFinite('7')].join()"),
            "true,false,false,true"
        );
        assert_eq!(eval("globalThis.Math === Math"), "true");
    }

    #[test]
    fn test_builtins_are_not_enumerable() {
        assert_eq!(
            eval("var keys = []; for (var k in globalThis) keys.push(k); keys.join()"),
            "keys,k"
        );
    }
}
