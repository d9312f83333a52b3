//! `Array` constructor and `Array.prototype`
//!
//! Arrays are dense vectors. Methods read the element vector afresh after
//! each callback so that callbacks mutating the array see consistent
//! lengths.

use crate::builtins::{constructor, method, relative_index};
use crate::gc::ObjectRef;
use crate::isolate::Isolate;
use crate::runtime::function::CallInfo;
use crate::runtime::value::JsValue;
use crate::vm::{ErrorKind, JsResult};

pub(super) fn install(isolate: &Isolate) {
    let proto = isolate.realm().array_proto;
    let ctor = constructor(isolate, "Array", array_constructor, 1, proto);
    method(isolate, ctor, "isArray", is_array, 1);

    method(isolate, proto, "push", push, 1);
    method(isolate, proto, "pop", pop, 0);
    method(isolate, proto, "shift", shift, 0);
    method(isolate, proto, "unshift", unshift, 1);
    method(isolate, proto, "slice", slice, 2);
    method(isolate, proto, "concat", concat, 1);
    method(isolate, proto, "join", join, 1);
    method(isolate, proto, "toString", to_string, 0);
    method(isolate, proto, "indexOf", index_of, 1);
    method(isolate, proto, "reverse", reverse, 0);
    method(isolate, proto, "forEach", for_each, 1);
    method(isolate, proto, "map", map, 1);
    method(isolate, proto, "filter", filter, 1);
    method(isolate, proto, "reduce", reduce, 1);
}

fn this_array(isolate: &Isolate, info: &CallInfo<'_>, name: &str) -> JsResult<ObjectRef> {
    match info.this.as_object() {
        Some(r) if isolate.with_object(r, |o| o.elements().is_some()) => Ok(r),
        _ => Err(isolate.type_error(&format!("Array.prototype.{} called on non-array", name))),
    }
}

fn len(isolate: &Isolate, r: ObjectRef) -> usize {
    isolate.with_object(r, |o| o.elements().map_or(0, Vec::len))
}

fn element(isolate: &Isolate, r: ObjectRef, index: usize) -> Option<JsValue> {
    isolate.with_object(r, |o| o.elements().and_then(|e| e.get(index).cloned()))
}

fn with_elements<R>(
    isolate: &Isolate,
    r: ObjectRef,
    f: impl FnOnce(&mut Vec<JsValue>) -> R,
) -> Option<R> {
    isolate.with_object_mut(r, |o| o.elements_mut().map(f))
}

fn array_constructor(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let items = match info.args {
        [JsValue::Number(n)] => {
            let n = *n;
            if n.fract() != 0.0 || !(0.0..=u32::MAX as f64).contains(&n) {
                return Err(isolate.error(ErrorKind::RangeError, "Invalid array length"));
            }
            let array = isolate.new_array(Vec::new());
            isolate.set_property(array, "length", JsValue::Number(n))?;
            return Ok(JsValue::Object(array));
        }
        args => args.to_vec(),
    };
    Ok(JsValue::Object(isolate.new_array(items)))
}

fn is_array(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    Ok(JsValue::Bool(isolate.is_array(&info.arg(0))))
}

fn push(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let r = this_array(isolate, info, "push")?;
    let len = with_elements(isolate, r, |items| {
        items.extend_from_slice(info.args);
        items.len()
    });
    Ok(JsValue::Number(len.unwrap_or(0) as f64))
}

fn pop(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let r = this_array(isolate, info, "pop")?;
    Ok(with_elements(isolate, r, Vec::pop).flatten().unwrap_or_default())
}

fn shift(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let r = this_array(isolate, info, "shift")?;
    let first = with_elements(isolate, r, |items| (!items.is_empty()).then(|| items.remove(0)));
    Ok(first.flatten().unwrap_or_default())
}

fn unshift(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let r = this_array(isolate, info, "unshift")?;
    let len = with_elements(isolate, r, |items| {
        items.splice(0..0, info.args.iter().cloned());
        items.len()
    });
    Ok(JsValue::Number(len.unwrap_or(0) as f64))
}

fn slice(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let r = this_array(isolate, info, "slice")?;
    let len = len(isolate, r);
    let start = relative_index(isolate, &info.arg(0), len, 0)?;
    let end = relative_index(isolate, &info.arg(1), len, len)?;
    let items = isolate.with_object(r, |o| {
        o.elements()
            .and_then(|e| e.get(start..end.max(start)))
            .map(<[JsValue]>::to_vec)
            .unwrap_or_default()
    });
    Ok(JsValue::Object(isolate.new_array(items)))
}

fn concat(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let r = this_array(isolate, info, "concat")?;
    let mut items = isolate.array_elements(r).unwrap_or_default();
    for arg in info.args {
        match arg.as_object().and_then(|a| {
            isolate.is_array(arg).then(|| isolate.array_elements(a)).flatten()
        }) {
            Some(more) => items.extend(more),
            None => items.push(arg.clone()),
        }
    }
    Ok(JsValue::Object(isolate.new_array(items)))
}

fn join_elements(isolate: &Isolate, r: ObjectRef, separator: &str) -> JsResult<JsValue> {
    let mut out = String::new();
    let mut index = 0;
    while let Some(item) = element(isolate, r, index) {
        if index > 0 {
            out.push_str(separator);
        }
        if !item.is_nullish() {
            out.push_str(&isolate.to_string(&item)?);
        }
        if out.len() > isolate.config().max_string_length {
            return Err(isolate.error(ErrorKind::RangeError, "Invalid string length"));
        }
        index += 1;
    }
    Ok(JsValue::from(out))
}

fn join(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let r = this_array(isolate, info, "join")?;
    let separator = match info.arg(0) {
        JsValue::Undefined => ",".into(),
        sep => isolate.to_string(&sep)?,
    };
    join_elements(isolate, r, &separator)
}

fn to_string(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let r = this_array(isolate, info, "toString")?;
    join_elements(isolate, r, ",")
}

fn index_of(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let r = this_array(isolate, info, "indexOf")?;
    let search = info.arg(0);
    let start = relative_index(isolate, &info.arg(1), len(isolate, r), 0)?;
    let found = isolate.with_object(r, |o| {
        o.elements().and_then(|items| {
            items
                .iter()
                .skip(start)
                .position(|item| item.strict_equals(&search))
                .map(|i| i + start)
        })
    });
    Ok(JsValue::Number(found.map_or(-1.0, |i| i as f64)))
}

fn reverse(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let r = this_array(isolate, info, "reverse")?;
    with_elements(isolate, r, |items| items.reverse());
    Ok(info.this.clone())
}

fn callback_arg(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let callback = info.arg(0);
    if !isolate.is_callable(&callback) {
        return Err(isolate.type_error(&format!(
            "{} is not a function",
            isolate.display_string(&callback)
        )));
    }
    Ok(callback)
}

/// Call `f(element, index, array)` for each element present at call time
fn each(
    isolate: &Isolate,
    info: &CallInfo<'_>,
    name: &str,
    mut f: impl FnMut(JsValue, JsValue) -> JsResult<()>,
) -> JsResult<()> {
    let r = this_array(isolate, info, name)?;
    let callback = callback_arg(isolate, info)?;
    let this = info.arg(1);
    let count = len(isolate, r);
    for index in 0..count {
        let Some(item) = element(isolate, r, index) else {
            break;
        };
        let args = [item.clone(), JsValue::Number(index as f64), info.this.clone()];
        let result = isolate.call(&callback, this.clone(), &args)?;
        f(item, result)?;
    }
    Ok(())
}

fn for_each(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    each(isolate, info, "forEach", |_, _| Ok(()))?;
    Ok(JsValue::Undefined)
}

fn map(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let mut out = Vec::new();
    each(isolate, info, "map", |_, result| {
        out.push(result);
        Ok(())
    })?;
    Ok(JsValue::Object(isolate.new_array(out)))
}

fn filter(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let mut out = Vec::new();
    each(isolate, info, "filter", |item, result| {
        if result.truthy() {
            out.push(item);
        }
        Ok(())
    })?;
    Ok(JsValue::Object(isolate.new_array(out)))
}

fn reduce(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let r = this_array(isolate, info, "reduce")?;
    let callback = callback_arg(isolate, info)?;
    let count = len(isolate, r);
    let mut index = 0;
    let mut acc = if info.args.len() > 1 {
        info.arg(1)
    } else {
        index = 1;
        match element(isolate, r, 0) {
            Some(first) => first,
            None => return Err(isolate.type_error("Reduce of empty array with no initial value")),
        }
    };
    while index < count {
        let Some(item) = element(isolate, r, index) else {
            break;
        };
        let args = [acc, item, JsValue::Number(index as f64), info.this.clone()];
        acc = isolate.call(&callback, JsValue::Undefined, &args)?;
        index += 1;
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::isolate::Isolate;

    fn eval(code: &str) -> String {
        let isolate = Isolate::new(Config::default());
        let value = isolate.run_script("array.js", code).unwrap();
        isolate.to_string(&value).unwrap().to_string()
    }

    #[test]
    fn test_constructor_and_length() {
        assert_eq!(eval("new Array(3).length"), "3");
        assert_eq!(eval("Array(1, 2, 3).join('-')"), "1-2-3");
        assert_eq!(eval("var a = []; a[4] = 'x'; a.length"), "5");
        assert_eq!(eval("var a = [1, 2, 3]; a.length = 1; a.join()"), "1");
        assert_eq!(eval("Array.isArray([]) + ',' + Array.isArray({})"), "true,false");
    }

    #[test]
    fn test_mutators() {
        assert_eq!(eval("var a = [1]; a.push(2, 3) + ':' + a.join()"), "3:1,2,3");
        assert_eq!(eval("var a = [1, 2]; a.pop() + ':' + a.join()"), "2:1");
        assert_eq!(eval("var a = [1, 2]; a.shift() + ':' + a.join()"), "1:2");
        assert_eq!(eval("var a = [3]; a.unshift(1, 2) + ':' + a.join()"), "3:1,2,3");
        assert_eq!(eval("[1, 2, 3].reverse().join()"), "3,2,1");
        assert_eq!(eval("typeof [].pop()"), "undefined");
    }

    #[test]
    fn test_accessors() {
        assert_eq!(eval("[1, 2, 3, 4].slice(1, -1).join()"), "2,3");
        assert_eq!(eval("[1, 2, 3].slice(-2).join()"), "2,3");
        assert_eq!(eval("[1].concat([2, 3], 4).join()"), "1,2,3,4");
        assert_eq!(eval("[1, null, undefined, 'x'].join('|')"), "1|||x");
        assert_eq!(eval("[1, 2, 1].indexOf(1, 1)"), "2");
        assert_eq!(eval("['1'].indexOf(1)"), "-1");
    }

    #[test]
    fn test_iteration() {
        assert_eq!(eval("var s = 0; [1, 2, 3].forEach(function (x, i) { s += x * i; }); s"), "8");
        assert_eq!(eval("[1, 2, 3].map(function (x) { return x * 2; }).join()"), "2,4,6");
        assert_eq!(eval("[1, 2, 3, 4].filter(function (x) { return x % 2; }).join()"), "1,3");
        assert_eq!(eval("[1, 2, 3].reduce(function (a, b) { return a + b; })"), "6");
        assert_eq!(eval("[].reduce(function (a, b) { return a + b; }, 'init')"), "init");
    }

    #[test]
    fn test_reduce_empty_throws() {
        let isolate = Isolate::new(Config::default());
        assert!(isolate.run_script("array.js", "[].reduce(function () {})").is_err());
    }
}
