//! `RegExp` backed by the `regex` crate
//!
//! Match positions reported to script are UTF-16 offsets; the crate works
//! in UTF-8 byte offsets, so `lastIndex` and `index` are converted on the
//! way in and out. Backreferences and lookaround are not available.

use regex::Regex;

use crate::builtins::{constructor, method};
use crate::isolate::Isolate;
use crate::runtime::function::CallInfo;
use crate::runtime::object::ObjectKind;
use crate::runtime::value::JsValue;
use crate::util::unicode;
use crate::vm::JsResult;

pub(super) fn install(isolate: &Isolate) {
    let proto = isolate.realm().regexp_proto;
    constructor(isolate, "RegExp", regexp_constructor, 2, proto);
    method(isolate, proto, "test", test, 1);
    method(isolate, proto, "exec", exec, 1);
    method(isolate, proto, "toString", to_string, 0);
}

/// Compiled pattern and `g` flag of a RegExp object
pub(crate) fn regexp_of(isolate: &Isolate, value: &JsValue) -> Option<(Regex, bool)> {
    let r = value.as_object()?;
    isolate.with_object(r, |o| match &o.kind {
        ObjectKind::RegExp(data) => Some((data.regex.clone(), data.global())),
        _ => None,
    })
}

fn regexp_constructor(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let pattern = info.arg(0);
    let source = match pattern.as_object() {
        Some(r) if regexp_of(isolate, &pattern).is_some() => isolate.get_property(r, "source"),
        _ if pattern.is_undefined() => JsValue::string(""),
        _ => pattern.clone(),
    };
    let source = isolate.to_string(&source)?;
    let flags = match info.arg(1) {
        JsValue::Undefined => match pattern.as_object() {
            Some(r) if regexp_of(isolate, &pattern).is_some() => {
                isolate.to_string(&isolate.get_property(r, "flags"))?
            }
            _ => "".into(),
        },
        flags => isolate.to_string(&flags)?,
    };
    let source = if &*source == "(?:)" { "" } else { &*source };
    Ok(JsValue::Object(isolate.new_regexp(source, &flags)?))
}

/// Run the pattern from `lastIndex` (global) or from the start
///
/// Returns the UTF-16 index of the match and its capture groups.
fn run(
    isolate: &Isolate,
    info: &CallInfo<'_>,
    name: &str,
) -> JsResult<Option<(usize, Vec<JsValue>, String)>> {
    let Some((regex, global)) = regexp_of(isolate, &info.this) else {
        return Err(isolate.type_error(&format!(
            "RegExp.prototype.{} called on incompatible receiver",
            name
        )));
    };
    let input = isolate.to_string(&info.arg(0))?.to_string();
    let start = if global {
        let last = isolate.get(&info.this, "lastIndex")?;
        isolate.to_integer(&last)?.max(0.0) as usize
    } else {
        0
    };
    if start > unicode::utf16_len(&input) {
        isolate.set(&info.this, "lastIndex", JsValue::Number(0.0))?;
        return Ok(None);
    }
    let from = unicode::utf16_to_utf8_index(&input, start);
    let Some(captures) = regex.captures_at(&input, from) else {
        if global {
            isolate.set(&info.this, "lastIndex", JsValue::Number(0.0))?;
        }
        return Ok(None);
    };
    let whole = captures.get(0).map_or(from..from, |m| m.range());
    if global {
        let end = unicode::utf8_to_utf16_index(&input, whole.end);
        isolate.set(&info.this, "lastIndex", JsValue::Number(end as f64))?;
    }
    let groups = captures
        .iter()
        .map(|m| m.map_or(JsValue::Undefined, |m| JsValue::string(m.as_str())))
        .collect();
    let index = unicode::utf8_to_utf16_index(&input, whole.start);
    Ok(Some((index, groups, input)))
}

fn test(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    Ok(JsValue::Bool(run(isolate, info, "test")?.is_some()))
}

fn exec(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let Some((index, groups, input)) = run(isolate, info, "exec")? else {
        return Ok(JsValue::Null);
    };
    let result = isolate.new_array(groups);
    isolate.set_property(result, "index", JsValue::Number(index as f64))?;
    isolate.set_property(result, "input", JsValue::from(input))?;
    Ok(JsValue::Object(result))
}

fn to_string(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let source = isolate.get(&info.this, "source")?;
    let flags = isolate.get(&info.this, "flags")?;
    Ok(JsValue::from(format!(
        "/{}/{}",
        isolate.to_string(&source)?,
        isolate.to_string(&flags)?
    )))
}
