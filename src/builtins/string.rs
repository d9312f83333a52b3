//! `String` constructor and `String.prototype`
//!
//! Strings are stored as UTF-8; every index that script sees is a UTF-16
//! code unit offset.

use std::rc::Rc;

use regex::Regex;

use crate::builtins::regexp::regexp_of;
use crate::builtins::{constructor, method, relative_index};
use crate::isolate::Isolate;
use crate::runtime::function::CallInfo;
use crate::runtime::object::ObjectKind;
use crate::runtime::string;
use crate::runtime::value::JsValue;
use crate::util::unicode;
use crate::vm::JsResult;

pub(super) fn install(isolate: &Isolate) {
    let proto = isolate.realm().string_proto;
    isolate.with_object_mut(proto, |o| o.kind = ObjectKind::Primitive(JsValue::string("")));
    let ctor = constructor(isolate, "String", string_constructor, 1, proto);
    method(isolate, ctor, "fromCharCode", from_char_code, 1);

    method(isolate, proto, "toString", value_of, 0);
    method(isolate, proto, "valueOf", value_of, 0);
    method(isolate, proto, "charAt", char_at, 1);
    method(isolate, proto, "charCodeAt", char_code_at, 1);
    method(isolate, proto, "indexOf", index_of, 1);
    method(isolate, proto, "substring", substring, 2);
    method(isolate, proto, "slice", slice, 2);
    method(isolate, proto, "toUpperCase", to_upper_case, 0);
    method(isolate, proto, "toLowerCase", to_lower_case, 0);
    method(isolate, proto, "split", split, 2);
    method(isolate, proto, "trim", trim, 0);
    method(isolate, proto, "replace", replace, 2);
}

/// The string a method operates on
fn this_string(isolate: &Isolate, info: &CallInfo<'_>, name: &str) -> JsResult<Rc<str>> {
    match &info.this {
        JsValue::String(s) => Ok(Rc::clone(s)),
        JsValue::Undefined | JsValue::Null => Err(isolate.type_error(&format!(
            "String.prototype.{} called on null or undefined",
            name
        ))),
        JsValue::Object(r) => {
            let boxed = isolate.with_object(*r, |o| match &o.kind {
                ObjectKind::Primitive(JsValue::String(s)) => Some(Rc::clone(s)),
                _ => None,
            });
            match boxed {
                Some(s) => Ok(s),
                None => isolate.to_string(&info.this),
            }
        }
        other => isolate.to_string(other),
    }
}

fn string_constructor(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let s = match info.args.first() {
        Some(value) => isolate.to_string(value)?,
        None => Rc::from(""),
    };
    if info.construct {
        return Ok(JsValue::Object(isolate.new_primitive_wrapper(JsValue::String(s))));
    }
    Ok(JsValue::String(s))
}

fn from_char_code(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let units = info
        .args
        .iter()
        .map(|arg| Ok(isolate.to_uint32(arg)? as u16))
        .collect::<JsResult<Vec<u16>>>()?;
    Ok(JsValue::from(String::from_utf16_lossy(&units)))
}

fn value_of(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    match &info.this {
        JsValue::String(_) => Ok(info.this.clone()),
        JsValue::Object(r) => {
            let boxed = isolate.with_object(*r, |o| match &o.kind {
                ObjectKind::Primitive(value @ JsValue::String(_)) => Some(value.clone()),
                _ => None,
            });
            boxed.ok_or_else(|| {
                isolate.type_error("String.prototype.valueOf requires that 'this' be a String")
            })
        }
        _ => Err(isolate.type_error("String.prototype.valueOf requires that 'this' be a String")),
    }
}

fn char_at(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let s = this_string(isolate, info, "charAt")?;
    let index = isolate.to_integer(&info.arg(0))?;
    let c = (index >= 0.0)
        .then(|| unicode::char_at_utf16(&s, index as usize))
        .flatten();
    Ok(JsValue::from(c.map(String::from).unwrap_or_default()))
}

fn char_code_at(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let s = this_string(isolate, info, "charCodeAt")?;
    let index = isolate.to_integer(&info.arg(0))?;
    let unit = (index >= 0.0)
        .then(|| unicode::code_unit_at_utf16(&s, index as usize))
        .flatten();
    Ok(JsValue::Number(unit.map_or(f64::NAN, f64::from)))
}

fn index_of(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let s = this_string(isolate, info, "indexOf")?;
    let search = isolate.to_string(&info.arg(0))?;
    let from = isolate.to_integer(&info.arg(1))?.max(0.0) as usize;
    let start = unicode::utf16_to_utf8_index(&s, from);
    let found = s[start..]
        .find(&*search)
        .map(|i| unicode::utf8_to_utf16_index(&s, start + i));
    Ok(JsValue::Number(found.map_or(-1.0, |i| i as f64)))
}

fn substring(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let s = this_string(isolate, info, "substring")?;
    let len = unicode::utf16_len(&s) as f64;
    let clamp = |value: &JsValue, default: f64| -> JsResult<usize> {
        if value.is_undefined() {
            return Ok(default as usize);
        }
        Ok(isolate.to_integer(value)?.clamp(0.0, len) as usize)
    };
    let a = clamp(&info.arg(0), 0.0)?;
    let b = clamp(&info.arg(1), len)?;
    Ok(JsValue::string(unicode::utf16_substring(&s, a.min(b), a.max(b))))
}

fn slice(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let s = this_string(isolate, info, "slice")?;
    let len = unicode::utf16_len(&s);
    let start = relative_index(isolate, &info.arg(0), len, 0)?;
    let end = relative_index(isolate, &info.arg(1), len, len)?;
    Ok(JsValue::string(unicode::utf16_substring(&s, start, end)))
}

fn to_upper_case(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let s = this_string(isolate, info, "toUpperCase")?;
    Ok(JsValue::from(s.to_uppercase()))
}

fn to_lower_case(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let s = this_string(isolate, info, "toLowerCase")?;
    Ok(JsValue::from(s.to_lowercase()))
}

fn trim(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let s = this_string(isolate, info, "trim")?;
    Ok(JsValue::string(string::trim(&s)))
}

fn split(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let s = this_string(isolate, info, "split")?;
    let limit = match info.arg(1) {
        JsValue::Undefined => u32::MAX as usize,
        limit => isolate.to_uint32(&limit)? as usize,
    };
    let separator = info.arg(0);
    let parts: Vec<JsValue> = if separator.is_undefined() {
        vec![JsValue::String(Rc::clone(&s))]
    } else if let Some((regex, _)) = regexp_of(isolate, &separator) {
        split_regex(&s, &regex)
    } else {
        let separator = isolate.to_string(&separator)?;
        if separator.is_empty() {
            s.chars().map(|c| JsValue::from(c.to_string())).collect()
        } else {
            s.split(&*separator).map(JsValue::string).collect()
        }
    };
    let parts = parts.into_iter().take(limit).collect();
    Ok(JsValue::Object(isolate.new_array(parts)))
}

fn split_regex(s: &str, regex: &Regex) -> Vec<JsValue> {
    if s.is_empty() {
        return if regex.is_match(s) {
            Vec::new()
        } else {
            vec![JsValue::string(s)]
        };
    }
    let mut parts = Vec::new();
    let mut last = 0;
    for captures in regex.captures_iter(s) {
        let Some(m) = captures.get(0) else {
            continue;
        };
        // An empty match never splits at the current start or at the end
        if m.end() == last || (m.is_empty() && m.start() == s.len()) {
            continue;
        }
        parts.push(JsValue::string(&s[last..m.start()]));
        parts.extend(
            captures
                .iter()
                .skip(1)
                .map(|g| g.map_or(JsValue::Undefined, |g| JsValue::string(g.as_str()))),
        );
        last = m.end();
    }
    parts.push(JsValue::string(&s[last..]));
    parts
}

/// Expand `$$`, `$&`, `` $` ``, `$'` and `$n` in a replacement template
fn expand_template(
    template: &str,
    matched: &str,
    groups: &[Option<&str>],
    before: &str,
    after: &str,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().map(|&(_, next)| next) {
            Some('$') => out.push('$'),
            Some('&') => out.push_str(matched),
            Some('`') => out.push_str(before),
            Some('\'') => out.push_str(after),
            Some(d) if d.is_ascii_digit() => {
                let mut index = d as usize - '0' as usize;
                chars.next();
                // Two-digit group numbers when such a group exists
                if let Some(&(_, d2)) = chars.peek() {
                    if let Some(d2) = d2.to_digit(10) {
                        let two = index * 10 + d2 as usize;
                        if two >= 1 && two <= groups.len() {
                            index = two;
                            chars.next();
                        }
                    }
                }
                match index.checked_sub(1).and_then(|i| groups.get(i)) {
                    Some(group) => out.push_str(group.unwrap_or("")),
                    None => {
                        out.push('$');
                        out.push_str(&index.to_string());
                    }
                }
                continue;
            }
            _ => {
                out.push('$');
                continue;
            }
        }
        chars.next();
    }
    out
}

fn replace(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let s = this_string(isolate, info, "replace")?;
    let pattern = info.arg(0);
    let replacement = info.arg(1);
    let replacer = isolate.is_callable(&replacement).then(|| replacement.clone());
    let template = match &replacer {
        Some(_) => Rc::from(""),
        None => isolate.to_string(&replacement)?,
    };

    // (start, end, groups) of every match to replace
    let mut matches: Vec<(usize, usize, Vec<Option<String>>)> = Vec::new();
    if let Some((regex, global)) = regexp_of(isolate, &pattern) {
        for captures in regex.captures_iter(&s) {
            let Some(m) = captures.get(0) else {
                continue;
            };
            let groups = captures
                .iter()
                .skip(1)
                .map(|g| g.map(|g| g.as_str().to_string()))
                .collect();
            matches.push((m.start(), m.end(), groups));
            if !global {
                break;
            }
        }
        if global {
            isolate.set(&pattern, "lastIndex", JsValue::Number(0.0))?;
        }
    } else {
        let needle = isolate.to_string(&pattern)?;
        if let Some(start) = s.find(&*needle) {
            matches.push((start, start + needle.len(), Vec::new()));
        }
    }

    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for (start, end, groups) in matches {
        out.push_str(&s[last..start]);
        let matched = &s[start..end];
        match &replacer {
            Some(f) => {
                let mut args = vec![JsValue::string(matched)];
                args.extend(
                    groups
                        .iter()
                        .map(|g| g.as_deref().map_or(JsValue::Undefined, JsValue::string)),
                );
                args.push(JsValue::Number(unicode::utf8_to_utf16_index(&s, start) as f64));
                args.push(JsValue::String(Rc::clone(&s)));
                let result = isolate.call(f, JsValue::Undefined, &args)?;
                out.push_str(&isolate.to_string(&result)?);
            }
            None => {
                let groups: Vec<Option<&str>> = groups.iter().map(|g| g.as_deref()).collect();
                out.push_str(&expand_template(&template, matched, &groups, &s[..start], &s[end..]));
            }
        }
        last = end;
    }
    out.push_str(&s[last..]);
    isolate.checked_string(out)
}

#[cfg(test)]
mod tests {
    use super::expand_template;
    use crate::config::Config;
    use crate::isolate::Isolate;

    fn eval(code: &str) -> String {
        let isolate = Isolate::new(Config::default());
        let value = isolate.run_script("string.js", code).unwrap();
        isolate.to_string(&value).unwrap().to_string()
    }

    #[test]
    fn test_indexing_uses_utf16_offsets() {
        assert_eq!(eval("'h\\u00e9llo'.length"), "5");
        assert_eq!(eval("'\\uD83D\\uDE00x'.length"), "3");
        assert_eq!(eval("'\\uD83D\\uDE00x'.charAt(2)"), "x");
        assert_eq!(eval("'\\uD83D\\uDE00x'.indexOf('x')"), "2");
        assert_eq!(eval("'abc'.charCodeAt(1)"), "98");
        assert_eq!(eval("isNaN('abc'.charCodeAt(5))"), "true");
        assert_eq!(eval("'abc'[1]"), "b");
    }

    #[test]
    fn test_substrings() {
        assert_eq!(eval("'hello'.substring(3, 1)"), "el");
        assert_eq!(eval("'hello'.substring(-2)"), "hello");
        assert_eq!(eval("'hello'.slice(-3, -1)"), "ll");
        assert_eq!(eval("'  pad \\n'.trim()"), "pad");
        assert_eq!(eval("'MiXeD'.toUpperCase() + 'MiXeD'.toLowerCase()"), "MIXEDmixed");
    }

    #[test]
    fn test_split() {
        assert_eq!(eval("'a,b,,c'.split(',').length"), "4");
        assert_eq!(eval("'abc'.split('').join('|')"), "a|b|c");
        assert_eq!(eval("'a1b22c'.split(/\\d+/).join('|')"), "a|b|c");
        assert_eq!(eval("'abc'.split(/(?:)/).join('|')"), "a|b|c");
        assert_eq!(eval("'a-b'.split(/(-)/).join('|')"), "a|-|b");
        assert_eq!(eval("'a b c'.split(' ', 2).join('|')"), "a|b");
        assert_eq!(eval("''.split(',').length"), "1");
    }

    #[test]
    fn test_replace() {
        assert_eq!(eval("'aaa'.replace('a', 'b')"), "baa");
        assert_eq!(eval("'aaa'.replace(/a/g, 'b')"), "bbb");
        assert_eq!(eval("'john smith'.replace(/(\\w+) (\\w+)/, '$2, $1')"), "smith, john");
        assert_eq!(eval("'x1y2'.replace(/\\d/g, function (d) { return d * 2; })"), "x2y4");
        assert_eq!(eval("'abc'.replace('b', '[$&]')"), "a[b]c");
    }

    #[test]
    fn test_expand_template() {
        let groups = [Some("1"), None];
        assert_eq!(expand_template("$$-$1-$2-$3", "m", &groups, "", ""), "$-1--$3");
        assert_eq!(expand_template("$`|$'", "m", &[], "pre", "post"), "pre|post");
    }

    #[test]
    fn test_boxed_strings() {
        assert_eq!(eval("typeof new String('x')"), "object");
        assert_eq!(eval("new String('ab').length"), "2");
        assert_eq!(eval("new String('ab') + 'c'"), "abc");
        assert_eq!(eval("String.fromCharCode(72, 105)"), "Hi");
    }
}
