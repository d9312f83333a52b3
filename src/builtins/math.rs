//! The `Math` object

use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::builtins::method;
use crate::isolate::Isolate;
use crate::runtime::function::CallInfo;
use crate::runtime::object::JsObject;
use crate::runtime::value::JsValue;
use crate::vm::JsResult;
use crate::vm::interpreter::pow;

/// Math functions of one numeric argument
macro_rules! unary {
    ($($name:ident => $f:expr),* $(,)?) => {
        $(
            fn $name(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
                let x = isolate.to_number(&info.arg(0))?;
                let f: fn(f64) -> f64 = $f;
                Ok(JsValue::Number(f(x)))
            }
        )*
    };
}

unary! {
    abs => f64::abs,
    floor => f64::floor,
    ceil => f64::ceil,
    round => round_half_up,
    trunc => f64::trunc,
    sign => |x| if x.is_nan() || x == 0.0 { x } else { x.signum() },
    sqrt => f64::sqrt,
    sin => f64::sin,
    cos => f64::cos,
    tan => f64::tan,
    asin => f64::asin,
    acos => f64::acos,
    atan => f64::atan,
    exp => f64::exp,
    log => f64::ln,
    log2 => f64::log2,
    log10 => f64::log10,
}

pub(super) fn install(isolate: &Isolate) {
    let math = isolate.alloc(JsObject::ordinary(Some(isolate.realm().object_proto)));
    isolate.define_property(isolate.global(), "Math", JsValue::Object(math), false);

    let constants = [
        ("PI", std::f64::consts::PI),
        ("E", std::f64::consts::E),
        ("LN2", std::f64::consts::LN_2),
        ("LN10", std::f64::consts::LN_10),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("SQRT2", std::f64::consts::SQRT_2),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
    ];
    for (name, value) in constants {
        isolate.define_property(math, name, JsValue::Number(value), false);
    }

    method(isolate, math, "abs", abs, 1);
    method(isolate, math, "floor", floor, 1);
    method(isolate, math, "ceil", ceil, 1);
    method(isolate, math, "round", round, 1);
    method(isolate, math, "trunc", trunc, 1);
    method(isolate, math, "sign", sign, 1);
    method(isolate, math, "sqrt", sqrt, 1);
    method(isolate, math, "sin", sin, 1);
    method(isolate, math, "cos", cos, 1);
    method(isolate, math, "tan", tan, 1);
    method(isolate, math, "asin", asin, 1);
    method(isolate, math, "acos", acos, 1);
    method(isolate, math, "atan", atan, 1);
    method(isolate, math, "exp", exp, 1);
    method(isolate, math, "log", log, 1);
    method(isolate, math, "log2", log2, 1);
    method(isolate, math, "log10", log10, 1);
    method(isolate, math, "atan2", atan2, 2);
    method(isolate, math, "pow", math_pow, 2);
    method(isolate, math, "min", min, 2);
    method(isolate, math, "max", max, 2);
    method(isolate, math, "random", random, 0);
}

/// `Math.round`: halves round towards +Infinity, -0 is preserved
fn round_half_up(x: f64) -> f64 {
    if !x.is_finite() || x.fract() == 0.0 {
        return x;
    }
    let r = (x + 0.5).floor();
    if r == 0.0 && x < 0.0 { -0.0 } else { r }
}

fn atan2(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let y = isolate.to_number(&info.arg(0))?;
    let x = isolate.to_number(&info.arg(1))?;
    Ok(JsValue::Number(y.atan2(x)))
}

fn math_pow(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let base = isolate.to_number(&info.arg(0))?;
    let exponent = isolate.to_number(&info.arg(1))?;
    Ok(JsValue::Number(pow(base, exponent)))
}

fn fold(
    isolate: &Isolate,
    info: &CallInfo<'_>,
    init: f64,
    pick: fn(f64, f64) -> f64,
) -> JsResult<JsValue> {
    let mut result = init;
    for arg in info.args {
        let n = isolate.to_number(arg)?;
        // NaN is contagious, but every argument is still converted
        result = if result.is_nan() || n.is_nan() { f64::NAN } else { pick(result, n) };
    }
    Ok(JsValue::Number(result))
}

fn min(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    fold(isolate, info, f64::INFINITY, |a, b| {
        if a == b && b == 0.0 && b.is_sign_negative() { b } else { a.min(b) }
    })
}

fn max(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    fold(isolate, info, f64::NEG_INFINITY, |a, b| {
        if a == b && a == 0.0 && a.is_sign_negative() { b } else { a.max(b) }
    })
}

thread_local! {
    static SEED: Cell<u64> = Cell::new(initial_seed());
}

fn initial_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64);
    nanos | 1
}

/// xorshift64*; plenty for `Math.random`, not for anything secret
fn random(_isolate: &Isolate, _info: &CallInfo<'_>) -> JsResult<JsValue> {
    let bits = SEED.with(|seed| {
        let mut x = seed.get();
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        seed.set(x);
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    });
    Ok(JsValue::Number((bits >> 11) as f64 / (1u64 << 53) as f64))
}

#[cfg(test)]
mod tests {
    use super::round_half_up;
    use crate::config::Config;
    use crate::isolate::Isolate;

    fn eval(code: &str) -> f64 {
        let isolate = Isolate::new(Config::default());
        isolate.run_script("math.js", code).unwrap().as_number().unwrap()
    }

    #[test]
    fn test_round() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert!(round_half_up(-0.2).is_sign_negative());
        assert_eq!(eval("Math.round(1.4999)"), 1.0);
    }

    #[test]
    fn test_min_max() {
        assert_eq!(eval("Math.max(1, 5, 3)"), 5.0);
        assert_eq!(eval("Math.min(4, -2)"), -2.0);
        assert_eq!(eval("Math.max()"), f64::NEG_INFINITY);
        assert!(eval("Math.min(1, NaN)").is_nan());
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval("Math.floor(-1.5) + Math.ceil(1.2) + Math.abs(-3)"), 3.0);
        assert_eq!(eval("Math.pow(2, 10)"), 1024.0);
        assert_eq!(eval("Math.sqrt(16)"), 4.0);
        assert_eq!(eval("Math.sign(-7)"), -1.0);
        let r = eval("Math.random()");
        assert!((0.0..1.0).contains(&r));
    }
}
