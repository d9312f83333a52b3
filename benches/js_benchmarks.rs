use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use mquickjs_simple::{Arguments, Callback, CallbackResult, Context, EngineContext, Value};

// Only one context may be live, so every benchmark builds and drops its own.
fn context() -> EngineContext {
    EngineContext::new().expect("no other context is live")
}

fn bench_eval(c: &mut Criterion, name: &str, code: &str) {
    let context = context();
    c.bench_function(name, |b| b.iter(|| black_box(context.evaluate("bench.js", code))));
}

fn bench_fib(c: &mut Criterion) {
    bench_eval(
        c,
        "fib_iter 1k",
        r#"
        function fib(n) {
            if (n <= 1) return n;
            var a = 0, b = 1;
            for (var i = 2; i <= n; i++) {
                var c = a + b;
                a = b;
                b = c;
            }
            return b;
        }
        var sum = 0;
        for (var i = 0; i < 1000; i++) sum += fib(30);
        sum;
    "#,
    );
}

fn bench_object_create(c: &mut Criterion) {
    bench_eval(
        c,
        "object create 1k",
        r#"
        function Point(x, y) {
            this.x = x;
            this.y = y;
        }
        var points = [];
        for (var i = 0; i < 1000; i++) points.push(new Point(i, i * 2));
        points.length;
    "#,
    );
}

fn bench_closure(c: &mut Criterion) {
    bench_eval(
        c,
        "closure 1k",
        r#"
        function makeAdder(x) {
            return function (y) { return x + y; };
        }
        var sum = 0;
        for (var i = 0; i < 1000; i++) sum += makeAdder(i)(i);
        sum;
    "#,
    );
}

fn bench_json(c: &mut Criterion) {
    bench_eval(
        c,
        "json parse 1k",
        r#"
        var data = '{"name": "test", "value": 42, "items": [1, 2, 3]}';
        var sum = 0;
        for (var i = 0; i < 1000; i++) sum += JSON.parse(data).value;
        sum;
    "#,
    );
}

fn bench_wrap_object(c: &mut Criterion) {
    let context = context();
    let global = context.global_object().expect("global object");
    context.evaluate("setup.js", "var point = { x: 1, y: 2, label: 'p' };");

    c.bench_function("get property 1k", |b| {
        b.iter(|| {
            for _ in 0..1000 {
                black_box(global.get(&context, "point"));
            }
        })
    });

    let point = global.get(&context, "point").and_then(|v| v.as_object()).expect("point");
    c.bench_function("keys", |b| b.iter(|| black_box(point.keys(&context))));
}

fn bench_unwrap_values(c: &mut Criterion) {
    let context = context();
    let global = context.global_object().expect("global object");
    let values = [
        Value::Int(7),
        Value::Double(0.5),
        Value::Bool(true),
        Value::from("a string of moderate length"),
    ];

    c.bench_function("set property 1k", |b| {
        b.iter(|| {
            for i in 0..1000 {
                black_box(global.set(&context, "slot", Some(&values[i % values.len()])));
            }
        })
    });
}

fn bench_callback(c: &mut Criterion) {
    let context = context();
    let add: Arc<dyn Callback> = Arc::new(|_: &Context, args: &mut Arguments| -> CallbackResult {
        let a = args.take(0).and_then(|v| v.as_double()).unwrap_or(0.0);
        let b = args.take(1).and_then(|v| v.as_double()).unwrap_or(0.0);
        Ok(Some(Value::Double(a + b)))
    });
    let add = context.create_function(add).expect("callback function");
    let global = context.global_object().expect("global object");
    global.set(&context, "add", Some(&Value::Function(add.clone())));

    c.bench_function("script to host 1k", |b| {
        b.iter(|| {
            black_box(context.evaluate(
                "calls.js",
                "var s = 0; for (var i = 0; i < 1000; i++) s = add(s, i); s;",
            ))
        })
    });

    let args = [Some(Value::Int(1)), Some(Value::Int(2))];
    c.bench_function("host to host through script", |b| {
        b.iter(|| black_box(add.call(&context, &args)))
    });
}

criterion_group!(
    benches,
    bench_fib,
    bench_object_create,
    bench_closure,
    bench_json,
    bench_wrap_object,
    bench_unwrap_values,
    bench_callback,
);

criterion_main!(benches);
