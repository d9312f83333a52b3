//! Host callbacks
//!
//! A `Callback` becomes script-callable when it is unwrapped. The bridge
//! retains it, stores it in an external object and makes that object weak;
//! the host function it returns carries the external as its data. When the
//! collector finds the external unreachable the weak finalizer releases the
//! callback. Each unwrap therefore costs one `retain` now and one `release`
//! later, whatever order the functions die in.
//!
//! Arguments are delivered with drain semantics: `Arguments::take` hands
//! over an argument the first time and `None` after that.

use std::any::Any;
use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::isolate::Isolate;
use crate::runtime::function::CallInfo;
use crate::runtime::object::ObjectKind;
use crate::runtime::value::JsValue;
use crate::scope::ExecutionScope;
use crate::value::Value;
use crate::vm::{ErrorKind, JsResult};

/// Failure raised by a callback; thrown into the calling script
#[derive(Debug)]
pub enum CallbackError {
    /// Throw this value (`None` throws `null`)
    Throw(Option<Value>),
    /// Throw an `Error` with this message
    Message(String),
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackError::Throw(value) => write!(f, "callback threw {:?}", value),
            CallbackError::Message(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for CallbackError {}

/// What a callback returns: a value (`None` for `undefined`) or a throw
pub type CallbackResult = Result<Option<Value>, CallbackError>;

impl From<String> for CallbackError {
    fn from(msg: String) -> Self {
        CallbackError::Message(msg)
    }
}

impl From<&str> for CallbackError {
    fn from(msg: &str) -> Self {
        CallbackError::Message(msg.to_string())
    }
}

/// A host function callable from script
pub trait Callback: Send + Sync {
    fn call(&self, context: &Context, args: &mut Arguments) -> CallbackResult;

    fn retain(&self) {}

    fn release(&self) {}
}

impl<F> Callback for F
where
    F: Fn(&Context, &mut Arguments) -> CallbackResult + Send + Sync,
{
    fn call(&self, context: &Context, args: &mut Arguments) -> CallbackResult {
        self(context, args)
    }
}

/// Arguments of one callback invocation
#[derive(Debug, Default)]
pub struct Arguments {
    items: Vec<Option<Value>>,
}

impl Arguments {
    pub fn new(items: Vec<Option<Value>>) -> Self {
        Arguments { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Take argument `index`; later reads of the same index yield `None`
    pub fn take(&mut self, index: usize) -> Option<Value> {
        self.items.get_mut(index).and_then(Option::take)
    }
}

/// Turn `callback` into a host function object
pub(crate) fn unwrap_callback(scope: &ExecutionScope<'_>, callback: &Arc<dyn Callback>) -> JsValue {
    let isolate = scope.isolate();
    callback.retain();

    let pointer = Arc::as_ptr(callback) as *const () as *mut c_void;
    let payload: Box<dyn Any> = Box::new(Arc::clone(callback));
    let external = isolate.new_external(pointer, None, Some(payload));
    scope.local(&JsValue::Object(external));

    let released = Arc::clone(callback);
    isolate.make_weak(external, Box::new(move || released.release()));

    let function = isolate.new_host_function(trampoline, JsValue::Object(external));
    JsValue::Object(function)
}

fn callback_of(isolate: &Isolate, data: &JsValue) -> Option<Arc<dyn Callback>> {
    let r = data.as_object()?;
    isolate.with_object(r, |object| match &object.kind {
        ObjectKind::External(external) => external
            .payload
            .as_ref()
            .and_then(|payload| payload.downcast_ref::<Arc<dyn Callback>>())
            .cloned(),
        _ => None,
    })
}

/// Native entry point of every host function
fn trampoline(isolate: &Isolate, info: &CallInfo<'_>) -> JsResult<JsValue> {
    let Some(context) = Context::from_isolate(isolate) else {
        return Err(isolate.error(ErrorKind::Error, "host function called outside its context"));
    };
    let Some(callback) = callback_of(isolate, info.data) else {
        return Err(isolate.type_error("host function lost its callback"));
    };

    let scope = ExecutionScope::new(context);
    let mut items = Vec::with_capacity(info.args.len());
    for arg in info.args {
        match scope.wrap(arg.clone()) {
            Ok(value) => items.push(value),
            Err(e) => {
                // Reported, not thrown: we are inside engine dispatch
                context.report_error(e);
                items.push(None);
            }
        }
    }
    let mut args = Arguments::new(items);

    match callback.call(context, &mut args) {
        Ok(result) => match scope.unwrap(result.as_ref()) {
            Ok(value) => Ok(value),
            Err(e) => {
                context.report_error(e);
                Ok(JsValue::Undefined)
            }
        },
        Err(CallbackError::Throw(thrown)) => match scope.unwrap(thrown.as_ref()) {
            Ok(value) => Err(isolate.exception(value)),
            Err(e) => {
                let message = e.to_string();
                context.report_error(e);
                Err(isolate.error(ErrorKind::Error, &message))
            }
        },
        Err(CallbackError::Message(msg)) => Err(isolate.error(ErrorKind::Error, &msg)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

    use super::*;
    use crate::test_support;

    #[derive(Default)]
    struct Counted {
        refs: AtomicI32,
        releases: AtomicUsize,
    }

    impl Callback for Counted {
        fn call(&self, _context: &Context, args: &mut Arguments) -> CallbackResult {
            Ok(args.take(0))
        }

        fn retain(&self) {
            self.refs.fetch_add(1, Ordering::SeqCst);
        }

        fn release(&self) {
            self.refs.fetch_sub(1, Ordering::SeqCst);
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_drain_semantics() {
        let mut args = Arguments::new(vec![Some(Value::Int(1)), None]);
        assert_eq!(args.len(), 2);
        assert_eq!(args.take(0).and_then(|v| v.as_int()), Some(1));
        assert!(args.take(0).is_none());
        assert!(args.take(1).is_none());
        assert!(args.take(9).is_none());
    }

    #[test]
    fn test_call_from_script() {
        let context = test_support::context();
        let add = context
            .create_function(Arc::new(|_: &Context, args: &mut Arguments| -> CallbackResult {
                let a = args.take(0).and_then(|v| v.as_double()).unwrap_or(0.0);
                let b = args.take(1).and_then(|v| v.as_double()).unwrap_or(0.0);
                Ok(Some(Value::from(a + b)))
            }))
            .unwrap();
        let global = context.global_object().unwrap();
        assert!(global.set(&context, "add", Some(&Value::from(add))));
        let result = context.evaluate("add.js", "add(2, 3.5) + add(1)");
        assert_eq!(result.and_then(|v| v.as_double()), Some(6.5));
    }

    #[test]
    fn test_errors_are_thrown_into_script() {
        let context = test_support::context();
        let global = context.global_object().unwrap();
        let fail = Value::callback(|_: &Context, args: &mut Arguments| -> CallbackResult {
            match args.take(0) {
                Some(value) => Err(CallbackError::Throw(Some(value))),
                None => Err("nope".into()),
            }
        });
        global.set(&context, "fail", Some(&fail));
        let caught = context.evaluate(
            "throw.js",
            "var out = [];\
             try { fail(); } catch (e) { out.push(e.message); }\
             try { fail(42); } catch (e) { out.push(e); }\
             out.join()",
        );
        assert_eq!(
            caught.and_then(|v| v.as_string().map(|s| s.to_string())),
            Some("nope,42".to_string())
        );
    }

    #[test]
    fn test_reentrant_evaluate() {
        let context = test_support::context();
        let global = context.global_object().unwrap();
        let nested = Value::callback(|context: &Context, args: &mut Arguments| -> CallbackResult {
            let code = args.take(0).and_then(|v| v.as_string().map(|s| s.to_string()));
            Ok(context.evaluate("inner.js", &code.unwrap_or_default()))
        });
        global.set(&context, "run", Some(&nested));
        let result = context.evaluate("outer.js", "var base = 40; run('base + 2')");
        assert_eq!(result.and_then(|v| v.as_int()), Some(42));
    }

    #[test]
    fn test_release_once_per_unwrap() {
        let context = test_support::context();
        let counted = Arc::new(Counted::default());
        let callback: Arc<dyn Callback> = counted.clone();

        let first = context.create_function(Arc::clone(&callback)).unwrap();
        let second = context.create_function(Arc::clone(&callback)).unwrap();
        assert_eq!(counted.refs.load(Ordering::SeqCst), 2);

        let echoed = first.call(&context, &[Some(Value::from("x"))]);
        assert_eq!(
            echoed.and_then(|v| v.as_string().map(|s| s.to_string())),
            Some("x".to_string())
        );

        drop(first);
        context.collect_garbage();
        assert_eq!(counted.releases.load(Ordering::SeqCst), 1);

        drop(second);
        context.collect_garbage();
        assert_eq!(counted.releases.load(Ordering::SeqCst), 2);
        assert_eq!(counted.refs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_teardown_releases_live_callbacks() {
        let counted = Arc::new(Counted::default());
        {
            let context = test_support::context();
            let callback: Arc<dyn Callback> = counted.clone();
            let global = context.global_object().unwrap();
            global.set(&context, "keep", Some(&Value::Callback(callback)));
            assert_eq!(counted.refs.load(Ordering::SeqCst), 1);
        }
        assert_eq!(counted.refs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_arguments_can_be_kept() {
        let context = test_support::context();
        let kept = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&kept);
        let keep = Value::callback(move |_: &Context, args: &mut Arguments| -> CallbackResult {
            if let Some(value) = args.take(0) {
                sink.lock().unwrap().push(value);
            }
            Ok(None)
        });
        context.global_object().unwrap().set(&context, "keep", Some(&keep));
        context.evaluate("keep.js", "keep({ tag: 'first' }); keep([1, 2, 3]);");
        context.collect_garbage();

        let kept = kept.lock().unwrap();
        let tag = kept[0].as_object().and_then(|o| o.get(&context, "tag"));
        assert_eq!(
            tag.and_then(|v| v.as_string().map(|s| s.to_string())),
            Some("first".to_string())
        );
        assert_eq!(kept[1].as_array().map(|a| a.length(&context)), Some(3));
    }
}
