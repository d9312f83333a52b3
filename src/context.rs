//! Engine context
//!
//! The context owns the single engine instance of the process, the handlers
//! the host installed and a cached `instanceof` helper compiled when the
//! context is built. Only one context may be live at a time; building a
//! second one fails with `RuntimeError::ContextAlreadyExists`.
//!
//! Every operation opens an `ExecutionScope` and comes in two forms:
//! `try_x` returns `Result<T, Error>`, while `x` hands a failure to the
//! script or runtime exception handler and returns the absent value.

use std::cell::OnceCell;
use std::collections::VecDeque;
use std::ffi::c_void;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::callback::Callback;
use crate::config::Config;
use crate::error::{Error, RuntimeError};
use crate::gc::GcStats;
use crate::handler::{
    DebugMessageHandler, ExternalFreer, HandlerSlot, RuntimeExceptionHandler,
    ScriptExceptionHandler,
};
use crate::isolate::{Isolate, MemoryStats, VERSION};
use crate::object::{External, Function, Object};
use crate::scope::{ExecutionLock, ExecutionScope};
use crate::value::Value;

static LIVE: AtomicBool = AtomicBool::new(false);

const INSTANCE_OF: &str =
    "(function (object, constructor) { return object instanceof constructor; })";

fn state(set: bool) -> &'static str {
    if set { "set" } else { "cleared" }
}

/// Clears the live flag once everything else in the context is gone
struct LiveToken;

impl Drop for LiveToken {
    fn drop(&mut self) {
        LIVE.store(false, Ordering::SeqCst);
    }
}

/// Settings for `EngineContext::with_options`
#[derive(Default)]
pub struct ContextOptions {
    pub config: Config,
    pub script_exception_handler: Option<Arc<dyn ScriptExceptionHandler>>,
    /// Also told when construction itself fails
    pub runtime_exception_handler: Option<Arc<dyn RuntimeExceptionHandler>>,
}

/// Queues debug commands; may be cloned and used from any thread
#[derive(Clone, Default)]
pub struct DebugCommandSender {
    queue: Arc<Mutex<VecDeque<String>>>,
}

impl DebugCommandSender {
    pub fn send(&self, command: impl Into<String>) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(command.into());
    }

    fn pop(&self) -> Option<String> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
    }
}

/// The live engine and its host-facing state
pub struct Context {
    // Dropped first: teardown runs the remaining finalizers
    isolate: Isolate,
    pub(crate) lock: ExecutionLock,
    instance_of: OnceCell<Function>,
    script_handler: HandlerSlot<dyn ScriptExceptionHandler>,
    runtime_handler: HandlerSlot<dyn RuntimeExceptionHandler>,
    debug_handler: HandlerSlot<dyn DebugMessageHandler>,
    debug_commands: DebugCommandSender,
    _live: LiveToken,
}

/// Owning handle of the process's engine context
pub struct EngineContext {
    context: Box<Context>,
}

impl EngineContext {
    pub fn new() -> Result<EngineContext, RuntimeError> {
        Self::with_options(ContextOptions::default())
    }

    pub fn with_options(options: ContextOptions) -> Result<EngineContext, RuntimeError> {
        if LIVE.swap(true, Ordering::SeqCst) {
            let error = RuntimeError::ContextAlreadyExists;
            match &options.runtime_exception_handler {
                Some(handler) => handler.handle(&error.to_string()),
                None => log::warn!("{}", error),
            }
            return Err(error);
        }

        let context = Box::new(Context {
            isolate: Isolate::new(options.config),
            lock: ExecutionLock::default(),
            instance_of: OnceCell::new(),
            script_handler: HandlerSlot::new(options.script_exception_handler),
            runtime_handler: HandlerSlot::new(options.runtime_exception_handler),
            debug_handler: HandlerSlot::new(None),
            debug_commands: DebugCommandSender::default(),
            _live: LiveToken,
        });
        let embedder: *const Context = &*context;
        context.isolate.set_embedder_data(embedder as *const c_void);

        let instance_of = match context.try_evaluate("(instanceof)", INSTANCE_OF) {
            Ok(Some(Value::Function(f))) => f,
            Ok(_) => return Err(RuntimeError::Fatal("instanceof helper is not a function".into())),
            Err(e) => return Err(RuntimeError::Fatal(e.to_string())),
        };
        // Freshly built, so the cell is empty
        let _ = context.instance_of.set(instance_of);

        log::debug!("engine context created ({})", VERSION);
        Ok(EngineContext { context })
    }

    /// Give up ownership to a C host
    pub(crate) fn into_raw(self) -> *mut Context {
        let this = std::mem::ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the box is moved out exactly once
        let context = unsafe { std::ptr::read(&this.context) };
        Box::into_raw(context)
    }

    /// # Safety
    /// `raw` must come from `into_raw` and not have been reclaimed.
    pub(crate) unsafe fn from_raw(raw: *mut Context) -> EngineContext {
        EngineContext {
            // SAFETY: guaranteed by the caller
            context: unsafe { Box::from_raw(raw) },
        }
    }
}

impl Deref for EngineContext {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.context
    }
}

impl Drop for EngineContext {
    fn drop(&mut self) {
        log::debug!(
            "engine context destroyed with {} live objects",
            self.context.isolate.memory_stats().live_objects
        );
    }
}

impl Context {
    /// Engine version, for diagnostics only
    pub fn version() -> &'static str {
        VERSION
    }

    /// The underlying engine instance
    pub fn isolate(&self) -> &Isolate {
        &self.isolate
    }

    /// The context that owns `isolate`, if any
    pub(crate) fn from_isolate(isolate: &Isolate) -> Option<&Context> {
        let data = isolate.embedder_data() as *const Context;
        if data.is_null() {
            return None;
        }
        // SAFETY: only `EngineContext::with_options` sets the embedder data,
        // to the boxed context that owns this isolate. The box does not move
        // and outlives every call made into the isolate.
        let context = unsafe { &*data };
        std::ptr::eq(&context.isolate, isolate).then_some(context)
    }

    /// Run `f` inside a fresh execution scope
    pub(crate) fn run<T>(
        &self,
        f: impl FnOnce(&ExecutionScope<'_>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let scope = ExecutionScope::new(self);
        f(&scope)
    }

    /// Hand a failure to the matching handler
    pub fn report_error(&self, error: Error) {
        match error {
            Error::Script(exception) => match self.script_handler.get() {
                Some(handler) => handler.handle(exception),
                None => log::debug!("script exception dropped: {}", exception),
            },
            Error::Runtime(error) => match self.runtime_handler.get() {
                Some(handler) => handler.handle(&error.to_string()),
                None => log::warn!("contract violation dropped: {}", error),
            },
        }
    }

    /// `Ok` as `Some`; an error is reported and becomes `None`
    pub fn report<T>(&self, result: Result<T, Error>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.report_error(error);
                None
            }
        }
    }

    pub(crate) fn instance_of_function(&self) -> Result<&Function, Error> {
        self.instance_of
            .get()
            .ok_or_else(|| RuntimeError::Fatal("context is not initialised".into()).into())
    }

    // ----- evaluation -----

    /// Compile and run `code`, returning its completion value
    pub fn try_evaluate(&self, file_name: &str, code: &str) -> Result<Option<Value>, Error> {
        self.run(|scope| {
            let value = scope.catch(scope.isolate().run_script(file_name, code))?;
            scope.wrap(value)
        })
    }

    pub fn evaluate(&self, file_name: &str, code: &str) -> Option<Value> {
        self.report(self.try_evaluate(file_name, code)).flatten()
    }

    pub fn try_global_object(&self) -> Result<Object, Error> {
        self.run(|scope| Ok(Object::from_handle(scope.persist(scope.isolate().global()))))
    }

    pub fn global_object(&self) -> Option<Object> {
        self.report(self.try_global_object())
    }

    // ----- value creation -----

    /// Hand `callback` to the engine as a function
    pub fn try_create_function(&self, callback: Arc<dyn Callback>) -> Result<Function, Error> {
        self.run(|scope| {
            let function = scope.unwrap(Some(&Value::Callback(callback)))?;
            match scope.wrap(function)? {
                Some(Value::Function(f)) => Ok(f),
                _ => Err(RuntimeError::UnhandledType("callback").into()),
            }
        })
    }

    pub fn create_function(&self, callback: Arc<dyn Callback>) -> Option<Function> {
        self.report(self.try_create_function(callback))
    }

    /// Wrap a host pointer; `freer` runs when the engine collects it
    pub fn try_create_external(
        &self,
        pointer: *mut c_void,
        freer: Option<Arc<dyn ExternalFreer>>,
    ) -> Result<External, Error> {
        let freer = freer.map(|freer| {
            freer.retain();
            Box::new(move |pointer: *mut c_void| {
                freer.free(pointer);
                freer.release();
            }) as Box<dyn FnOnce(*mut c_void)>
        });
        self.run(|scope| {
            let r = scope.isolate().new_external(pointer, freer, None);
            Ok(External::from_handle(scope.persist(r), pointer))
        })
    }

    pub fn create_external(
        &self,
        pointer: *mut c_void,
        freer: Option<Arc<dyn ExternalFreer>>,
    ) -> Option<External> {
        self.report(self.try_create_external(pointer, freer))
    }

    /// Script `===`
    pub fn try_strict_equals(&self, a: Option<&Value>, b: Option<&Value>) -> Result<bool, Error> {
        self.run(|scope| {
            let a = scope.unwrap(a)?;
            let b = scope.unwrap(b)?;
            Ok(a.strict_equals(&b))
        })
    }

    pub fn strict_equals(&self, a: Option<&Value>, b: Option<&Value>) -> bool {
        self.report(self.try_strict_equals(a, b)).unwrap_or(false)
    }

    // ----- memory -----

    /// Collect now; `None` when deferred because a script is running
    pub fn collect_garbage(&self) -> Option<GcStats> {
        let _lock = self.lock.acquire();
        let stats = self.isolate.collect_garbage();
        if let Some(stats) = &stats {
            log::trace!("collected {} objects, ran {} finalizers", stats.freed, stats.finalizers);
        }
        stats
    }

    /// Idle-time hint; true when the engine has nothing left to do
    pub fn idle_notification(&self, deadline_ms: u64) -> bool {
        let _lock = self.lock.acquire();
        self.isolate.idle_notification(deadline_ms)
    }

    pub fn memory_stats(&self) -> MemoryStats {
        let _lock = self.lock.acquire();
        self.isolate.memory_stats()
    }

    // ----- handlers -----

    pub fn set_script_exception_handler(&self, handler: Option<Arc<dyn ScriptExceptionHandler>>) {
        log::debug!("script exception handler {}", state(handler.is_some()));
        self.script_handler.set(handler);
    }

    pub fn set_runtime_exception_handler(&self, handler: Option<Arc<dyn RuntimeExceptionHandler>>) {
        log::debug!("runtime exception handler {}", state(handler.is_some()));
        self.runtime_handler.set(handler);
    }

    /// Installing a handler turns on `break` events
    pub fn set_debug_message_handler(&self, handler: Option<Arc<dyn DebugMessageHandler>>) {
        let _lock = self.lock.acquire();
        log::debug!("debug message handler {}", state(handler.is_some()));
        self.isolate.debugger().set_enabled(handler.is_some());
        self.debug_handler.set(handler);
    }

    // ----- debugging -----

    pub fn send_debug_command(&self, command: &str) {
        self.debug_commands.send(command);
    }

    /// A sender for other threads
    pub fn debug_command_sender(&self) -> DebugCommandSender {
        self.debug_commands.clone()
    }

    /// Answer queued commands and deliver pending events, in order
    ///
    /// Does nothing while a script is running on this thread.
    pub fn process_debug_messages(&self) {
        let scope = ExecutionScope::new(self);
        let isolate = scope.isolate();
        if isolate.call_depth() > 0 {
            return;
        }
        let agent = isolate.debugger();
        self.deliver_debug(agent.drain_events());
        while let Some(command) = self.debug_commands.pop() {
            let response = agent.process_command(isolate, &command);
            self.deliver_debug(vec![response]);
            self.deliver_debug(agent.drain_events());
        }
    }

    fn deliver_debug(&self, messages: Vec<String>) {
        if messages.is_empty() {
            return;
        }
        match self.debug_handler.get() {
            Some(handler) => messages.iter().for_each(|message| handler.handle(message)),
            None => log::debug!("{} debug messages dropped", messages.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::test_support;

    #[test]
    fn test_single_instance() {
        let context = test_support::context();
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);
        let options = ContextOptions {
            runtime_exception_handler: Some(Arc::new(move |message: &str| {
                sink.lock().unwrap().push(message.to_string());
            })),
            ..ContextOptions::default()
        };
        assert!(matches!(
            EngineContext::with_options(options),
            Err(RuntimeError::ContextAlreadyExists)
        ));
        assert_eq!(reports.lock().unwrap().len(), 1);
        assert_eq!(context.evaluate("still.js", "6 * 7").and_then(|v| v.as_int()), Some(42));
    }

    #[test]
    fn test_rebuild_after_drop() {
        drop(test_support::context());
        let context = test_support::context();
        let again = context.evaluate("again.js", "'ok'");
        assert_eq!(again.and_then(|v| v.as_string().map(|s| s.to_string())), Some("ok".into()));
    }

    #[test]
    fn test_deep_nesting_is_a_script_error() {
        let context = test_support::context();
        let deep = format!("{}{}", "[".repeat(100_000), "]".repeat(100_000));
        match context.try_evaluate("deep.js", &deep) {
            Err(Error::Script(exception)) => {
                assert_eq!(exception.message(), "SyntaxError: too much recursion");
            }
            other => panic!("expected a script exception, got {:?}", other.map(|_| ())),
        }

        let parse = format!("JSON.parse('{}')", deep);
        assert!(matches!(context.try_evaluate("json.js", &parse), Err(Error::Script(_))));
        assert_eq!(context.evaluate("after.js", "[[1]][0][0]").and_then(|v| v.as_int()), Some(1));
    }

    #[test]
    fn test_globals_persist_between_evaluations() {
        let context = test_support::context();
        context.evaluate("a.js", "var counter = 1;");
        context.evaluate("b.js", "counter += 1;");
        let global = context.global_object().unwrap();
        assert_eq!(global.get(&context, "counter").and_then(|v| v.as_int()), Some(2));
        assert!(context.evaluate("c.js", "var nothing;").is_none());
    }

    #[test]
    fn test_wrappers_do_not_leak() {
        let context = test_support::context();
        context.collect_garbage();
        let baseline = context.memory_stats();

        let value = context.evaluate("leak.js", "({ list: [1, 2, 3] })");
        context.collect_garbage();
        let pinned = context.memory_stats();
        assert_eq!(pinned.persistent_handles, baseline.persistent_handles + 1);
        assert_eq!(pinned.live_objects, baseline.live_objects + 2);

        drop(value);
        context.collect_garbage();
        let after = context.memory_stats();
        assert_eq!(after.live_objects, baseline.live_objects);
        assert_eq!(after.persistent_handles, baseline.persistent_handles);
    }

    #[test]
    fn test_external_freer() {
        let context = test_support::context();
        let freed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&freed);
        let mut payload = 17u32;
        let pointer = &mut payload as *mut u32 as *mut c_void;
        let freer: Arc<dyn ExternalFreer> = Arc::new(move |p: *mut c_void| {
            assert!(!p.is_null());
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let external = context.create_external(pointer, Some(freer)).unwrap();
        assert_eq!(external.pointer(), pointer);

        let global = context.global_object().unwrap();
        global.set(&context, "ext", Some(&Value::External(external.clone())));
        let back = global.get(&context, "ext");
        assert_eq!(back.as_ref().and_then(|v| v.as_external()).map(|e| e.pointer()), Some(pointer));

        drop((external, back));
        global.set(&context, "ext", None);
        context.collect_garbage();
        assert_eq!(freed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_idle_notification() {
        let context = test_support::context();
        context.evaluate("idle.js", "var junk = [{}, {}, {}];");
        assert!(context.idle_notification(10));
        assert!(context.memory_stats().collections >= 1);
    }

    #[test]
    fn test_debug_round_trip() {
        let context = test_support::context();
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&messages);
        context.set_debug_message_handler(Some(Arc::new(move |message: &str| {
            sink.lock().unwrap().push(message.to_string());
        })));

        context.evaluate("dbg.js", "var x = 5;\ndebugger;");
        let sender = context.debug_command_sender();
        std::thread::spawn(move || {
            sender.send(
                r#"{"seq":1,"type":"request","command":"evaluate","arguments":{"expression":"x * 2"}}"#,
            );
        })
        .join()
        .unwrap();
        assert!(messages.lock().unwrap().is_empty());

        context.process_debug_messages();
        let messages = messages.lock().unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains(r#""event":"break""#));
        assert!(messages[1].contains(r#""text":"10""#), "{}", messages[1]);
    }

    #[test]
    fn test_version() {
        assert!(Context::version().starts_with("mquickjs-simple "));
    }
}
