//! mquickjs-simple - an embeddable JavaScript engine with an
//! ownership-explicit host boundary
//!
//! The engine (parser, tree-walking interpreter, builtins and a
//! mark-and-sweep collector) lives in the lower modules. Hosts talk to it
//! through one process-wide [`EngineContext`] and owned [`Value`]s that keep
//! their script objects alive until dropped, or through the C ABI in
//! [`ffi`].
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use mquickjs_simple::{Arguments, CallbackResult, Context, EngineContext, Value};
//!
//! let context = EngineContext::new().unwrap();
//! let add = context
//!     .create_function(Arc::new(|_: &Context, args: &mut Arguments| -> CallbackResult {
//!         let a = args.take(0).and_then(|v| v.as_double()).unwrap_or(0.0);
//!         let b = args.take(1).and_then(|v| v.as_double()).unwrap_or(0.0);
//!         Ok(Some(Value::Double(a + b)))
//!     }))
//!     .unwrap();
//! let global = context.global_object().unwrap();
//! global.set(&context, "add", Some(&Value::Function(add)));
//! let sum = context.evaluate("sum.js", "add(1, 2)");
//! assert_eq!(sum.and_then(|v| v.as_int()), Some(3));
//! ```

// Engine
pub mod builtins;
pub mod config;
pub mod debug;
pub mod gc;
pub mod isolate;
pub mod parser;
pub mod runtime;
pub mod util;
pub mod vm;

// Host boundary
pub mod callback;
pub mod context;
mod convert;
pub mod error;
pub mod exception;
pub mod ffi;
pub mod handler;
pub mod object;
pub mod scope;
pub mod value;

#[cfg(test)]
mod test_support;

pub use callback::{Arguments, Callback, CallbackError, CallbackResult};
pub use config::Config;
pub use context::{Context, ContextOptions, DebugCommandSender, EngineContext};
pub use error::{Error, RuntimeError, RuntimeErrorCode};
pub use exception::ScriptException;
pub use handler::{
    DebugMessageHandler, ExternalFreer, RuntimeExceptionHandler, ScriptExceptionHandler,
};
pub use isolate::{MemoryStats, VERSION};
pub use object::{Array, External, Function, Object};
pub use scope::ExecutionScope;
pub use value::{ByteString, Value, ValueType};
