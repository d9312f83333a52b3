//! Script execution
//!
//! The interpreter walks the syntax tree; `ops` holds the object model
//! operations it shares with builtins and the host boundary.

pub mod exception;
pub mod interpreter;
pub mod ops;
pub mod stack;

pub use exception::{ErrorKind, Exception, JsResult, ThrowSite};
pub use ops::Hint;
pub use stack::{CallStack, Frame};
