//! Runtime support
//!
//! This module contains the core runtime types for JavaScript execution:
//! - Values and heap objects
//! - Property tables
//! - Function kinds (closures, native functions, bound functions)
//! - String and number conversions
//! - The realm's intrinsic objects

pub mod function;
pub mod object;
pub mod property;
pub mod realm;
pub mod string;
pub mod value;

pub use function::{CallInfo, Function, NativeFunction};
pub use object::{ClassId, Environment, ExternalData, JsObject, ObjectKind, RegExpData};
pub use property::{Property, PropertyTable};
pub use realm::Realm;
pub use value::JsValue;
