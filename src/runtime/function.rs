//! Function objects
//!
//! Three kinds of callable: script closures over a parsed function body,
//! native functions (builtins and host functions, which carry a data value),
//! and bound functions produced by `Function.prototype.bind`.

use std::rc::Rc;

use crate::gc::ObjectRef;
use crate::isolate::Isolate;
use crate::parser::ast::FunctionNode;
use crate::runtime::value::JsValue;
use crate::vm::JsResult;

/// Signature of every native function
pub type NativeFunction = fn(&Isolate, &CallInfo<'_>) -> JsResult<JsValue>;

/// Arguments of a native call
pub struct CallInfo<'a> {
    /// Receiver (`undefined` for constructor calls)
    pub this: JsValue,
    pub args: &'a [JsValue],
    /// Data value attached when the function was created
    pub data: &'a JsValue,
    /// Invoked through `new`
    pub construct: bool,
    /// The function object being called
    pub callee: ObjectRef,
}

impl CallInfo<'_> {
    /// Argument `index`, or `undefined` when absent
    #[inline]
    pub fn arg(&self, index: usize) -> JsValue {
        self.args.get(index).cloned().unwrap_or_default()
    }
}

#[derive(Clone)]
pub enum Function {
    /// Script function with its captured environment (`None` is global)
    Closure {
        node: Rc<FunctionNode>,
        scope: Option<ObjectRef>,
    },
    /// Builtin or host function
    Native {
        call: NativeFunction,
        data: JsValue,
        constructor: bool,
    },
    Bound {
        target: ObjectRef,
        this: JsValue,
        args: Rc<[JsValue]>,
    },
}

impl Function {
    /// Collect heap references held by this function
    pub fn trace(&self, out: &mut Vec<ObjectRef>) {
        match self {
            Function::Closure { scope, .. } => out.extend(scope.iter().copied()),
            Function::Native { data, .. } => out.extend(data.as_object()),
            Function::Bound { target, this, args } => {
                out.push(*target);
                out.extend(this.as_object());
                out.extend(args.iter().filter_map(JsValue::as_object));
            }
        }
    }

    /// Whether `new` may be applied
    pub fn is_constructor(&self) -> bool {
        match self {
            Function::Closure { .. } | Function::Bound { .. } => true,
            Function::Native { constructor, .. } => *constructor,
        }
    }
}
