//! Tree-walking interpreter
//!
//! Executes the syntax tree directly. Scopes are `Environment` objects on
//! the heap, chained through their `parent`; the end of every chain is the
//! global object. Statements and the expressions that can throw record
//! their line in the innermost call frame, which is what exceptions and
//! stack traces report.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use crate::gc::ObjectRef;
use crate::isolate::Isolate;
use crate::parser::ast::{
    BinaryOp, Expr, FunctionNode, LogicalOp, Stmt, StmtKind, SwitchCase, UnaryOp,
};
use crate::parser::{Source, parse_program};
use crate::runtime::function::Function;
use crate::runtime::object::{ClassId, Environment, JsObject, ObjectKind};
use crate::runtime::value::JsValue;
use crate::util::dtoa;
use crate::vm::exception::{ErrorKind, Exception, JsResult, ThrowSite};
use crate::vm::ops::{Hint, to_int32};
use crate::vm::stack::Frame;

/// How a statement finished
#[derive(Debug)]
enum Completion {
    Normal,
    Return(JsValue),
    Break,
    Continue,
}

/// State of the function (or script) being executed
struct Activation<'a> {
    scope: Option<ObjectRef>,
    this: JsValue,
    /// Value of the last expression statement, for script results
    completion: Option<&'a RefCell<JsValue>>,
}

impl<'a> Activation<'a> {
    fn with_scope(&self, scope: ObjectRef) -> Activation<'a> {
        Activation {
            scope: Some(scope),
            this: self.this.clone(),
            completion: self.completion,
        }
    }
}

/// Assignable location
enum Reference {
    Binding(Rc<str>),
    Property(JsValue, Rc<str>),
}

/// Pops the frame pushed for a call, also when it unwinds with an error
struct FrameGuard<'a> {
    isolate: &'a Isolate,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.isolate.frames.borrow_mut().pop();
    }
}

impl Isolate {
    /// Compile and run a script; the result is its completion value
    pub fn run_script(&self, name: &str, text: &str) -> JsResult<JsValue> {
        let source = Source::new(name, text);
        self.register_script(&source);
        let program = parse_program(&source)
            .map_err(|e| self.syntax_error(&source, &e.message, e.line))?;

        let _call = self.enter_call()?;
        let _frame = self.push_frame(&program);
        let global = self.global();
        for var in &program.vars {
            if !self.has_own_property(global, var) {
                self.define_property(global, var, JsValue::Undefined, true);
            }
        }
        for function in &program.functions {
            let f = self.make_closure(function, None);
            self.define_property(global, function.display_name(), JsValue::Object(f), true);
        }

        let completion = RefCell::new(JsValue::Undefined);
        let act = Activation {
            scope: None,
            this: JsValue::Object(global),
            completion: Some(&completion),
        };
        self.exec_block(&act, &program.body)?;
        Ok(completion.into_inner())
    }

    fn syntax_error(&self, source: &Source, message: &str, line: usize) -> Exception {
        let error = self.new_error(ErrorKind::SyntaxError, message);
        let trace = format!("    at {}:{}", source.name, line);
        self.define_property(
            error,
            "stack",
            JsValue::from(format!("SyntaxError: {}\n{}", message, trace)),
            false,
        );
        let site = ThrowSite {
            file: Rc::clone(&source.name),
            line: line as u32,
            source_line: source.line(line).to_string(),
            stack: trace,
        };
        Exception::new(JsValue::Object(error), Some(Rc::new(site)))
    }

    fn push_frame(&self, node: &FunctionNode) -> FrameGuard<'_> {
        self.frames.borrow_mut().push(Frame {
            name: node.name.clone().unwrap_or_else(|| Rc::from("")),
            source: Rc::clone(&node.source),
            line: node.line,
            is_program: node.is_program,
        });
        FrameGuard { isolate: self }
    }

    /// Function object for `node`; named function expressions see their
    /// own name
    fn make_closure(&self, node: &Rc<FunctionNode>, scope: Option<ObjectRef>) -> ObjectRef {
        let function = Function::Closure {
            node: Rc::clone(node),
            scope,
        };
        self.new_function(function, node.display_name(), node.params.len())
    }

    fn make_function_expression(
        &self,
        node: &Rc<FunctionNode>,
        scope: Option<ObjectRef>,
    ) -> ObjectRef {
        let Some(name) = node.name.clone() else {
            return self.make_closure(node, scope);
        };
        let env = self.new_environment(scope);
        let f = self.make_closure(node, Some(env));
        self.with_object_mut(env, |object| {
            if let Some(env) = object.environment_mut() {
                env.vars.insert(name, JsValue::Object(f));
            }
        });
        f
    }

    pub(crate) fn new_environment(&self, parent: Option<ObjectRef>) -> ObjectRef {
        self.alloc(JsObject::new(
            ClassId::Environment,
            None,
            ObjectKind::Environment(Environment {
                vars: HashMap::new(),
                parent,
            }),
        ))
    }

    pub(crate) fn call_closure(
        &self,
        callee: ObjectRef,
        node: &Rc<FunctionNode>,
        scope: Option<ObjectRef>,
        this: JsValue,
        args: &[JsValue],
    ) -> JsResult<JsValue> {
        let mut vars: HashMap<Rc<str>, JsValue> = HashMap::new();
        for (i, param) in node.params.iter().enumerate() {
            vars.insert(Rc::clone(param), args.get(i).cloned().unwrap_or_default());
        }
        if node.uses_arguments {
            let arguments = self.alloc(JsObject::new(
                ClassId::Arguments,
                Some(self.realm().object_proto),
                ObjectKind::Array(args.to_vec()),
            ));
            self.define_property(arguments, "callee", JsValue::Object(callee), false);
            vars.insert(Rc::from("arguments"), JsValue::Object(arguments));
        }
        for var in &node.vars {
            vars.entry(Rc::clone(var)).or_insert(JsValue::Undefined);
        }
        let env = self.alloc(JsObject::new(
            ClassId::Environment,
            None,
            ObjectKind::Environment(Environment { vars, parent: scope }),
        ));
        for function in &node.functions {
            let f = self.make_closure(function, Some(env));
            self.with_object_mut(env, |object| {
                if let Some(env) = object.environment_mut() {
                    env.vars.insert(Rc::from(function.display_name()), JsValue::Object(f));
                }
            });
        }

        // Sloppy mode: a missing receiver is the global object
        let this = if this.is_nullish() {
            JsValue::Object(self.global())
        } else {
            this
        };
        let act = Activation {
            scope: Some(env),
            this,
            completion: None,
        };
        let _frame = self.push_frame(node);
        match self.exec_block(&act, &node.body)? {
            Completion::Return(value) => Ok(value),
            _ => Ok(JsValue::Undefined),
        }
    }

    // ----- bindings -----

    /// Resolve `name`; `None` when it is not declared anywhere
    fn lookup(&self, scope: Option<ObjectRef>, name: &str) -> Option<JsValue> {
        let mut current = scope;
        while let Some(env) = current {
            let (found, parent) = self.with_object(env, |object| match object.environment() {
                Some(env) => (env.vars.get(name).cloned(), env.parent),
                None => (None, None),
            });
            if found.is_some() {
                return found;
            }
            current = parent;
        }
        let global = self.global();
        if self.has_property(global, name) {
            Some(self.get_property(global, name))
        } else {
            None
        }
    }

    fn get_binding(&self, scope: Option<ObjectRef>, name: &str) -> JsResult<JsValue> {
        match self.lookup(scope, name) {
            Some(value) => Ok(value),
            None => Err(self.error(ErrorKind::ReferenceError, &format!("{} is not defined", name))),
        }
    }

    /// Assign to the nearest binding; undeclared names become globals
    fn set_binding(
        &self,
        scope: Option<ObjectRef>,
        name: &Rc<str>,
        value: JsValue,
    ) -> JsResult<()> {
        let mut current = scope;
        let mut value = Some(value);
        while let Some(env) = current {
            let parent = self.with_object_mut(env, |object| {
                let env = object.environment_mut()?;
                if let Some(slot) = env.vars.get_mut(name) {
                    *slot = value.take().unwrap_or_default();
                    return None;
                }
                Some(env.parent)
            });
            match parent {
                Some(parent) => current = parent,
                None => return Ok(()),
            }
        }
        self.set_property(self.global(), name, value.unwrap_or_default())
    }

    fn reference(&self, act: &Activation<'_>, expr: &Expr) -> JsResult<Reference> {
        match expr {
            Expr::Ident(name, _) => Ok(Reference::Binding(Rc::clone(name))),
            Expr::Member(object, name, line) => {
                let object = self.eval(act, object)?;
                self.set_line(*line);
                Ok(Reference::Property(object, Rc::clone(name)))
            }
            Expr::Index(object, index, line) => {
                let object = self.eval(act, object)?;
                let key = self.eval(act, index)?;
                self.set_line(*line);
                Ok(Reference::Property(object, self.to_property_key(&key)?))
            }
            _ => Err(self.error(ErrorKind::SyntaxError, "Invalid left-hand side in assignment")),
        }
    }

    fn get_reference(&self, act: &Activation<'_>, reference: &Reference) -> JsResult<JsValue> {
        match reference {
            Reference::Binding(name) => self.get_binding(act.scope, name),
            Reference::Property(object, key) => self.get(object, key),
        }
    }

    fn put_reference(
        &self,
        act: &Activation<'_>,
        reference: &Reference,
        value: JsValue,
    ) -> JsResult<()> {
        match reference {
            Reference::Binding(name) => self.set_binding(act.scope, name, value),
            Reference::Property(object, key) => self.set(object, key, value),
        }
    }

    // ----- statements -----

    fn exec_block(&self, act: &Activation<'_>, body: &[Stmt]) -> JsResult<Completion> {
        for stmt in body {
            match self.exec(act, stmt)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    /// Run a loop body; `Some` means the loop must stop with that completion
    fn loop_body(&self, act: &Activation<'_>, body: &Stmt) -> JsResult<Option<Completion>> {
        Ok(match self.exec(act, body)? {
            Completion::Break => Some(Completion::Normal),
            Completion::Return(value) => Some(Completion::Return(value)),
            Completion::Normal | Completion::Continue => None,
        })
    }

    fn exec(&self, act: &Activation<'_>, stmt: &Stmt) -> JsResult<Completion> {
        self.set_line(stmt.line);
        match &stmt.kind {
            StmtKind::Empty | StmtKind::FunctionDecl => {}
            StmtKind::Expr(expr) => {
                let value = self.eval(act, expr)?;
                if let Some(completion) = act.completion {
                    *completion.borrow_mut() = value;
                }
            }
            StmtKind::Var(decls) => {
                for (name, init) in decls {
                    if let Some(init) = init {
                        let value = self.eval(act, init)?;
                        self.set_binding(act.scope, name, value)?;
                    }
                }
            }
            StmtKind::Block(body) => return self.exec_block(act, body),
            StmtKind::If { test, then, otherwise } => {
                if self.eval(act, test)?.truthy() {
                    return self.exec(act, then);
                } else if let Some(otherwise) = otherwise {
                    return self.exec(act, otherwise);
                }
            }
            StmtKind::While { test, body } => {
                while self.eval(act, test)?.truthy() {
                    if let Some(done) = self.loop_body(act, body)? {
                        return Ok(done);
                    }
                }
            }
            StmtKind::DoWhile { body, test } => loop {
                if let Some(done) = self.loop_body(act, body)? {
                    return Ok(done);
                }
                if !self.eval(act, test)?.truthy() {
                    break;
                }
            },
            StmtKind::For { init, test, update, body } => {
                if let Some(init) = init {
                    self.exec(act, init)?;
                }
                loop {
                    if let Some(test) = test {
                        if !self.eval(act, test)?.truthy() {
                            break;
                        }
                    }
                    if let Some(done) = self.loop_body(act, body)? {
                        return Ok(done);
                    }
                    if let Some(update) = update {
                        self.eval(act, update)?;
                    }
                }
            }
            StmtKind::ForIn { target, object, body } => {
                return self.exec_for_in(act, target, object, body);
            }
            StmtKind::ForOf { target, iterable, body } => {
                return self.exec_for_of(act, target, iterable, body);
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(act, expr)?,
                    None => JsValue::Undefined,
                };
                return Ok(Completion::Return(value));
            }
            StmtKind::Break => return Ok(Completion::Break),
            StmtKind::Continue => return Ok(Completion::Continue),
            StmtKind::Throw(expr) => {
                let value = self.eval(act, expr)?;
                self.set_line(stmt.line);
                return Err(self.exception(value));
            }
            StmtKind::Try { block, param, handler, finalizer } => {
                let (param, handler) = (param.as_ref(), handler.as_deref());
                return self.exec_try(act, block, param, handler, finalizer.as_deref());
            }
            StmtKind::Switch { discriminant, cases } => {
                return self.exec_switch(act, discriminant, cases);
            }
            StmtKind::Debugger => {
                let top = self.frames.borrow().top().cloned();
                if let Some(frame) = top {
                    self.debugger().on_break(&frame.source, frame.line);
                }
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_for_in(
        &self,
        act: &Activation<'_>,
        target: &Expr,
        object: &Expr,
        body: &Stmt,
    ) -> JsResult<Completion> {
        let object = self.eval(act, object)?;
        if object.is_nullish() {
            return Ok(Completion::Normal);
        }
        let r = self.to_object(&object)?;
        for key in self.for_in_keys(r) {
            // Skip keys deleted by an earlier iteration
            if !self.has_property(r, &key) {
                continue;
            }
            let reference = self.reference(act, target)?;
            self.put_reference(act, &reference, JsValue::String(key))?;
            if let Some(done) = self.loop_body(act, body)? {
                return Ok(done);
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_for_of(
        &self,
        act: &Activation<'_>,
        target: &Expr,
        iterable: &Expr,
        body: &Stmt,
    ) -> JsResult<Completion> {
        let iterable = self.eval(act, iterable)?;
        if let JsValue::String(s) = &iterable {
            for c in s.chars() {
                let reference = self.reference(act, target)?;
                self.put_reference(act, &reference, JsValue::from(c.to_string()))?;
                if let Some(done) = self.loop_body(act, body)? {
                    return Ok(done);
                }
            }
            return Ok(Completion::Normal);
        }
        let Some(r) = iterable
            .as_object()
            .filter(|r| self.with_object(*r, |o| o.elements().is_some()))
        else {
            let shown = self.display_string(&iterable);
            return Err(self.type_error(&format!("{} is not iterable", shown)));
        };
        // Live view: elements pushed during iteration are visited
        let mut index = 0;
        while let Some(item) = self.element(r, index) {
            index += 1;
            let reference = self.reference(act, target)?;
            self.put_reference(act, &reference, item)?;
            if let Some(done) = self.loop_body(act, body)? {
                return Ok(done);
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_try(
        &self,
        act: &Activation<'_>,
        block: &[Stmt],
        param: Option<&Rc<str>>,
        handler: Option<&[Stmt]>,
        finalizer: Option<&[Stmt]>,
    ) -> JsResult<Completion> {
        let mut result = self.exec_block(act, block);
        if let (Err(exception), Some(handler)) = (&result, handler) {
            let value = exception.value.clone();
            result = match param {
                Some(param) => {
                    let env = self.new_environment(act.scope);
                    self.with_object_mut(env, |object| {
                        if let Some(env) = object.environment_mut() {
                            env.vars.insert(Rc::clone(param), value);
                        }
                    });
                    self.exec_block(&act.with_scope(env), handler)
                }
                None => self.exec_block(act, handler),
            };
        }
        if let Some(finalizer) = finalizer {
            match self.exec_block(act, finalizer)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        result
    }

    fn exec_switch(
        &self,
        act: &Activation<'_>,
        discriminant: &Expr,
        cases: &[SwitchCase],
    ) -> JsResult<Completion> {
        let value = self.eval(act, discriminant)?;
        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                if self.eval(act, test)?.strict_equals(&value) {
                    start = Some(i);
                    break;
                }
            }
        }
        let start = start.or_else(|| cases.iter().position(|case| case.test.is_none()));
        if let Some(start) = start {
            for case in &cases[start..] {
                match self.exec_block(act, &case.body)? {
                    Completion::Normal => {}
                    Completion::Break => break,
                    abrupt => return Ok(abrupt),
                }
            }
        }
        Ok(Completion::Normal)
    }

    // ----- expressions -----

    /// Record `line` in the innermost frame
    fn set_line(&self, line: u32) {
        self.frames.borrow_mut().set_line(line);
    }

    fn element(&self, r: ObjectRef, index: usize) -> Option<JsValue> {
        self.with_object(r, |o| o.elements().and_then(|e| e.get(index).cloned()))
    }

    fn eval(&self, act: &Activation<'_>, expr: &Expr) -> JsResult<JsValue> {
        Ok(match expr {
            Expr::Number(n) => JsValue::Number(*n),
            Expr::String(s) => JsValue::String(Rc::clone(s)),
            Expr::Bool(b) => JsValue::Bool(*b),
            Expr::Null => JsValue::Null,
            Expr::Ident(name, line) => {
                if &**name == "undefined" {
                    return Ok(JsValue::Undefined);
                }
                self.set_line(*line);
                self.get_binding(act.scope, name)?
            }
            Expr::This => act.this.clone(),
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(match item {
                        Some(expr) => self.eval(act, expr)?,
                        None => JsValue::Undefined,
                    });
                }
                JsValue::Object(self.new_array(values))
            }
            Expr::Object(props) => {
                let object = self.new_object();
                for (key, value) in props {
                    let value = self.eval(act, value)?;
                    self.set_property(object, key, value)?;
                }
                JsValue::Object(object)
            }
            Expr::Function(node) => JsValue::Object(self.make_function_expression(node, act.scope)),
            Expr::RegExp { pattern, flags } => JsValue::Object(self.new_regexp(pattern, flags)?),
            Expr::Unary(op, operand) => self.eval_unary(act, *op, operand)?,
            Expr::Update { increment, prefix, target } => {
                self.eval_update(act, *increment, *prefix, target)?
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(act, left)?;
                let right = self.eval(act, right)?;
                self.binary(*op, &left, &right)?
            }
            Expr::Logical(op, left, right) => {
                let left = self.eval(act, left)?;
                match (op, left.truthy()) {
                    (LogicalOp::And, true) | (LogicalOp::Or, false) => self.eval(act, right)?,
                    _ => left,
                }
            }
            Expr::Assign { op, target, value } => self.eval_assign(act, *op, target, value)?,
            Expr::Conditional { test, then, otherwise } => {
                if self.eval(act, test)?.truthy() {
                    self.eval(act, then)?
                } else {
                    self.eval(act, otherwise)?
                }
            }
            Expr::Member(object, name, line) => {
                let object = self.eval(act, object)?;
                self.set_line(*line);
                self.get(&object, name)?
            }
            Expr::Index(object, index, line) => self.eval_index(act, object, index, *line)?,
            Expr::Call { callee, args, line } => self.eval_call(act, callee, args, *line)?,
            Expr::New { callee, args, line } => self.eval_new(act, callee, args, *line)?,
            Expr::Sequence(items) => {
                let mut last = JsValue::Undefined;
                for item in items {
                    last = self.eval(act, item)?;
                }
                last
            }
        })
    }

    fn eval_update(
        &self,
        act: &Activation<'_>,
        increment: bool,
        prefix: bool,
        target: &Expr,
    ) -> JsResult<JsValue> {
        let reference = self.reference(act, target)?;
        let old = self.to_number(&self.get_reference(act, &reference)?)?;
        let new = if increment { old + 1.0 } else { old - 1.0 };
        self.put_reference(act, &reference, JsValue::Number(new))?;
        Ok(JsValue::Number(if prefix { new } else { old }))
    }

    fn eval_assign(
        &self,
        act: &Activation<'_>,
        op: Option<BinaryOp>,
        target: &Expr,
        value: &Expr,
    ) -> JsResult<JsValue> {
        let reference = self.reference(act, target)?;
        let value = match op {
            None => self.eval(act, value)?,
            Some(op) => {
                let old = self.get_reference(act, &reference)?;
                let rhs = self.eval(act, value)?;
                self.binary(op, &old, &rhs)?
            }
        };
        self.put_reference(act, &reference, value.clone())?;
        Ok(value)
    }

    fn eval_index(
        &self,
        act: &Activation<'_>,
        object: &Expr,
        index: &Expr,
        line: u32,
    ) -> JsResult<JsValue> {
        let object = self.eval(act, object)?;
        let index = self.eval(act, index)?;
        self.set_line(line);
        if let (JsValue::Object(r), Some(i)) = (&object, index.as_int32()) {
            // Dense array fast path
            if let Some(item) = self.element(*r, i as usize).filter(|_| i >= 0) {
                return Ok(item);
            }
        }
        let key = self.to_property_key(&index)?;
        self.get(&object, &key)
    }

    fn eval_call(
        &self,
        act: &Activation<'_>,
        callee: &Expr,
        args: &[Expr],
        line: u32,
    ) -> JsResult<JsValue> {
        let (function, this) = match callee {
            Expr::Member(..) | Expr::Index(..) => {
                let Reference::Property(this, key) = self.reference(act, callee)? else {
                    return Err(self.type_error("invalid call target"));
                };
                (self.get(&this, &key)?, this)
            }
            _ => (self.eval(act, callee)?, JsValue::Undefined),
        };
        let args = self.eval_args(act, args)?;
        self.set_line(line);
        match function.as_object() {
            Some(r) if self.is_callable(&function) => self.call_function(r, this, &args, false),
            _ => Err(self.type_error(&format!("{} is not a function", callee_text(callee)))),
        }
    }

    fn eval_new(
        &self,
        act: &Activation<'_>,
        callee: &Expr,
        args: &[Expr],
        line: u32,
    ) -> JsResult<JsValue> {
        let constructor = self.eval(act, callee)?;
        let args = self.eval_args(act, args)?;
        self.set_line(line);
        if !self.is_constructor(&constructor) {
            return Err(self.type_error(&format!("{} is not a constructor", callee_text(callee))));
        }
        self.construct(&constructor, &args)
    }

    fn is_constructor(&self, value: &JsValue) -> bool {
        value.as_object().is_some_and(|r| {
            self.with_object(r, |o| o.function().is_some_and(Function::is_constructor))
        })
    }

    fn eval_args(&self, act: &Activation<'_>, args: &[Expr]) -> JsResult<Vec<JsValue>> {
        args.iter().map(|arg| self.eval(act, arg)).collect()
    }

    fn eval_unary(&self, act: &Activation<'_>, op: UnaryOp, operand: &Expr) -> JsResult<JsValue> {
        match op {
            UnaryOp::TypeOf => {
                let value = match operand {
                    Expr::Ident(name, _) => self.lookup(act.scope, name).unwrap_or_default(),
                    _ => self.eval(act, operand)?,
                };
                Ok(JsValue::string(self.type_of(&value)))
            }
            UnaryOp::Delete => match operand {
                Expr::Member(..) | Expr::Index(..) => {
                    let Reference::Property(object, key) = self.reference(act, operand)? else {
                        return Ok(JsValue::Bool(true));
                    };
                    match object {
                        JsValue::Object(r) => Ok(JsValue::Bool(self.delete_property(r, &key))),
                        JsValue::Undefined | JsValue::Null => Err(self.type_error(&format!(
                            "Cannot convert undefined or null to object (deleting '{}')",
                            key
                        ))),
                        _ => Ok(JsValue::Bool(true)),
                    }
                }
                Expr::Ident(..) => Ok(JsValue::Bool(false)),
                _ => {
                    self.eval(act, operand)?;
                    Ok(JsValue::Bool(true))
                }
            },
            _ => {
                let value = self.eval(act, operand)?;
                Ok(match op {
                    UnaryOp::Neg => JsValue::Number(-self.to_number(&value)?),
                    UnaryOp::Plus => JsValue::Number(self.to_number(&value)?),
                    UnaryOp::Not => JsValue::Bool(!value.truthy()),
                    UnaryOp::BitNot => JsValue::Number(!self.to_int32(&value)? as f64),
                    _ => JsValue::Undefined,
                })
            }
        }
    }

    /// Evaluate a binary operator on two values
    pub fn binary(&self, op: BinaryOp, left: &JsValue, right: &JsValue) -> JsResult<JsValue> {
        // Number fast path
        if let (JsValue::Number(a), JsValue::Number(b)) = (left, right) {
            if let Some(result) = number_op(op, *a, *b) {
                return Ok(result);
            }
        }
        Ok(match op {
            BinaryOp::Add => {
                let a = self.to_primitive(left, Hint::Number)?;
                let b = self.to_primitive(right, Hint::Number)?;
                if matches!(a, JsValue::String(_)) || matches!(b, JsValue::String(_)) {
                    let mut s = self.to_string(&a)?.to_string();
                    s.push_str(&self.to_string(&b)?);
                    self.checked_string(s)?
                } else {
                    JsValue::Number(self.to_number(&a)? + self.to_number(&b)?)
                }
            }
            BinaryOp::Eq => JsValue::Bool(self.loose_equals(left, right)?),
            BinaryOp::NotEq => JsValue::Bool(!self.loose_equals(left, right)?),
            BinaryOp::StrictEq => JsValue::Bool(left.strict_equals(right)),
            BinaryOp::StrictNotEq => JsValue::Bool(!left.strict_equals(right)),
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                let ordering = self.compare(left, right)?;
                JsValue::Bool(match op {
                    BinaryOp::Lt => ordering == Some(Ordering::Less),
                    BinaryOp::LtEq => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                    BinaryOp::Gt => ordering == Some(Ordering::Greater),
                    _ => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                })
            }
            BinaryOp::In => {
                let JsValue::Object(r) = right else {
                    return Err(self.type_error(&format!(
                        "Cannot use 'in' operator to search for '{}' in {}",
                        self.display_string(left),
                        self.display_string(right)
                    )));
                };
                let key = self.to_property_key(left)?;
                JsValue::Bool(self.has_property(*r, &key))
            }
            BinaryOp::InstanceOf => JsValue::Bool(self.instance_of(left, right)?),
            _ => {
                let a = self.to_number(left)?;
                let b = self.to_number(right)?;
                number_op(op, a, b).unwrap_or(JsValue::Number(f64::NAN))
            }
        })
    }

    /// Relational comparison; `None` when either side is `NaN`
    fn compare(&self, left: &JsValue, right: &JsValue) -> JsResult<Option<Ordering>> {
        let a = self.to_primitive(left, Hint::Number)?;
        let b = self.to_primitive(right, Hint::Number)?;
        if let (JsValue::String(a), JsValue::String(b)) = (&a, &b) {
            // Strings compare by UTF-16 code units
            return Ok(Some(a.encode_utf16().cmp(b.encode_utf16())));
        }
        Ok(self.to_number(&a)?.partial_cmp(&self.to_number(&b)?))
    }
}

/// Arithmetic, bitwise and numeric comparison operators on two numbers
fn number_op(op: BinaryOp, a: f64, b: f64) -> Option<JsValue> {
    let shift = (to_int32(b) as u32) & 31;
    Some(match op {
        BinaryOp::Add => JsValue::Number(a + b),
        BinaryOp::Sub => JsValue::Number(a - b),
        BinaryOp::Mul => JsValue::Number(a * b),
        BinaryOp::Div => JsValue::Number(a / b),
        BinaryOp::Mod => JsValue::Number(a % b),
        BinaryOp::Exp => JsValue::Number(pow(a, b)),
        BinaryOp::Shl => JsValue::Number(to_int32(a).wrapping_shl(shift) as f64),
        BinaryOp::Shr => JsValue::Number((to_int32(a) >> shift) as f64),
        BinaryOp::UShr => JsValue::Number(((to_int32(a) as u32) >> shift) as f64),
        BinaryOp::BitAnd => JsValue::Number((to_int32(a) & to_int32(b)) as f64),
        BinaryOp::BitOr => JsValue::Number((to_int32(a) | to_int32(b)) as f64),
        BinaryOp::BitXor => JsValue::Number((to_int32(a) ^ to_int32(b)) as f64),
        BinaryOp::Lt => JsValue::Bool(a < b),
        BinaryOp::LtEq => JsValue::Bool(a <= b),
        BinaryOp::Gt => JsValue::Bool(a > b),
        BinaryOp::GtEq => JsValue::Bool(a >= b),
        BinaryOp::StrictEq | BinaryOp::Eq => JsValue::Bool(a == b),
        BinaryOp::StrictNotEq | BinaryOp::NotEq => JsValue::Bool(a != b),
        BinaryOp::In | BinaryOp::InstanceOf => return None,
    })
}

/// `Math.pow` semantics: unlike `powf`, `1 ** NaN` and `1 ** Infinity` are `NaN`
pub fn pow(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

/// Source-like rendering of a callee for error messages
fn callee_text(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name, _) => name.to_string(),
        Expr::This => "this".to_string(),
        Expr::Member(object, name, _) => format!("{}.{}", callee_text(object), name),
        Expr::Index(object, index, _) => match &**index {
            Expr::Number(n) => format!("{}[{}]", callee_text(object), dtoa::number_to_string(*n)),
            Expr::String(s) => format!("{}[\"{}\"]", callee_text(object), s),
            _ => format!("{}[...]", callee_text(object)),
        },
        Expr::Call { callee, .. } => format!("{}(...)", callee_text(callee)),
        _ => "expression".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn eval(isolate: &Isolate, code: &str) -> JsValue {
        isolate.run_script("test.js", code).unwrap()
    }

    fn eval_number(code: &str) -> f64 {
        let isolate = Isolate::new(Config::default());
        eval(&isolate, code).as_number().unwrap()
    }

    fn eval_string(code: &str) -> String {
        let isolate = Isolate::new(Config::default());
        let value = eval(&isolate, code);
        isolate.to_string(&value).unwrap().to_string()
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        assert_eq!(eval_number("1 + 2 * 3"), 7.0);
        assert_eq!(eval_number("(1 + 2) * 3"), 9.0);
        assert_eq!(eval_number("7 % 3 + 2 ** 3"), 9.0);
        assert_eq!(eval_number("-5 >>> 28"), 15.0);
        assert_eq!(eval_number("1 << 31"), -2147483648.0);
        assert!(eval_number("1 ** NaN").is_nan());
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(eval_string("'a' + 1 + 2"), "a12");
        assert_eq!(eval_string("1 + 2 + 'a'"), "3a");
        assert_eq!(eval_string("[1, 2] + ''"), "1,2");
        assert_eq!(eval_string("({}) + ''"), "[object Object]");
    }

    #[test]
    fn test_closures_and_recursion() {
        assert_eq!(
            eval_number(
                "function counter() { var n = 0; return function () { return ++n; }; }
                 var c = counter(); c(); c(); c()"
            ),
            3.0
        );
        assert_eq!(
            eval_number("function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); } fib(15)"),
            610.0
        );
        assert_eq!(
            eval_number("var f = function g(n) { return n ? g(n - 1) + 1 : 0; }; f(4)"),
            4.0
        );
    }

    #[test]
    fn test_hoisting() {
        assert_eq!(
            eval_string(
                "typeof hoisted + ':' + early(); \
                 var hoisted = 1; function early() { return 'ok'; }"
            ),
            "undefined:ok"
        );
    }

    #[test]
    fn test_loops_and_switch() {
        assert_eq!(
            eval_number(
                "var s = 0; for (var i = 0; i < 10; i++) { \
                 if (i == 3) continue; if (i == 6) break; s += i; } s"
            ),
            12.0
        );
        assert_eq!(eval_number("var i = 0; do { i++; } while (i < 5); i"), 5.0);
        assert_eq!(
            eval_string(
                "var out = ''; switch (2) { case 1: out += 'a'; case 2: out += 'b'; \
                 case 3: out += 'c'; break; default: out += 'd'; } out"
            ),
            "bc"
        );
        assert_eq!(
            eval_string("var k = []; for (var p in {a: 1, b: 2}) k.push(p); k.join()"),
            "a,b"
        );
        assert_eq!(eval_number("var t = 0; for (var x of [1, 2, 3]) t += x; t"), 6.0);
    }

    #[test]
    fn test_try_catch_finally() {
        assert_eq!(
            eval_string(
                "var log = ''; try { throw new Error('x'); } \
                 catch (e) { log += e.message; } finally { log += '!'; } log"
            ),
            "x!"
        );
        assert_eq!(
            eval_number("function f() { try { return 1; } finally { g = 2; } } var g = 0; f() + g"),
            3.0
        );
        assert_eq!(
            eval_string("try { undefinedName; } catch (e) { e.name + ': ' + e.message }"),
            "ReferenceError: undefinedName is not defined"
        );
    }

    #[test]
    fn test_this_and_constructors() {
        assert_eq!(
            eval_number(
                "function P(x) { this.x = x; } \
                 P.prototype.get = function () { return this.x; }; new P(42).get()"
            ),
            42.0
        );
        assert_eq!(
            eval_string(
                "function P() {} var p = new P(); \
                 (p instanceof P) + ',' + (p instanceof Array)"
            ),
            "true,false"
        );
    }

    #[test]
    fn test_equality() {
        assert_eq!(
            eval_string("[null == undefined, 1 == '1', 0 == false, NaN == NaN, '1' === 1].join()"),
            "true,true,true,false,false"
        );
        assert_eq!(
            eval_string("['a' < 'b', 'B' < 'a', 2 < '10', 'x' < 1].join()"),
            "true,true,true,false"
        );
    }

    #[test]
    fn test_type_errors() {
        let isolate = Isolate::new(Config::default());
        let err = isolate.run_script("t.js", "var o = {};\no.missing()").unwrap_err();
        let message = isolate.get(&err.value, "message").unwrap();
        assert_eq!(message.as_str(), Some("o.missing is not a function"));
        assert_eq!(err.site.as_ref().map(|s| s.line), Some(2));

        let err = isolate.run_script("t.js", "null.x").unwrap_err();
        let message = isolate.get(&err.value, "message").unwrap();
        assert_eq!(message.as_str(), Some("Cannot read properties of null (reading 'x')"));
    }

    #[test]
    fn test_stack_trace() {
        let isolate = Isolate::new(Config::default());
        let err = isolate
            .run_script(
                "trace.js",
                "function inner() {\n  throw new Error('boom');\n}\n\
                 function outer() { inner(); }\nouter();",
            )
            .unwrap_err();
        let stack = isolate.get(&err.value, "stack").unwrap();
        assert_eq!(
            stack.as_str(),
            Some(
                "Error: boom\n    at inner (trace.js:2)\n    at outer \
                 (trace.js:4)\n    at trace.js:5"
            )
        );
        let site = err.site.unwrap();
        assert_eq!(site.line, 2);
        assert_eq!(site.source_line, "  throw new Error('boom');");
        assert!(isolate.frames.borrow().is_empty());
    }

    #[test]
    fn test_syntax_error_site() {
        let isolate = Isolate::new(Config::default());
        let err = isolate.run_script("bad.js", "var a = 1;\nvar = 2;").unwrap_err();
        assert_eq!(isolate.class_of(err.value.as_object().unwrap()), ClassId::SyntaxError);
        let site = err.site.unwrap();
        assert_eq!((site.line, site.source_line.as_str()), (2, "var = 2;"));
    }

    #[test]
    fn test_call_depth_exceeded() {
        let isolate = Isolate::new(Config {
            max_call_depth: 32,
            ..Config::default()
        });
        let err = isolate.run_script("deep.js", "function f() { return f(); } f()").unwrap_err();
        let message = isolate.get(&err.value, "message").unwrap();
        assert_eq!(message.as_str(), Some("Maximum call stack size exceeded"));
        assert_eq!(isolate.call_depth(), 0);
    }

    #[test]
    fn test_default_call_depth_fits_small_stack() {
        let messages = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                let isolate = Isolate::new(Config::default());
                let scripts = [
                    "var f = function () { return f(); }; f()",
                    "function g(n) { return 1 + g(n + 1) * 2; } g(0)",
                    "function h() { try { return [h()]; } finally { } } h()",
                ];
                scripts
                    .iter()
                    .map(|script| {
                        let err = isolate.run_script("deep.js", script).unwrap_err();
                        let message = isolate.get(&err.value, "message").unwrap();
                        message.as_str().map(str::to_string)
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap()
            .join()
            .unwrap();
        for message in messages {
            assert_eq!(message.as_deref(), Some("Maximum call stack size exceeded"));
        }
    }

    #[test]
    fn test_expression_lines() {
        let isolate = Isolate::new(Config::default());
        let err = isolate
            .run_script("lines.js", "var o = {\n  a: 1,\n  b: undefinedThing\n};")
            .unwrap_err();
        let message = isolate.get(&err.value, "message").unwrap();
        assert_eq!(message.as_str(), Some("undefinedThing is not defined"));
        let site = err.site.unwrap();
        assert_eq!(site.line, 3);
        assert_eq!(site.source_line, "  b: undefinedThing");

        let err = isolate
            .run_script("chain.js", "var p = {};\nvar q = p\n  .missing\n  .deeper;")
            .unwrap_err();
        assert_eq!(err.site.map(|s| s.line), Some(4));

        let err = isolate
            .run_script("args.js", "var none;\nnone(1,\n  2);")
            .unwrap_err();
        let message = isolate.get(&err.value, "message").unwrap();
        assert_eq!(message.as_str(), Some("none is not a function"));
        assert_eq!(err.site.map(|s| s.line), Some(2));

        let err = isolate
            .run_script("throw.js", "throw {\n  reason: p\n};")
            .unwrap_err();
        assert_eq!(err.site.map(|s| s.line), Some(1));
    }

    #[test]
    fn test_nesting_depth() {
        let isolate = Isolate::new(Config::default());
        let deep = format!("{}1{}", "[".repeat(100_000), "]".repeat(100_000));
        let err = isolate.run_script("deep.js", &deep).unwrap_err();
        assert_eq!(isolate.class_of(err.value.as_object().unwrap()), ClassId::SyntaxError);
        let message = isolate.get(&err.value, "message").unwrap();
        assert_eq!(message.as_str(), Some("too much recursion"));

        let nested = format!("{}7{}", "[".repeat(200), "]".repeat(200));
        let unwrap = ".pop()".repeat(200);
        assert_eq!(eval(&isolate, &format!("{}{}", nested, unwrap)).as_number(), Some(7.0));
    }

    #[test]
    fn test_completion_value() {
        let isolate = Isolate::new(Config::default());
        assert!(eval(&isolate, "var x = 5;").is_undefined());
        assert_eq!(eval(&isolate, "x * 2; if (x) { x + 1 }").as_number(), Some(6.0));
        assert_eq!(eval(&isolate, "x").as_number(), Some(5.0));
    }
}
