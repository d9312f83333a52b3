//! Syntax tree
//!
//! Statements carry the 1-based line they start on. That line is what the
//! interpreter reports for exceptions and stack frames.

use std::rc::Rc;

/// A named source text with a line index
pub struct Source {
    pub name: Rc<str>,
    pub text: Rc<str>,
    /// Byte offset of the start of each line
    line_starts: Vec<usize>,
}

impl Source {
    pub fn new(name: &str, text: &str) -> Rc<Self> {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Rc::new(Source {
            name: Rc::from(name),
            text: Rc::from(text),
            line_starts,
        })
    }

    /// Text of a 1-based line, without its terminator
    pub fn line(&self, line: usize) -> &str {
        let Some(&start) = line.checked_sub(1).and_then(|i| self.line_starts.get(i)) else {
            return "";
        };
        let end = self
            .line_starts
            .get(line)
            .map(|&next| next - 1)
            .unwrap_or(self.text.len());
        self.text[start..end].trim_end_matches('\r')
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Source({})", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    TypeOf,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    In,
    InstanceOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Expressions that can fail at run time carry the line they start on
#[derive(Debug)]
pub enum Expr {
    Number(f64),
    String(Rc<str>),
    Bool(bool),
    Null,
    Ident(Rc<str>, u32),
    This,
    /// `None` entries are holes
    Array(Vec<Option<Expr>>),
    Object(Vec<(Rc<str>, Expr)>),
    Function(Rc<FunctionNode>),
    RegExp { pattern: Rc<str>, flags: Rc<str> },
    Unary(UnaryOp, Box<Expr>),
    Update {
        increment: bool,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    /// `op` is set for compound assignment
    Assign {
        op: Option<BinaryOp>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Member(Box<Expr>, Rc<str>, u32),
    Index(Box<Expr>, Box<Expr>, u32),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        line: u32,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Expr>,
        line: u32,
    },
    Sequence(Vec<Expr>),
}

#[derive(Debug)]
pub struct SwitchCase {
    /// `None` for `default`
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub struct Stmt {
    pub line: u32,
    pub kind: StmtKind,
}

#[derive(Debug)]
pub enum StmtKind {
    Empty,
    Expr(Expr),
    Var(Vec<(Rc<str>, Option<Expr>)>),
    /// Hoisted; nothing happens when it is reached
    FunctionDecl,
    Block(Vec<Stmt>),
    If {
        test: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While { test: Expr, body: Box<Stmt> },
    DoWhile { body: Box<Stmt>, test: Expr },
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForIn {
        target: Expr,
        object: Expr,
        body: Box<Stmt>,
    },
    ForOf {
        target: Expr,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    Throw(Expr),
    Try {
        block: Vec<Stmt>,
        param: Option<Rc<str>>,
        handler: Option<Vec<Stmt>>,
        finalizer: Option<Vec<Stmt>>,
    },
    Switch {
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    Debugger,
}

/// A parsed function body, or a whole program
pub struct FunctionNode {
    pub name: Option<Rc<str>>,
    pub params: Vec<Rc<str>>,
    pub body: Vec<Stmt>,
    /// Hoisted `var` names, in declaration order
    pub vars: Vec<Rc<str>>,
    /// Hoisted function declarations
    pub functions: Vec<Rc<FunctionNode>>,
    pub uses_arguments: bool,
    pub source: Rc<Source>,
    pub line: u32,
    /// Byte range of the function text in `source`
    pub span: (usize, usize),
    pub is_program: bool,
}

impl FunctionNode {
    pub fn text(&self) -> &str {
        self.source.text.get(self.span.0..self.span.1).unwrap_or("")
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

impl std::fmt::Debug for FunctionNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionNode")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("statements", &self.body.len())
            .field("vars", &self.vars)
            .field("functions", &self.functions.len())
            .field("line", &self.line)
            .finish()
    }
}
