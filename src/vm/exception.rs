//! Script exceptions
//!
//! A thrown value travels up the Rust stack as `Err(Exception)`. The throw
//! site is captured once, when the exception is created, from the call
//! stack at that moment.

use std::fmt;
use std::rc::Rc;

use crate::runtime::value::JsValue;

pub type JsResult<T> = Result<T, Exception>;

/// Native error constructors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    ReferenceError,
    SyntaxError,
    RangeError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::Error,
        ErrorKind::TypeError,
        ErrorKind::ReferenceError,
        ErrorKind::SyntaxError,
        ErrorKind::RangeError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::RangeError => "RangeError",
        }
    }
}

/// Where an exception was raised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrowSite {
    pub file: Rc<str>,
    /// 1-based
    pub line: u32,
    pub source_line: String,
    /// `"    at ..."` lines, innermost first
    pub stack: String,
}

#[derive(Clone)]
pub struct Exception {
    pub value: JsValue,
    pub site: Option<Rc<ThrowSite>>,
}

impl Exception {
    pub fn new(value: JsValue, site: Option<Rc<ThrowSite>>) -> Self {
        Exception { value, site }
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.site {
            Some(site) => write!(f, "Exception({:?} at {}:{})", self.value, site.file, site.line),
            None => write!(f, "Exception({:?})", self.value),
        }
    }
}
