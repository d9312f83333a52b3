//! Boundary errors
//!
//! Every public operation returns `Result<T, Error>` from its `try_` form.
//! A script failure carries a full diagnostic; a contract violation only
//! names what the host did wrong.

use std::fmt;

use crate::exception::ScriptException;
use crate::value::ValueType;

/// Misuse of the boundary layer
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// An engine context is already live in this process
    ContextAlreadyExists,
    /// A native value of a kind the boundary cannot represent
    UnhandledType(&'static str),
    /// A required argument was absent
    NullArgument(&'static str),
    /// Method call on a property that is not a function
    NotAFunction(String),
    /// A wrapper created by a different engine context
    ForeignValue,
    InvalidCast { expected: ValueType, found: ValueType },
    /// String longer than `Config::max_string_length`
    StringTooLong(usize),
    /// A value handle released twice, or never issued
    DoubleRelease,
    /// The engine could not be initialised; the context is unusable
    Fatal(String),
}

/// Stable numbering of `RuntimeError` for the C ABI
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorCode {
    Ok = 0,
    ContextAlreadyExists = 1,
    UnhandledType = 2,
    NullArgument = 3,
    NotAFunction = 4,
    ForeignValue = 5,
    InvalidCast = 6,
    StringTooLong = 7,
    DoubleRelease = 8,
    Fatal = 9,
    /// A script exception was raised instead
    ScriptException = 10,
}

impl RuntimeError {
    pub fn code(&self) -> RuntimeErrorCode {
        match self {
            RuntimeError::ContextAlreadyExists => RuntimeErrorCode::ContextAlreadyExists,
            RuntimeError::UnhandledType(_) => RuntimeErrorCode::UnhandledType,
            RuntimeError::NullArgument(_) => RuntimeErrorCode::NullArgument,
            RuntimeError::NotAFunction(_) => RuntimeErrorCode::NotAFunction,
            RuntimeError::ForeignValue => RuntimeErrorCode::ForeignValue,
            RuntimeError::InvalidCast { .. } => RuntimeErrorCode::InvalidCast,
            RuntimeError::StringTooLong(_) => RuntimeErrorCode::StringTooLong,
            RuntimeError::DoubleRelease => RuntimeErrorCode::DoubleRelease,
            RuntimeError::Fatal(_) => RuntimeErrorCode::Fatal,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::ContextAlreadyExists => {
                write!(f, "An engine context already exists in this process")
            }
            RuntimeError::UnhandledType(kind) => write!(f, "Unhandled type: {}", kind),
            RuntimeError::NullArgument(name) => write!(f, "Argument '{}' must not be null", name),
            RuntimeError::NotAFunction(name) => write!(f, "Property '{}' is not a function", name),
            RuntimeError::ForeignValue => write!(f, "Value belongs to another engine context"),
            RuntimeError::InvalidCast { expected, found } => {
                write!(f, "Cannot read {:?} value as {:?}", found, expected)
            }
            RuntimeError::StringTooLong(len) => write!(f, "String of {} bytes is too long", len),
            RuntimeError::DoubleRelease => write!(f, "Value released twice"),
            RuntimeError::Fatal(msg) => write!(f, "Fatal engine error: {}", msg),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Tagged result of every `try_` operation
#[derive(Debug)]
pub enum Error {
    Script(ScriptException),
    Runtime(RuntimeError),
}

impl Error {
    pub fn code(&self) -> RuntimeErrorCode {
        match self {
            Error::Script(_) => RuntimeErrorCode::ScriptException,
            Error::Runtime(e) => e.code(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Script(e) => write!(f, "{}", e),
            Error::Runtime(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Script(e) => Some(e),
            Error::Runtime(e) => Some(e),
        }
    }
}

impl From<ScriptException> for Error {
    fn from(e: ScriptException) -> Self {
        Error::Script(e)
    }
}

impl From<RuntimeError> for Error {
    fn from(e: RuntimeError) -> Self {
        Error::Runtime(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            RuntimeError::NotAFunction("frob".into()).to_string(),
            "Property 'frob' is not a function"
        );
        let cast = RuntimeError::InvalidCast {
            expected: ValueType::Int,
            found: ValueType::String,
        };
        assert_eq!(cast.to_string(), "Cannot read String value as Int");
        assert_eq!(cast.code(), RuntimeErrorCode::InvalidCast);
    }

    #[test]
    fn test_codes() {
        assert_eq!(RuntimeErrorCode::Ok as i32, 0);
        assert_eq!(
            Error::from(RuntimeError::DoubleRelease).code(),
            RuntimeErrorCode::DoubleRelease
        );
        assert_eq!(RuntimeError::ContextAlreadyExists.code() as i32, 1);
    }
}
