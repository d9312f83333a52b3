//! Script exception diagnostics
//!
//! A script failure never leaves the boundary as an engine exception. The
//! execution scope that trapped it turns it into a `ScriptException`: the
//! thrown value re-wrapped for the host, plus message, location and stack
//! text. Missing details become empty strings (or line `-1`); building the
//! diagnostic never throws.

use std::fmt;

use crate::runtime::value::JsValue;
use crate::scope::ExecutionScope;
use crate::value::Value;
use crate::vm::Exception;

/// A trapped script failure
pub struct ScriptException {
    exception: Option<Value>,
    message: String,
    file_name: String,
    line_number: i32,
    stack_trace: String,
    source_line: String,
}

impl ScriptException {
    /// The thrown value; ownership moves to the first caller
    pub fn take_exception(&mut self) -> Option<Value> {
        self.exception.take()
    }

    /// `ToString` of the thrown value, e.g. `"Error: boom"`
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// 1-based, or `-1` when unknown
    pub fn line_number(&self) -> i32 {
        self.line_number
    }

    pub fn stack_trace(&self) -> &str {
        &self.stack_trace
    }

    pub fn source_line(&self) -> &str {
        &self.source_line
    }
}

impl fmt::Debug for ScriptException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptException")
            .field("message", &self.message)
            .field("file_name", &self.file_name)
            .field("line_number", &self.line_number)
            .finish()
    }
}

impl fmt::Display for ScriptException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line_number > 0 {
            write!(f, "{}:{}: {}", self.file_name, self.line_number, self.message)
        } else {
            f.write_str(&self.message)
        }
    }
}

impl std::error::Error for ScriptException {}

impl ExecutionScope<'_> {
    /// Build the diagnostic for a trapped exception
    pub(crate) fn translate(&self, exception: Exception) -> ScriptException {
        let isolate = self.isolate();
        let value = exception.value;
        self.local(&value);

        let message = match isolate.to_string(&value) {
            Ok(s) => s.to_string(),
            // toString itself threw
            Err(_) => isolate.display_string(&value),
        };

        let stack_property = match &value {
            JsValue::Object(r) => match isolate.get_property(*r, "stack") {
                JsValue::String(s) => Some(s.to_string()),
                _ => None,
            },
            _ => None,
        };

        let (file_name, line_number, source_line, site_stack) = match &exception.site {
            Some(site) => (
                site.file.to_string(),
                i32::try_from(site.line).unwrap_or(-1),
                site.source_line.clone(),
                format!("{}\n{}", message, site.stack),
            ),
            None => (String::new(), -1, String::new(), String::new()),
        };

        let wrapped = match self.wrap(value) {
            Ok(wrapped) => wrapped,
            Err(e) => {
                log::debug!("thrown value not representable: {}", e);
                None
            }
        };

        ScriptException {
            exception: wrapped,
            message,
            file_name,
            line_number,
            stack_trace: stack_property.unwrap_or(site_stack),
            source_line,
        }
    }
}
