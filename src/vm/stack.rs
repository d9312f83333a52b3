//! Call stack for the interpreter
//!
//! One frame per script function activation plus one for each running
//! script. Frames only carry what stack traces need: the function name,
//! the source and the line currently executing.

use std::rc::Rc;

use crate::parser::Source;

#[derive(Debug, Clone)]
pub struct Frame {
    /// Empty for anonymous functions
    pub name: Rc<str>,
    pub source: Rc<Source>,
    /// Line of the statement being executed
    pub line: u32,
    /// Top-level script code
    pub is_program: bool,
}

impl Frame {
    fn write_trace_line(&self, out: &mut String) {
        out.push_str("    at ");
        if self.is_program {
            out.push_str(&format!("{}:{}", self.source.name, self.line));
        } else {
            let name = if self.name.is_empty() { "<anonymous>" } else { &self.name };
            out.push_str(&format!("{} ({}:{})", name, self.source.name, self.line));
        }
    }
}

/// Active script frames
#[derive(Debug, Default)]
pub struct CallStack {
    frames: Vec<Frame>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    #[inline]
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Get the current stack depth
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Record the line the innermost frame is executing
    #[inline]
    pub fn set_line(&mut self, line: u32) {
        if let Some(frame) = self.frames.last_mut() {
            frame.line = line;
        }
    }

    /// V8-style trace, innermost frame first
    pub fn trace(&self) -> String {
        let mut out = String::new();
        for (i, frame) in self.frames.iter().rev().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            frame.write_trace_line(&mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(name: &str, source: &Rc<Source>, line: u32, is_program: bool) -> Frame {
        Frame {
            name: Rc::from(name),
            source: Rc::clone(source),
            line,
            is_program,
        }
    }

    #[test]
    fn test_trace_format() {
        let source = Source::new("main.js", "");
        let mut stack = CallStack::new();
        stack.push(frame("", &source, 9, true));
        stack.push(frame("outer", &source, 5, false));
        stack.push(frame("", &source, 2, false));

        assert_eq!(
            stack.trace(),
            "    at <anonymous> (main.js:2)\n    at outer (main.js:5)\n    at main.js:9"
        );
    }

    #[test]
    fn test_set_line_updates_innermost() {
        let source = Source::new("a.js", "");
        let mut stack = CallStack::new();
        stack.set_line(4); // no frames: ignored
        stack.push(frame("f", &source, 1, false));
        stack.set_line(7);

        assert_eq!(stack.top().map(|f| f.line), Some(7));
        assert_eq!(stack.len(), 1);
        assert!(stack.pop().is_some());
        assert!(stack.is_empty());
    }
}
