//! Debug agent
//!
//! Answers JSON debug requests and records `break` events raised by
//! `debugger` statements. Requests look like
//! `{"seq":1,"type":"request","command":"evaluate","arguments":{"expression":"1+1"}}`;
//! every response echoes the request's `seq` as `request_seq`.
//!
//! The agent only produces message text. Delivering it to a handler, and
//! queueing commands that arrive from other threads, is the host
//! context's job.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::builtins::json::{parse_text, quote};
use crate::isolate::{Isolate, VERSION};
use crate::parser::Source;
use crate::runtime::value::JsValue;

#[derive(Default)]
pub struct DebugAgent {
    enabled: Cell<bool>,
    seq: Cell<u64>,
    events: RefCell<VecDeque<String>>,
}

impl DebugAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Break events are only recorded while enabled
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
        if !enabled {
            self.events.borrow_mut().clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    fn next_seq(&self) -> u64 {
        let seq = self.seq.get() + 1;
        self.seq.set(seq);
        seq
    }

    /// A `debugger` statement was reached
    pub fn on_break(&self, source: &Source, line: u32) {
        if !self.enabled.get() {
            return;
        }
        let event = format!(
            r#"{{"seq":{},"type":"event","event":"break","body":{{"script":{},"line":{},"sourceLine":{}}}}}"#,
            self.next_seq(),
            quote(&source.name),
            line,
            quote(source.line(line as usize))
        );
        log::trace!("debug event: {}", event);
        self.events.borrow_mut().push_back(event);
    }

    /// Events recorded since the last call, oldest first
    pub fn drain_events(&self) -> Vec<String> {
        self.events.borrow_mut().drain(..).collect()
    }

    /// Answer one raw request
    ///
    /// Must be called with no script running; `evaluate` runs code.
    pub fn process_command(&self, isolate: &Isolate, raw: &str) -> String {
        let request = match parse_text(isolate, raw) {
            Ok(request @ JsValue::Object(_)) => request,
            _ => return self.response(0, "", Err("Invalid request".to_string())),
        };
        let field = |name: &str| isolate.get(&request, name).unwrap_or_default();
        let request_seq = field("seq").as_number().unwrap_or(0.0) as u64;
        let command = match field("command") {
            JsValue::String(s) => s,
            _ => return self.response(request_seq, "", Err("Missing command".to_string())),
        };
        let body = match &*command {
            "version" => Ok(format!(r#"{{"version":{}}}"#, quote(VERSION))),
            "scripts" => {
                let scripts: Vec<String> = isolate
                    .scripts()
                    .iter()
                    .map(|(name, lines)| {
                        format!(r#"{{"name":{},"lineCount":{}}}"#, quote(name), lines)
                    })
                    .collect();
                Ok(format!("[{}]", scripts.join(",")))
            }
            "evaluate" => {
                let arguments = field("arguments");
                let expression = isolate.get(&arguments, "expression").unwrap_or_default();
                match expression {
                    JsValue::String(code) => self.evaluate(isolate, &code),
                    _ => Err("Missing expression".to_string()),
                }
            }
            other => Err(format!("Unknown command: {}", other)),
        };
        self.response(request_seq, &command, body)
    }

    fn evaluate(&self, isolate: &Isolate, code: &str) -> Result<String, String> {
        match isolate.run_script("(debug)", code) {
            Ok(value) => {
                let text = isolate
                    .to_string(&value)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| isolate.display_string(&value));
                Ok(format!(
                    r#"{{"type":{},"text":{}}}"#,
                    quote(isolate.type_of(&value)),
                    quote(&text)
                ))
            }
            Err(exception) => Err(isolate
                .to_string(&exception.value)
                .map(|s| s.to_string())
                .unwrap_or_else(|_| isolate.display_string(&exception.value))),
        }
    }

    fn response(&self, request_seq: u64, command: &str, body: Result<String, String>) -> String {
        let seq = self.next_seq();
        match body {
            Ok(body) => format!(
                r#"{{"seq":{},"type":"response","request_seq":{},"command":{},"success":true,"body":{}}}"#,
                seq,
                request_seq,
                quote(command),
                body
            ),
            Err(message) => format!(
                r#"{{"seq":{},"type":"response","request_seq":{},"command":{},"success":false,"message":{}}}"#,
                seq,
                request_seq,
                quote(command),
                quote(&message)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::isolate::Isolate;

    #[test]
    fn test_version_and_unknown_commands() {
        let isolate = Isolate::new(Config::default());
        let agent = isolate.debugger();
        let response =
            agent.process_command(&isolate, r#"{"seq":7,"type":"request","command":"version"}"#);
        assert!(response.contains(r#""request_seq":7"#));
        assert!(response.contains(r#""success":true"#));
        assert!(response.contains("mquickjs-simple"));

        let response = agent
            .process_command(&isolate, r#"{"seq":8,"type":"request","command":"frobnicate"}"#);
        assert!(response.contains(r#""success":false"#));

        let response = agent.process_command(&isolate, "not json");
        assert!(response.contains("Invalid request"));
    }

    #[test]
    fn test_evaluate() {
        let isolate = Isolate::new(Config::default());
        isolate.run_script("setup.js", "var answer = 42;").unwrap();
        let response = isolate.debugger().process_command(
            &isolate,
            r#"{"seq":1,"type":"request","command":"evaluate","arguments":{"expression":"answer + 1"}}"#,
        );
        assert!(response.contains(r#""body":{"type":"number","text":"43"}"#), "{}", response);

        let response = isolate.debugger().process_command(
            &isolate,
            r#"{"seq":2,"type":"request","command":"evaluate","arguments":{"expression":"missing"}}"#,
        );
        assert!(response.contains("ReferenceError: missing is not defined"), "{}", response);
    }

    #[test]
    fn test_scripts() {
        let isolate = Isolate::new(Config::default());
        isolate.run_script("a.js", "1;\n2;").unwrap();
        let response = isolate
            .debugger()
            .process_command(&isolate, r#"{"seq":3,"type":"request","command":"scripts"}"#);
        assert!(response.contains(r#"{"name":"a.js","lineCount":2}"#), "{}", response);
    }

    #[test]
    fn test_debugger_statement_queues_break() {
        let isolate = Isolate::new(Config::default());
        isolate.run_script("quiet.js", "debugger;").unwrap();
        assert!(isolate.debugger().drain_events().is_empty());

        isolate.debugger().set_enabled(true);
        isolate.run_script("loud.js", "var x = 1;\ndebugger;").unwrap();
        let events = isolate.debugger().drain_events();
        assert_eq!(events.len(), 1);
        assert!(events[0].contains(r#""event":"break""#));
        assert!(events[0].contains(r#""script":"loud.js","line":2,"sourceLine":"debugger;""#));
    }
}
