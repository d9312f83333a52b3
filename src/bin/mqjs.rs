//! mqjs - script runner and interactive shell
//!
//! ```text
//! mqjs [--gc-threshold N] [--max-depth N] [-i] [file.js ...]
//! ```
//!
//! Files run in order; without files (or with `-i`) an interactive loop
//! follows. Set `RUST_LOG` for engine diagnostics.

use std::process;
use std::sync::Arc;

use mquickjs_simple::{
    Arguments, Callback, CallbackResult, Config, Context, ContextOptions, EngineContext, Error,
    RuntimeError, ScriptException, ScriptExceptionHandler, Value,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

const HISTORY_FILE: &str = ".mqjs_history";

struct Options {
    config: Config,
    interactive: bool,
    files: Vec<String>,
}

fn usage() -> ! {
    eprintln!("usage: mqjs [--gc-threshold N] [--max-depth N] [-i] [file.js ...]");
    process::exit(2);
}

fn parse_args() -> Options {
    let mut options = Options {
        config: Config::default(),
        interactive: false,
        files: Vec::new(),
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--gc-threshold" => options.config.gc_threshold = number(args.next()),
            "--max-depth" => options.config.max_call_depth = number(args.next()),
            "-i" | "--interactive" => options.interactive = true,
            "-h" | "--help" => usage(),
            _ if arg.starts_with('-') => usage(),
            _ => options.files.push(arg),
        }
    }
    options
}

fn number(arg: Option<String>) -> usize {
    arg.and_then(|n| n.parse().ok()).unwrap_or_else(|| usage())
}

fn print_exception(exception: ScriptException) {
    eprintln!("{}", exception);
    if !exception.source_line().is_empty() {
        eprintln!("    {}", exception.source_line().trim());
    }
    if !exception.stack_trace().is_empty() {
        eprintln!("{}", exception.stack_trace());
    }
}

/// Script `String(value)`, falling back to the host's view of it
fn display(context: &Context, value: Option<Value>) -> String {
    let Some(value) = value else {
        return "undefined".into();
    };
    if let Some(s) = value.as_string() {
        return s.to_str_lossy().into_owned();
    }
    let converted = context
        .global_object()
        .and_then(|global| global.get(context, "String"))
        .and_then(|string| string.as_function().cloned())
        .and_then(|string| string.call(context, &[Some(value.clone())]));
    match converted.as_ref().and_then(Value::as_string) {
        Some(s) => s.to_str_lossy().into_owned(),
        None => format!("{:?}", value),
    }
}

fn print(context: &Context, args: &mut Arguments) -> CallbackResult {
    let line = (0..args.len())
        .map(|i| display(context, args.take(i)))
        .collect::<Vec<_>>()
        .join(" ");
    println!("{}", line);
    Ok(None)
}

fn install_globals(context: &Context) -> Result<(), Error> {
    let print: Arc<dyn Callback> = Arc::new(print);
    let print = Value::Function(context.try_create_function(print)?);
    let global = context.try_global_object()?;
    global.try_set(context, "print", Some(&print))?;

    let console = context
        .try_evaluate("(console)", "({})")?
        .and_then(|v| v.as_object())
        .ok_or_else(|| Error::from(RuntimeError::Fatal("console is not an object".into())))?;
    console.try_set(context, "log", Some(&print))?;
    global.try_set(context, "console", Some(&Value::Object(console)))
}

fn run_file(context: &Context, path: &str) -> bool {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("mqjs: cannot read {}: {}", path, e);
            return false;
        }
    };
    match context.try_evaluate(path, &source) {
        Ok(_) => true,
        Err(e) => {
            context.report_error(e);
            false
        }
    }
}

fn command(context: &Context, line: &str) -> bool {
    match line {
        ".exit" => return false,
        ".gc" => match context.collect_garbage() {
            Some(stats) => {
                println!("freed {} objects, ran {} finalizers", stats.freed, stats.finalizers)
            }
            None => println!("collection deferred"),
        },
        ".stats" => {
            let stats = context.memory_stats();
            println!("live objects: {}", stats.live_objects);
            println!("persistent handles: {}", stats.persistent_handles);
            println!("weak handles: {}", stats.weak_handles);
            println!("local handles: {}", stats.local_handles);
            println!("collections: {}", stats.collections);
        }
        _ => println!("unknown command {} (try .gc, .stats or .exit)", line),
    }
    true
}

fn repl(context: &Context) -> rustyline::Result<()> {
    let mut editor = DefaultEditor::new()?;
    let history = std::env::var("HOME")
        .map(|home| std::path::Path::new(&home).join(HISTORY_FILE))
        .unwrap_or_else(|_| HISTORY_FILE.into());
    let _ = editor.load_history(&history);
    println!("{}", Context::version());

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);
                if line.starts_with('.') {
                    if !command(context, line) {
                        break;
                    }
                    continue;
                }
                match context.try_evaluate("<repl>", line) {
                    Ok(value) => println!("{}", display(context, value)),
                    Err(e) => context.report_error(e),
                }
                context.process_debug_messages();
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e),
        }
    }

    let _ = editor.save_history(&history);
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let options = parse_args();

    let handler: Arc<dyn ScriptExceptionHandler> = Arc::new(print_exception);
    let context = match EngineContext::with_options(ContextOptions {
        config: options.config,
        script_exception_handler: Some(handler),
        runtime_exception_handler: Some(Arc::new(|message: &str| eprintln!("mqjs: {}", message))),
    }) {
        Ok(context) => context,
        Err(e) => {
            eprintln!("mqjs: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = install_globals(&context) {
        eprintln!("mqjs: {}", e);
        process::exit(1);
    }

    let mut ok = true;
    for file in &options.files {
        ok &= run_file(&context, file);
    }

    if options.files.is_empty() || options.interactive {
        if let Err(e) = repl(&context) {
            eprintln!("mqjs: {}", e);
            process::exit(1);
        }
    }
    if !ok {
        process::exit(1);
    }
}
