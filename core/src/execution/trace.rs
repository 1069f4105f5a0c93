//! Execution tracing
//!
//! A `Tracer` observes a run without influencing it. `PrintTracer` writes
//! the indented text format used by the debug command; `RecordingTracer`
//! keeps events in memory.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

use serde::Serialize;

use super::function::FunctionId;

pub trait Tracer {
    /// A command line entered execution
    fn on_command(&mut self, depth: usize, command: &str);

    /// A leaf command completed; failures report 0
    fn on_return(&mut self, depth: usize, command: &str, result: i32);

    /// A function is about to run `commands` lines
    fn on_call(&mut self, depth: usize, function: &FunctionId, commands: usize);

    fn on_error(&mut self, message: &str);
}

impl<T: Tracer + ?Sized> Tracer for Rc<RefCell<T>> {
    fn on_command(&mut self, depth: usize, command: &str) {
        self.borrow_mut().on_command(depth, command);
    }

    fn on_return(&mut self, depth: usize, command: &str, result: i32) {
        self.borrow_mut().on_return(depth, command, result);
    }

    fn on_call(&mut self, depth: usize, function: &FunctionId, commands: usize) {
        self.borrow_mut().on_call(depth, function, commands);
    }

    fn on_error(&mut self, message: &str) {
        self.borrow_mut().on_error(message);
    }
}

/* ===================== Text Output ===================== */

const INDENT: &str = "    ";

/// Writes one line per event, indented by call depth
///
/// ```text
///     [F] demo:main size=2
///         [C] say hello -> 1
///         [C] function demo:inner
///         [F] demo:inner size=1
///             [C] return 7
/// ```
///
/// The first I/O error is kept and returned from `finish`; later events
/// are dropped.
pub struct PrintTracer<W: Write> {
    output: W,
    last_indent: usize,
    waiting_for_result: bool,
    error: Option<io::Error>,
}

impl<W: Write> PrintTracer<W> {
    pub fn new(output: W) -> Self {
        PrintTracer {
            output,
            last_indent: 0,
            waiting_for_result: false,
            error: None,
        }
    }

    fn write(&mut self, args: fmt::Arguments<'_>) {
        if self.error.is_none() {
            if let Err(error) = self.output.write_fmt(args) {
                self.error = Some(error);
            }
        }
    }

    fn print_indent(&mut self, indent: usize) {
        for _ in 0..=indent {
            self.write(format_args!("{INDENT}"));
        }
    }

    fn indent_and_save(&mut self, indent: usize) {
        self.print_indent(indent);
        self.last_indent = indent;
    }

    fn new_line(&mut self) {
        if self.waiting_for_result {
            self.write(format_args!("\n"));
            self.waiting_for_result = false;
        }
    }

    /// Output sent by a command while tracing
    pub fn message(&mut self, text: &str) {
        self.new_line();
        self.print_indent(self.last_indent + 1);
        self.write(format_args!("[M] {text}\n"));
    }

    /// A bare line, such as the name of a traced function
    pub fn heading(&mut self, text: &str) {
        self.new_line();
        self.write(format_args!("{text}\n"));
    }

    /// Flush buffered output, surfacing the first write error
    pub fn flush(&mut self) -> io::Result<()> {
        self.new_line();
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        self.output.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.output
    }

    /// Flush and hand back the writer
    pub fn finish(mut self) -> io::Result<W> {
        self.flush()?;
        Ok(self.output)
    }
}

impl<W: Write> Tracer for PrintTracer<W> {
    fn on_command(&mut self, depth: usize, command: &str) {
        self.new_line();
        self.indent_and_save(depth);
        self.write(format_args!("[C] {command}"));
        self.waiting_for_result = true;
    }

    fn on_return(&mut self, depth: usize, command: &str, result: i32) {
        if self.waiting_for_result {
            self.write(format_args!(" -> {result}\n"));
            self.waiting_for_result = false;
        } else {
            self.indent_and_save(depth);
            self.write(format_args!("[R = {result}] {command}\n"));
        }
    }

    fn on_call(&mut self, depth: usize, function: &FunctionId, commands: usize) {
        self.new_line();
        self.indent_and_save(depth);
        self.write(format_args!("[F] {function} size={commands}\n"));
    }

    fn on_error(&mut self, message: &str) {
        self.new_line();
        self.indent_and_save(self.last_indent + 1);
        self.write(format_args!("[E] {message}\n"));
    }
}

/* ===================== Recording ===================== */

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "t")]
pub enum TraceEvent {
    Command { depth: usize, command: String },
    Return { depth: usize, command: String, result: i32 },
    Call { depth: usize, function: String, commands: usize },
    Error { message: String },
}

#[derive(Debug, Default)]
pub struct RecordingTracer {
    pub events: Vec<TraceEvent>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tracer for RecordingTracer {
    fn on_command(&mut self, depth: usize, command: &str) {
        self.events.push(TraceEvent::Command {
            depth,
            command: command.to_string(),
        });
    }

    fn on_return(&mut self, depth: usize, command: &str, result: i32) {
        self.events.push(TraceEvent::Return {
            depth,
            command: command.to_string(),
            result,
        });
    }

    fn on_call(&mut self, depth: usize, function: &FunctionId, commands: usize) {
        self.events.push(TraceEvent::Call {
            depth,
            function: function.to_string(),
            commands,
        });
    }

    fn on_error(&mut self, message: &str) {
        self.events.push(TraceEvent::Error {
            message: message.to_string(),
        });
    }
}
