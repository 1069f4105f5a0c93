//! Functions and call-site scheduling
//!
//! A `CommandFunction` is a named list of command lines, possibly with
//! parameters. Calling it first binds arguments (`instantiate`), then
//! queues a `CallFunction` task per function. How the callee's result is
//! routed depends on the call site:
//!
//! - return-call: straight into the caller's return sink
//! - one function: into the caller's callback
//! - several functions, no consumer: each call on its own
//! - several functions with a consumer: summed, delivered once

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::callback::{ResultAccumulator, ResultCallback};
use super::chain::{ChainModifiers, ContextChain};
use super::control::ExecutionControl;
use super::error::{CommandError, InstantiationError};
use super::source::ExecutionSource;
use super::tasks::Task;

/* ===================== Identifiers ===================== */

/// `namespace:path`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FunctionId {
    namespace: String,
    path: String,
}

impl FunctionId {
    pub const DEFAULT_NAMESPACE: &'static str = "minecraft";

    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Result<Self, CommandError> {
        let namespace = namespace.into();
        let path = path.into();
        let invalid = |reason: &str| CommandError::InvalidFunctionId {
            id: format!("{namespace}:{path}"),
            reason: reason.to_string(),
        };

        if namespace.is_empty() || !namespace.chars().all(is_namespace_char) {
            return Err(invalid("namespace must match [a-z0-9_.-]+"));
        }
        if path.is_empty() || !path.chars().all(|c| is_namespace_char(c) || c == '/') {
            return Err(invalid("path must match [a-z0-9_.-/]+"));
        }
        Ok(FunctionId { namespace, path })
    }

    /// Parse `ns:path`, or `path` in the default namespace
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        match text.split_once(':') {
            Some((namespace, path)) => FunctionId::new(namespace, path),
            None => FunctionId::new(Self::DEFAULT_NAMESPACE, text),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

fn is_namespace_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '_' | '.' | '-')
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl FromStr for FunctionId {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FunctionId::parse(s)
    }
}

impl TryFrom<String> for FunctionId {
    type Error = CommandError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FunctionId::parse(&value)
    }
}

impl From<FunctionId> for String {
    fn from(id: FunctionId) -> Self {
        id.to_string()
    }
}

/* ===================== Functions ===================== */

/// A function body bound to concrete arguments
pub struct InstantiatedFunction<S: ExecutionSource> {
    id: FunctionId,
    entries: Vec<ContextChain<S>>,
}

impl<S: ExecutionSource> InstantiatedFunction<S> {
    pub fn new(id: FunctionId, entries: Vec<ContextChain<S>>) -> Self {
        InstantiatedFunction { id, entries }
    }

    pub fn id(&self) -> &FunctionId {
        &self.id
    }

    pub fn entries(&self) -> &[ContextChain<S>] {
        &self.entries
    }

    pub fn into_parts(self) -> (FunctionId, Vec<ContextChain<S>>) {
        (self.id, self.entries)
    }
}

impl<S: ExecutionSource> Clone for InstantiatedFunction<S> {
    fn clone(&self) -> Self {
        InstantiatedFunction {
            id: self.id.clone(),
            entries: self.entries.clone(),
        }
    }
}

impl<S: ExecutionSource> fmt::Debug for InstantiatedFunction<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstantiatedFunction")
            .field("id", &self.id)
            .field("entries", &self.entries.len())
            .finish()
    }
}

pub trait CommandFunction<S: ExecutionSource> {
    fn id(&self) -> &FunctionId;

    /// Bind `arguments` (a JSON object, when present) to the body
    fn instantiate(&self, arguments: Option<&JsonValue>) -> Result<InstantiatedFunction<S>, InstantiationError>;
}

pub type FunctionRef<S> = Rc<dyn CommandFunction<S>>;

/// A function without parameters
pub struct PlainFunction<S: ExecutionSource> {
    id: FunctionId,
    entries: Vec<ContextChain<S>>,
}

impl<S: ExecutionSource> PlainFunction<S> {
    pub fn new(id: FunctionId, entries: Vec<ContextChain<S>>) -> Self {
        PlainFunction { id, entries }
    }
}

impl<S: ExecutionSource> CommandFunction<S> for PlainFunction<S> {
    fn id(&self) -> &FunctionId {
        &self.id
    }

    fn instantiate(&self, arguments: Option<&JsonValue>) -> Result<InstantiatedFunction<S>, InstantiationError> {
        check_compound(arguments)?;
        Ok(InstantiatedFunction::new(self.id.clone(), self.entries.clone()))
    }
}

/// Arguments, when given, must be a JSON object
pub fn check_compound(arguments: Option<&JsonValue>) -> Result<Option<&serde_json::Map<String, JsonValue>>, InstantiationError> {
    match arguments {
        None => Ok(None),
        Some(JsonValue::Object(map)) => Ok(Some(map)),
        Some(other) => Err(InstantiationError::NotCompound {
            found: json_kind(other).to_string(),
        }),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "compound",
    }
}

/* ===================== Resolution ===================== */

pub trait FunctionResolver<S: ExecutionSource> {
    fn function(&self, id: &FunctionId) -> Option<FunctionRef<S>>;

    fn tag(&self, id: &FunctionId) -> Option<Vec<FunctionRef<S>>>;
}

/// Resolve `ns:path` or `#ns:tag` to the functions it names
pub fn resolve_functions<S, R>(resolver: &R, target: &str) -> Result<Vec<FunctionRef<S>>, CommandError>
where
    S: ExecutionSource,
    R: FunctionResolver<S> + ?Sized,
{
    if let Some(tag) = target.strip_prefix('#') {
        let id = FunctionId::parse(tag)?;
        let functions = resolver
            .tag(&id)
            .ok_or_else(|| CommandError::UnknownTag { id: id.to_string() })?;
        if functions.is_empty() {
            return Err(CommandError::NoFunctions {
                target: target.to_string(),
            });
        }
        Ok(functions)
    } else {
        let id = FunctionId::parse(target)?;
        resolver
            .function(&id)
            .map(|function| vec![function])
            .ok_or_else(|| CommandError::UnknownFunction { id: id.to_string() })
    }
}

/// Bind arguments for every function, failing on the first that rejects them
pub fn instantiate_all<S: ExecutionSource>(
    functions: &[FunctionRef<S>],
    arguments: Option<&JsonValue>,
) -> Result<Vec<InstantiatedFunction<S>>, CommandError> {
    functions
        .iter()
        .map(|function| {
            function
                .instantiate(arguments)
                .map_err(|reason| CommandError::Instantiation {
                    function: function.id().to_string(),
                    reason,
                })
        })
        .collect()
}

/* ===================== Call Sites ===================== */

/// Schedule calls to `functions` from the current frame
///
/// `original` is the source the command line started from; its callback is
/// the external consumer. `source` is the source the callees run under
/// (with callbacks cleared). Every function is instantiated before anything
/// is queued, so a binding failure schedules nothing.
pub fn queue_functions<S: ExecutionSource>(
    functions: &[FunctionRef<S>],
    arguments: Option<&JsonValue>,
    original: &S,
    source: &S,
    modifiers: ChainModifiers,
    control: &mut ExecutionControl<'_, S>,
) -> Result<(), CommandError> {
    let instantiated = instantiate_all(functions, arguments)?;
    let callee_source = source.clear_callbacks();
    let consumer = original.callback();
    let frame = control.current_frame().clone();

    if modifiers.is_return() {
        let callback = ResultCallback::chain(&consumer, frame.return_value_consumer());
        for function in instantiated {
            let callback = decorate_output(original, function.id(), &callback);
            control.queue_next(Task::call_function(function, callback, true, callee_source.clone()));
        }
        // A body that never returns makes the caller fail
        control.queue_next(Task::fallthrough());
        return Ok(());
    }

    let sink = ResultCallback::chain(&consumer, &frame.result_recorder());
    if instantiated.len() == 1 || consumer.is_empty() {
        for function in instantiated {
            let callback = decorate_output(original, function.id(), &sink);
            control.queue_next(Task::call_function(function, callback, false, callee_source.clone()));
        }
    } else {
        let accumulator = ResultAccumulator::new();
        for function in instantiated {
            let callback = decorate_output(original, function.id(), &accumulator.callback());
            control.queue_next(Task::call_function(function, callback, false, callee_source.clone()));
        }
        control.queue_next(Task::deferred(move |_| accumulator.deliver(&sink)));
    }
    Ok(())
}

/// Report function results to non-silent sources
fn decorate_output<S: ExecutionSource>(original: &S, id: &FunctionId, callback: &ResultCallback) -> ResultCallback {
    if original.is_silent() {
        return callback.clone();
    }
    let source = original.clone();
    let id = id.to_string();
    let inner = callback.clone();
    ResultCallback::new(move |success, result| {
        source.report_function_result(&id, success, result);
        inner.on_result(success, result);
    })
}
