//! Test helpers for engine tests
//!
//! `TestSource` shares its log and error list across every source derived
//! from it, so a test can inspect what all branches did.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value as JsonValue;

use crate::execution::{
    queue_functions, ChainBuilder, ChainModifiers, CommandError, CommandFunction, ContextChain,
    CustomExecutor, CustomModifier, ExecutionContext, ExecutionControl, ExecutionLimits,
    ExecutionSource, FunctionId, FunctionRef, FunctionResolver, InstantiatedFunction,
    InstantiationError, PlainFunction, ResultCallback, schedule_function_conditions,
};

#[derive(Clone)]
pub struct TestSource {
    pub name: String,
    pub log: Rc<RefCell<Vec<String>>>,
    pub errors: Rc<RefCell<Vec<(String, String, bool)>>>,
    pub reports: Rc<RefCell<Vec<(String, bool, i32)>>>,
    callback: ResultCallback,
    silent: bool,
}

impl TestSource {
    pub fn new(name: &str) -> Self {
        TestSource {
            name: name.to_string(),
            log: Rc::new(RefCell::new(Vec::new())),
            errors: Rc::new(RefCell::new(Vec::new())),
            reports: Rc::new(RefCell::new(Vec::new())),
            callback: ResultCallback::empty(),
            silent: true,
        }
    }

    /// A sibling source with another name, sharing all recorders
    pub fn named(&self, name: &str) -> Self {
        TestSource {
            name: name.to_string(),
            ..self.clone()
        }
    }

    pub fn loud(&self) -> Self {
        TestSource {
            silent: false,
            ..self.clone()
        }
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.log.borrow_mut().push(entry.into());
    }

    pub fn logged(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn error_count(&self) -> usize {
        self.errors.borrow().len()
    }
}

impl ExecutionSource for TestSource {
    fn callback(&self) -> ResultCallback {
        self.callback.clone()
    }

    fn with_callback(&self, callback: ResultCallback) -> Self {
        TestSource {
            callback,
            ..self.clone()
        }
    }

    fn is_silent(&self) -> bool {
        self.silent
    }

    fn handle_error(&self, error: &CommandError, forked: bool) {
        self.errors
            .borrow_mut()
            .push((self.name.clone(), error.to_string(), forked));
    }

    fn report_function_result(&self, id: &str, success: bool, result: i32) {
        self.reports.borrow_mut().push((id.to_string(), success, result));
    }
}

/* ===================== Results ===================== */

pub type Results = Rc<RefCell<Vec<(bool, i32)>>>;

/// A callback that records every result it sees
pub fn recorder() -> (ResultCallback, Results) {
    let results: Results = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&results);
    let callback = ResultCallback::new(move |success, result| sink.borrow_mut().push((success, result)));
    (callback, results)
}

pub fn context() -> ExecutionContext<TestSource> {
    ExecutionContext::new(ExecutionLimits::default())
}

pub fn id(text: &str) -> FunctionId {
    FunctionId::parse(text).unwrap()
}

/* ===================== Chains ===================== */

/// A leaf that logs `label@source` and returns `value`
pub fn log_line(label: &str, value: i32) -> ContextChain<TestSource> {
    let label = label.to_string();
    ChainBuilder::new(format!("log {label}")).executes(move |s: &TestSource| {
        s.push(format!("{label}@{}", s.name));
        Ok(value)
    })
}

pub fn fail_line(message: &str) -> ContextChain<TestSource> {
    let message = message.to_string();
    ChainBuilder::new("fail").executes(move |_: &TestSource| Err(CommandError::failed(message.clone())))
}

pub fn return_line(value: i32) -> ContextChain<TestSource> {
    ChainBuilder::new(format!("return {value}")).custom(ReturnValue(value))
}

pub fn call_line(functions: Vec<FunctionRef<TestSource>>) -> ContextChain<TestSource> {
    ChainBuilder::new("function").custom(CallFunctions::new(functions))
}

pub fn return_call_line(functions: Vec<FunctionRef<TestSource>>) -> ContextChain<TestSource> {
    ChainBuilder::new("return run function")
        .return_run()
        .custom(CallFunctions::new(functions))
}

pub fn function(text: &str, lines: Vec<ContextChain<TestSource>>) -> FunctionRef<TestSource> {
    Rc::new(PlainFunction::new(id(text), lines))
}

pub fn instantiate(function: &FunctionRef<TestSource>) -> InstantiatedFunction<TestSource> {
    function.instantiate(None).unwrap()
}

/* ===================== Executors ===================== */

pub struct ReturnValue(pub i32);

impl CustomExecutor<TestSource> for ReturnValue {
    fn run(
        &self,
        _source: &TestSource,
        _chain: &ContextChain<TestSource>,
        _modifiers: ChainModifiers,
        control: &mut ExecutionControl<'_, TestSource>,
    ) -> Result<(), CommandError> {
        control.return_success(self.0);
        Ok(())
    }
}

pub struct CallFunctions {
    functions: Vec<FunctionRef<TestSource>>,
    arguments: Option<JsonValue>,
}

impl CallFunctions {
    pub fn new(functions: Vec<FunctionRef<TestSource>>) -> Self {
        CallFunctions {
            functions,
            arguments: None,
        }
    }

    pub fn with_arguments(functions: Vec<FunctionRef<TestSource>>, arguments: JsonValue) -> Self {
        CallFunctions {
            functions,
            arguments: Some(arguments),
        }
    }
}

impl CustomExecutor<TestSource> for CallFunctions {
    fn run(
        &self,
        source: &TestSource,
        _chain: &ContextChain<TestSource>,
        modifiers: ChainModifiers,
        control: &mut ExecutionControl<'_, TestSource>,
    ) -> Result<(), CommandError> {
        queue_functions(&self.functions, self.arguments.as_ref(), source, source, modifiers, control)
    }
}

/// `if function` / `unless function` over a fixed function list
pub struct FunctionCondition {
    pub functions: Vec<FunctionRef<TestSource>>,
    pub predicate: fn(i32) -> bool,
}

impl CustomModifier<TestSource> for FunctionCondition {
    fn apply(
        &self,
        original: &TestSource,
        sources: Vec<TestSource>,
        chain: &ContextChain<TestSource>,
        modifiers: ChainModifiers,
        control: &mut ExecutionControl<'_, TestSource>,
    ) -> Result<(), CommandError> {
        schedule_function_conditions(
            original,
            sources,
            chain,
            modifiers,
            &self.functions,
            |s: &TestSource| s.clone(),
            self.predicate,
            control,
        )
    }
}

/* ===================== Deep Calls ===================== */

/// Function `deep/N` calls `deep/N+1` until `max`, which returns `max`
///
/// Bodies are built on instantiation so no chain of `Rc`s links the levels.
pub struct DeepFunction {
    id: FunctionId,
    level: usize,
    max: usize,
}

impl DeepFunction {
    pub fn new(level: usize, max: usize) -> Self {
        DeepFunction {
            id: FunctionId::new("test", format!("deep/{level}")).unwrap(),
            level,
            max,
        }
    }
}

impl CommandFunction<TestSource> for DeepFunction {
    fn id(&self) -> &FunctionId {
        &self.id
    }

    fn instantiate(&self, _arguments: Option<&JsonValue>) -> Result<InstantiatedFunction<TestSource>, InstantiationError> {
        let line = if self.level == self.max {
            let value = self.max as i32;
            ChainBuilder::new("bottom").executes(move |_: &TestSource| Ok(value))
        } else {
            let next: FunctionRef<TestSource> = Rc::new(DeepFunction::new(self.level + 1, self.max));
            call_line(vec![next])
        };
        Ok(InstantiatedFunction::new(self.id.clone(), vec![line]))
    }
}

/* ===================== Resolver ===================== */

#[derive(Default)]
pub struct MapResolver {
    pub functions: HashMap<FunctionId, FunctionRef<TestSource>>,
    pub tags: HashMap<FunctionId, Vec<FunctionRef<TestSource>>>,
}

impl FunctionResolver<TestSource> for MapResolver {
    fn function(&self, id: &FunctionId) -> Option<FunctionRef<TestSource>> {
        self.functions.get(id).cloned()
    }

    fn tag(&self, id: &FunctionId) -> Option<Vec<FunctionRef<TestSource>>> {
        self.tags.get(id).cloned()
    }
}
