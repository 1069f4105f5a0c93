//! Running pack functions from outside the engine

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::info;

use crate::execution::{
    instantiate_all, resolve_functions, CommandError, EngineError, ExecutionContext, ExecutionLimits,
    ResultCallback, Tracer, UsageError,
};

use super::pack::FunctionPack;
use super::source::SourceStack;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Usage(#[from] UsageError),
}

/// What one top-level function returned
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionResult {
    pub function: String,
    pub success: bool,
    pub result: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// In completion order; functions that never produced a result are absent
    pub results: Vec<FunctionResult>,
    pub executed_commands: usize,
}

/// Options for `run_target`
pub struct RunOptions<'a> {
    pub arguments: Option<&'a JsonValue>,
    pub limits: ExecutionLimits,
    pub tracer: Option<Box<dyn Tracer>>,
}

impl Default for RunOptions<'_> {
    fn default() -> Self {
        RunOptions {
            arguments: None,
            limits: ExecutionLimits::default(),
            tracer: None,
        }
    }
}

/// Resolve `target` (`ns:path` or `#ns:tag`) in `pack` and run it as `source`
pub fn run_target(
    pack: &FunctionPack,
    target: &str,
    source: &SourceStack,
    options: RunOptions<'_>,
) -> Result<RunReport, RunError> {
    let functions = resolve_functions(pack, target)?;
    let instantiated = instantiate_all(&functions, options.arguments)?;

    let mut context = ExecutionContext::new(options.limits);
    if let Some(tracer) = options.tracer {
        context.set_tracer(tracer)?;
    }

    let results = Rc::new(RefCell::new(Vec::new()));
    for function in instantiated {
        let sink = Rc::clone(&results);
        let name = function.id().to_string();
        let callback = ResultCallback::new(move |success, result| {
            sink.borrow_mut().push(FunctionResult {
                function: name.clone(),
                success,
                result,
            });
        });
        context.queue_initial_function_call(function, source.clone(), callback);
    }

    info!(target_function = target, "Running function target");
    context.run()?;

    let results = results.borrow().clone();
    Ok(RunReport {
        results,
        executed_commands: context.executed_commands(),
    })
}
