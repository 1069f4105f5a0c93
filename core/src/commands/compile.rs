//! Turning command lines into executable chains
//!
//! Modifiers become redirect, fork or custom-modifier stages; the action
//! becomes the executable stage. `function`, `return` and `debug` are
//! custom executors because they schedule work instead of producing a
//! value directly.

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::Path;
use std::rc::Rc;

use chrono::Local;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::execution::{
    passes_if, passes_unless, queue_functions, resolve_functions, schedule_function_conditions,
    ChainBuilder, ChainModifiers, CommandError, ContextChain, CustomExecutor, CustomModifier,
    ExecutionControl, ExecutionSource, PrintTracer, ResultCallback, Task, UsageError,
};

use super::pack::{ActionSpec, CommandLine, FunctionPack, ModifierSpec};
use super::source::SourceStack;

/// Permission level functions run at
pub const FUNCTION_PERMISSION: u8 = 2;

/// Callees of `function` and function conditions run quietly at function permission
pub fn modify_sender_for_execution(source: &SourceStack) -> SourceStack {
    source
        .with_suppressed_output()
        .with_maximum_permission(FUNCTION_PERMISSION)
}

/// `@s` names the executing entity; anything else is a literal holder
fn resolve_holder(source: &SourceStack, holder: &str) -> String {
    if holder == "@s" {
        source.display_name().to_string()
    } else {
        holder.to_string()
    }
}

pub fn compile_line(line: &CommandLine, pack: &FunctionPack) -> ContextChain<SourceStack> {
    let mut builder = ChainBuilder::new(line.to_string());
    if line.return_run {
        builder = builder.return_run();
    }
    for modifier in &line.modifiers {
        builder = compile_modifier(builder, modifier, pack);
    }
    compile_action(builder, &line.run, pack)
}

/* ===================== Modifiers ===================== */

fn compile_modifier(
    builder: ChainBuilder<SourceStack>,
    modifier: &ModifierSpec,
    pack: &FunctionPack,
) -> ChainBuilder<SourceStack> {
    match modifier.clone() {
        ModifierSpec::As { targets } => builder.fork(move |s: &SourceStack| {
            Ok(targets.iter().map(|target| s.with_entity(target)).collect())
        }),
        ModifierSpec::Positioned { pos } => {
            builder.redirect(move |s: &SourceStack| Ok(vec![s.with_position(pos)]))
        }
        ModifierSpec::In { dimension } => {
            builder.redirect(move |s: &SourceStack| Ok(vec![s.with_dimension(&dimension)]))
        }
        ModifierSpec::IfScore {
            holder,
            objective,
            min,
            max,
        } => builder.redirect(move |s: &SourceStack| {
            let holder = resolve_holder(s, &holder);
            let matched = s.world().score(&holder, &objective).is_some_and(|value| {
                min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
            });
            Ok(if matched { vec![s.clone()] } else { Vec::new() })
        }),
        ModifierSpec::IfFunction { function } => builder.custom_modifier(FunctionCondition {
            target: function,
            pack: pack.clone(),
            predicate: passes_if,
        }),
        ModifierSpec::UnlessFunction { function } => builder.custom_modifier(FunctionCondition {
            target: function,
            pack: pack.clone(),
            predicate: passes_unless,
        }),
        ModifierSpec::StoreResult { holder, objective } => builder.redirect(move |s: &SourceStack| {
            Ok(vec![s.chain_callback(&store_callback(s, &holder, &objective, true))])
        }),
        ModifierSpec::StoreSuccess { holder, objective } => builder.redirect(move |s: &SourceStack| {
            Ok(vec![s.chain_callback(&store_callback(s, &holder, &objective, false))])
        }),
    }
}

/// Writes every result the source reports into a score
fn store_callback(source: &SourceStack, holder: &str, objective: &str, storing_result: bool) -> ResultCallback {
    let world = source.shared_world();
    let holder = resolve_holder(source, holder);
    let objective = objective.to_string();
    ResultCallback::new(move |success, result| {
        let value = if storing_result {
            result
        } else {
            i32::from(success)
        };
        world.set_score(&holder, &objective, value);
    })
}

/// `if function` / `unless function`
struct FunctionCondition {
    target: String,
    pack: FunctionPack,
    predicate: fn(i32) -> bool,
}

impl CustomModifier<SourceStack> for FunctionCondition {
    fn apply(
        &self,
        original: &SourceStack,
        sources: Vec<SourceStack>,
        chain: &ContextChain<SourceStack>,
        modifiers: ChainModifiers,
        control: &mut ExecutionControl<'_, SourceStack>,
    ) -> Result<(), CommandError> {
        let functions = resolve_functions(&self.pack, &self.target)?;
        schedule_function_conditions(
            original,
            sources,
            chain,
            modifiers,
            &functions,
            modify_sender_for_execution,
            self.predicate,
            control,
        )
    }
}

/* ===================== Actions ===================== */

fn compile_action(
    builder: ChainBuilder<SourceStack>,
    action: &ActionSpec,
    pack: &FunctionPack,
) -> ContextChain<SourceStack> {
    match action.clone() {
        ActionSpec::Say { message } => builder.executes(move |s: &SourceStack| {
            s.world().print(s.display_name(), message.as_str());
            Ok(1)
        }),
        ActionSpec::Value { value } => builder.executes(move |_: &SourceStack| Ok(value)),
        ActionSpec::Fail { message } => {
            builder.executes(move |_: &SourceStack| Err(CommandError::failed(message.as_str())))
        }
        ActionSpec::Add {
            holder,
            objective,
            amount,
        } => builder.executes(move |s: &SourceStack| {
            let holder = resolve_holder(s, &holder);
            let value = s.world().add_score(&holder, &objective, amount);
            s.send_success(format!("Added {amount} to [{objective}] for {holder} (now {value})"));
            Ok(value)
        }),
        ActionSpec::Get { holder, objective } => builder.executes(move |s: &SourceStack| {
            let holder = resolve_holder(s, &holder);
            match s.world().score(&holder, &objective) {
                Some(value) => {
                    s.send_success(format!("{holder} has {value} [{objective}]"));
                    Ok(value)
                }
                None => Err(CommandError::failed(format!(
                    "Can't get value of {objective} for {holder}; none is set"
                ))),
            }
        }),
        ActionSpec::Function {
            function,
            arguments,
        } => builder.custom(FunctionExecutor {
            target: function,
            arguments,
            pack: pack.clone(),
        }),
        ActionSpec::Return { value } => builder.custom(ReturnValue(value)),
        ActionSpec::ReturnFail => builder.custom(ReturnFail),
        ActionSpec::Debug { function } => builder.custom(DebugTrace {
            target: function,
            pack: pack.clone(),
        }),
    }
}

/// `function <target> [arguments]`
struct FunctionExecutor {
    target: String,
    arguments: Option<JsonValue>,
    pack: FunctionPack,
}

impl CustomExecutor<SourceStack> for FunctionExecutor {
    fn run(
        &self,
        source: &SourceStack,
        _chain: &ContextChain<SourceStack>,
        modifiers: ChainModifiers,
        control: &mut ExecutionControl<'_, SourceStack>,
    ) -> Result<(), CommandError> {
        let functions = resolve_functions(&self.pack, &self.target)?;
        let callee = modify_sender_for_execution(source);

        let ids: Vec<String> = functions.iter().map(|f| f.id().to_string()).collect();
        match ids.as_slice() {
            [single] => source.send_success(format!("Running function {single}")),
            _ => source.send_success(format!("Running functions {}", ids.join(", "))),
        }

        queue_functions(&functions, self.arguments.as_ref(), source, &callee, modifiers, control)
    }
}

struct ReturnValue(i32);

impl CustomExecutor<SourceStack> for ReturnValue {
    fn run(
        &self,
        source: &SourceStack,
        _chain: &ContextChain<SourceStack>,
        _modifiers: ChainModifiers,
        control: &mut ExecutionControl<'_, SourceStack>,
    ) -> Result<(), CommandError> {
        source.callback().on_success(self.0);
        control.return_success(self.0);
        Ok(())
    }
}

struct ReturnFail;

impl CustomExecutor<SourceStack> for ReturnFail {
    fn run(
        &self,
        source: &SourceStack,
        _chain: &ContextChain<SourceStack>,
        _modifiers: ChainModifiers,
        control: &mut ExecutionControl<'_, SourceStack>,
    ) -> Result<(), CommandError> {
        source.callback().on_failure();
        control.return_failure();
        Ok(())
    }
}

/* ===================== Debug Trace ===================== */

/// `debug function <target>`: runs the functions with a file tracer attached
struct DebugTrace {
    target: String,
    pack: FunctionPack,
}

fn open_trace(path: &Path) -> io::Result<BufWriter<File>> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

impl CustomExecutor<SourceStack> for DebugTrace {
    fn run(
        &self,
        source: &SourceStack,
        _chain: &ContextChain<SourceStack>,
        modifiers: ChainModifiers,
        control: &mut ExecutionControl<'_, SourceStack>,
    ) -> Result<(), CommandError> {
        if modifiers.is_return() {
            return Err(UsageError::ReturnRunTrace.into());
        }
        if control.tracer_attached() {
            return Err(UsageError::TracerAlreadyAttached.into());
        }
        let functions = resolve_functions(&self.pack, &self.target)?;

        let file_name = format!("debug-trace-{}.txt", Local::now().format("%Y-%m-%d_%H.%M.%S"));
        let path = self.pack.trace_dir().join(&file_name);
        let writer = match open_trace(&path) {
            Ok(writer) => writer,
            Err(error) => {
                warn!(path = %path.display(), %error, "Tracing failed");
                source.send_failure("Tracing failed");
                return Ok(());
            }
        };

        let tracer = Rc::new(RefCell::new(PrintTracer::new(writer)));
        control.set_tracer(Box::new(Rc::clone(&tracer)))?;

        let sink: Rc<dyn Fn(&str)> = {
            let tracer = Rc::clone(&tracer);
            Rc::new(move |text: &str| tracer.borrow_mut().message(text))
        };
        let traced = source
            .with_output(sink)
            .with_maximum_permission(FUNCTION_PERMISSION);

        let mut traced_commands = 0;
        for function in &functions {
            let instantiated = match function.instantiate(None) {
                Ok(instantiated) => instantiated,
                Err(error) => {
                    source.send_failure(error.to_string());
                    continue;
                }
            };
            traced_commands += instantiated.entries().len();

            let heading = Rc::clone(&tracer);
            let id = function.id().to_string();
            control.queue_next(Task::<SourceStack>::deferred(move |_| heading.borrow_mut().heading(&id)));
            control.queue_next(Task::call_function(
                instantiated,
                ResultCallback::empty(),
                false,
                traced.clone(),
            ));
        }

        let source = source.clone();
        let summary = match functions.as_slice() {
            [single] => format!(
                "Traced {traced_commands} command(s) from function {} to output file {file_name}",
                single.id()
            ),
            many => format!(
                "Traced {traced_commands} command(s) from {} functions to output file {file_name}",
                many.len()
            ),
        };
        control.queue_next(Task::<SourceStack>::deferred(move |control| {
            drop(control.take_tracer());
            if let Err(error) = tracer.borrow_mut().flush() {
                warn!(path = %path.display(), %error, "Failed to write trace");
            }
            source.send_success(summary);
        }));
        Ok(())
    }
}
