//! Continuation tasks
//!
//! Every unit of pending work is a `Task`. The set of task kinds is closed,
//! so dispatch is a single `match` in `Task::execute`.
//!
//! ## Task kinds
//! - `Fork`: walks the modifier stages of one line, then schedules its executable
//! - `Execute`: one leaf command under one source
//! - `Continuation`: drips leaf executions onto the stack one at a time
//! - `CallFunction`: opens a callee frame and schedules the body
//! - `EndFunction`: returns the callee frame's last result
//! - `Isolated`: runs a producer in a fresh frame with its own return sink
//! - `Fallthrough`: returns failure from the current frame
//! - `Deferred`: arbitrary follow-up work

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::callback::ResultCallback;
use super::chain::{ChainModifiers, Command, ContextChain, StageAction};
use super::context::ExecutionContext;
use super::control::ExecutionControl;
use super::error::CommandError;
use super::frame::Frame;
use super::function::InstantiatedFunction;
use super::source::ExecutionSource;

/// Follow-up work that needs the execution handle
pub type DeferredTask<S> = Box<dyn FnOnce(&mut ExecutionControl<'_, S>)>;

pub enum Task<S: ExecutionSource> {
    Fork(ForkTask<S>),
    Execute { leaf: Rc<Leaf<S>>, source: S },
    Continuation(Continuation<S>),
    CallFunction(CallFunction<S>),
    EndFunction,
    Isolated(IsolatedCall<S>),
    Fallthrough,
    Deferred(DeferredTask<S>),
}

impl<S: ExecutionSource> Task<S> {
    /// A top-level command line under a single source
    pub fn command(chain: ContextChain<S>, source: S) -> Self {
        Task::Fork(ForkTask {
            original: source.clone(),
            sources: Sources::Ready(vec![source]),
            chain,
            modifiers: ChainModifiers::DEFAULT,
            top_level: true,
        })
    }

    /// Resume `chain` for the given sources after a modifier stage
    pub fn fork(original: S, sources: Vec<S>, chain: ContextChain<S>, modifiers: ChainModifiers) -> Self {
        Task::Fork(ForkTask {
            original,
            sources: Sources::Ready(sources),
            chain,
            modifiers,
            top_level: false,
        })
    }

    /// Like `fork`, but the source list is read only when the task runs
    pub fn continuation(
        original: S,
        sources: Rc<RefCell<Vec<S>>>,
        chain: ContextChain<S>,
        modifiers: ChainModifiers,
    ) -> Self {
        Task::Fork(ForkTask {
            original,
            sources: Sources::Collected(sources),
            chain,
            modifiers,
            top_level: false,
        })
    }

    pub fn call_function(
        function: InstantiatedFunction<S>,
        callback: ResultCallback,
        return_parent_frame: bool,
        source: S,
    ) -> Self {
        Task::CallFunction(CallFunction {
            function,
            callback,
            return_parent_frame,
            source,
        })
    }

    pub fn isolated(
        producer: impl FnOnce(&mut ExecutionControl<'_, S>) + 'static,
        output: ResultCallback,
    ) -> Self {
        Task::Isolated(IsolatedCall {
            producer: Box::new(producer),
            output,
        })
    }

    pub fn deferred(f: impl FnOnce(&mut ExecutionControl<'_, S>) + 'static) -> Self {
        Task::Deferred(Box::new(f))
    }

    pub fn fallthrough() -> Self {
        Task::Fallthrough
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Task::Fork(_) => "Fork",
            Task::Execute { .. } => "Execute",
            Task::Continuation(_) => "Continuation",
            Task::CallFunction(_) => "CallFunction",
            Task::EndFunction => "EndFunction",
            Task::Isolated(_) => "Isolated",
            Task::Fallthrough => "Fallthrough",
            Task::Deferred(_) => "Deferred",
        }
    }

    pub(crate) fn execute(self, context: &mut ExecutionContext<S>, frame: Frame) {
        let mut control = ExecutionControl::new(context, frame);
        match self {
            Task::Fork(task) => task.execute(&mut control),
            Task::Execute { leaf, source } => leaf.execute(&source, &mut control),
            Task::Continuation(task) => task.execute(&mut control),
            Task::CallFunction(call) => call.execute(&mut control),
            Task::EndFunction => {
                if let Some((success, result)) = control.current_frame().recorded() {
                    control.return_result(success, result);
                }
            }
            Task::Isolated(call) => call.execute(&mut control),
            Task::Fallthrough => control.return_failure(),
            Task::Deferred(f) => f(&mut control),
        }
    }
}

impl<S: ExecutionSource> fmt::Debug for Task<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/* ===================== Fork / Redirect ===================== */

enum Sources<S> {
    Ready(Vec<S>),
    /// Filled by earlier tasks; taken when the fork runs
    Collected(Rc<RefCell<Vec<S>>>),
}

impl<S> Sources<S> {
    fn resolve(self) -> Vec<S> {
        match self {
            Sources::Ready(sources) => sources,
            Sources::Collected(cell) => std::mem::take(&mut *cell.borrow_mut()),
        }
    }
}

/// Runs the modifier stages of a line and schedules its executable
///
/// Fork and redirect are the same operation: a redirect stage maps each
/// source to any number of sources, and the outputs are concatenated in
/// order. A branch that errors is dropped; in a non-forked line the error
/// stops the whole line.
pub struct ForkTask<S: ExecutionSource> {
    original: S,
    sources: Sources<S>,
    chain: ContextChain<S>,
    modifiers: ChainModifiers,
    top_level: bool,
}

impl<S: ExecutionSource> ForkTask<S> {
    fn execute(self, control: &mut ExecutionControl<'_, S>) {
        let ForkTask {
            original,
            sources,
            mut chain,
            mut modifiers,
            top_level,
        } = self;

        if top_level {
            let depth = control.current_frame().depth();
            control.trace(|tracer| tracer.on_command(depth, chain.input()));
        }

        let fork_limit = control.limits().fork_limit;
        let mut sources = sources.resolve();

        loop {
            let stage = chain.top_stage().clone();
            modifiers = modifiers.union(stage.modifiers);

            match stage.action {
                StageAction::Redirect(redirect) => {
                    let mut next = Vec::with_capacity(sources.len());
                    for source in &sources {
                        match redirect(source) {
                            Ok(produced) => {
                                next.extend(produced);
                                if next.len() > fork_limit {
                                    let error = CommandError::ForkLimitReached { limit: fork_limit };
                                    control.report_error(&original, &error, modifiers.is_forked());
                                    return;
                                }
                            }
                            Err(error) => {
                                control.report_error(source, &error, modifiers.is_forked());
                                if !modifiers.is_forked() {
                                    return;
                                }
                            }
                        }
                    }
                    sources = next;
                }
                StageAction::CustomModify(modifier) => {
                    if let Err(error) = modifier.apply(&original, sources, &chain, modifiers, control) {
                        control.report_error(&original, &error, modifiers.is_forked());
                    }
                    return;
                }
                StageAction::Execute(command) => {
                    if finish_without_sources(&sources, modifiers, control) {
                        return;
                    }
                    if modifiers.is_return() {
                        sources.truncate(1);
                    }
                    let leaf = Rc::new(Leaf {
                        command,
                        chain,
                        modifiers,
                    });
                    schedule_leaves(control, leaf, sources);
                    return;
                }
                StageAction::CustomExecute(executor) => {
                    if finish_without_sources(&sources, modifiers, control) {
                        return;
                    }
                    for source in &sources {
                        if let Err(error) = executor.run(source, &chain, modifiers, control) {
                            control.report_error(source, &error, modifiers.is_forked());
                            source.callback().on_failure();
                            control.current_frame().record(false, 0);
                        }
                    }
                    return;
                }
            }

            match chain.next_stage() {
                Some(next) => chain = next,
                None => return,
            }
        }
    }
}

/// A line that reaches its executable with no sources ends here; a
/// return-run line makes its frame fail.
fn finish_without_sources<S: ExecutionSource>(
    sources: &[S],
    modifiers: ChainModifiers,
    control: &mut ExecutionControl<'_, S>,
) -> bool {
    if !sources.is_empty() {
        return false;
    }
    if modifiers.is_return() {
        control.queue_next(Task::Fallthrough);
    }
    true
}

/* ===================== Leaf Execution ===================== */

/// The executable stage of a line, shared by every source it runs under
pub struct Leaf<S: ExecutionSource> {
    command: Command<S>,
    chain: ContextChain<S>,
    modifiers: ChainModifiers,
}

impl<S: ExecutionSource> Leaf<S> {
    fn execute(&self, source: &S, control: &mut ExecutionControl<'_, S>) {
        control.increment_cost();
        let depth = control.current_frame().depth();
        let input = self.chain.input();

        let (success, result) = match (self.command)(source) {
            Ok(result) => {
                control.trace(|tracer| tracer.on_return(depth, input, result));
                (true, result)
            }
            Err(error) => {
                control.report_error(source, &error, self.modifiers.is_forked());
                control.trace(|tracer| tracer.on_return(depth, input, 0));
                (false, 0)
            }
        };

        source.callback().on_result(success, result);
        control.current_frame().record(success, result);
        if self.modifiers.is_return() {
            control.return_result(success, result);
        }
    }
}

/// Queue one leaf execution per source
///
/// One or two sources are queued directly; larger fan-outs go through a
/// `Continuation` so the stack holds two entries instead of N.
fn schedule_leaves<S: ExecutionSource>(
    control: &mut ExecutionControl<'_, S>,
    leaf: Rc<Leaf<S>>,
    sources: Vec<S>,
) {
    match sources.len() {
        0 => {}
        1 | 2 => {
            for source in sources {
                control.queue_next(Task::Execute {
                    leaf: Rc::clone(&leaf),
                    source,
                });
            }
        }
        _ => control.queue_next(Task::Continuation(Continuation {
            leaf,
            sources: sources.into(),
        })),
    }
}

pub struct Continuation<S: ExecutionSource> {
    leaf: Rc<Leaf<S>>,
    sources: VecDeque<S>,
}

impl<S: ExecutionSource> Continuation<S> {
    fn execute(mut self, control: &mut ExecutionControl<'_, S>) {
        let Some(source) = self.sources.pop_front() else {
            return;
        };
        control.queue_next(Task::Execute {
            leaf: Rc::clone(&self.leaf),
            source,
        });
        if !self.sources.is_empty() {
            control.queue_next(Task::Continuation(self));
        }
    }
}

/* ===================== Function Calls ===================== */

pub struct CallFunction<S: ExecutionSource> {
    function: InstantiatedFunction<S>,
    callback: ResultCallback,
    /// Return-calls share the caller's frame control
    return_parent_frame: bool,
    source: S,
}

impl<S: ExecutionSource> CallFunction<S> {
    fn execute(self, control: &mut ExecutionControl<'_, S>) {
        control.increment_cost();
        let caller = control.current_frame().clone();
        let (id, entries) = self.function.into_parts();

        control.trace(|tracer| tracer.on_call(caller.depth(), &id, entries.len()));
        trace!(function = %id, depth = caller.depth() + 1, lines = entries.len(), "Calling function");

        let inherited = self.return_parent_frame.then(|| caller.control());
        let callee = caller.child(self.callback, inherited);
        for chain in entries {
            control.queue_in(callee.clone(), Task::command(chain, self.source.clone()));
        }
        control.queue_in(callee, Task::EndFunction);
    }
}

/* ===================== Isolated Calls ===================== */

/// Work run in its own frame whose return goes to `output`
pub struct IsolatedCall<S: ExecutionSource> {
    producer: DeferredTask<S>,
    output: ResultCallback,
}

impl<S: ExecutionSource> IsolatedCall<S> {
    fn execute(self, control: &mut ExecutionControl<'_, S>) {
        let frame = control.current_frame().child(self.output, None);
        let mut isolated = control.nested(frame);
        (self.producer)(&mut isolated);
    }
}
