//! The execution driver
//!
//! `ExecutionContext` owns the continuation stack and runs it to
//! completion. Each iteration pops one entry, executes its task, and then
//! moves whatever that task queued onto the top of the stack. Nothing here
//! recurses: a function nested 50,000 calls deep costs 50,000 stack
//! entries, not 50,000 native frames.
//!
//! ## State machine
//! `Idle -> Running -> Complete | Failed`. Running out of command quota or
//! overflowing the queue is `Failed`; errors inside individual branches
//! are reported to their sources and do not affect the state.

use tracing::{debug, error, info};
use uuid::Uuid;

use super::callback::ResultCallback;
use super::chain::ContextChain;
use super::error::{CommandError, EngineError, UsageError};
use super::frame::{Frame, FrameControl};
use super::function::InstantiatedFunction;
use super::source::ExecutionSource;
use super::stack::{ContinuationStack, Entry};
use super::tasks::Task;
use super::trace::Tracer;

/* ===================== Limits & State ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    Running,
    Complete,
    Failed,
}

/// Bounds for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Leaf executions and function calls per run
    pub command_limit: usize,
    /// Contexts a single redirect stage may produce
    pub fork_limit: usize,
    /// Entries the continuation stack may hold
    pub max_queue_depth: usize,
}

impl ExecutionLimits {
    pub const DEFAULT_COMMAND_LIMIT: usize = 65536;
    pub const DEFAULT_FORK_LIMIT: usize = 65536;
    pub const DEFAULT_MAX_QUEUE_DEPTH: usize = 10_000_000;
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        ExecutionLimits {
            command_limit: Self::DEFAULT_COMMAND_LIMIT,
            fork_limit: Self::DEFAULT_FORK_LIMIT,
            max_queue_depth: Self::DEFAULT_MAX_QUEUE_DEPTH,
        }
    }
}

/* ===================== Context ===================== */

pub struct ExecutionContext<S: ExecutionSource> {
    limits: ExecutionLimits,
    command_quota: usize,
    stack: ContinuationStack<S>,
    /// Entries queued by the running task, in queue order
    pending: Vec<Entry<S>>,
    tracer: Option<Box<dyn Tracer>>,
    current_depth: usize,
    next_seed: u64,
    queue_overflow: bool,
    state: ExecutionState,
}

impl<S: ExecutionSource> ExecutionContext<S> {
    pub fn new(limits: ExecutionLimits) -> Self {
        ExecutionContext {
            limits,
            command_quota: limits.command_limit,
            stack: ContinuationStack::new(),
            pending: Vec::new(),
            tracer: None,
            current_depth: 0,
            next_seed: 0,
            queue_overflow: false,
            state: ExecutionState::Idle,
        }
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Commands charged against the quota so far
    pub fn executed_commands(&self) -> usize {
        self.limits.command_limit - self.command_quota
    }

    /// Depth of the frame whose task is currently executing
    pub fn current_depth(&self) -> usize {
        self.current_depth
    }

    /// Entries waiting to run
    pub fn queued(&self) -> usize {
        self.stack.len() + self.pending.len()
    }

    /* ===================== Tracing ===================== */

    pub fn set_tracer(&mut self, tracer: Box<dyn Tracer>) -> Result<(), UsageError> {
        if self.tracer.is_some() {
            return Err(UsageError::TracerAlreadyAttached);
        }
        self.tracer = Some(tracer);
        Ok(())
    }

    pub fn take_tracer(&mut self) -> Option<Box<dyn Tracer>> {
        self.tracer.take()
    }

    pub fn tracer_attached(&self) -> bool {
        self.tracer.is_some()
    }

    pub(crate) fn trace(&mut self, f: impl FnOnce(&mut dyn Tracer)) {
        if let Some(tracer) = self.tracer.as_deref_mut() {
            f(tracer);
        }
    }

    /* ===================== Seeding ===================== */

    /// Queue a command line at depth 0
    ///
    /// An explicit return from the line delivers to `return_sink`.
    pub fn queue_initial_command(&mut self, chain: ContextChain<S>, source: S, return_sink: ResultCallback) {
        let frame = self.seed_frame(return_sink);
        self.queue_next(Entry::new(frame, Task::command(chain, source)));
    }

    /// Queue a call to an already instantiated function
    pub fn queue_initial_function_call(
        &mut self,
        function: InstantiatedFunction<S>,
        source: S,
        callback: ResultCallback,
    ) {
        let task = Task::call_function(function, callback, false, source);
        let frame = self.seed_frame(ResultCallback::empty());
        self.queue_next(Entry::new(frame, task));
    }

    /// Queue an arbitrary task in a fresh root frame
    pub fn queue_initial_task(&mut self, task: Task<S>) {
        let frame = self.seed_frame(ResultCallback::empty());
        self.queue_next(Entry::new(frame, task));
    }

    /* ===================== Driver ===================== */

    /// Seed the context with `tasks` and run it
    pub fn run_tasks(&mut self, tasks: impl IntoIterator<Item = Task<S>>) -> Result<(), EngineError> {
        for task in tasks {
            self.queue_initial_task(task);
        }
        self.run()
    }

    /// Run until the stack is empty or a limit stops execution
    pub fn run(&mut self) -> Result<(), EngineError> {
        if self.state != ExecutionState::Idle {
            return Err(EngineError::NotIdle { state: self.state });
        }
        self.state = ExecutionState::Running;

        let span = tracing::debug_span!("command_execution", invocation = %Uuid::new_v4());
        let _guard = span.enter();

        self.push_pending();
        let outcome = loop {
            if self.queue_overflow {
                error!(
                    limit = self.limits.max_queue_depth,
                    "Command execution stopped due to queue overflow"
                );
                break Err(EngineError::QueueOverflow {
                    limit: self.limits.max_queue_depth,
                });
            }
            if self.stack.is_empty() {
                break Ok(());
            }
            if self.command_quota == 0 {
                info!(
                    executed = self.limits.command_limit,
                    "Command execution stopped due to limit"
                );
                break Err(EngineError::CommandLimitReached {
                    executed: self.limits.command_limit,
                });
            }

            let Some(entry) = self.stack.pop() else {
                break Ok(());
            };
            self.current_depth = entry.frame.depth();
            entry.task.execute(self, entry.frame);
            self.push_pending();
        };

        match outcome {
            Ok(()) => {
                self.state = ExecutionState::Complete;
                debug!(executed = self.executed_commands(), "Command execution complete");
            }
            Err(_) => {
                self.state = ExecutionState::Failed;
                self.pending.clear();
                self.stack.clear();
            }
        }
        outcome
    }

    /// A fresh depth-0 frame whose return cannot reach other seeds
    fn seed_frame(&mut self, return_sink: ResultCallback) -> Frame {
        let seed = self.next_seed;
        self.next_seed += 1;
        Frame::root(seed, return_sink)
    }

    /* ===================== Task Support ===================== */

    /// Stage an entry to run after the current task returns
    pub(crate) fn queue_next(&mut self, entry: Entry<S>) {
        if self.queue_overflow {
            return;
        }
        if self.queued() >= self.limits.max_queue_depth {
            self.queue_overflow = true;
            return;
        }
        self.pending.push(entry);
    }

    fn push_pending(&mut self) {
        while let Some(entry) = self.pending.pop() {
            self.stack.push(entry);
        }
    }

    pub(crate) fn increment_cost(&mut self) {
        self.command_quota = self.command_quota.saturating_sub(1);
    }

    pub(crate) fn discard(&mut self, control: FrameControl) {
        self.pending.retain(|entry| !control.covers(&entry.frame));
        self.stack.discard(control);
    }

    /// Deliver a frame's result and drop the rest of its work
    pub(crate) fn return_from(&mut self, frame: &Frame, success: bool, result: i32) {
        frame.return_value_consumer().on_result(success, result);
        self.discard(frame.control());
    }

    pub(crate) fn report_error(&mut self, source: &S, error: &CommandError, forked: bool) {
        let message = error.to_string();
        self.trace(|tracer| tracer.on_error(&message));
        source.handle_error(error, forked);
    }
}
