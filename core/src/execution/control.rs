//! Handle given to custom executors and modifiers

use super::context::{ExecutionContext, ExecutionLimits};
use super::error::{CommandError, UsageError};
use super::frame::Frame;
use super::source::ExecutionSource;
use super::stack::Entry;
use super::tasks::Task;
use super::trace::Tracer;

/// The running context seen from inside one frame
pub struct ExecutionControl<'a, S: ExecutionSource> {
    context: &'a mut ExecutionContext<S>,
    frame: Frame,
}

impl<'a, S: ExecutionSource> ExecutionControl<'a, S> {
    pub(crate) fn new(context: &'a mut ExecutionContext<S>, frame: Frame) -> Self {
        ExecutionControl { context, frame }
    }

    pub fn current_frame(&self) -> &Frame {
        &self.frame
    }

    /// Queue a task in the current frame
    pub fn queue_next(&mut self, task: Task<S>) {
        let entry = Entry::new(self.frame.clone(), task);
        self.context.queue_next(entry);
    }

    /// A handle for `frame` over the same context
    pub(crate) fn nested(&mut self, frame: Frame) -> ExecutionControl<'_, S> {
        ExecutionControl::new(&mut *self.context, frame)
    }

    pub(crate) fn queue_in(&mut self, frame: Frame, task: Task<S>) {
        self.context.queue_next(Entry::new(frame, task));
    }

    pub fn limits(&self) -> &ExecutionLimits {
        self.context.limits()
    }

    pub fn tracer_attached(&self) -> bool {
        self.context.tracer_attached()
    }

    pub fn set_tracer(&mut self, tracer: Box<dyn Tracer>) -> Result<(), UsageError> {
        self.context.set_tracer(tracer)
    }

    pub fn take_tracer(&mut self) -> Option<Box<dyn Tracer>> {
        self.context.take_tracer()
    }

    pub(crate) fn trace(&mut self, f: impl FnOnce(&mut dyn Tracer)) {
        self.context.trace(f);
    }

    pub(crate) fn increment_cost(&mut self) {
        self.context.increment_cost();
    }

    pub fn report_error(&mut self, source: &S, error: &CommandError, forked: bool) {
        self.context.report_error(source, error, forked);
    }

    /// Return `result` from the current frame, discarding its remaining work
    pub fn return_success(&mut self, result: i32) {
        self.return_result(true, result);
    }

    pub fn return_failure(&mut self) {
        self.return_result(false, 0);
    }

    pub fn return_result(&mut self, success: bool, result: i32) {
        let frame = self.frame.clone();
        self.context.return_from(&frame, success, result);
    }
}
