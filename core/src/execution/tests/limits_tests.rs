//! Tests for run limits and the run state machine

use std::rc::Rc;

use crate::execution::{
    EngineError, ExecutionContext, ExecutionLimits, ExecutionState, FunctionRef, ResultCallback, Task,
};

use super::helpers::{context, instantiate, recorder, return_line, DeepFunction, TestSource};

#[test]
fn test_command_limit_stops_run() {
    let limits = ExecutionLimits {
        command_limit: 10,
        ..ExecutionLimits::default()
    };
    let mut ctx: ExecutionContext<TestSource> = ExecutionContext::new(limits);
    let endless: FunctionRef<TestSource> = Rc::new(DeepFunction::new(0, 1_000_000));
    ctx.queue_initial_function_call(instantiate(&endless), TestSource::new("C"), ResultCallback::empty());

    let result = ctx.run();

    assert_eq!(result, Err(EngineError::CommandLimitReached { executed: 10 }));
    assert_eq!(ctx.state(), ExecutionState::Failed);
    assert_eq!(ctx.executed_commands(), 10);
    assert_eq!(ctx.queued(), 0);
}

#[test]
fn test_queue_overflow_stops_run() {
    let limits = ExecutionLimits {
        max_queue_depth: 5,
        ..ExecutionLimits::default()
    };
    let mut ctx: ExecutionContext<TestSource> = ExecutionContext::new(limits);
    ctx.queue_initial_task(Task::<TestSource>::deferred(|control| {
        for _ in 0..10 {
            control.queue_next(Task::fallthrough());
        }
    }));

    let result = ctx.run();

    assert_eq!(result, Err(EngineError::QueueOverflow { limit: 5 }));
    assert_eq!(ctx.state(), ExecutionState::Failed);
}

#[test]
fn test_run_requires_idle_context() {
    let mut ctx = context();
    assert_eq!(ctx.state(), ExecutionState::Idle);

    ctx.run().unwrap();
    assert_eq!(ctx.state(), ExecutionState::Complete);

    assert_eq!(
        ctx.run(),
        Err(EngineError::NotIdle {
            state: ExecutionState::Complete
        })
    );
}

#[test]
fn test_top_level_return_reaches_return_sink() {
    let (sink, results) = recorder();
    let mut ctx = context();
    ctx.queue_initial_command(return_line(4), TestSource::new("C"), sink);
    ctx.run().unwrap();

    assert_eq!(*results.borrow(), vec![(true, 4)]);
}
