//! Function conditions
//!
//! `if function` and `unless function` run functions to decide which
//! sources continue down the line. Each source gets an isolated call that
//! return-calls every function; the first result is tested and passing
//! sources are collected. Once every isolated call has settled, a single
//! continuation resumes the rest of the line over the collected sources.

use std::cell::RefCell;
use std::rc::Rc;

use super::callback::ResultCallback;
use super::chain::{ChainModifiers, ContextChain};
use super::control::ExecutionControl;
use super::error::CommandError;
use super::function::{instantiate_all, FunctionRef};
use super::source::ExecutionSource;
use super::tasks::Task;

/// Test a function result for `if function`
pub fn passes_if(result: i32) -> bool {
    result != 0
}

/// Test a function result for `unless function`
pub fn passes_unless(result: i32) -> bool {
    result == 0
}

/// Schedule the condition calls and the continuation of `chain`
///
/// `chain` is positioned at the condition stage. `source_modifier` is
/// applied to every callee source after its callbacks are cleared.
#[allow(clippy::too_many_arguments)]
pub fn schedule_function_conditions<S: ExecutionSource>(
    original: &S,
    sources: Vec<S>,
    chain: &ContextChain<S>,
    modifiers: ChainModifiers,
    functions: &[FunctionRef<S>],
    source_modifier: impl Fn(&S) -> S,
    predicate: impl Fn(i32) -> bool + 'static,
    control: &mut ExecutionControl<'_, S>,
) -> Result<(), CommandError> {
    let instantiated = instantiate_all(functions, None)?;
    let passed = Rc::new(RefCell::new(Vec::with_capacity(sources.len())));
    let predicate = Rc::new(predicate);

    for source in sources {
        let callee_source = source_modifier(&source.clear_callbacks());
        let output = {
            let passed = Rc::clone(&passed);
            let predicate = Rc::clone(&predicate);
            ResultCallback::new(move |_success, result| {
                if predicate(result) {
                    passed.borrow_mut().push(source.clone());
                }
            })
        };

        let calls = instantiated.clone();
        let producer = move |isolated: &mut ExecutionControl<'_, S>| {
            let callback = isolated.current_frame().return_value_consumer().clone();
            for function in calls {
                isolated.queue_next(Task::call_function(
                    function,
                    callback.clone(),
                    true,
                    callee_source.clone(),
                ));
            }
            isolated.queue_next(Task::fallthrough());
        };
        control.queue_next(Task::isolated(producer, output));
    }

    if let Some(next) = chain.next_stage() {
        control.queue_next(Task::continuation(original.clone(), passed, next, modifiers));
    }
    Ok(())
}
