//! Command-chain execution engine
//!
//! Executes resolved command lines (`ContextChain`s) against source
//! contexts. All pending work lives on an explicit continuation stack, so
//! nested function calls are bounded by memory rather than by the native
//! call stack.
//!
//! ## Module Organization
//! - `context`: the driver loop, limits and run state
//! - `tasks`: the closed set of task kinds
//! - `chain`: staged command lines and their modifiers
//! - `function`: function ids, instantiation and call-site policies
//! - `condition`: `if function` / `unless function` scheduling
//! - `callback`: composable result callbacks
//! - `trace`: tracer interface and implementations

pub mod callback;
pub mod chain;
pub mod condition;
pub mod context;
pub mod control;
pub mod error;
pub mod frame;
pub mod function;
pub mod source;
pub mod stack;
pub mod tasks;
pub mod trace;

#[cfg(test)]
mod tests;

pub use callback::{ResultAccumulator, ResultCallback};
pub use chain::{
    ChainBuilder, ChainModifiers, Command, ContextChain, CustomExecutor, CustomModifier,
    RedirectModifier, Stage, StageAction,
};
pub use condition::{passes_if, passes_unless, schedule_function_conditions};
pub use context::{ExecutionContext, ExecutionLimits, ExecutionState};
pub use control::ExecutionControl;
pub use error::{CommandError, EngineError, InstantiationError, UsageError};
pub use frame::{Frame, FrameControl};
pub use function::{
    check_compound, instantiate_all, queue_functions, resolve_functions, CommandFunction,
    FunctionId, FunctionRef, FunctionResolver, InstantiatedFunction, PlainFunction,
};
pub use source::ExecutionSource;
pub use stack::{ContinuationStack, Entry};
pub use tasks::Task;
pub use trace::{PrintTracer, RecordingTracer, TraceEvent, Tracer};
