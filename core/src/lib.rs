//! Command-chain execution engine
//!
//! `execution` is the engine: chains, tasks, frames and the trampoline
//! driver. `commands` is a small concrete command layer on top of it with
//! function packs, used by the CLI and the end-to-end tests.

pub mod cli;
pub mod commands;
pub mod config;
pub mod execution;
pub mod logging;

pub use config::Config;
pub use execution::{
    CommandError, EngineError, ExecutionContext, ExecutionLimits, ExecutionSource, ResultCallback,
};
