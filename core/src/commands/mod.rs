//! Reference command layer
//!
//! A small, concrete consumer of the execution engine: a source type, a
//! scoreboard-and-console world, a handful of commands, and function packs
//! loaded from JSON or TOML. The CLI and the end-to-end tests run on this.

pub mod compile;
pub mod pack;
pub mod run;
pub mod source;
pub mod world;


pub use compile::{compile_line, modify_sender_for_execution, FUNCTION_PERMISSION};
pub use pack::{ActionSpec, CommandLine, FunctionDef, FunctionPack, ModifierSpec, PackError, PackFile, PackFunction};
pub use run::{run_target, FunctionResult, RunError, RunOptions, RunReport};
pub use source::SourceStack;
pub use world::{ConsoleLine, ReportedError, World};
