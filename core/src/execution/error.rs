//! Error types for the execution engine
//!
//! Branch-local failures are `CommandError`s and travel to the error sink of
//! the source that raised them. `EngineError` is what stops a whole run.

use thiserror::Error;

/* ===================== Branch Errors ===================== */

/// An error raised while executing one branch of a command line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Domain failure raised by a leaf command or redirect
    #[error("{message}")]
    Failed { message: String },

    #[error("Unknown function {id}")]
    UnknownFunction { id: String },

    #[error("Unknown function tag #{id}")]
    UnknownTag { id: String },

    #[error("No functions matched {target}")]
    NoFunctions { target: String },

    #[error("Invalid function id '{id}': {reason}")]
    InvalidFunctionId { id: String, reason: String },

    /// Argument binding failed; nothing from the call site was scheduled
    #[error("Failed to instantiate function {function}: {reason}")]
    Instantiation {
        function: String,
        reason: InstantiationError,
    },

    #[error("Fork limit reached: more than {limit} contexts")]
    ForkLimitReached { limit: usize },

    #[error(transparent)]
    Usage(#[from] UsageError),
}

impl CommandError {
    /// Shorthand for a domain failure
    pub fn failed(message: impl Into<String>) -> Self {
        CommandError::Failed {
            message: message.into(),
        }
    }
}

/// Misuse of an engine facility from inside a command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("A tracer is already attached to this execution")]
    TracerAlreadyAttached,

    #[error("Tracing cannot be used as the target of 'return run'")]
    ReturnRunTrace,
}

/// Failure to bind arguments to a function body
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstantiationError {
    #[error("Expected compound arguments, found {found}")]
    NotCompound { found: String },

    #[error("Missing arguments: {}", names.join(", "))]
    MissingArguments { names: Vec<String> },

    #[error("Line {line}: {message}")]
    InvalidLine { line: usize, message: String },
}

/* ===================== Run Errors ===================== */

/// A condition that terminates the whole run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Command limit reached after {executed} commands")]
    CommandLimitReached { executed: usize },

    #[error("Continuation queue exceeded {limit} entries")]
    QueueOverflow { limit: usize },

    #[error("Execution context is {state:?}, expected Idle")]
    NotIdle { state: super::context::ExecutionState },
}
