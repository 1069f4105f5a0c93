//! Staged command lines
//!
//! A `ContextChain` is the resolved form of one command line: an ordered
//! list of stages where every stage but the last transforms the set of
//! sources, and the last one executes. Chains are immutable; advancing
//! produces a new chain sharing the same stage storage.

use std::fmt;
use std::rc::Rc;

use super::control::ExecutionControl;
use super::error::CommandError;
use super::source::ExecutionSource;

/* ===================== Modifiers ===================== */

/// Flags attached to a stage when the chain is built
///
/// While a line executes, the flags of visited stages are unioned, so a
/// forked stage marks everything after it as forked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainModifiers {
    forked: bool,
    is_return: bool,
}

impl ChainModifiers {
    pub const DEFAULT: ChainModifiers = ChainModifiers {
        forked: false,
        is_return: false,
    };

    pub fn is_forked(self) -> bool {
        self.forked
    }

    pub fn is_return(self) -> bool {
        self.is_return
    }

    pub fn set_forked(self) -> Self {
        ChainModifiers {
            forked: true,
            ..self
        }
    }

    pub fn set_return(self) -> Self {
        ChainModifiers {
            is_return: true,
            ..self
        }
    }

    pub fn union(self, other: ChainModifiers) -> Self {
        ChainModifiers {
            forked: self.forked || other.forked,
            is_return: self.is_return || other.is_return,
        }
    }
}

/* ===================== Stage Actions ===================== */

/// Maps one source to zero or more sources (fork and redirect alike)
pub type RedirectModifier<S> = Rc<dyn Fn(&S) -> Result<Vec<S>, CommandError>>;

/// A leaf command producing a result value
pub type Command<S> = Rc<dyn Fn(&S) -> Result<i32, CommandError>>;

/// A modifier stage that takes over scheduling of the rest of the line
///
/// Receives every current source at once; `chain` is positioned at this
/// stage, so the remainder is `chain.next_stage()`.
pub trait CustomModifier<S: ExecutionSource> {
    fn apply(
        &self,
        original: &S,
        sources: Vec<S>,
        chain: &ContextChain<S>,
        modifiers: ChainModifiers,
        control: &mut ExecutionControl<'_, S>,
    ) -> Result<(), CommandError>;
}

/// An executable stage that schedules work instead of returning a value
pub trait CustomExecutor<S: ExecutionSource> {
    fn run(
        &self,
        source: &S,
        chain: &ContextChain<S>,
        modifiers: ChainModifiers,
        control: &mut ExecutionControl<'_, S>,
    ) -> Result<(), CommandError>;
}

pub enum StageAction<S: ExecutionSource> {
    Redirect(RedirectModifier<S>),
    CustomModify(Rc<dyn CustomModifier<S>>),
    Execute(Command<S>),
    CustomExecute(Rc<dyn CustomExecutor<S>>),
}

impl<S: ExecutionSource> StageAction<S> {
    pub fn is_executable(&self) -> bool {
        matches!(self, StageAction::Execute(_) | StageAction::CustomExecute(_))
    }
}

impl<S: ExecutionSource> Clone for StageAction<S> {
    fn clone(&self) -> Self {
        match self {
            StageAction::Redirect(f) => StageAction::Redirect(Rc::clone(f)),
            StageAction::CustomModify(m) => StageAction::CustomModify(Rc::clone(m)),
            StageAction::Execute(f) => StageAction::Execute(Rc::clone(f)),
            StageAction::CustomExecute(e) => StageAction::CustomExecute(Rc::clone(e)),
        }
    }
}

impl<S: ExecutionSource> fmt::Debug for StageAction<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageAction::Redirect(_) => "Redirect",
            StageAction::CustomModify(_) => "CustomModify",
            StageAction::Execute(_) => "Execute",
            StageAction::CustomExecute(_) => "CustomExecute",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct Stage<S: ExecutionSource> {
    pub action: StageAction<S>,
    pub modifiers: ChainModifiers,
}

impl<S: ExecutionSource> Clone for Stage<S> {
    fn clone(&self) -> Self {
        Stage {
            action: self.action.clone(),
            modifiers: self.modifiers,
        }
    }
}

/* ===================== Context Chain ===================== */

pub struct ContextChain<S: ExecutionSource> {
    input: Rc<str>,
    stages: Rc<[Stage<S>]>,
    index: usize,
}

impl<S: ExecutionSource> ContextChain<S> {
    /// The command line text this chain was resolved from
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn top_stage(&self) -> &Stage<S> {
        &self.stages[self.index]
    }

    /// The remainder of the chain after the current stage
    pub fn next_stage(&self) -> Option<ContextChain<S>> {
        (self.index + 1 < self.stages.len()).then(|| ContextChain {
            input: Rc::clone(&self.input),
            stages: Rc::clone(&self.stages),
            index: self.index + 1,
        })
    }

    /// True when the current stage is the last (executable) one
    pub fn is_executable(&self) -> bool {
        self.index + 1 == self.stages.len()
    }

    pub fn remaining(&self) -> usize {
        self.stages.len() - self.index
    }
}

impl<S: ExecutionSource> Clone for ContextChain<S> {
    fn clone(&self) -> Self {
        ContextChain {
            input: Rc::clone(&self.input),
            stages: Rc::clone(&self.stages),
            index: self.index,
        }
    }
}

impl<S: ExecutionSource> fmt::Debug for ContextChain<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextChain")
            .field("input", &self.input)
            .field("index", &self.index)
            .field("stages", &self.stages.len())
            .finish()
    }
}

/* ===================== Builder ===================== */

/// Assembles a chain stage by stage
///
/// ```ignore
/// let chain = ChainBuilder::new("execute as @a run say hi")
///     .fork(|s| Ok(s.everyone()))
///     .executes(|s| s.say("hi"));
/// ```
pub struct ChainBuilder<S: ExecutionSource> {
    input: String,
    stages: Vec<Stage<S>>,
}

impl<S: ExecutionSource> ChainBuilder<S> {
    pub fn new(input: impl Into<String>) -> Self {
        ChainBuilder {
            input: input.into(),
            stages: Vec::new(),
        }
    }

    fn modifier(mut self, action: StageAction<S>, modifiers: ChainModifiers) -> Self {
        self.stages.push(Stage { action, modifiers });
        self
    }

    fn finish(mut self, action: StageAction<S>) -> ContextChain<S> {
        self.stages.push(Stage {
            action,
            modifiers: ChainModifiers::DEFAULT,
        });
        ContextChain {
            input: Rc::from(self.input),
            stages: Rc::from(self.stages),
            index: 0,
        }
    }

    /// A single-source-in, any-number-out stage
    pub fn redirect(self, f: impl Fn(&S) -> Result<Vec<S>, CommandError> + 'static) -> Self {
        self.modifier(StageAction::Redirect(Rc::new(f)), ChainModifiers::DEFAULT)
    }

    /// Like `redirect`, but errors in one branch do not stop the others
    pub fn fork(self, f: impl Fn(&S) -> Result<Vec<S>, CommandError> + 'static) -> Self {
        self.modifier(
            StageAction::Redirect(Rc::new(f)),
            ChainModifiers::DEFAULT.set_forked(),
        )
    }

    pub fn custom_modifier(self, modifier: impl CustomModifier<S> + 'static) -> Self {
        self.modifier(
            StageAction::CustomModify(Rc::new(modifier)),
            ChainModifiers::DEFAULT,
        )
    }

    /// Marks the rest of the line as the return value of the enclosing frame
    pub fn return_run(self) -> Self {
        self.modifier(
            StageAction::Redirect(Rc::new(|s: &S| Ok(vec![s.clone()]))),
            ChainModifiers::DEFAULT.set_return(),
        )
    }

    pub fn executes(self, f: impl Fn(&S) -> Result<i32, CommandError> + 'static) -> ContextChain<S> {
        self.finish(StageAction::Execute(Rc::new(f)))
    }

    pub fn custom(self, executor: impl CustomExecutor<S> + 'static) -> ContextChain<S> {
        self.finish(StageAction::CustomExecute(Rc::new(executor)))
    }
}
