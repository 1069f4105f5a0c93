//! The continuation stack
//!
//! Pending work lives here instead of on the native call stack. Entries
//! are popped from the top; a frame that returns early removes every
//! entry at its depth or deeper from the top of the stack.

use std::fmt;

use super::frame::{Frame, FrameControl};
use super::source::ExecutionSource;
use super::tasks::Task;

/// A task together with the frame it runs in
pub struct Entry<S: ExecutionSource> {
    pub frame: Frame,
    pub task: Task<S>,
}

impl<S: ExecutionSource> Entry<S> {
    pub fn new(frame: Frame, task: Task<S>) -> Self {
        Entry { frame, task }
    }
}

impl<S: ExecutionSource> fmt::Debug for Entry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("depth", &self.frame.depth())
            .field("task", &self.task.kind())
            .finish()
    }
}

/// LIFO of pending entries
pub struct ContinuationStack<S: ExecutionSource> {
    entries: Vec<Entry<S>>,
}

impl<S: ExecutionSource> ContinuationStack<S> {
    pub fn new() -> Self {
        ContinuationStack {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: Entry<S>) {
        self.entries.push(entry);
    }

    pub fn pop(&mut self) -> Option<Entry<S>> {
        self.entries.pop()
    }

    pub fn peek(&self) -> Option<&Entry<S>> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries from the top while `control` covers them
    ///
    /// Returns how many entries were removed.
    pub fn discard(&mut self, control: FrameControl) -> usize {
        let mut removed = 0;
        while self
            .entries
            .last()
            .is_some_and(|entry| control.covers(&entry.frame))
        {
            self.entries.pop();
            removed += 1;
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<S: ExecutionSource> Default for ContinuationStack<S> {
    fn default() -> Self {
        Self::new()
    }
}
