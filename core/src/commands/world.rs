//! Minimal game state the reference commands act on

use std::cell::RefCell;
use std::collections::BTreeMap;

use serde::Serialize;

/// A line of chat or command feedback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsoleLine {
    pub sender: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportedError {
    pub sender: String,
    pub message: String,
    pub forked: bool,
}

/// Scoreboard, console and error log shared by every source in a run
#[derive(Debug, Default)]
pub struct World {
    scores: RefCell<BTreeMap<(String, String), i32>>,
    console: RefCell<Vec<ConsoleLine>>,
    errors: RefCell<Vec<ReportedError>>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&self, holder: &str, objective: &str) -> Option<i32> {
        self.scores
            .borrow()
            .get(&(holder.to_string(), objective.to_string()))
            .copied()
    }

    pub fn set_score(&self, holder: &str, objective: &str, value: i32) {
        self.scores
            .borrow_mut()
            .insert((holder.to_string(), objective.to_string()), value);
    }

    /// Add to a score (unset counts as 0) and return the new value
    pub fn add_score(&self, holder: &str, objective: &str, amount: i32) -> i32 {
        let mut scores = self.scores.borrow_mut();
        let entry = scores
            .entry((holder.to_string(), objective.to_string()))
            .or_insert(0);
        *entry = entry.wrapping_add(amount);
        *entry
    }

    pub fn scores(&self) -> Vec<(String, String, i32)> {
        self.scores
            .borrow()
            .iter()
            .map(|((holder, objective), value)| (holder.clone(), objective.clone(), *value))
            .collect()
    }

    pub fn print(&self, sender: &str, text: impl Into<String>) {
        self.console.borrow_mut().push(ConsoleLine {
            sender: sender.to_string(),
            text: text.into(),
        });
    }

    pub fn console(&self) -> Vec<ConsoleLine> {
        self.console.borrow().clone()
    }

    pub fn report_error(&self, sender: &str, message: String, forked: bool) {
        self.errors.borrow_mut().push(ReportedError {
            sender: sender.to_string(),
            message,
            forked,
        });
    }

    pub fn errors(&self) -> Vec<ReportedError> {
        self.errors.borrow().clone()
    }
}
