//! Result callbacks
//!
//! A `ResultCallback` is a sink for `(success, result)` pairs. Callbacks
//! compose with `chain`; the empty callback is a real value so that the
//! "no consumer" case can be detected by the call-site policies.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Sink for the `(success, result)` pair produced by a command or function
#[derive(Clone, Default)]
pub struct ResultCallback(Option<Rc<dyn Fn(bool, i32)>>);

impl ResultCallback {
    pub fn empty() -> Self {
        ResultCallback(None)
    }

    pub fn new(f: impl Fn(bool, i32) + 'static) -> Self {
        ResultCallback(Some(Rc::new(f)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn on_result(&self, success: bool, result: i32) {
        if let Some(f) = &self.0 {
            f(success, result);
        }
    }

    pub fn on_success(&self, result: i32) {
        self.on_result(true, result);
    }

    pub fn on_failure(&self) {
        self.on_result(false, 0);
    }

    /// Compose two callbacks: `first` sees every result before `second`
    ///
    /// Chaining with an empty callback returns the other side unchanged, so
    /// composition is associative and empty is its identity.
    pub fn chain(first: &ResultCallback, second: &ResultCallback) -> ResultCallback {
        match (&first.0, &second.0) {
            (None, _) => second.clone(),
            (_, None) => first.clone(),
            (Some(a), Some(b)) => {
                let (a, b) = (Rc::clone(a), Rc::clone(b));
                ResultCallback::new(move |success, result| {
                    a(success, result);
                    b(success, result);
                })
            }
        }
    }

    pub fn then(&self, next: &ResultCallback) -> ResultCallback {
        ResultCallback::chain(self, next)
    }
}

impl fmt::Debug for ResultCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("ResultCallback(empty)")
        } else {
            f.write_str("ResultCallback(..)")
        }
    }
}

/* ===================== Accumulation ===================== */

/// Collects results from several calls and delivers one combined result
///
/// Success is the OR of all reported successes, the result is the wrapping
/// sum of all reported results.
#[derive(Debug, Clone, Default)]
pub struct ResultAccumulator {
    state: Rc<AccumulatorState>,
}

#[derive(Debug, Default)]
struct AccumulatorState {
    any_result: Cell<bool>,
    any_success: Cell<bool>,
    sum: Cell<i32>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that feeds this accumulator
    pub fn callback(&self) -> ResultCallback {
        let state = Rc::clone(&self.state);
        ResultCallback::new(move |success, result| {
            state.any_result.set(true);
            if success {
                state.any_success.set(true);
            }
            state.sum.set(state.sum.get().wrapping_add(result));
        })
    }

    /// The combined result, or `None` if nothing was reported
    pub fn result(&self) -> Option<(bool, i32)> {
        self.state
            .any_result
            .get()
            .then(|| (self.state.any_success.get(), self.state.sum.get()))
    }

    /// Deliver the combined result to `target` if anything was reported
    pub fn deliver(&self, target: &ResultCallback) {
        if let Some((success, result)) = self.result() {
            target.on_result(success, result);
        }
    }
}
