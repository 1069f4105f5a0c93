//! The source context a command executes under

use super::callback::ResultCallback;
use super::error::CommandError;

/// Who, where, and with-what a command runs
///
/// Implementations are immutable values: every transform returns a new
/// source and never touches one that another branch may still hold.
pub trait ExecutionSource: Clone + 'static {
    /// The callback that receives this source's command results
    fn callback(&self) -> ResultCallback;

    fn with_callback(&self, callback: ResultCallback) -> Self;

    fn clear_callbacks(&self) -> Self {
        self.with_callback(ResultCallback::empty())
    }

    /// Run `callback` after the current one
    fn chain_callback(&self, callback: &ResultCallback) -> Self {
        self.with_callback(ResultCallback::chain(&self.callback(), callback))
    }

    /// Silent sources produce no feedback output
    fn is_silent(&self) -> bool;

    /// Error sink for failures raised while this source was executing
    fn handle_error(&self, error: &CommandError, forked: bool);

    /// Feedback hook for a function finishing on behalf of this source
    fn report_function_result(&self, _id: &str, _success: bool, _result: i32) {}
}
