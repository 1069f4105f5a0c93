//! Call frames

use std::cell::Cell;
use std::rc::Rc;

use super::callback::ResultCallback;

/// Decides which entries are dropped when a frame returns
///
/// Every task seeded into a context gets its own `seed`; a return only
/// discards entries of the same seed, so sibling seeds always run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameControl {
    seed: u64,
    discard_depth: usize,
}

impl FrameControl {
    /// Return discards everything at `depth` or deeper
    pub fn for_depth(depth: usize) -> Self {
        FrameControl {
            seed: 0,
            discard_depth: depth,
        }
    }

    /// The depth-0 control of seeded task `seed`
    pub fn for_seed(seed: u64) -> Self {
        FrameControl {
            seed,
            discard_depth: 0,
        }
    }

    /// Same seed, own boundary at `depth`
    pub fn nested(&self, depth: usize) -> Self {
        FrameControl {
            seed: self.seed,
            discard_depth: depth,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn discard_depth(&self) -> usize {
        self.discard_depth
    }

    /// Whether a return under this control drops work queued in `frame`
    pub fn covers(&self, frame: &Frame) -> bool {
        frame.control.seed == self.seed && frame.depth >= self.discard_depth
    }
}

/// One activation of a command line or function body
///
/// `last_result` holds the latest `(success, result)` reported at this
/// frame; it is what the frame returns when its body runs off the end.
#[derive(Debug, Clone)]
pub struct Frame {
    depth: usize,
    return_sink: ResultCallback,
    control: FrameControl,
    last_result: Rc<Cell<Option<(bool, i32)>>>,
}

impl Frame {
    pub fn new(depth: usize, return_sink: ResultCallback, control: FrameControl) -> Self {
        Frame {
            depth,
            return_sink,
            control,
            last_result: Rc::new(Cell::new(None)),
        }
    }

    /// Depth-0 frame of seeded task `seed`; its return discards that seed's work
    pub fn root(seed: u64, return_sink: ResultCallback) -> Self {
        Frame::new(0, return_sink, FrameControl::for_seed(seed))
    }

    /// A callee frame one level deeper
    pub fn child(&self, return_sink: ResultCallback, control: Option<FrameControl>) -> Self {
        let depth = self.depth + 1;
        Frame::new(
            depth,
            return_sink,
            control.unwrap_or_else(|| self.control.nested(depth)),
        )
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn return_value_consumer(&self) -> &ResultCallback {
        &self.return_sink
    }

    pub fn control(&self) -> FrameControl {
        self.control
    }

    pub fn record(&self, success: bool, result: i32) {
        self.last_result.set(Some((success, result)));
    }

    /// A callback that records into this frame's result slot
    pub fn result_recorder(&self) -> ResultCallback {
        let slot = Rc::clone(&self.last_result);
        ResultCallback::new(move |success, result| slot.set(Some((success, result))))
    }

    pub fn recorded(&self) -> Option<(bool, i32)> {
        self.last_result.get()
    }
}
