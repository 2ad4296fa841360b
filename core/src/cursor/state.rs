/// The state of a cursor's readahead worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadState {
    /// No worker is running.
    #[default]
    Stopped,
    /// The worker is running but has not been given a target yet.
    Wait,
    /// The worker is decoding ahead of the consumer.
    Readahead,
    /// The consumer asked for `frame`; the worker has not picked it up yet.
    Seek { frame: i64 },
    /// The worker is moving the decoder to a new position.
    Seeking,
    /// The worker has been told to exit.
    Shutdown,
}

/// An event that moves the worker from one state to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    /// `start_thread` spawned a worker.
    Start,
    /// The consumer wants the frame at this position.
    Request(i64),
    /// The worker takes ownership of the pending target.
    Claim,
    /// The worker finished landing on the claimed target.
    Complete,
    /// `stop_thread` was called.
    Stop,
    /// The worker left its loop.
    Exit,
}

impl ThreadState {
    /// Returns the state after `transition`, or `None` if the transition is not
    /// allowed from this state.
    pub(crate) fn next(self, transition: Transition) -> Option<ThreadState> {
        use ThreadState::*;
        use Transition::*;

        match (self, transition) {
            (Stopped, Start) => Some(Wait),
            (Wait | Readahead | Seek { .. }, Request(frame)) => Some(Seek { frame }),
            (Seek { .. }, Claim) => Some(Seeking),
            (Seeking, Complete) => Some(Readahead),
            (Wait | Readahead | Seek { .. } | Seeking, Stop) => Some(Shutdown),
            (Shutdown, Exit) => Some(Stopped),
            _ => None,
        }
    }

    /// Whether a worker thread exists in this state.
    pub fn is_running(&self) -> bool {
        !matches!(self, ThreadState::Stopped)
    }

    /// Whether a worker currently owns the decoder or is about to.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            ThreadState::Readahead | ThreadState::Seek { .. } | ThreadState::Seeking
        )
    }
}
