use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::error;
use parking_lot::MutexGuard;

use super::data::{Shared, SharedState};
use super::state::{ThreadState, Transition};
use super::VideoSource;

/// How eagerly a readahead worker competes with the consumer.
///
/// The priority is fixed when the worker is created. Changing it on a running
/// cursor stops the worker and starts a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadPriority {
    /// Yield the CPU after every decoded frame.
    Low,
    /// Hand the shared lock to a waiting consumer after every decoded frame.
    #[default]
    Normal,
    /// Keep decoding until the queue is full.
    High,
    /// Same as `High`.
    Urgent,
}

/// The background thread that decodes ahead of a cursor's consumer.
pub(crate) struct ReadaheadWorker<S: VideoSource> {
    shared: Arc<Shared<S>>,
    priority: ThreadPriority,
}

impl<S: VideoSource> ReadaheadWorker<S> {
    pub(crate) fn spawn(
        shared: Arc<Shared<S>>,
        priority: ThreadPriority,
    ) -> std::io::Result<JoinHandle<()>> {
        let worker = Self { shared, priority };

        thread::Builder::new()
            .name(String::from("vidcursor-readahead"))
            .spawn(move || worker.run())
    }

    fn run(self) {
        let shared = Arc::clone(&self.shared);
        let mut state = shared.state.lock();

        self.prime(&mut state);

        loop {
            if state.status == ThreadState::Shutdown {
                break;
            }

            if self.poll(&mut state) {
                match self.priority {
                    ThreadPriority::Low => MutexGuard::unlocked(&mut state, thread::yield_now),
                    ThreadPriority::Normal => MutexGuard::bump(&mut state),
                    ThreadPriority::High | ThreadPriority::Urgent => {}
                }
            } else {
                shared.action.wait(&mut state);
            }
        }

        state.apply(Transition::Exit);
    }

    /// Queue the frame the engine is holding so the first fetch after the
    /// worker starts does not miss.
    fn prime(&self, state: &mut MutexGuard<'_, SharedState<S>>) {
        let Some(mut engine) = state.engine.take() else {
            return;
        };
        let mut buffer = state.pool.alloc();

        let exported = MutexGuard::unlocked(state, || engine.export_frame(&mut buffer));

        state.check_in(engine);
        if exported {
            state.enqueue(buffer);
        } else {
            state.recycle(buffer);
        }
    }

    /// Do one unit of work for the current state. Returns `false` if there was
    /// nothing to do and the worker should sleep.
    fn poll(&self, state: &mut MutexGuard<'_, SharedState<S>>) -> bool {
        match state.status {
            ThreadState::Wait | ThreadState::Shutdown => false,
            ThreadState::Readahead => self.read_ahead(state),
            ThreadState::Seek { frame } => {
                self.seek_to(state, frame);
                true
            }
            ThreadState::Stopped | ThreadState::Seeking => {
                error!(
                    "{}: readahead worker polled in state {:?}",
                    state.name, state.status
                );
                false
            }
        }
    }

    fn read_ahead(&self, state: &mut MutexGuard<'_, SharedState<S>>) -> bool {
        if !state.queue.has_room() {
            return false;
        }
        let Some(mut engine) = state.engine.take() else {
            return false;
        };
        if !engine.is_valid() || engine.at_eof() {
            state.engine = Some(engine);
            return false;
        }

        let mut buffer = state.pool.alloc();

        let exported = MutexGuard::unlocked(state, || {
            engine.decode_next() && engine.export_frame(&mut buffer)
        });

        state.check_in(engine);

        // The consumer may have asked for a different frame in the meantime.
        if exported && state.status == ThreadState::Readahead {
            state.enqueue(buffer);
        } else {
            state.recycle(buffer);
        }

        true
    }

    fn seek_to(&self, state: &mut MutexGuard<'_, SharedState<S>>, frame: i64) {
        state.apply(Transition::Claim);

        let Some(mut engine) = state.engine.take() else {
            state.apply(Transition::Complete);
            return;
        };
        let mut buffer = state.pool.alloc();

        let exported = MutexGuard::unlocked(state, || {
            engine.advance_to_frame(frame);
            engine.export_frame(&mut buffer)
        });

        state.check_in(engine);
        state.clear_all_frames();
        if exported {
            state.enqueue(buffer);
        } else {
            state.recycle(buffer);
        }

        // A stop request that arrived while seeking wins.
        if state.status == ThreadState::Seeking {
            state.apply(Transition::Complete);
        }
    }
}
