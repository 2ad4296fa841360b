use std::sync::Arc;
use std::thread::JoinHandle;

use log::{debug, error, warn};
use parking_lot::{Condvar, Mutex, MutexGuard};

use super::data::{BufferPool, PoolStats, ReadaheadQueue, Shared, SharedState};
use super::engine::Engine;
use super::state::{ThreadState, Transition};
use super::worker::{ReadaheadWorker, ThreadPriority};
use super::{CursorOptions, OpenError, VideoInfo, VideoSource};
use crate::{FrameBuffer, Window};

/// A time-indexed cursor over a decoded video stream.
///
/// Set the playback time with [`set_time`], then ask for the frame at that time
/// with [`fetch_buffer`]. Neither call ever waits for the decoder: when the
/// frame is not ready yet, `fetch_buffer` returns `None` and a background
/// worker (if one is running) starts decoding towards it. Poll again on the
/// next cycle.
///
/// [`set_time`]: DecodeCursor::set_time
/// [`fetch_buffer`]: DecodeCursor::fetch_buffer
pub struct DecodeCursor<S: VideoSource> {
    shared: Arc<Shared<S>>,
    worker: Option<JoinHandle<()>>,

    info: VideoInfo,
    initial_dts: i64,
    current_frame: i64,
    last_window: Option<Window>,

    thread_priority: ThreadPriority,
    show_stale_frames: bool,
}

impl<S: VideoSource> DecodeCursor<S> {
    /// Open a cursor over `source` and decode its first frame.
    ///
    /// If `opts.max_readahead_frames` is greater than zero, a readahead worker
    /// is started as well.
    pub fn open(source: S, opts: CursorOptions) -> Result<Self, OpenError<S::OpenError>> {
        let (engine, info) = Engine::open(source, &opts)?;
        let initial_dts = engine.initial_dts();

        let state = SharedState {
            status: ThreadState::Stopped,
            queue: ReadaheadQueue::new(opts.max_readahead_frames),
            pool: BufferPool::new(info.frame_bytes(), info.timebase),
            progress: engine.progress(),
            engine: Some(engine),
            name: info.name.clone(),
        };

        let mut cursor = Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                action: Condvar::new(),
            }),
            worker: None,
            info,
            initial_dts,
            current_frame: initial_dts,
            last_window: None,
            thread_priority: opts.thread_priority,
            show_stale_frames: opts.show_stale_frames,
        };

        if opts.max_readahead_frames > 0 {
            cursor.start_thread();
        }

        Ok(cursor)
    }

    /// Info about the opened video.
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// Set the playback time in seconds.
    ///
    /// Once the end of the stream is known, `loop_count` is the number of extra
    /// passes over the video to allow: with `0` every time past the end shows
    /// the last frame, with `n` the video repeats `n` more times before
    /// clamping.
    ///
    /// Returns `false` if the last buffer returned by [`fetch_buffer`] is still
    /// the right one for this time, in which case there is no need to fetch.
    ///
    /// [`fetch_buffer`]: DecodeCursor::fetch_buffer
    pub fn set_time(&mut self, timestamp: f64, loop_count: u32) -> bool {
        let progress = self.shared.state.lock().progress;
        if !progress.valid {
            return false;
        }

        let mut frame = (timestamp / self.info.timebase + 0.5).floor() as i64;

        if let Some(eof_frame) = progress.eof_frame {
            let period = eof_frame.saturating_add(1).max(1);
            let limit = period.saturating_mul(i64::from(loop_count) + 1);
            frame = if frame < limit {
                frame % period
            } else {
                eof_frame
            };
        }

        // Nothing exists before the first decodable frame.
        self.current_frame = frame.max(self.initial_dts);

        self.last_window
            .map_or(true, |window| !window.contains(self.current_frame))
    }

    /// The frame number the cursor was last set to.
    pub fn current_frame(&self) -> i64 {
        self.current_frame
    }

    /// Get the buffer for the current time, or `None` if it is not ready yet.
    ///
    /// Without a readahead worker this decodes synchronously and only returns
    /// `None` if no frame could be decoded. With a worker it never decodes;
    /// a miss asks the worker to seek and returns immediately.
    ///
    /// Pass the buffer back with [`release_buffer`] once it is no longer
    /// needed.
    ///
    /// [`release_buffer`]: DecodeCursor::release_buffer
    pub fn fetch_buffer(&mut self) -> Option<FrameBuffer> {
        let mut state = self.shared.state.lock();
        if !state.progress.valid {
            return None;
        }

        let buffer = if self.worker.is_some() {
            self.fetch_readahead(&mut state)
        } else {
            self.fetch_direct(&mut state)
        };

        if let Some(buffer) = &buffer {
            self.last_window = Some(buffer.window());
        }
        buffer
    }

    fn fetch_direct(&self, state: &mut MutexGuard<'_, SharedState<S>>) -> Option<FrameBuffer> {
        let state = &mut **state;
        let engine = state.engine.as_mut()?;

        engine.advance_to_frame(self.current_frame);
        state.progress = engine.progress();

        let mut buffer = state.pool.alloc();
        if engine.export_frame(&mut buffer) {
            Some(buffer)
        } else {
            state.pool.recycle(buffer);
            None
        }
    }

    fn fetch_readahead(&self, state: &mut MutexGuard<'_, SharedState<S>>) -> Option<FrameBuffer> {
        // No frames exist past the end, so the last one stands in for them.
        let target = match state.progress.eof_frame {
            Some(eof_frame) => self.current_frame.min(eof_frame),
            None => self.current_frame,
        };

        let mut frame = state.queue.pop_front();
        if frame.is_some() {
            // The queue has room again.
            self.shared.action.notify_one();
        }
        while let Some(buffer) = frame.take() {
            if buffer.end() <= target && !state.queue.is_empty() {
                debug!(
                    "{}: discarding frame {} (too old for {})",
                    state.name,
                    buffer.begin(),
                    target
                );
                state.recycle(buffer);
                frame = state.queue.pop_front();
            } else {
                frame = Some(buffer);
                break;
            }
        }

        let too_old = frame.as_ref().map_or(true, |buffer| buffer.end() <= target);
        let too_new = frame.as_ref().map_or(false, |buffer| buffer.begin() > target);

        if too_new {
            debug!(
                "{}: frame {} is too new for {}, seeking",
                state.name,
                frame.as_ref().map_or(target, |buffer| buffer.begin()),
                target
            );
            state.clear_all_frames();
        }

        // The worker idles in `Wait` until it has been given a target.
        if (too_old || too_new || state.status == ThreadState::Wait)
            && state.apply(Transition::Request(target))
        {
            self.shared.action.notify_one();
        }

        match frame {
            Some(buffer) if too_new || (too_old && !self.show_stale_frames) => {
                state.recycle(buffer);
                debug!("{}: no frame ready for {}", state.name, target);
                None
            }
            Some(buffer) => Some(buffer),
            None => {
                debug!("{}: no frame ready for {}", state.name, target);
                None
            }
        }
    }

    /// Return a buffer obtained from [`fetch_buffer`] so its memory can be reused.
    ///
    /// [`fetch_buffer`]: DecodeCursor::fetch_buffer
    pub fn release_buffer(&mut self, buffer: FrameBuffer) {
        self.shared.state.lock().recycle(buffer);
    }

    /// The maximum number of frames the worker decodes ahead of the consumer.
    pub fn max_readahead_frames(&self) -> usize {
        self.shared.state.lock().queue.max_frames()
    }

    /// Change how many frames may be decoded ahead. Zero stops the readahead
    /// worker, anything else starts it if it is not running.
    pub fn set_max_readahead_frames(&mut self, max_frames: usize) {
        {
            let mut state = self.shared.state.lock();
            if state.queue.max_frames() == max_frames {
                return;
            }
            state.set_max_frames(max_frames);
        }
        self.shared.action.notify_one();

        if max_frames == 0 {
            self.stop_thread();
        } else {
            self.start_thread();
        }
    }

    pub fn thread_priority(&self) -> ThreadPriority {
        self.thread_priority
    }

    /// Change the priority of the readahead worker. A running worker is
    /// stopped and started again with the new priority.
    pub fn set_thread_priority(&mut self, priority: ThreadPriority) {
        if self.thread_priority == priority {
            return;
        }
        self.thread_priority = priority;

        if self.is_thread_started() {
            self.stop_thread();
            self.start_thread();
        }
    }

    /// Start the readahead worker if it is not running.
    ///
    /// If the thread cannot be spawned, the cursor keeps decoding on the
    /// caller's thread.
    pub fn start_thread(&mut self) {
        if self.worker.is_some() {
            return;
        }

        {
            let mut state = self.shared.state.lock();
            if state.queue.max_frames() == 0 {
                debug!("{}: no readahead frames, not starting worker", state.name);
                return;
            }
            if !state.apply(Transition::Start) {
                return;
            }
        }

        match ReadaheadWorker::spawn(Arc::clone(&self.shared), self.thread_priority) {
            Ok(handle) => self.worker = Some(handle),
            Err(e) => {
                warn!(
                    "{}: could not spawn readahead worker, decoding on the caller's thread: {}",
                    self.info.name, e
                );
                // No thread ever saw the `Wait` state.
                self.shared.state.lock().status = ThreadState::Stopped;
            }
        }
    }

    /// Stop the readahead worker and wait for it to exit.
    ///
    /// Any decode step in progress runs to completion first. All queued
    /// frames are returned to the pool.
    pub fn stop_thread(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };

        self.shared.state.lock().apply(Transition::Stop);
        self.shared.action.notify_all();

        let panicked = handle.join().is_err();

        let mut state = self.shared.state.lock();
        if panicked {
            error!("{}: readahead worker panicked", self.info.name);
            state.status = ThreadState::Stopped;
            if state.engine.is_none() {
                state.progress.valid = false;
            }
        }
        state.clear_all_frames();
    }

    /// Whether a readahead worker is running.
    pub fn is_thread_started(&self) -> bool {
        self.worker.is_some()
    }

    pub fn thread_state(&self) -> ThreadState {
        self.shared.state.lock().status
    }

    /// The number of decoded frames waiting in the readahead queue.
    pub fn queued_frames(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.shared.state.lock().pool.stats()
    }

    /// The last frame of the stream, once the decoder has reached it.
    pub fn eof_frame(&self) -> Option<i64> {
        self.shared.state.lock().progress.eof_frame
    }

    /// The distance in frames below which a forward jump is decoded linearly
    /// instead of seeking. It only ever grows.
    pub fn min_forward_seek_distance(&self) -> i64 {
        self.shared.state.lock().progress.min_forward_seek
    }

    /// Whether the cursor can still produce frames. A cursor becomes invalid
    /// for good if its source could not be reopened after a reset.
    pub fn is_valid(&self) -> bool {
        self.shared.state.lock().progress.valid
    }
}

impl<S: VideoSource> Drop for DecodeCursor<S> {
    fn drop(&mut self) {
        self.stop_thread();
    }
}
