use std::collections::VecDeque;

use log::trace;
use parking_lot::{Condvar, Mutex};

use super::engine::{Engine, EngineProgress};
use super::state::{ThreadState, Transition};
use super::VideoSource;
use crate::FrameBuffer;

/// Allocation statistics of a cursor's buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Buffers waiting in the free list.
    pub available: usize,
    /// Buffers allocated over the lifetime of the cursor.
    pub total_allocated: usize,
    /// Allocations that were served from the free list.
    pub total_recycled: usize,
}

/// Free list of output buffers sized to the video's converted frames.
pub(crate) struct BufferPool {
    free: Vec<FrameBuffer>,
    frame_bytes: usize,
    timebase: f64,
    total_allocated: usize,
    total_recycled: usize,
}

impl BufferPool {
    pub(crate) fn new(frame_bytes: usize, timebase: f64) -> Self {
        Self {
            free: Vec::new(),
            frame_bytes,
            timebase,
            total_allocated: 0,
            total_recycled: 0,
        }
    }

    pub(crate) fn alloc(&mut self) -> FrameBuffer {
        if let Some(buffer) = self.free.pop() {
            self.total_recycled += 1;
            buffer
        } else {
            // No buffers in the pool. Create a new one.
            self.total_allocated += 1;
            FrameBuffer::new(self.frame_bytes, self.timebase)
        }
    }

    pub(crate) fn recycle(&mut self, buffer: FrameBuffer) {
        // Buffers handed back by a consumer might not be ours.
        if buffer.byte_len() == self.frame_bytes {
            self.free.push(buffer);
        }
    }

    pub(crate) fn stats(&self) -> PoolStats {
        PoolStats {
            available: self.free.len(),
            total_allocated: self.total_allocated,
            total_recycled: self.total_recycled,
        }
    }
}

/// Bounded queue of decoded-ahead buffers, ordered by window start.
pub(crate) struct ReadaheadQueue {
    frames: VecDeque<FrameBuffer>,
    max_frames: usize,
}

impl ReadaheadQueue {
    pub(crate) fn new(max_frames: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(max_frames),
            max_frames,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub(crate) fn has_room(&self) -> bool {
        self.frames.len() < self.max_frames
    }

    pub(crate) fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Change the bound, returning the buffers that no longer fit to the pool.
    pub(crate) fn set_max_frames(&mut self, max_frames: usize, pool: &mut BufferPool) {
        self.max_frames = max_frames;
        while self.frames.len() > max_frames {
            if let Some(buffer) = self.frames.pop_back() {
                pool.recycle(buffer);
            }
        }
    }

    /// Append a buffer. A buffer that would overflow the queue or break the
    /// ordering goes back to the pool instead.
    pub(crate) fn push(&mut self, buffer: FrameBuffer, pool: &mut BufferPool) {
        let in_order = self
            .frames
            .back()
            .map_or(true, |last| last.begin() <= buffer.begin());

        if self.has_room() && in_order {
            self.frames.push_back(buffer);
        } else {
            pool.recycle(buffer);
        }
    }

    pub(crate) fn pop_front(&mut self) -> Option<FrameBuffer> {
        self.frames.pop_front()
    }

    /// Empty the queue into the pool.
    pub(crate) fn clear(&mut self, pool: &mut BufferPool) {
        for buffer in self.frames.drain(..) {
            pool.recycle(buffer);
        }
    }
}

/// Everything the consumer and the worker share, guarded by one mutex.
pub(crate) struct SharedState<S: VideoSource> {
    pub status: ThreadState,
    pub queue: ReadaheadQueue,
    pub pool: BufferPool,
    /// `None` while the worker has the engine checked out for decoding.
    pub engine: Option<Engine<S>>,
    pub progress: EngineProgress,
    pub name: String,
}

impl<S: VideoSource> SharedState<S> {
    /// Apply `transition` to the worker state. Returns `false` (and leaves the
    /// state alone) if the transition is not allowed.
    pub fn apply(&mut self, transition: Transition) -> bool {
        match self.status.next(transition) {
            Some(next) => {
                self.status = next;
                true
            }
            None => {
                trace!(
                    "{}: ignoring {:?} in state {:?}",
                    self.name,
                    transition,
                    self.status
                );
                false
            }
        }
    }

    /// Return the engine after decoding and publish its progress.
    pub fn check_in(&mut self, engine: Engine<S>) {
        self.progress = engine.progress();
        self.engine = Some(engine);
    }

    pub fn enqueue(&mut self, buffer: FrameBuffer) {
        self.queue.push(buffer, &mut self.pool);
    }

    pub fn recycle(&mut self, buffer: FrameBuffer) {
        self.pool.recycle(buffer);
    }

    pub fn clear_all_frames(&mut self) {
        self.queue.clear(&mut self.pool);
    }

    pub fn set_max_frames(&mut self, max_frames: usize) {
        self.queue.set_max_frames(max_frames, &mut self.pool);
    }
}

pub(crate) struct Shared<S: VideoSource> {
    pub state: Mutex<SharedState<S>>,
    /// Signalled whenever the target changes, the queue gains room or the
    /// worker should shut down.
    pub action: Condvar,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Window;

    fn framed(pool: &mut BufferPool, begin: i64) -> FrameBuffer {
        let mut buffer = pool.alloc();
        buffer.window = Window::new(begin, begin + 1);
        buffer
    }

    #[test]
    fn pool_reuses_recycled_buffers() {
        let mut pool = BufferPool::new(12, 1.0);

        let a = pool.alloc();
        let b = pool.alloc();
        assert_eq!(a.pixels().len(), 12);
        pool.recycle(a);
        pool.recycle(b);
        let _c = pool.alloc();

        assert_eq!(
            pool.stats(),
            PoolStats {
                available: 1,
                total_allocated: 2,
                total_recycled: 1,
            }
        );
    }

    #[test]
    fn pool_rejects_foreign_buffers() {
        let mut pool = BufferPool::new(12, 1.0);
        pool.recycle(FrameBuffer::new(8, 1.0));
        assert_eq!(pool.stats().available, 0);
    }

    #[test]
    fn queue_is_bounded_and_ordered() {
        let mut pool = BufferPool::new(4, 1.0);
        let mut queue = ReadaheadQueue::new(2);

        let first = framed(&mut pool, 5);
        queue.push(first, &mut pool);
        let stale = framed(&mut pool, 3);
        queue.push(stale, &mut pool);
        assert_eq!(queue.len(), 1);

        let second = framed(&mut pool, 6);
        queue.push(second, &mut pool);
        let overflow = framed(&mut pool, 7);
        queue.push(overflow, &mut pool);
        assert_eq!(queue.len(), 2);
        assert!(!queue.has_room());
        assert_eq!(pool.stats().available, 2);

        assert_eq!(queue.pop_front().map(|b| b.begin()), Some(5));
        assert_eq!(queue.pop_front().map(|b| b.begin()), Some(6));
        assert!(queue.is_empty());
    }

    #[test]
    fn shrinking_recycles_the_tail() {
        let mut pool = BufferPool::new(4, 1.0);
        let mut queue = ReadaheadQueue::new(4);
        for begin in 0..4 {
            let buffer = framed(&mut pool, begin);
            queue.push(buffer, &mut pool);
        }

        queue.set_max_frames(1, &mut pool);
        assert_eq!(queue.len(), 1);
        assert_eq!(pool.stats().available, 3);
        assert_eq!(queue.pop_front().map(|b| b.begin()), Some(0));

        queue.clear(&mut pool);
        assert_eq!(queue.len(), 0);
    }
}
