use std::cmp::Ordering;

/// The half-open range of stream frames `[begin, end)` for which a decoded
/// frame is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub begin: i64,
    pub end: i64,
}

impl Window {
    pub fn new(begin: i64, end: i64) -> Self {
        debug_assert!(begin <= end, "window [{}, {}) is inverted", begin, end);
        Self { begin, end }
    }

    /// Whether `frame` is the current frame of this window.
    pub fn contains(&self, frame: i64) -> bool {
        self.begin <= frame && frame < self.end
    }
}

/// A block of converted pixels together with the window it was exported for.
pub struct FrameBuffer {
    pixels: Vec<u8>,
    pub(crate) window: Window,
    timebase: f64,
}

impl FrameBuffer {
    pub(crate) fn new(num_bytes: usize, timebase: f64) -> Self {
        FrameBuffer {
            pixels: vec![0; num_bytes],
            window: Window::default(),
            timebase,
        }
    }

    /// The converted pixels, `width * height * num_components` bytes, rows top to bottom.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn begin(&self) -> i64 {
        self.window.begin
    }

    pub fn end(&self) -> i64 {
        self.window.end
    }

    /// The time in seconds nearest to the middle of this buffer's window.
    ///
    /// Setting a cursor to this time should return this buffer again.
    pub fn timestamp(&self) -> f64 {
        let mid_frame = (self.window.begin + self.window.end - 1) / 2;
        mid_frame as f64 * self.timebase
    }

    /// Orders two buffers by the time ranges they cover. The buffers may come
    /// from different cursors with different timebases.
    ///
    /// Returns `Equal` if the two buffers show the same moment of the video.
    pub fn compare_timestamp(&self, other: &FrameBuffer) -> Ordering {
        let begin = self.window.begin as f64 * self.timebase;
        let end = self.window.end as f64 * self.timebase;
        let other_begin = other.window.begin as f64 * other.timebase;
        let other_end = other.window.end as f64 * other.timebase;

        if end <= other_begin {
            Ordering::Less
        } else if begin >= other_end {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    pub(crate) fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("window", &self.window)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}
