mod data;
mod decode_cursor;
mod engine;
mod source;
mod state;
mod worker;

pub mod error;

pub use data::PoolStats;
pub use decode_cursor::DecodeCursor;
pub use error::OpenError;
pub use source::{Decoder, FrameConverter, OpenedStream, Packet, PacketSource, VideoInfo, VideoSource};
pub use state::ThreadState;
pub use worker::ThreadPriority;

use crate::LibraryLock;

/// The default distance in seconds below which a forward jump is decoded
/// linearly rather than seeking.
pub const DEFAULT_MIN_FORWARD_SEEK_SECONDS: f64 = 3.0;

/// Options for a [`DecodeCursor`].
#[derive(Debug, Clone)]
pub struct CursorOptions {
    /// The maximum number of frames decoded ahead of the consumer. Anything
    /// above zero starts a readahead worker when the cursor is opened.
    pub max_readahead_frames: usize,

    /// The priority of the readahead worker.
    pub thread_priority: ThreadPriority,

    /// While a seek is pending, return the newest frame that is too old for
    /// the requested time instead of nothing.
    ///
    /// This avoids visible freezes during playback at the cost of briefly
    /// showing the wrong frame.
    ///
    /// By default this is set to `false`.
    pub show_stale_frames: bool,

    /// Whether the container may be asked to seek at all. When `false`,
    /// backward jumps reopen the stream and forward jumps decode linearly.
    ///
    /// By default this is set to `true`.
    pub support_seek: bool,

    /// The lock held around every call into the backend. `None` if the
    /// backend is safe to call from several cursors at once.
    pub library_lock: Option<LibraryLock>,

    /// The initial minimum forward seek distance, in seconds.
    ///
    /// By default this is set to `3.0`.
    pub min_forward_seek_seconds: f64,
}

impl CursorOptions {
    /// The default options for cursors over `S`.
    pub fn for_source<S: VideoSource>() -> Self {
        Self {
            max_readahead_frames: S::DEFAULT_MAX_READAHEAD_FRAMES,
            thread_priority: ThreadPriority::default(),
            show_stale_frames: false,
            support_seek: true,
            library_lock: if S::THREAD_SAFE {
                None
            } else {
                Some(LibraryLock::global())
            },
            min_forward_seek_seconds: DEFAULT_MIN_FORWARD_SEEK_SECONDS,
        }
    }
}
