mod cursor;
mod frame_buffer;
mod lock;

pub mod synthetic;


pub use cursor::{
    error, CursorOptions, DecodeCursor, Decoder, FrameConverter, OpenError, OpenedStream, Packet,
    PacketSource, PoolStats, ThreadPriority, ThreadState, VideoInfo, VideoSource,
    DEFAULT_MIN_FORWARD_SEEK_SECONDS,
};
pub use frame_buffer::{FrameBuffer, Window};
pub use lock::LibraryLock;
