use std::error::Error;

/// A compressed packet read from a container.
#[derive(Debug, Clone)]
pub struct Packet<P> {
    /// The decode timestamp of this packet, in stream frame units.
    pub frame: i64,
    /// The compressed data.
    pub payload: P,
}

/// Info about an opened video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    /// A short human-readable name used in log messages (usually the file name).
    pub name: String,
    /// The width of a converted frame in pixels.
    pub width: usize,
    /// The height of a converted frame in pixels.
    pub height: usize,
    /// The number of bytes per pixel in a converted frame.
    pub num_components: usize,
    /// The duration of one stream frame unit in seconds.
    pub timebase: f64,
    /// The length of the video in seconds (if the container knows it).
    pub length: Option<f64>,
}

impl VideoInfo {
    /// The number of bytes in one converted frame.
    pub fn frame_bytes(&self) -> usize {
        self.width * self.height * self.num_components
    }
}

/// Sequential reader of timestamped packets from a container.
pub trait PacketSource: Send + 'static {
    type Payload: Send + 'static;

    /// Read the next packet of the video stream, or `None` once the end of the
    /// stream has been reached.
    fn next_packet(&mut self) -> Option<Packet<Self::Payload>>;

    /// Reposition the reader near `target_frame`.
    ///
    /// The landing position is only approximate: containers land on keyframes,
    /// which may lie before (or, for forward seeks, after) the target. Returns
    /// `false` if the container could not seek at all.
    fn seek(&mut self, target_frame: i64, prefer_backward: bool) -> bool;
}

/// A stateful codec. It may need several packets before it produces a frame.
pub trait Decoder: Send + 'static {
    type Payload;
    type Frame: Send + 'static;

    /// Feed one packet to the codec, returning a decoded frame if one became
    /// available.
    fn submit(&mut self, packet: &Packet<Self::Payload>) -> Option<Self::Frame>;

    /// Discard any frames the codec is holding. Called after every container seek.
    fn flush(&mut self) {}
}

/// Converts decoded frames into the cursor's fixed pixel layout.
pub trait FrameConverter: Send + 'static {
    type Frame;

    /// Write `frame` into `pixels`, which is exactly
    /// `width * height * num_components` bytes long.
    fn convert(&mut self, frame: &Self::Frame, pixels: &mut [u8]);
}

/// An opened container plus the codec that decodes it.
pub struct OpenedStream<P, D> {
    pub packets: P,
    pub decoder: D,
    pub info: VideoInfo,
}

/// A descriptor of a video that can be opened (and re-opened) by a cursor.
pub trait VideoSource: Sized + Send + 'static {
    type Packets: PacketSource;
    type Decoder: Decoder<Payload = <Self::Packets as PacketSource>::Payload>;
    type Converter: FrameConverter<Frame = <Self::Decoder as Decoder>::Frame>;
    type OpenError: Error + Send + 'static;

    const DEFAULT_MAX_READAHEAD_FRAMES: usize;
    /// Whether separate cursors may call into the backend concurrently. If this
    /// is `false`, cursors share the process-wide [`LibraryLock`] by default.
    ///
    /// [`LibraryLock`]: crate::LibraryLock
    const THREAD_SAFE: bool;

    /// Open the stream from the beginning.
    ///
    /// This is called once when the cursor is created and again every time the
    /// cursor needs to reset the stream.
    fn open(&mut self) -> Result<OpenedStream<Self::Packets, Self::Decoder>, Self::OpenError>;

    /// Create the pixel converter. Called once, right after the first
    /// successful `open`.
    fn converter(&mut self, info: &VideoInfo) -> Result<Self::Converter, Self::OpenError>;
}

pub(crate) type PayloadOf<S> = <<S as VideoSource>::Packets as PacketSource>::Payload;
pub(crate) type FrameOf<S> = <<S as VideoSource>::Decoder as Decoder>::Frame;
