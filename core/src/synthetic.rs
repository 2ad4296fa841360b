//! A deterministic in-memory video source.
//!
//! Every frame is its own packet. Converting a frame fills the buffer with
//! `frame % 256`, which makes it easy to check which frame a buffer holds.

use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::{Decoder, FrameConverter, OpenedStream, Packet, PacketSource, VideoInfo, VideoSource};

/// How the container answers seek requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekBehavior {
    /// Land on the last keyframe at or before the target. Seeking before the
    /// first frame fails.
    #[default]
    Keyframe,
    /// Every seek fails.
    Fail,
}

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// The number of frames in the stream.
    pub num_frames: i64,
    /// The timestamp of the first packet.
    pub first_frame: i64,
    /// The distance between keyframes, counted from `first_frame`.
    pub keyframe_interval: i64,
    pub seek_behavior: SeekBehavior,
    pub width: usize,
    pub height: usize,
    pub num_components: usize,
    pub timebase: f64,
    /// Sleep this long in every decode call.
    pub decode_delay: Option<Duration>,
    /// The number of packets the decoder swallows after it is opened or
    /// flushed before it produces frames again.
    pub decoder_latency: usize,
    /// Fail every `open` after this many have succeeded.
    pub max_opens: Option<usize>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            num_frames: 100,
            first_frame: 0,
            keyframe_interval: 1,
            seek_behavior: SeekBehavior::Keyframe,
            width: 4,
            height: 2,
            num_components: 3,
            timebase: 1.0,
            decode_delay: None,
            decoder_latency: 0,
            max_opens: None,
        }
    }
}

/// Counters shared by a source and every stream it opens.
#[derive(Debug, Default)]
pub struct SyntheticStats {
    opens: AtomicUsize,
    decodes: AtomicUsize,
    seeks: AtomicUsize,
}

impl SyntheticStats {
    /// Successful calls to `open`.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }

    /// Packets submitted to a decoder.
    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::Relaxed)
    }

    /// Container seeks attempted, successful or not.
    pub fn seeks(&self) -> usize {
        self.seeks.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub enum SyntheticError {
    /// `max_opens` streams have already been opened.
    OpenBudgetExhausted { opens: usize },
}

impl Error for SyntheticError {}

impl std::fmt::Display for SyntheticError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyntheticError::OpenBudgetExhausted { opens } => {
                write!(f, "Synthetic source refused to open again after {} opens", opens)
            }
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    stats: Arc<SyntheticStats>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            stats: Arc::new(SyntheticStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SyntheticStats> {
        Arc::clone(&self.stats)
    }
}

impl VideoSource for SyntheticSource {
    type Packets = SyntheticPackets;
    type Decoder = SyntheticDecoder;
    type Converter = SyntheticConverter;
    type OpenError = SyntheticError;

    const DEFAULT_MAX_READAHEAD_FRAMES: usize = 0;
    const THREAD_SAFE: bool = true;

    fn open(&mut self) -> Result<OpenedStream<SyntheticPackets, SyntheticDecoder>, SyntheticError> {
        let opens = self.stats.opens();
        if self.config.max_opens.map_or(false, |max| opens >= max) {
            return Err(SyntheticError::OpenBudgetExhausted { opens });
        }
        self.stats.opens.fetch_add(1, Ordering::Relaxed);

        let config = &self.config;
        Ok(OpenedStream {
            packets: SyntheticPackets {
                next_frame: config.first_frame,
                first_frame: config.first_frame,
                end_frame: config.first_frame + config.num_frames,
                keyframe_interval: config.keyframe_interval.max(1),
                seek_behavior: config.seek_behavior,
                stats: Arc::clone(&self.stats),
            },
            decoder: SyntheticDecoder {
                delay: config.decode_delay,
                latency: config.decoder_latency,
                warming_up: config.decoder_latency,
                stats: Arc::clone(&self.stats),
            },
            info: VideoInfo {
                name: String::from("synthetic"),
                width: config.width,
                height: config.height,
                num_components: config.num_components,
                timebase: config.timebase,
                length: Some(config.num_frames as f64 * config.timebase),
            },
        })
    }

    fn converter(&mut self, _info: &VideoInfo) -> Result<SyntheticConverter, SyntheticError> {
        Ok(SyntheticConverter)
    }
}

pub struct SyntheticPackets {
    next_frame: i64,
    first_frame: i64,
    end_frame: i64,
    keyframe_interval: i64,
    seek_behavior: SeekBehavior,
    stats: Arc<SyntheticStats>,
}

impl PacketSource for SyntheticPackets {
    type Payload = i64;

    fn next_packet(&mut self) -> Option<Packet<i64>> {
        if self.next_frame >= self.end_frame {
            return None;
        }
        let frame = self.next_frame;
        self.next_frame += 1;

        Some(Packet {
            frame,
            payload: frame,
        })
    }

    fn seek(&mut self, target_frame: i64, _prefer_backward: bool) -> bool {
        self.stats.seeks.fetch_add(1, Ordering::Relaxed);

        if self.seek_behavior == SeekBehavior::Fail
            || target_frame < self.first_frame
            || self.end_frame <= self.first_frame
        {
            return false;
        }

        let target = target_frame.min(self.end_frame - 1);
        let offset = target - self.first_frame;
        self.next_frame = self.first_frame + offset - offset % self.keyframe_interval;
        true
    }
}

pub struct SyntheticDecoder {
    delay: Option<Duration>,
    latency: usize,
    /// Packets left to swallow before the next frame comes out.
    warming_up: usize,
    stats: Arc<SyntheticStats>,
}

/// A decoded synthetic frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticFrame {
    pub frame: i64,
}

impl Decoder for SyntheticDecoder {
    type Payload = i64;
    type Frame = SyntheticFrame;

    fn submit(&mut self, packet: &Packet<i64>) -> Option<SyntheticFrame> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.stats.decodes.fetch_add(1, Ordering::Relaxed);

        if self.warming_up > 0 {
            self.warming_up -= 1;
            return None;
        }

        Some(SyntheticFrame {
            frame: packet.payload,
        })
    }

    fn flush(&mut self) {
        self.warming_up = self.latency;
    }
}

pub struct SyntheticConverter;

impl FrameConverter for SyntheticConverter {
    type Frame = SyntheticFrame;

    fn convert(&mut self, frame: &SyntheticFrame, pixels: &mut [u8]) {
        pixels.fill(frame.frame.rem_euclid(256) as u8);
    }
}
