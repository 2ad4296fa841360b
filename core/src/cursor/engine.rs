use arrayvec::ArrayVec;
use log::{error, trace};

use super::source::{
    Decoder, FrameConverter, FrameOf, Packet, PacketSource, PayloadOf, VideoInfo, VideoSource,
};
use super::{CursorOptions, OpenError};
use crate::lock::{with_library, LibraryLock};
use crate::{FrameBuffer, Window};

/// The maximum number of container seeks a single binary search may issue.
pub(crate) const MAX_BINARY_SEEK_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy)]
struct SeekAttempt {
    frame: i64,
    landed: bool,
}

/// The parts of the engine's state that the consumer side mirrors while the
/// engine itself is busy on the worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EngineProgress {
    pub eof_frame: Option<i64>,
    pub min_forward_seek: i64,
    pub valid: bool,
}

struct Stream<S: VideoSource> {
    packets: S::Packets,
    decoder: S::Decoder,
}

/// Drives a source's packets through its decoder until a requested frame is
/// held, deciding between linear decoding and container seeks.
pub(crate) struct Engine<S: VideoSource> {
    source: S,
    stream: Option<Stream<S>>,
    converter: S::Converter,
    lock: Option<LibraryLock>,
    name: String,

    /// One packet of lookahead: the next packet to decode.
    packet: Option<Packet<PayloadOf<S>>>,
    packet_frame: i64,
    decoded: Option<FrameOf<S>>,

    begin_frame: i64,
    end_frame: i64,
    frame_ready: bool,

    initial_dts: i64,
    eof_frame: Option<i64>,
    min_forward_seek: i64,
    support_seek: bool,
}

impl<S: VideoSource> Engine<S> {
    /// Open `source` and decode its first frame.
    pub(crate) fn open(
        mut source: S,
        opts: &CursorOptions,
    ) -> Result<(Self, VideoInfo), OpenError<S::OpenError>> {
        let lock = opts.library_lock.clone();

        let opened = with_library(&lock, || source.open()).map_err(OpenError::Source)?;
        let info = opened.info;

        if info.frame_bytes() == 0 {
            return Err(OpenError::InvalidFrameSize {
                width: info.width,
                height: info.height,
                num_components: info.num_components,
            });
        }
        if !(info.timebase.is_finite() && info.timebase > 0.0) {
            return Err(OpenError::InvalidTimebase(info.timebase));
        }
        if !(opts.min_forward_seek_seconds.is_finite() && opts.min_forward_seek_seconds >= 0.0) {
            return Err(OpenError::InvalidOption("min_forward_seek_seconds"));
        }

        let converter =
            with_library(&lock, || source.converter(&info)).map_err(OpenError::Converter)?;

        let mut engine = Self {
            source,
            stream: Some(Stream {
                packets: opened.packets,
                decoder: opened.decoder,
            }),
            converter,
            lock,
            name: info.name.clone(),
            packet: None,
            packet_frame: 0,
            decoded: None,
            begin_frame: 0,
            end_frame: 0,
            frame_ready: false,
            initial_dts: 0,
            eof_frame: None,
            // Saturates for huge distances.
            min_forward_seek: (opts.min_forward_seek_seconds / info.timebase) as i64,
            support_seek: opts.support_seek,
        };

        engine.fetch_packet(0, false);
        engine.fetch_frame(None);
        engine.initial_dts = engine.begin_frame;

        Ok((engine, info))
    }

    pub(crate) fn initial_dts(&self) -> i64 {
        self.initial_dts
    }

    pub(crate) fn window(&self) -> Window {
        Window::new(self.begin_frame, self.end_frame)
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.stream.is_some()
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.packet.is_none()
    }

    pub(crate) fn progress(&self) -> EngineProgress {
        EngineProgress {
            eof_frame: self.eof_frame,
            min_forward_seek: self.min_forward_seek,
            valid: self.is_valid(),
        }
    }

    /// Read the next packet into the lookahead slot. Returns `true` at the end
    /// of the stream, in which case the read position becomes `default_frame`.
    fn fetch_packet(&mut self, default_frame: i64, record_eof: bool) -> bool {
        let packet = match self.stream.as_mut() {
            Some(stream) => {
                let packets = &mut stream.packets;
                with_library(&self.lock, || packets.next_packet())
            }
            None => None,
        };

        match packet {
            Some(packet) => {
                self.packet_frame = packet.frame;
                self.packet = Some(packet);
                false
            }
            None => {
                if record_eof && self.eof_frame.is_none() {
                    trace!("{}: end of stream after frame {}", self.name, self.packet_frame);
                    self.eof_frame = Some(self.packet_frame);
                }
                self.packet = None;
                self.packet_frame = default_frame;
                true
            }
        }
    }

    /// Feed the lookahead packet to the decoder. Returns `true` if it produced a frame.
    fn decode_packet(&mut self) -> bool {
        let (Some(stream), Some(packet)) = (self.stream.as_mut(), self.packet.as_ref()) else {
            return false;
        };
        let decoder = &mut stream.decoder;

        match with_library(&self.lock, || decoder.submit(packet)) {
            Some(frame) => {
                self.decoded = Some(frame);
                true
            }
            None => false,
        }
    }

    /// Decode forward. With a target, decode every packet up to and including
    /// the last one at or before `target`. Without one, decode until the codec
    /// produces the next frame.
    fn fetch_frame(&mut self, target: Option<i64>) {
        match target {
            Some(target) => {
                while self.packet.is_some() && self.packet_frame <= target {
                    self.decode_packet();
                    self.begin_frame = self.packet_frame;
                    self.fetch_packet(self.begin_frame + 1, true);
                }
            }
            None => {
                let mut finished = false;
                while !finished && self.packet.is_some() {
                    finished = self.decode_packet();
                    self.begin_frame = self.packet_frame;
                    self.fetch_packet(self.begin_frame + 1, true);
                }
            }
        }

        self.end_frame = self.packet_frame.max(self.begin_frame + 1);
        self.frame_ready = self.decoded.is_some();
    }

    /// Decode the frame after the current one, for readahead. Returns `false`
    /// if there is nothing left to decode.
    pub(crate) fn decode_next(&mut self) -> bool {
        if !self.is_valid() || self.at_eof() {
            return false;
        }
        self.fetch_frame(None);
        true
    }

    /// Start decoding again after the container has been repositioned.
    fn land(&mut self, default_frame: i64) {
        if let Some(stream) = self.stream.as_mut() {
            let decoder = &mut stream.decoder;
            with_library(&self.lock, || decoder.flush());
        }
        self.decoded = None;
        self.fetch_packet(default_frame, false);
        self.fetch_frame(None);
    }

    fn seek_container(&mut self, target: i64, backward: bool) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };
        let packets = &mut stream.packets;
        with_library(&self.lock, || packets.seek(target, backward))
    }

    /// Move the container near `frame`, falling back to a binary search or a
    /// full reset when the container refuses.
    fn seek(&mut self, frame: i64, backward: bool) {
        if !self.support_seek {
            if backward {
                self.reset_stream();
            }
            return;
        }

        let target = frame.max(self.initial_dts);
        if self.seek_container(target, backward) {
            self.land(target);
            return;
        }

        trace!(
            "{}: {} seek to frame {} failed",
            self.name,
            if backward { "backward" } else { "forward" },
            target
        );

        if backward {
            self.reset_stream();
            self.seek(frame, false);
            return;
        }

        match self.binary_seek(self.initial_dts, frame) {
            Some(landed) => self.land(landed),
            None => self.reset_stream(),
        }
    }

    /// Search `[min_frame, max_frame]` for the latest position the container
    /// accepts a seek to.
    fn binary_seek(&mut self, min_frame: i64, max_frame: i64) -> Option<i64> {
        let mut attempts: ArrayVec<SeekAttempt, MAX_BINARY_SEEK_ATTEMPTS> = ArrayVec::new();
        let (mut low, mut high) = (min_frame, max_frame);

        while !attempts.is_full() {
            let try_frame = low + (high - low) / 2;
            if try_frame >= high {
                break;
            }

            let landed = self.seek_container(try_frame, true);
            attempts.push(SeekAttempt {
                frame: try_frame,
                landed,
            });

            if landed {
                low = try_frame + 1;
            } else {
                high = try_frame - 1;
            }
        }

        trace!("{}: binary seek attempts {:?}", self.name, attempts);

        let best = attempts.iter().rev().find(|a| a.landed)?.frame;
        match attempts.last() {
            Some(last) if last.landed => Some(best),
            // A later attempt failed and may have moved the container.
            _ => self.seek_container(best, true).then_some(best),
        }
    }

    /// Close the stream and open it again from the start. If the source cannot
    /// be reopened, the engine becomes invalid.
    fn reset_stream(&mut self) {
        trace!("{}: resetting stream", self.name);

        if let Some(stream) = self.stream.take() {
            with_library(&self.lock, move || drop(stream));
        }
        self.packet = None;
        self.decoded = None;

        let source = &mut self.source;
        match with_library(&self.lock, || source.open()) {
            Ok(opened) => {
                self.stream = Some(Stream {
                    packets: opened.packets,
                    decoder: opened.decoder,
                });
                self.fetch_packet(0, false);
                self.fetch_frame(None);
            }
            Err(e) => {
                error!("{}: stream error, invalidating cursor: {}", self.name, e);
                self.frame_ready = false;
            }
        }
    }

    /// Seek back to at or before `frame`, resetting the stream if the seek
    /// could not get far enough back.
    fn rewind_to(&mut self, frame: i64) {
        trace!("{}: seeking backward to {} from {}", self.name, frame, self.begin_frame);
        self.seek(frame, true);

        if self.begin_frame > frame {
            trace!("{}: ended up at {}, not far enough back", self.name, self.begin_frame);
            self.reset_stream();
        }
    }

    /// Decode until `frame` lies in the current window (or as close as the
    /// stream allows).
    pub(crate) fn advance_to_frame(&mut self, frame: i64) {
        if !self.is_valid() {
            return;
        }
        let frame = match self.eof_frame {
            Some(eof_frame) => frame.min(eof_frame),
            None => frame,
        };

        if frame < self.begin_frame {
            self.rewind_to(frame);
            if frame >= self.end_frame {
                trace!("{}: sliding forward to {} from {}", self.name, frame, self.begin_frame);
                self.fetch_frame(Some(frame));
            }
        } else if frame < self.end_frame {
            // Already holding it.
        } else if frame < self.end_frame.saturating_add(self.min_forward_seek) {
            trace!("{}: sliding forward to {} from {}", self.name, frame, self.begin_frame);
            self.fetch_frame(Some(frame));
        } else {
            trace!("{}: jumping forward to {} from {}", self.name, frame, self.begin_frame);

            let base = self.begin_frame;
            self.seek(frame, false);

            if self.begin_frame < base {
                self.min_forward_seek = self
                    .min_forward_seek
                    .saturating_add(base - self.begin_frame);
                trace!(
                    "{}: wrong way, increasing minimum forward seek to {}",
                    self.name,
                    self.min_forward_seek
                );
            }
            if self.begin_frame > frame {
                self.rewind_to(frame);
            }
            if frame >= self.end_frame {
                trace!(
                    "{}: correcting, sliding forward to {} from {}",
                    self.name,
                    frame,
                    self.begin_frame
                );
                self.fetch_frame(Some(frame));
            }
        }

        trace!("{}: wanted {}, got {}", self.name, frame, self.begin_frame);
    }

    /// Convert the held frame into `buffer`. Returns `false` if no frame is held.
    pub(crate) fn export_frame(&mut self, buffer: &mut FrameBuffer) -> bool {
        if !self.frame_ready {
            return false;
        }
        let Some(frame) = self.decoded.as_ref() else {
            return false;
        };

        let converter = &mut self.converter;
        let pixels = buffer.pixels_mut();
        with_library(&self.lock, || converter.convert(frame, pixels));
        buffer.window = self.window();
        true
    }
}
