#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(clippy::missing_panics_doc)]
#![warn(clippy::clone_on_ref_ptr)]
#![forbid(unsafe_code)]

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vidcursor_core::{Decoder, OpenedStream, Packet, PacketSource, VideoInfo, VideoSource};

mod convert;
mod error;

pub use convert::{Chroma, Y4mConverter};
pub use error::OpenError;

type Reader = y4m::Decoder<BufReader<File>>;

/// The planes of one Y4M frame, copied out of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Y4mFrame {
    pub y: Vec<u8>,
    pub u: Vec<u8>,
    pub v: Vec<u8>,
}

/// A YUV4MPEG2 file that can be opened by a `DecodeCursor`.
pub struct Y4mSource {
    path: PathBuf,
    layout: Option<(usize, usize, Chroma)>,
}

impl Y4mSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            layout: None,
        }
    }
}

fn open_reader(path: &Path) -> Result<Reader, OpenError> {
    let file = File::open(path)?;
    Ok(y4m::decode(BufReader::new(file))?)
}

impl VideoSource for Y4mSource {
    type Packets = Y4mPackets;
    type Decoder = Y4mDecoder;
    type Converter = Y4mConverter;
    type OpenError = OpenError;

    const DEFAULT_MAX_READAHEAD_FRAMES: usize = 8;
    const THREAD_SAFE: bool = true;

    fn open(&mut self) -> Result<OpenedStream<Y4mPackets, Y4mDecoder>, OpenError> {
        let reader = open_reader(&self.path)?;

        let width = reader.get_width();
        let height = reader.get_height();
        let framerate = reader.get_framerate();
        if framerate.num == 0 || framerate.den == 0 {
            return Err(OpenError::NoFrameRate);
        }
        let colorspace = reader.get_colorspace();
        let chroma =
            Chroma::from_colorspace(colorspace).ok_or(OpenError::UnsupportedColorspace(colorspace))?;

        self.layout = Some((width, height, chroma));

        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned());

        Ok(OpenedStream {
            packets: Y4mPackets {
                path: self.path.clone(),
                name: name.clone(),
                reader,
                pending: None,
                next_frame: 0,
                num_frames: None,
            },
            decoder: Y4mDecoder,
            info: VideoInfo {
                name,
                width,
                height,
                num_components: chroma.num_components(),
                timebase: framerate.den as f64 / framerate.num as f64,
                length: None,
            },
        })
    }

    fn converter(&mut self, _info: &VideoInfo) -> Result<Y4mConverter, OpenError> {
        let (width, height, chroma) = self.layout.ok_or(OpenError::NotOpened)?;
        Ok(Y4mConverter::new(width, height, chroma))
    }
}

/// Reads one packet per Y4M frame. Frame numbers start at zero.
pub struct Y4mPackets {
    path: PathBuf,
    name: String,
    reader: Reader,
    /// A frame read ahead by a seek, returned before reading on.
    pending: Option<Y4mFrame>,
    next_frame: i64,
    /// The number of frames in the file, once a read has run off its end.
    num_frames: Option<i64>,
}

fn read_planes(reader: &mut Reader) -> Result<Y4mFrame, y4m::Error> {
    let frame = reader.read_frame()?;
    Ok(Y4mFrame {
        y: frame.get_y_plane().to_vec(),
        u: frame.get_u_plane().to_vec(),
        v: frame.get_v_plane().to_vec(),
    })
}

impl PacketSource for Y4mPackets {
    type Payload = Arc<Y4mFrame>;

    fn next_packet(&mut self) -> Option<Packet<Arc<Y4mFrame>>> {
        let frame = match self.pending.take() {
            Some(frame) => frame,
            None => match read_planes(&mut self.reader) {
                Ok(frame) => frame,
                Err(y4m::Error::EOF) => {
                    self.num_frames = Some(self.next_frame);
                    return None;
                }
                Err(e) => {
                    log::warn!("{}: failed to read frame {}: {:?}", self.name, self.next_frame, e);
                    return None;
                }
            },
        };

        let packet = Packet {
            frame: self.next_frame,
            payload: Arc::new(frame),
        };
        self.next_frame += 1;
        Some(packet)
    }

    /// Every Y4M frame is a keyframe, so seeks are exact. The file is reopened
    /// and read up to the target, so a seek costs as much as reading every
    /// frame before it.
    ///
    /// A target past the last frame fails and leaves the reader where it was.
    /// Once the length of the file is known, such seeks fail without reading.
    fn seek(&mut self, target_frame: i64, _prefer_backward: bool) -> bool {
        if target_frame < 0 || self.num_frames.map_or(false, |n| target_frame >= n) {
            return false;
        }

        let mut reader = match open_reader(&self.path) {
            Ok(reader) => reader,
            Err(e) => {
                log::warn!("{}: failed to reopen for seek: {}", self.name, e);
                return false;
            }
        };

        for skipped in 0..target_frame {
            match reader.read_frame() {
                Ok(_) => {}
                Err(y4m::Error::EOF) => {
                    self.num_frames = Some(skipped);
                    return false;
                }
                Err(_) => return false,
            }
        }
        let frame = match read_planes(&mut reader) {
            Ok(frame) => frame,
            Err(y4m::Error::EOF) => {
                self.num_frames = Some(target_frame);
                return false;
            }
            Err(e) => {
                log::debug!("{}: no frame {} to seek to: {:?}", self.name, target_frame, e);
                return false;
            }
        };

        self.reader = reader;
        self.pending = Some(frame);
        self.next_frame = target_frame;
        true
    }
}

/// Y4M frames are raw, so decoding hands the packet's planes straight through.
pub struct Y4mDecoder;

impl Decoder for Y4mDecoder {
    type Payload = Arc<Y4mFrame>;
    type Frame = Arc<Y4mFrame>;

    fn submit(&mut self, packet: &Packet<Arc<Y4mFrame>>) -> Option<Arc<Y4mFrame>> {
        Some(Arc::clone(&packet.payload))
    }
}

#[cfg(test)]
mod tests;
