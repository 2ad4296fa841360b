#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![forbid(unsafe_code)]

//! Time-indexed cursors over decoded video streams.
//!
//! A [`DecodeCursor`] answers "which frame is visible at time `t`?" without
//! ever blocking the caller. An optional background worker decodes ahead of
//! playback and corrects for containers that can only seek to keyframes.
//!
//! Backends implement [`VideoSource`]. A YUV4MPEG2 backend is included with
//! the default `decode-y4m` feature.

pub use vidcursor_core::*;

#[cfg(feature = "decode-y4m")]
pub use vidcursor_decode_y4m::{
    Chroma, OpenError as Y4mOpenError, Y4mConverter, Y4mDecoder, Y4mFrame, Y4mPackets,
    Y4mSource,
};

/// Open a cursor over a YUV4MPEG2 file with the default options for that
/// backend.
#[cfg(feature = "decode-y4m")]
pub fn open_y4m<P: Into<std::path::PathBuf>>(
    file: P,
) -> Result<DecodeCursor<Y4mSource>, OpenError<Y4mOpenError>> {
    DecodeCursor::open(
        Y4mSource::new(file),
        CursorOptions::for_source::<Y4mSource>(),
    )
}
