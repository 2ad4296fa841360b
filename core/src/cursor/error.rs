use std::error::Error;

/// An error opening a [`DecodeCursor`].
///
/// This is the only error a cursor ever reports. Once a cursor is open, decode
/// and seek failures are absorbed and show up as missing frames.
///
/// [`DecodeCursor`]: crate::DecodeCursor
#[derive(Debug)]
pub enum OpenError<SourceError: Error> {
    /// The container or codec could not be opened.
    Source(SourceError),
    /// The pixel converter could not be created.
    Converter(SourceError),
    /// The source reported a frame layout with no pixels in it.
    InvalidFrameSize {
        width: usize,
        height: usize,
        num_components: usize,
    },
    /// The source reported a timebase that is not a positive, finite number of seconds.
    InvalidTimebase(f64),
    /// A field of the cursor options holds an unusable value.
    InvalidOption(&'static str),
}

impl<SourceError: Error> std::error::Error for OpenError<SourceError> {}

impl<SourceError: Error> std::fmt::Display for OpenError<SourceError> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenError::Source(e) => write!(f, "Failed to open source: {}", e),
            OpenError::Converter(e) => write!(f, "Failed to create frame converter: {}", e),
            OpenError::InvalidFrameSize {
                width,
                height,
                num_components,
            } => write!(
                f,
                "Invalid frame size {}x{} with {} components",
                width, height, num_components
            ),
            OpenError::InvalidTimebase(timebase) => {
                write!(f, "Invalid timebase {} seconds per frame", timebase)
            }
            OpenError::InvalidOption(name) => write!(f, "Invalid value for option `{}`", name),
        }
    }
}
