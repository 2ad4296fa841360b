use std::error::Error;
use std::io;

#[derive(Debug)]
pub enum OpenError {
    Io(io::Error),
    /// The file is not a valid YUV4MPEG2 stream.
    Format(y4m::Error),
    /// The stream header has a zero frame rate.
    NoFrameRate,
    /// The stream uses a colorspace that cannot be converted.
    UnsupportedColorspace(y4m::Colorspace),
    /// A converter was requested before the stream was opened.
    NotOpened,
}

impl Error for OpenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            OpenError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for OpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenError::Io(e) => write!(f, "IO error: {}", e),
            OpenError::Format(e) => write!(f, "Y4M format error: {:?}", e),
            OpenError::NoFrameRate => write!(f, "Y4M stream has no frame rate"),
            OpenError::UnsupportedColorspace(c) => {
                write!(f, "Unsupported Y4M colorspace: {:?}", c)
            }
            OpenError::NotOpened => write!(f, "Y4M stream has not been opened"),
        }
    }
}

impl From<io::Error> for OpenError {
    fn from(e: io::Error) -> Self {
        OpenError::Io(e)
    }
}

impl From<y4m::Error> for OpenError {
    fn from(e: y4m::Error) -> Self {
        OpenError::Format(e)
    }
}
