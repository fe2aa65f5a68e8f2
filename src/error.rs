use std::io;
use std::path::Path;

/// Error type for the library. Every variant carries a human readable message;
/// loaders prefix it with the offending file path.
#[derive(Debug, thiserror::Error)]
pub enum StardictError {
    #[error("File Not Found: {0}")]
    FileNotFound(String),
    #[error("Invalid Header: {0}")]
    InvalidHeader(String),
    #[error("Invalid Data: {0}")]
    InvalidData(String),
    #[error("IO Error: {0}")]
    Io(String),
    #[error("Not Supported: {0}")]
    NotSupported(String),
    #[error("Invalid Argument: {0}")]
    InvalidArgument(String),
}

impl StardictError {
    /// Prefix the message with `path`, keeping the kind.
    pub fn in_file(self, path: &Path) -> Self {
        self.context(&path.display().to_string())
    }

    /// Prefix the message with `what: `, keeping the kind.
    pub fn context(self, what: &str) -> Self {
        match self {
            StardictError::FileNotFound(m) => StardictError::FileNotFound(format!("{}: {}", what, m)),
            StardictError::InvalidHeader(m) => {
                StardictError::InvalidHeader(format!("{}: {}", what, m))
            }
            StardictError::InvalidData(m) => StardictError::InvalidData(format!("{}: {}", what, m)),
            StardictError::Io(m) => StardictError::Io(format!("{}: {}", what, m)),
            StardictError::NotSupported(m) => {
                StardictError::NotSupported(format!("{}: {}", what, m))
            }
            StardictError::InvalidArgument(m) => {
                StardictError::InvalidArgument(format!("{}: {}", what, m))
            }
        }
    }

    pub fn message(&self) -> &str {
        match self {
            StardictError::FileNotFound(m)
            | StardictError::InvalidHeader(m)
            | StardictError::InvalidData(m)
            | StardictError::Io(m)
            | StardictError::NotSupported(m)
            | StardictError::InvalidArgument(m) => m,
        }
    }
}

impl From<io::Error> for StardictError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => StardictError::FileNotFound(e.to_string()),
            io::ErrorKind::Unsupported => StardictError::NotSupported(e.to_string()),
            io::ErrorKind::InvalidData => StardictError::InvalidData(e.to_string()),
            _ => StardictError::Io(e.to_string()),
        }
    }
}

impl From<binrw::Error> for StardictError {
    fn from(e: binrw::Error) -> Self {
        match e {
            binrw::Error::Io(io) if io.kind() != io::ErrorKind::UnexpectedEof => {
                StardictError::Io(io.to_string())
            }
            other => StardictError::InvalidHeader(other.to_string()),
        }
    }
}

impl From<&'static str> for StardictError {
    fn from(s: &'static str) -> Self {
        StardictError::InvalidData(s.to_string())
    }
}

impl From<String> for StardictError {
    fn from(s: String) -> Self {
        StardictError::InvalidData(s)
    }
}

/// Bridge back into `std::io` for the `Read`/`Seek` implementations.
impl From<StardictError> for io::Error {
    fn from(e: StardictError) -> Self {
        let kind = match &e {
            StardictError::FileNotFound(_) => io::ErrorKind::NotFound,
            StardictError::NotSupported(_) => io::ErrorKind::Unsupported,
            StardictError::InvalidData(_) | StardictError::InvalidHeader(_) => {
                io::ErrorKind::InvalidData
            }
            StardictError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            StardictError::Io(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StardictError>;
