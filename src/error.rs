use std::io;
use thiserror::Error;

/// Faults raised while reading a request off the connection.
///
/// Every variant aborts the current connection only.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    #[error("missing or unparsable header: {0}")]
    MissingOrUnparsableHeader(String),

    #[error("request body ended after {read} of {expected} bytes")]
    BodyReadShortfall { expected: usize, read: usize },

    #[error("connection closed before the end of the headers")]
    UnexpectedEof,

    #[error("malformed form field: {0:?}")]
    MalformedFormField(String),

    #[error("timed out reading request")]
    TimedOut,

    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

/// Faults raised while composing or writing a response.
///
/// These are the faults a [`crate::server::ServeControl`] collects.
#[derive(Debug, Error)]
pub enum HandlerFault {
    #[error("no active game")]
    NoActiveGame,

    #[error("invalid button index: {0:?}")]
    InvalidButtonIndex(String),

    #[error("button {button} is outside a board of {size} lights")]
    ButtonOutOfRange { button: usize, size: usize },

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("template rendering failed: {0}")]
    Template(#[from] minijinja::Error),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

/// Reasons a static path is refused before touching the disk.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path too long")]
    TooLong,
    #[error("path must start with /")]
    NotAbsolute,
    #[error("invalid URL encoding")]
    InvalidEncoding,
    #[error("path contains null bytes")]
    NullByte,
    #[error("too many path components")]
    TooManyComponents,
    #[error("path traversal attempt detected")]
    Traversal,
    #[error("invalid characters in path component")]
    InvalidCharacters,
    #[error("access to hidden files denied")]
    Hidden,
    #[error("path component too long")]
    ComponentTooLong,
    #[error("file path outside public directory")]
    OutsideRoot,
}
