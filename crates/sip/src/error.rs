use thiserror::Error;

/// A type alias for handling `Result`s with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing or serializing a SIP message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The first line was neither a valid request line nor a valid status line.
    #[error("malformed start line: {0}")]
    MalformedStartLine(String),

    /// A header line could not be split into a name and a value.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// `Content-Length` named more bytes than the datagram actually carried.
    #[error("truncated body: Content-Length={expected}, got {actual}")]
    TruncatedBody {
        /// Bytes promised by `Content-Length`.
        expected: usize,
        /// Bytes actually present after the header block.
        actual: usize,
    },

    /// The method name on a request line is not one this gateway recognises.
    #[error("unrecognised method: {0}")]
    UnknownMethod(String),

    /// A message required for dialog matching was missing a mandatory header.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),
}
