use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors from the media pipeline, audio-socket peer, and recorder.
#[derive(Error, Debug)]
pub enum Error {
    /// The `host:port` target string had no colon or an unparsable port.
    #[error("invalid audio-socket target: {0}")]
    InvalidTarget(String),

    /// TCP connect did not complete within the 3 s deadline.
    #[error("audio-socket connect to {0} timed out")]
    ConnectTimeout(String),

    /// The recorder could not create its output directory or open its file(s).
    #[error("failed to open recording file: {0}")]
    RecordingFileOpen(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
