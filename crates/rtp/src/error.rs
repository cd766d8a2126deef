use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors from RTP port allocation and I/O.
#[derive(Error, Debug)]
pub enum Error {
    /// No even port remained free in any worker's sub-range.
    #[error("RTP port pool exhausted")]
    PortsExhausted,

    /// Binding either the even RTP socket or its paired odd RTCP socket failed.
    #[error("failed to bind RTP/RTCP socket pair on port {port}: {source}")]
    BindFailed {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// A send was attempted on a port this pool does not currently own.
    #[error("no active socket bound to port {0}")]
    UnknownPort(u16),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
