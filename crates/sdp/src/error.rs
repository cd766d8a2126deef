use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors from SDP offer parsing or answer negotiation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The offer had no `m=audio` media description.
    #[error("offer carries no audio media description")]
    NoAudioMedia,

    /// No payload type in the preference list appeared in the offer.
    #[error("no common codec between offer and local preference list")]
    NoCodec,
}
