//! RTP/RTCP packet codec, jitter buffer, and the worker pool that owns the
//! gateway's UDP port range.
//!
//! Grounded on `original_source/src/rtp/*`.

pub mod error;
pub mod jitter;
pub mod net;
pub mod packet;
pub mod pool;

pub use error::{Error, Result};
pub use jitter::JitterBuffer;
pub use packet::{classify_rtcp, RtcpPacketType, RtpPacket};
pub use pool::{Handlers, PacketHandler, RtpWorkerPool};
