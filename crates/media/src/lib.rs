//! G.711 codec, the media pipeline, its stages, the audio-socket TCP peer,
//! and the call recorder.
//!
//! Grounded on `original_source/src/media/*` and `original_source/src/util/*`.

pub mod audiosocket;
pub mod error;
pub mod g711;
pub mod pipeline;
pub mod stage;
pub mod stages;
pub mod wav;

pub use audiosocket::AudioSocketClient;
pub use error::{Error, Result};
pub use pipeline::MediaPipeline;
pub use stage::Stage;
pub use stages::backend::BackendStage;
pub use stages::echo::EchoStage;
pub use stages::recorder::RecorderStage;
