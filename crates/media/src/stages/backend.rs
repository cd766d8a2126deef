//! Bridges RTP audio to an audio-socket TCP backend.
//!
//! Grounded on `original_source/src/media/stages/AudioSocketStage.cpp`.
//! Gain is unity here (see `SPEC_FULL.md` §4.I) rather than the original's
//! fixed 3x compensation.

use crate::audiosocket::AudioSocketClient;
use crate::g711;
use crate::stage::Stage;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Caps the PCM16 backend-return queue at 2 s of 8 kHz audio (16 000 bytes
/// of G.711-equivalent sample count, i.e. 16 000 i16 samples worth of
/// bytes once re-encoded); overflow drops the oldest bytes.
const DOWNLINK_CAP_BYTES: usize = 16_000;
const FRAME_BYTES: usize = 160; // 20 ms at 8 kHz, one byte per G.711 sample.

const GAIN: i32 = 1;

fn apply_gain(samples: &mut [i16]) {
    if GAIN == 1 {
        return;
    }
    for sample in samples {
        let scaled = (*sample as i32) * GAIN;
        *sample = scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    }
}

fn pcm16le_to_samples(data: &[u8]) -> Vec<i16> {
    data.chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect()
}

fn samples_to_pcm16le(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Shared downlink buffer: PCM samples already decoded from backend audio
/// and gain-adjusted, waiting to be drained 160 bytes (one 20 ms frame) at
/// a time and re-encoded to G.711 on the RTP side.
#[derive(Default)]
struct DownlinkBuffer(VecDeque<u8>);

impl DownlinkBuffer {
    fn push_encoded(&mut self, encoded: &[u8]) {
        self.0.extend(encoded);
        let overflow = self.0.len().saturating_sub(DOWNLINK_CAP_BYTES);
        for _ in 0..overflow {
            self.0.pop_front();
        }
    }

    fn drain_frame(&mut self) -> Option<Vec<u8>> {
        if self.0.len() >= FRAME_BYTES {
            Some(self.0.drain(..FRAME_BYTES).collect())
        } else {
            None
        }
    }
}

pub struct BackendStage {
    client: Arc<AudioSocketClient>,
    payload_type: u8,
    downlink: Arc<Mutex<DownlinkBuffer>>,
}

impl BackendStage {
    /// Connects to `target` and wires the resulting audio-socket client's
    /// audio callback straight into this stage's downlink buffer.
    pub fn connect(
        target: &str,
        call_id: String,
        from_user: &str,
        to_user: &str,
        payload_type: u8,
    ) -> crate::error::Result<Self> {
        let downlink = Arc::new(Mutex::new(DownlinkBuffer::default()));
        let downlink_for_cb = downlink.clone();

        let client = AudioSocketClient::connect(target, call_id, from_user, to_user, move |data| {
            on_backend_audio(&downlink_for_cb, payload_type, &data);
        })?;

        Ok(BackendStage {
            client,
            payload_type,
            downlink,
        })
    }

    pub fn client(&self) -> &Arc<AudioSocketClient> {
        &self.client
    }
}

fn on_backend_audio(downlink: &Mutex<DownlinkBuffer>, payload_type: u8, data: &[u8]) {
    if data.len() % 2 != 0 {
        return;
    }
    let mut samples = pcm16le_to_samples(data);
    apply_gain(&mut samples);
    let encoded = g711::encode(payload_type, &samples);
    downlink.lock().push_encoded(&encoded);
}

impl Stage for BackendStage {
    fn process_uplink(&mut self, frame: &mut Vec<u8>) {
        if frame.is_empty() {
            return;
        }
        let mut samples = g711::decode(self.payload_type, frame);
        apply_gain(&mut samples);
        self.client.send_audio(&samples_to_pcm16le(&samples));
    }

    fn process_downlink(&mut self, frame: &mut Vec<u8>) {
        if let Some(chunk) = self.downlink.lock().drain_frame() {
            *frame = chunk;
        } else {
            *frame = vec![g711::silence_byte(self.payload_type); FRAME_BYTES];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downlink_buffer_caps_at_16000_bytes_dropping_oldest() {
        let mut buf = DownlinkBuffer::default();
        buf.push_encoded(&vec![1u8; 16_000]);
        buf.push_encoded(&vec![2u8; 500]);
        assert_eq!(buf.0.len(), DOWNLINK_CAP_BYTES);
        assert_eq!(*buf.0.back().unwrap(), 2);
    }

    #[test]
    fn drain_frame_only_releases_full_20ms_chunks() {
        let mut buf = DownlinkBuffer::default();
        buf.push_encoded(&vec![9u8; 159]);
        assert!(buf.drain_frame().is_none());
        buf.push_encoded(&[9u8]);
        assert_eq!(buf.drain_frame().unwrap().len(), FRAME_BYTES);
    }

    #[test]
    fn pcm16le_roundtrips_through_samples() {
        let samples: Vec<i16> = vec![0, 1, -1, 32767, -32768];
        let bytes = samples_to_pcm16le(&samples);
        assert_eq!(pcm16le_to_samples(&bytes), samples);
    }
}
