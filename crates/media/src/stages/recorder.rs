//! Background-thread call recorder: split raw G.711 files or a mixed
//! PCM16 WAV.
//!
//! Grounded on `original_source/src/media/stages/RecorderStage.cpp`. The
//! original's mutex+condvar+swap queue becomes an unbounded
//! `crossbeam-channel`, whose disconnect-then-drain semantics give the
//! same "flush everything queued before the writer exits" behavior as the
//! original's `!running_ && queue_.empty()` wait predicate.

use crate::g711;
use crate::wav;
use crossbeam_channel::{unbounded, Sender};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread::JoinHandle;

use crate::stage::Stage;

/// Single-direction buffer large enough to force a raw flush (1 s at 8 kHz).
const FLUSH_THRESHOLD_SAMPLES: usize = 8000;

enum Chunk {
    Uplink(Vec<u8>),
    Downlink(Vec<u8>),
}

pub struct RecorderStage {
    sender: Option<Sender<Chunk>>,
    worker: Option<JoinHandle<()>>,
}

impl RecorderStage {
    pub fn new(
        mixed: bool,
        path_prefix: &str,
        call_id: &str,
        payload_type: u8,
    ) -> crate::error::Result<Self> {
        std::fs::create_dir_all(path_prefix).map_err(crate::error::Error::Io)?;

        let writer = if mixed {
            let path = Path::new(path_prefix).join(format!("{call_id}.mixed.wav"));
            let mut file = BufWriter::new(
                File::create(&path).map_err(crate::error::Error::RecordingFileOpen)?,
            );
            wav::write_header(&mut file, 8000, 1, 16).map_err(crate::error::Error::Io)?;
            RecorderWriter::Mixed {
                file,
                ul_buffer: Vec::new(),
                dl_buffer: Vec::new(),
                payload_type,
            }
        } else {
            let up_path = Path::new(path_prefix).join(format!("{call_id}.uplink.raw"));
            let down_path = Path::new(path_prefix).join(format!("{call_id}.downlink.raw"));
            let uplink = BufWriter::new(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&up_path)
                    .map_err(crate::error::Error::RecordingFileOpen)?,
            );
            let downlink = BufWriter::new(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&down_path)
                    .map_err(crate::error::Error::RecordingFileOpen)?,
            );
            RecorderWriter::Split { uplink, downlink }
        };

        let (sender, receiver) = unbounded::<Chunk>();
        let worker = std::thread::spawn(move || {
            let mut writer = writer;
            while let Ok(chunk) = receiver.recv() {
                writer.handle(chunk);
            }
            writer.finish();
        });

        Ok(RecorderStage {
            sender: Some(sender),
            worker: Some(worker),
        })
    }
}

impl Stage for RecorderStage {
    fn process_uplink(&mut self, frame: &mut Vec<u8>) {
        if frame.is_empty() {
            return;
        }
        if let Some(sender) = &self.sender {
            let _ = sender.send(Chunk::Uplink(frame.clone()));
        }
    }

    fn process_downlink(&mut self, frame: &mut Vec<u8>) {
        if frame.is_empty() {
            return;
        }
        if let Some(sender) = &self.sender {
            let _ = sender.send(Chunk::Downlink(frame.clone()));
        }
    }
}

impl Drop for RecorderStage {
    fn drop(&mut self) {
        // Dropping `sender` disconnects the channel; the worker drains
        // whatever is still queued, then exits its recv loop. Must happen
        // before the join or the worker blocks on `recv` forever.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

enum RecorderWriter {
    Split {
        uplink: BufWriter<File>,
        downlink: BufWriter<File>,
    },
    Mixed {
        file: BufWriter<File>,
        ul_buffer: Vec<i16>,
        dl_buffer: Vec<i16>,
        payload_type: u8,
    },
}

impl RecorderWriter {
    fn handle(&mut self, chunk: Chunk) {
        match self {
            RecorderWriter::Split { uplink, downlink } => match chunk {
                Chunk::Uplink(data) => {
                    let _ = uplink.write_all(&data);
                }
                Chunk::Downlink(data) => {
                    let _ = downlink.write_all(&data);
                }
            },
            RecorderWriter::Mixed {
                file,
                ul_buffer,
                dl_buffer,
                payload_type,
            } => {
                let (is_uplink, data) = match chunk {
                    Chunk::Uplink(d) => (true, d),
                    Chunk::Downlink(d) => (false, d),
                };
                let pcm = g711::decode(*payload_type, &data);
                if is_uplink {
                    ul_buffer.extend(pcm);
                } else {
                    dl_buffer.extend(pcm);
                }

                let mix_len = ul_buffer.len().min(dl_buffer.len());
                if mix_len > 0 {
                    let mixed: Vec<i16> = ul_buffer[..mix_len]
                        .iter()
                        .zip(dl_buffer[..mix_len].iter())
                        .map(|(&u, &d)| {
                            let sum = u as i32 + d as i32;
                            sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16
                        })
                        .collect();
                    write_samples(file, &mixed);
                    ul_buffer.drain(..mix_len);
                    dl_buffer.drain(..mix_len);
                }

                if ul_buffer.len() > FLUSH_THRESHOLD_SAMPLES {
                    write_samples(file, ul_buffer);
                    ul_buffer.clear();
                }
                if dl_buffer.len() > FLUSH_THRESHOLD_SAMPLES {
                    write_samples(file, dl_buffer);
                    dl_buffer.clear();
                }
            }
        }
    }

    fn finish(&mut self) {
        match self {
            RecorderWriter::Split { uplink, downlink } => {
                let _ = uplink.flush();
                let _ = downlink.flush();
            }
            RecorderWriter::Mixed { file, .. } => {
                let _ = file.flush();
                if let Err(e) = wav::patch_sizes(file) {
                    tracing::warn!(error = %e, "failed to patch WAV header sizes");
                }
            }
        }
    }
}

fn write_samples(file: &mut BufWriter<File>, samples: &[i16]) {
    for s in samples {
        let _ = file.write_all(&s.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_mode_creates_two_raw_files() {
        let dir = std::env::temp_dir().join(format!(
            "gateway-media-test-{}",
            std::process::id()
        ));
        let call_id = "call-split-1";
        {
            let mut stage =
                RecorderStage::new(false, dir.to_str().unwrap(), call_id, 0).unwrap();
            stage.process_uplink(&mut vec![1, 2, 3]);
            stage.process_downlink(&mut vec![4, 5]);
        } // Drop joins the worker, flushing files.

        let up = std::fs::read(dir.join(format!("{call_id}.uplink.raw"))).unwrap();
        let down = std::fs::read(dir.join(format!("{call_id}.downlink.raw"))).unwrap();
        assert_eq!(up, vec![1, 2, 3]);
        assert_eq!(down, vec![4, 5]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn mixed_mode_writes_a_patched_wav_header() {
        let dir = std::env::temp_dir().join(format!(
            "gateway-media-test-{}",
            std::process::id() + 1
        ));
        let call_id = "call-mixed-1";
        {
            let mut stage =
                RecorderStage::new(true, dir.to_str().unwrap(), call_id, 0).unwrap();
            stage.process_uplink(&mut vec![0xFFu8; 160]);
            stage.process_downlink(&mut vec![0xFFu8; 160]);
        }

        let bytes = std::fs::read(dir.join(format!("{call_id}.mixed.wav"))).unwrap();
        assert!(bytes.len() > 44);
        let data_size = u32::from_le_bytes(bytes[40..44].try_into().unwrap());
        assert_eq!(data_size as usize, bytes.len() - 44);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
