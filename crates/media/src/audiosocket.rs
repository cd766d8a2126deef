//! TCP peer protocol client for the audio-socket backend.
//!
//! Grounded on `original_source/src/audiosocket/AudioSocketClient.cpp`. The
//! original polls a non-blocking fd with `poll(2)`; here a read-timeout on a
//! blocking clone of the stream gives the same "check the running flag at
//! most once per interval" behavior without hand-rolled readiness polling.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const TYPE_UUID: u8 = 0x01;
const TYPE_AUDIO: u8 = 0x10;
const TYPE_TRANSFER: u8 = 0x02;
const TYPE_TERM: u8 = 0x00;
const UUID_PAYLOAD_LEN: usize = 32;
const MAX_PAYLOAD_LEN: usize = 0xFFFF;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const READ_POLL_INTERVAL: Duration = Duration::from_millis(1000);
const TERMINATE_TIMEOUT: Duration = Duration::from_millis(50);

pub type TransferCallback = Box<dyn Fn(&str) + Send>;
pub type DisconnectCallback = Box<dyn Fn() + Send>;

#[derive(Default)]
struct CallbackSlots {
    on_transfer: Mutex<Option<TransferCallback>>,
    on_disconnect: Mutex<Option<DisconnectCallback>>,
}

/// A connected audio-socket peer. The audio callback is fixed for the
/// client's lifetime (it is how the backend stage drains inbound PCM into
/// its downlink buffer); transfer and disconnect callbacks may be attached
/// after connect.
pub struct AudioSocketClient {
    call_id: String,
    writer: Mutex<TcpStream>,
    running: Arc<AtomicBool>,
    reader_handle: Mutex<Option<JoinHandle<()>>>,
    callbacks: Arc<CallbackSlots>,
}

impl AudioSocketClient {
    pub fn connect(
        target: &str,
        call_id: String,
        from_user: &str,
        to_user: &str,
        on_audio: impl Fn(Vec<u8>) + Send + 'static,
    ) -> Result<Arc<Self>> {
        let addr = target
            .to_socket_addrs()
            .ok()
            .and_then(|mut it| it.next())
            .ok_or_else(|| Error::InvalidTarget(target.to_string()))?;

        tracing::debug!(call_id = %call_id, %target, "connecting to audio-socket backend");

        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                Error::ConnectTimeout(target.to_string())
            } else {
                Error::Io(e)
            }
        })?;
        stream.set_nodelay(true).ok();

        let reader_stream = stream.try_clone().map_err(Error::Io)?;
        reader_stream.set_read_timeout(Some(READ_POLL_INTERVAL)).ok();

        let running = Arc::new(AtomicBool::new(true));
        let callbacks = Arc::new(CallbackSlots::default());

        let client = Arc::new(AudioSocketClient {
            call_id: call_id.clone(),
            writer: Mutex::new(stream),
            running: running.clone(),
            reader_handle: Mutex::new(None),
            callbacks: callbacks.clone(),
        });

        let reader_call_id = call_id.clone();
        let handle = std::thread::spawn(move || {
            reader_loop(reader_stream, running, callbacks, on_audio, reader_call_id);
        });
        *client.reader_handle.lock() = Some(handle);

        client.send_uuid(from_user, to_user);

        Ok(client)
    }

    pub fn set_transfer_callback(&self, cb: impl Fn(&str) + Send + 'static) {
        *self.callbacks.on_transfer.lock() = Some(Box::new(cb));
    }

    pub fn set_disconnect_callback(&self, cb: impl Fn() + Send + 'static) {
        *self.callbacks.on_disconnect.lock() = Some(Box::new(cb));
    }

    fn send_uuid(&self, from_user: &str, to_user: &str) {
        let payload = build_uuid_payload(from_user, to_user);
        tracing::info!(call_id = %self.call_id, %payload, "sending audio-socket UUID handshake");
        let mut frame = Vec::with_capacity(3 + UUID_PAYLOAD_LEN);
        frame.push(TYPE_UUID);
        frame.extend_from_slice(&(UUID_PAYLOAD_LEN as u16).to_be_bytes());
        frame.extend_from_slice(payload.as_bytes());
        self.write_frame(&frame, None);
    }

    /// Sends PCM16LE audio, capped at 65 535 bytes.
    pub fn send_audio(&self, pcm: &[u8]) {
        if pcm.is_empty() {
            return;
        }
        let len = pcm.len().min(MAX_PAYLOAD_LEN);
        let mut frame = Vec::with_capacity(3 + len);
        frame.push(TYPE_AUDIO);
        frame.extend_from_slice(&(len as u16).to_be_bytes());
        frame.extend_from_slice(&pcm[..len]);
        self.write_frame(&frame, None);
    }

    fn write_frame(&self, frame: &[u8], timeout: Option<Duration>) {
        let mut stream = self.writer.lock();
        if let Some(t) = timeout {
            stream.set_write_timeout(Some(t)).ok();
        }
        if let Err(e) = stream.write_all(frame) {
            tracing::warn!(call_id = %self.call_id, error = %e, "audio-socket write failed");
        }
        if timeout.is_some() {
            stream.set_write_timeout(None).ok();
        }
    }

    /// Best-effort terminate frame, then shuts the socket down and joins
    /// (or detaches, if called from the reader thread itself) the reader.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        let terminate = [TYPE_TERM, 0, 0];
        self.write_frame(&terminate, Some(TERMINATE_TIMEOUT));
        self.writer.lock().shutdown(std::net::Shutdown::Both).ok();

        let handle = self.reader_handle.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != std::thread::current().id() {
                tracing::debug!(call_id = %self.call_id, "joining audio-socket reader thread");
                let _ = handle.join();
            } else {
                tracing::debug!(call_id = %self.call_id, "stop() called from reader thread, not joining");
            }
        }
    }
}

impl Drop for AudioSocketClient {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_uuid_payload(from_user: &str, to_user: &str) -> String {
    let dialer = last_n_chars(from_user, 10);
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        .to_string();
    let epoch = last_n_chars(&epoch, 7);
    let dialed = last_n_chars(to_user, 15);
    format!("{dialer:0>10}{epoch:0>7}{dialed:0>15}")
}

fn last_n_chars(s: &str, n: usize) -> String {
    if s.len() > n {
        s[s.len() - n..].to_string()
    } else {
        s.to_string()
    }
}

enum ReadOutcome {
    Ok,
    Closed,
    Stopped,
    Err,
}

fn read_with_retry(stream: &mut TcpStream, buf: &mut [u8], running: &AtomicBool) -> ReadOutcome {
    let mut received = 0;
    while received < buf.len() {
        match stream.read(&mut buf[received..]) {
            Ok(0) => return ReadOutcome::Closed,
            Ok(n) => received += n,
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                if !running.load(Ordering::Acquire) {
                    return ReadOutcome::Stopped;
                }
            }
            Err(_) => return ReadOutcome::Err,
        }
    }
    ReadOutcome::Ok
}

fn reader_loop(
    mut stream: TcpStream,
    running: Arc<AtomicBool>,
    callbacks: Arc<CallbackSlots>,
    on_audio: impl Fn(Vec<u8>) + Send,
    call_id: String,
) {
    let mut unexpected = true;

    while running.load(Ordering::Acquire) {
        let mut header = [0u8; 3];
        match read_with_retry(&mut stream, &mut header, &running) {
            ReadOutcome::Ok => {}
            ReadOutcome::Stopped => {
                unexpected = false;
                break;
            }
            ReadOutcome::Closed | ReadOutcome::Err => break,
        }

        let kind = header[0];
        let len = u16::from_be_bytes([header[1], header[2]]) as usize;

        let payload = if len > 0 {
            let mut payload = vec![0u8; len];
            match read_with_retry(&mut stream, &mut payload, &running) {
                ReadOutcome::Ok => payload,
                ReadOutcome::Stopped => {
                    unexpected = false;
                    break;
                }
                ReadOutcome::Closed | ReadOutcome::Err => break,
            }
        } else {
            Vec::new()
        };

        match kind {
            TYPE_AUDIO => on_audio(payload),
            TYPE_TRANSFER => {
                if let Ok(uri) = String::from_utf8(payload) {
                    tracing::info!(call_id = %call_id, %uri, "audio-socket transfer request");
                    if let Some(cb) = callbacks.on_transfer.lock().as_ref() {
                        cb(&uri);
                    }
                }
            }
            TYPE_TERM => {
                tracing::info!(call_id = %call_id, "audio-socket peer sent terminate");
                unexpected = false;
                break;
            }
            _ => {}
        }
    }

    running.store(false, Ordering::Release);
    tracing::info!(call_id = %call_id, unexpected, "audio-socket reader loop stopped");
    if unexpected {
        if let Some(cb) = callbacks.on_disconnect.lock().as_ref() {
            cb();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_payload_is_32_ascii_digits_zero_padded() {
        let payload = build_uuid_payload("555", "1234567890123456");
        assert_eq!(payload.len(), 32);
        assert!(payload.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(&payload[..10], "0000000555");
        // dialed is truncated to its last 15 digits.
        assert_eq!(&payload[17..], "234567890123456");
    }

    #[test]
    fn uuid_payload_pads_short_dialed_number() {
        let payload = build_uuid_payload("2025550123", "42");
        assert_eq!(&payload[17..], "000000000000042");
    }
}
