//! RTP worker pool: owns the UDP sockets for a sub-range of the configured
//! port range, polls them for readiness, and dispatches packets by port.
//!
//! Grounded on `original_source/src/rtp/RtpWorker.cpp`. That implementation
//! hand-rolls `epoll`/`poll` and packs `(port << 32 | fd)` into the epoll
//! event datum so the hot loop can act without a second lookup. `mio`
//! already owns the fd↔source association behind its `Token`, so here the
//! port alone is the token — one `HashMap` lookup by port remains, but it's
//! the same lookup the original avoided only on Linux's epoll path (its
//! portable `poll()` fallback still walked its `activeSockets_` map anyway).
//! See DESIGN.md for this deliberate simplification.

use crate::error::{Error, Result};
use crate::net::bind_udp;
use mio::net::UdpSocket as MioUdpSocket;
use mio::{Events, Interest, Poll, Token};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Called with `(local_port, payload, sender_addr)` for every RTP or RTCP
/// datagram the pool receives.
pub type PacketHandler = Arc<dyn Fn(u16, &[u8], SocketAddr) + Send + Sync>;

/// The pool's current packet/RTCP callbacks. Swapped as a unit so a handler
/// update never observes a half-updated pair.
#[derive(Clone)]
pub struct Handlers {
    pub on_rtp: PacketHandler,
    pub on_rtcp: PacketHandler,
}

struct PortSocket {
    socket: MioUdpSocket,
}

struct RtpWorker {
    id: usize,
    even_start: u16,
    even_end: u16,
    free_ports: Mutex<Vec<u16>>,
    sockets: Mutex<HashMap<u16, Arc<PortSocket>>>,
    poll: Mutex<Poll>,
    handlers: RwLock<Option<Arc<Handlers>>>,
    handlers_changed: AtomicBool,
    running: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl RtpWorker {
    fn new(id: usize, even_start: u16, even_end: u16) -> std::io::Result<Self> {
        let mut free_ports = Vec::new();
        let mut p = even_start;
        while p <= even_end {
            free_ports.push(p);
            p = match p.checked_add(2) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(RtpWorker {
            id,
            even_start,
            even_end,
            free_ports: Mutex::new(free_ports),
            sockets: Mutex::new(HashMap::new()),
            poll: Mutex::new(Poll::new()?),
            handlers: RwLock::new(None),
            handlers_changed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            thread: Mutex::new(None),
        })
    }

    fn owns_port(&self, port: u16) -> bool {
        port >= self.even_start && port <= self.even_end.saturating_add(1)
    }

    fn allocate(&self, bind_ip: Ipv4Addr) -> Result<(u16, u16)> {
        let rtp_port = {
            let mut free = self.free_ports.lock();
            free.pop().ok_or(Error::PortsExhausted)?
        };
        let rtcp_port = rtp_port + 1;

        let result = (|| -> Result<(u16, u16)> {
            let rtp_std = bind_udp(bind_ip, rtp_port).map_err(|e| Error::BindFailed {
                port: rtp_port,
                source: e,
            })?;
            let rtcp_std = bind_udp(bind_ip, rtcp_port).map_err(|e| Error::BindFailed {
                port: rtcp_port,
                source: e,
            })?;

            let mut rtp_mio = MioUdpSocket::from_std(rtp_std);
            let mut rtcp_mio = MioUdpSocket::from_std(rtcp_std);

            let poll = self.poll.lock();
            poll.registry()
                .register(&mut rtp_mio, Token(rtp_port as usize), Interest::READABLE)?;
            poll.registry()
                .register(&mut rtcp_mio, Token(rtcp_port as usize), Interest::READABLE)?;
            drop(poll);

            let mut sockets = self.sockets.lock();
            sockets.insert(rtp_port, Arc::new(PortSocket { socket: rtp_mio }));
            sockets.insert(rtcp_port, Arc::new(PortSocket { socket: rtcp_mio }));

            Ok((rtp_port, rtcp_port))
        })();

        if result.is_err() {
            self.free_ports.lock().push(rtp_port);
        }
        result
    }

    fn release(&self, rtp_port: u16) {
        let rtcp_port = rtp_port + 1;
        let mut sockets = self.sockets.lock();
        if let Some(mut owned) = sockets.remove(&rtp_port) {
            if let Some(inner) = Arc::get_mut(&mut owned) {
                let _ = self.poll.lock().registry().deregister(&mut inner.socket);
            }
        }
        if let Some(mut owned) = sockets.remove(&rtcp_port) {
            if let Some(inner) = Arc::get_mut(&mut owned) {
                let _ = self.poll.lock().registry().deregister(&mut inner.socket);
            }
        }
        drop(sockets);
        self.free_ports.lock().push(rtp_port);
    }

    fn send(&self, port: u16, data: &[u8], dest: SocketAddr) -> Result<()> {
        let socket = {
            let sockets = self.sockets.lock();
            sockets.get(&port).cloned().ok_or(Error::UnknownPort(port))?
        };
        socket.socket.send_to(data, dest)?;
        Ok(())
    }

    fn set_handlers(&self, handlers: Arc<Handlers>) {
        *self.handlers.write() = Some(handlers);
        self.handlers_changed.store(true, Ordering::Release);
    }

    fn run(self: Arc<Self>) {
        let mut events = Events::with_capacity(128);
        let mut current: Option<Arc<Handlers>> = self.handlers.read().clone();

        while self.running.load(Ordering::Acquire) {
            {
                let mut poll = self.poll.lock();
                if let Err(err) = poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                    tracing::warn!(worker = self.id, %err, "rtp worker poll failed");
                    continue;
                }
            }

            if self.handlers_changed.swap(false, Ordering::AcqRel) {
                current = self.handlers.read().clone();
            }
            let Some(handlers) = current.clone() else {
                continue;
            };

            for event in events.iter() {
                let port = event.token().0 as u16;
                let socket = {
                    let sockets = self.sockets.lock();
                    sockets.get(&port).cloned()
                };
                let Some(socket) = socket else { continue };

                let mut buf = [0u8; crate::packet::MAX_PACKET_LEN];
                match socket.socket.recv_from(&mut buf) {
                    Ok((n, from)) => {
                        if port % 2 == 0 {
                            (handlers.on_rtp)(port, &buf[..n], from);
                        } else {
                            (handlers.on_rtcp)(port, &buf[..n], from);
                        }
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(err) => {
                        tracing::debug!(worker = self.id, port, %err, "rtp recv failed");
                    }
                }
            }
        }
    }

    fn start(self: &Arc<Self>) {
        self.running.store(true, Ordering::Release);
        let worker = Arc::clone(self);
        let handle = std::thread::spawn(move || worker.run());
        *self.thread.lock() = Some(handle);
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

/// The RTP/RTCP worker pool: `N` workers, each owning an aligned even
/// sub-range of `[start_port, end_port]`. Allocation is round-robin across
/// workers.
pub struct RtpWorkerPool {
    bind_ip: Ipv4Addr,
    workers: Vec<Arc<RtpWorker>>,
    next_worker: AtomicUsize,
}

impl RtpWorkerPool {
    /// Builds a pool with `worker_count` workers sharing `[start_port,
    /// end_port]`, an even start/end pair as required by the RTP/RTCP
    /// pairing rule.
    pub fn new(bind_ip: Ipv4Addr, start_port: u16, end_port: u16, worker_count: usize) -> std::io::Result<Self> {
        let worker_count = worker_count.max(1);
        let start_port = start_port & !1; // align down to even
        let end_port = if end_port % 2 == 0 { end_port } else { end_port - 1 };

        let total_even_ports = ((end_port - start_port) / 2) + 1;
        let per_worker = (total_even_ports as usize / worker_count).max(1);

        let mut workers = Vec::with_capacity(worker_count);
        let mut cursor = start_port;
        for id in 0..worker_count {
            let is_last = id == worker_count - 1;
            let range_end = if is_last {
                end_port
            } else {
                (cursor + (per_worker as u16 - 1) * 2).min(end_port)
            };
            workers.push(Arc::new(RtpWorker::new(id, cursor, range_end)?));
            cursor = range_end + 2;
            if cursor > end_port {
                break;
            }
        }

        Ok(RtpWorkerPool {
            bind_ip,
            workers,
            next_worker: AtomicUsize::new(0),
        })
    }

    /// Installs the packet/RTCP handlers and starts every worker's poll loop.
    pub fn start(&self, handlers: Handlers) {
        let handlers = Arc::new(handlers);
        for worker in &self.workers {
            worker.set_handlers(Arc::clone(&handlers));
            worker.start();
        }
    }

    /// Swaps the active handlers without stopping the poll loops.
    pub fn set_handlers(&self, handlers: Handlers) {
        let handlers = Arc::new(handlers);
        for worker in &self.workers {
            worker.set_handlers(Arc::clone(&handlers));
        }
    }

    pub fn stop(&self) {
        for worker in &self.workers {
            worker.stop();
        }
    }

    /// Allocates an RTP/RTCP port pair from the next worker in round-robin
    /// order, trying every worker once before failing.
    pub fn allocate(&self) -> Result<(u16, u16)> {
        let start = self.next_worker.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        for offset in 0..self.workers.len() {
            let idx = (start + offset) % self.workers.len();
            match self.workers[idx].allocate(self.bind_ip) {
                Ok(pair) => return Ok(pair),
                Err(Error::PortsExhausted) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(Error::PortsExhausted)
    }

    /// Releases the RTP/RTCP port pair starting at `rtp_port` back to its
    /// owning worker's free list.
    pub fn release(&self, rtp_port: u16) {
        if let Some(worker) = self.workers.iter().find(|w| w.owns_port(rtp_port)) {
            worker.release(rtp_port);
        }
    }

    /// Sends `data` on the socket bound to `port`, to `dest`.
    pub fn send(&self, port: u16, data: &[u8], dest: SocketAddr) -> Result<()> {
        let worker = self
            .workers
            .iter()
            .find(|w| w.owns_port(port))
            .ok_or(Error::UnknownPort(port))?;
        worker.send(port, data, dest)
    }
}

impl Drop for RtpWorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_release_round_trips_a_port() {
        let pool = RtpWorkerPool::new(Ipv4Addr::LOCALHOST, 32000, 32100, 2).unwrap();
        let (rtp, rtcp) = pool.allocate().unwrap();
        assert_eq!(rtcp, rtp + 1);
        assert!(rtp % 2 == 0);
        pool.release(rtp);
        // The port must be available again after release.
        let mut seen_again = false;
        for _ in 0..60 {
            let (p, _) = pool.allocate().unwrap();
            if p == rtp {
                seen_again = true;
            }
            pool.release(p);
        }
        assert!(seen_again);
    }

    #[test]
    fn exhausting_the_pool_returns_an_error() {
        let pool = RtpWorkerPool::new(Ipv4Addr::LOCALHOST, 33000, 33006, 1).unwrap();
        let mut allocated = Vec::new();
        loop {
            match pool.allocate() {
                Ok((rtp, _)) => allocated.push(rtp),
                Err(Error::PortsExhausted) => break,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert!(!allocated.is_empty());
        for p in allocated {
            pool.release(p);
        }
    }
}
