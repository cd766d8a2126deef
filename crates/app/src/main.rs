//! Gateway entry point: loads configuration, brings up the SIP/RTP sockets,
//! and runs the poll loop that feeds both into the call state machine.
//!
//! Grounded on `original_source/src/main.cpp` and
//! `original_source/src/app/GatewayApp.h`/`.cpp`. The original bundles
//! socket ownership, the transaction map, and message routing into one
//! `GatewayApp` class; here that's split along the same lines the rest of
//! this workspace already uses the call crate for everything but the two
//! concrete sockets, which stay in this binary.

mod transport;

use clap::Parser;
use gateway_call::{CallRegistry, Dispatcher, GatewayConfig};
use gateway_rtp::{Handlers, RtpPacket, RtpWorkerPool};
use gateway_sip::{SipMessage, TransactionManager};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use transport::UdpSipTransport;

const SIP_POLL_TIMEOUT: Duration = Duration::from_millis(10);
const TRANSACTION_SWEEP_INTERVAL: Duration = Duration::from_secs(5);
/// Fallback worker count when the platform can't report hardware
/// concurrency. `available_parallelism()` itself is the §4.D default ("N =
/// number of hardware threads"), matching
/// `original_source/src/rtp/RtpServer.cpp`'s `hardware_concurrency()`.
const RTP_WORKER_COUNT_FALLBACK: usize = 4;

#[derive(Parser)]
#[command(name = "gateway", about = "SIP/RTP media gateway")]
struct Cli {
    /// Path to the gateway's YAML configuration file.
    #[arg(long, default_value = "./config/gateway.yaml")]
    config: PathBuf,
}

fn load_config(path: &std::path::Path) -> anyhow::Result<GatewayConfig> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(serde_yaml::from_str(&text)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Ok(GatewayConfig::default())
        }
        Err(err) => Err(err.into()),
    }
}

fn init_logging(log_level: &str) {
    let filter = match log_level.to_ascii_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARN" => "warn",
        "ERROR" => "error",
        _ => "info",
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Arc::new(load_config(&cli.config)?);
    init_logging(&config.log_level);

    let bind_ip: Ipv4Addr = config
        .bind_ip
        .parse()
        .unwrap_or_else(|_| Ipv4Addr::UNSPECIFIED);

    let rtp_worker_count = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(RTP_WORKER_COUNT_FALLBACK);
    let rtp = Arc::new(RtpWorkerPool::new(
        bind_ip,
        config.rtp_port_start,
        config.rtp_port_end,
        rtp_worker_count,
    )?);
    let registry = Arc::new(CallRegistry::new());
    let transactions = Arc::new(TransactionManager::new());
    let transport = Arc::new(UdpSipTransport::bind(bind_ip, config.sip_port, SIP_POLL_TIMEOUT)?);
    let transport_dyn: Arc<dyn gateway_call::SipTransport> = transport.clone();

    let deps = gateway_call::Deps {
        config: Arc::clone(&config),
        registry: Arc::clone(&registry),
        rtp: Arc::clone(&rtp),
        transactions: Arc::clone(&transactions),
        transport: transport_dyn,
    };

    let rtp_registry = Arc::clone(&registry);
    let on_rtp: gateway_rtp::PacketHandler = Arc::new(move |port, data, sender| {
        let Some(session) = rtp_registry.get_call_by_port(port) else {
            return;
        };
        let Some(packet) = RtpPacket::parse(data) else {
            return;
        };
        session.on_rtp_packet(packet, sender);
    });
    let on_rtcp: gateway_rtp::PacketHandler = Arc::new(|port, data, _sender| {
        if let Some(kind) = gateway_rtp::classify_rtcp(data) {
            tracing::debug!(port, ?kind, "received RTCP");
        }
    });
    rtp.start(Handlers { on_rtp, on_rtcp });

    let dispatcher = Arc::new(Dispatcher::new(deps));

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            running.store(false, Ordering::Release);
        })?;
    }

    let cli_running = Arc::clone(&running);
    let cli_registry = Arc::clone(&registry);
    let cli_dispatcher = Arc::clone(&dispatcher);
    std::thread::spawn(move || cli_loop(cli_running, cli_registry, cli_dispatcher));

    tracing::info!("gateway running, press Ctrl+C to exit");
    let mut last_sweep = Instant::now();
    let mut buf = [0u8; gateway_rtp::packet::MAX_PACKET_LEN];

    while running.load(Ordering::Acquire) {
        if let Some((n, sender)) = transport.recv(&mut buf) {
            match SipMessage::parse(&buf[..n]) {
                Ok(msg) if msg.is_request() => dispatcher.handle_request(&msg, sender),
                Ok(_) => tracing::debug!("ignoring unsolicited SIP response"),
                Err(err) => tracing::debug!(%err, "dropping malformed SIP datagram"),
            }
        }

        if last_sweep.elapsed() >= TRANSACTION_SWEEP_INTERVAL {
            dispatcher.sweep_transactions();
            last_sweep = Instant::now();
        }

        // §9's per-call drain timer: give every call's jitter buffer a
        // chance to release a stranded tail once its stream goes idle,
        // riding the same 10ms poll deadline as the SIP recv above.
        dispatcher.drain_idle_jitter_buffers();
    }

    tracing::info!("shutting down, terminating active calls");
    dispatcher.terminate_all();
    rtp.stop();

    Ok(())
}

fn cli_loop(running: Arc<AtomicBool>, registry: Arc<CallRegistry>, dispatcher: Arc<Dispatcher>) {
    use std::io::BufRead;
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        if !running.load(Ordering::Acquire) {
            break;
        }
        let Ok(line) = line else { break };
        let line = line.trim();
        if line == "list" {
            tracing::info!(active_calls = registry.count(), "active calls");
        } else if let Some(id) = line.strip_prefix("cut ") {
            let cut = dispatcher.cut_call(id.trim());
            tracing::info!(call_id = id.trim(), cut, "cut call");
        } else if line == "exit" || line == "quit" {
            running.store(false, Ordering::Release);
            break;
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("failed to start gateway: {err:#}");
        std::process::exit(1);
    }
}
