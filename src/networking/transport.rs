// Copyright (c) 2026 Ddns-node Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Transport (C3): `tokio`-spawned loops replacing the libp2p swarm loop
//! this module used to run, keeping its shape — a config struct, a
//! `spawn_*` function returning `(Handle, EventReceiver, JoinHandle)`,
//! `tokio::select!` dispatch, `tracing` logs, `Metrics` counters for
//! drops/invalid messages.
//!
//! 1. UDP broadcast + multicast listener/sender on `udp_port`, split across
//!    two sockets (see `run_udp_loop`) since a destination address isn't
//!    visible through `recv_from` on a single wildcard-bound socket.
//! 2. TCP direct listener on `tcp_direct_port` (newline-delimited JSON).
//! 3. TCP file-transfer listener on `tcp_file_port`, used for unsolicited
//!    snapshot pushes: each file is framed as a u32 name length, the utf8
//!    name, a u64 size, then that many bytes; a zero-length name ends the
//!    stream.
//! 4. TCP sync-serve listener on `tcp_sync_port`, answering a peer's
//!    `SYNC_REQUEST` pull with this node's current snapshot directory using
//!    the same file framing.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::core::consensus::engine::Broadcaster;
use crate::core::message::Envelope;
use crate::core::sync::SyncError;
use crate::monitoring::metrics::Metrics;
use crate::networking::handler::HandlerRegistry;
use crate::networking::peer_score::{Decision, PeerScore, ScoreParams};

/// Runtime configuration for the transport subsystem.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Local address to bind all three listeners to.
    pub bind_ip: Ipv4Addr,
    /// UDP broadcast/multicast port.
    pub udp_port: u16,
    /// TCP direct-message port.
    pub tcp_direct_port: u16,
    /// TCP file-transfer port (unsolicited snapshot pushes).
    pub tcp_file_port: u16,
    /// TCP port a lagging peer pulls a snapshot from on demand.
    pub tcp_sync_port: u16,
    /// Multicast group peers join to receive broadcasts.
    pub multicast_group: Ipv4Addr,
    /// Directory new snapshot transfers are staged into before handoff to
    /// `core::sync`.
    pub scratch_dir: PathBuf,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_ip: Ipv4Addr::UNSPECIFIED,
            udp_port: 6969,
            tcp_direct_port: 6970,
            tcp_file_port: 6971,
            tcp_sync_port: 6972,
            multicast_group: Ipv4Addr::new(230, 0, 0, 1),
            scratch_dir: PathBuf::from("sync-scratch"),
        }
    }
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A socket could not be bound or configured.
    #[error("io")]
    Io,
}

impl From<std::io::Error> for TransportError {
    fn from(_: std::io::Error) -> Self {
        TransportError::Io
    }
}

/// Events surfaced to the owning node outside of the handler registry.
#[derive(Clone, Debug)]
pub enum TransportEvent {
    /// A snapshot directory finished transferring from `peer_ip` and is
    /// staged at `path`, ready for `core::sync::sync` to import.
    SnapshotReceived {
        /// The sender's address text.
        peer_ip: String,
        /// Local scratch path the snapshot was written to.
        path: PathBuf,
    },
}

/// Receiver of transport events.
pub type EventRx = mpsc::Receiver<TransportEvent>;

enum OutboundCommand {
    Broadcast(Envelope),
    Multicast(Envelope),
    Direct { peer_ip: String, envelope: Envelope },
}

/// Handle used to send messages; cheap to clone.
#[derive(Clone)]
pub struct TransportHandle {
    outbound_tx: mpsc::Sender<OutboundCommand>,
}

impl TransportHandle {
    /// Send `envelope` as a UDP broadcast to the local subnet.
    pub fn broadcast(&self, envelope: Envelope) {
        let _ = self.outbound_tx.try_send(OutboundCommand::Broadcast(envelope));
    }

    /// Send `envelope` as a UDP multicast to the configured group.
    pub fn multicast(&self, envelope: Envelope) {
        let _ = self.outbound_tx.try_send(OutboundCommand::Multicast(envelope));
    }

    /// Send `envelope` directly to one peer over TCP.
    pub fn send_direct(&self, peer_ip: String, envelope: Envelope) {
        let _ = self.outbound_tx.try_send(OutboundCommand::Direct { peer_ip, envelope });
    }
}

impl Broadcaster for TransportHandle {
    fn broadcast(&self, envelope: &Envelope) {
        self.broadcast(envelope.clone());
    }
}

/// A [`crate::core::sync::SnapshotSource`] that pulls a snapshot from a
/// peer's sync-serve port and stages it under `scratch_dir`.
pub struct TcpSnapshotSource {
    sync_port: u16,
    scratch_dir: PathBuf,
}

impl TcpSnapshotSource {
    /// Build a source targeting `sync_port`, staging received files under
    /// `scratch_dir`.
    pub fn new(sync_port: u16, scratch_dir: PathBuf) -> Self {
        Self { sync_port, scratch_dir }
    }
}

impl crate::core::sync::SnapshotSource for TcpSnapshotSource {
    fn fetch_snapshot(&self, peer_ip: &str) -> Result<PathBuf, SyncError> {
        let rt = tokio::runtime::Handle::try_current().map_err(|_| SyncError::Transfer)?;
        let sync_port = self.sync_port;
        let scratch_dir = self.scratch_dir.clone();
        let peer_ip = peer_ip.to_string();
        tokio::task::block_in_place(|| {
            rt.block_on(async move { fetch_snapshot_async(&peer_ip, sync_port, &scratch_dir).await })
        })
    }
}

async fn fetch_snapshot_async(peer_ip: &str, sync_port: u16, scratch_dir: &Path) -> Result<PathBuf, SyncError> {
    let addr = format!("{}:{}", peer_ip, sync_port);
    let stream = TcpStream::connect(&addr).await.map_err(|_| SyncError::Transfer)?;
    let dest = scratch_dir.join(unique_dir_name());
    tokio::fs::create_dir_all(&dest).await.map_err(|_| SyncError::Transfer)?;
    receive_file_stream(stream, &dest).await.map_err(|_| SyncError::Transfer)?;
    Ok(dest)
}

fn unique_dir_name() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("recv-{}-{}", std::process::id(), n)
}

/// Write every regular file under `dir` (recursively) to `stream`, framed as
/// `u32 name_len ∥ utf8 name ∥ u64 size ∥ bytes`, terminated by a zero-length
/// name.
async fn send_file_stream(stream: &mut TcpStream, dir: &Path) -> std::io::Result<()> {
    let mut stack = vec![PathBuf::new()];
    while let Some(rel) = stack.pop() {
        let abs = dir.join(&rel);
        let mut entries = tokio::fs::read_dir(&abs).await?;
        while let Some(entry) = entries.next_entry().await? {
            let entry_rel = rel.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                stack.push(entry_rel);
                continue;
            }
            let name = entry_rel.to_string_lossy().into_owned();
            let bytes = tokio::fs::read(entry.path()).await?;
            stream.write_u32(name.len() as u32).await?;
            stream.write_all(name.as_bytes()).await?;
            stream.write_u64(bytes.len() as u64).await?;
            stream.write_all(&bytes).await?;
        }
    }
    stream.write_u32(0).await?;
    stream.flush().await
}

async fn receive_file_stream(stream: TcpStream, dest_dir: &Path) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);
    loop {
        let name_len = reader.read_u32().await?;
        if name_len == 0 {
            break;
        }
        let mut name_bytes = vec![0u8; name_len as usize];
        reader.read_exact(&mut name_bytes).await?;
        let name = String::from_utf8_lossy(&name_bytes).into_owned();
        let size = reader.read_u64().await?;
        let mut body = vec![0u8; size as usize];
        reader.read_exact(&mut body).await?;

        let rel = Path::new(&name);
        let dest = dest_dir.join(rel);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&dest, &body).await?;
    }
    Ok(())
}

/// Serve `dir` to every connecting peer, for as long as the owning node runs.
/// Used on `tcp_sync_port` to answer a `SYNC_REQUEST` with this node's
/// current block-ledger snapshot.
pub fn serve_snapshot_dir(listener_port_label: &'static str, dir: PathBuf, mut incoming: mpsc::Receiver<TcpStream>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(mut stream) = incoming.recv().await {
            if let Err(e) = send_file_stream(&mut stream, &dir).await {
                warn!(label = listener_port_label, err = ?e, "snapshot transfer to peer failed");
            }
        }
    })
}

fn envelope_bytes(envelope: &Envelope) -> Option<Vec<u8>> {
    envelope.to_line().ok().map(String::into_bytes)
}

/// Score, log and dispatch one inbound datagram's bytes, routing it through
/// `dispatch` (broadcast or multicast, depending on which socket delivered
/// it).
fn handle_datagram(
    bytes: &[u8],
    from: std::net::SocketAddr,
    scores: &Mutex<PeerScore>,
    metrics: &Metrics,
    registry: &HandlerRegistry,
    dispatch: impl Fn(&HandlerRegistry, &Envelope),
) {
    let peer_ip = from.ip().to_string();
    let mut guard = scores.lock().expect("peer score lock");
    if guard.score_of(peer_ip.as_bytes()) <= -200 {
        return;
    }
    match Envelope::from_line(&String::from_utf8_lossy(bytes)) {
        Ok(envelope) => {
            guard.observe_good(peer_ip.as_bytes().to_vec(), Instant::now(), 1);
            drop(guard);
            dispatch(registry, &envelope);
        }
        Err(_) => {
            let decision = guard.observe_bad(peer_ip.as_bytes().to_vec(), Instant::now(), 1);
            drop(guard);
            metrics.transport_invalid_total.inc();
            if decision == Decision::Ban {
                warn!(peer = %peer_ip, "peer banned after repeated malformed udp messages");
            }
        }
    }
}

/// Wait on `socket`'s next datagram, or never resolve if `socket` is `None`
/// (the multicast socket failed to bind). Lets the caller `select!` over an
/// optional second socket without a separate branch per outcome.
async fn recv_or_pending(socket: &Option<UdpSocket>, buf: &mut [u8]) -> std::io::Result<(usize, std::net::SocketAddr)> {
    match socket {
        Some(s) => s.recv_from(buf).await,
        None => std::future::pending().await,
    }
}

async fn run_udp_loop(
    cfg: TransportConfig,
    metrics: Arc<Metrics>,
    registry: Arc<HandlerRegistry>,
    mut outbound: mpsc::Receiver<(bool, Envelope)>,
) {
    let socket = match UdpSocket::bind((cfg.bind_ip, cfg.udp_port)).await {
        Ok(s) => s,
        Err(e) => {
            warn!(err = ?e, "udp bind failed");
            return;
        }
    };
    if let Err(e) = socket.set_broadcast(true) {
        warn!(err = ?e, "failed to enable udp broadcast");
    }

    // A packet's destination address isn't visible through `recv_from` on a
    // single wildcard-bound socket, so multicast traffic is told apart from
    // broadcast/unicast traffic by binding a second socket directly to the
    // group address: only datagrams actually addressed to the group land on
    // it, while broadcast/unicast continue to arrive on `socket` above.
    let mcast_socket = match UdpSocket::bind((cfg.multicast_group, cfg.udp_port)).await {
        Ok(s) => match s.join_multicast_v4(cfg.multicast_group, cfg.bind_ip) {
            Ok(()) => Some(s),
            Err(e) => {
                warn!(err = ?e, group = %cfg.multicast_group, "failed to join multicast group");
                None
            }
        },
        Err(e) => {
            warn!(err = ?e, group = %cfg.multicast_group, "multicast socket bind failed; multicast messages will not be received");
            None
        }
    };

    let scores = Mutex::new(PeerScore::new(ScoreParams::default()));
    let mut buf = vec![0u8; 64 * 1024];
    let mut mcast_buf = vec![0u8; 64 * 1024];

    info!(port = cfg.udp_port, group = %cfg.multicast_group, "udp listener started");

    loop {
        tokio::select! {
            maybe_cmd = outbound.recv() => {
                match maybe_cmd {
                    Some((is_multicast, envelope)) => {
                        let Some(bytes) = envelope_bytes(&envelope) else {
                            metrics.transport_invalid_total.inc();
                            continue;
                        };
                        let dest = if is_multicast {
                            (cfg.multicast_group, cfg.udp_port)
                        } else {
                            (Ipv4Addr::BROADCAST, cfg.udp_port)
                        };
                        if let Err(e) = socket.send_to(&bytes, dest).await {
                            warn!(err = ?e, "udp send failed");
                            metrics.transport_send_failed_total.inc();
                        }
                    }
                    None => {
                        warn!("udp outbound channel closed");
                        break;
                    }
                }
            }

            recv = socket.recv_from(&mut buf) => {
                let (n, from) = match recv {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(err = ?e, "udp recv failed");
                        continue;
                    }
                };
                handle_datagram(&buf[..n], from, &scores, &metrics, &registry, HandlerRegistry::dispatch_broadcast);
            }

            recv = recv_or_pending(&mcast_socket, &mut mcast_buf) => {
                let (n, from) = match recv {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(err = ?e, "udp multicast recv failed");
                        continue;
                    }
                };
                handle_datagram(&mcast_buf[..n], from, &scores, &metrics, &registry, HandlerRegistry::dispatch_multicast);
            }
        }
    }
}

async fn handle_direct_connection(stream: TcpStream, registry: Arc<HandlerRegistry>, metrics: Arc<Metrics>) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match tokio::io::AsyncBufReadExt::read_line(&mut reader, &mut line).await {
            Ok(0) => break,
            Ok(_) => match Envelope::from_line(&line) {
                Ok(envelope) => registry.dispatch_direct(&envelope),
                Err(_) => metrics.transport_invalid_total.inc(),
            },
            Err(_) => break,
        }
    }
}

async fn run_tcp_direct_loop(
    cfg: TransportConfig,
    metrics: Arc<Metrics>,
    registry: Arc<HandlerRegistry>,
    mut outbound: mpsc::Receiver<(String, Envelope)>,
) {
    let listener = match TcpListener::bind((cfg.bind_ip, cfg.tcp_direct_port)).await {
        Ok(l) => l,
        Err(e) => {
            warn!(err = ?e, "tcp direct bind failed");
            return;
        }
    };
    info!(port = cfg.tcp_direct_port, "tcp direct listener started");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let registry = registry.clone();
                        let metrics = metrics.clone();
                        tokio::spawn(handle_direct_connection(stream, registry, metrics));
                    }
                    Err(e) => warn!(err = ?e, "tcp direct accept failed"),
                }
            }

            maybe_cmd = outbound.recv() => {
                match maybe_cmd {
                    Some((peer_ip, envelope)) => {
                        let port = cfg.tcp_direct_port;
                        let metrics = metrics.clone();
                        tokio::spawn(async move {
                            if let Err(e) = send_direct_once(&peer_ip, port, &envelope).await {
                                warn!(peer = %peer_ip, err = ?e, "direct send failed");
                                metrics.transport_send_failed_total.inc();
                            }
                        });
                    }
                    None => {
                        warn!("tcp direct outbound channel closed");
                        break;
                    }
                }
            }
        }
    }
}

async fn send_direct_once(peer_ip: &str, port: u16, envelope: &Envelope) -> std::io::Result<()> {
    let mut stream = TcpStream::connect((peer_ip, port)).await?;
    let line = envelope.to_line().map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "malformed envelope"))?;
    stream.write_all(line.as_bytes()).await?;
    stream.flush().await
}

async fn run_tcp_file_loop(cfg: TransportConfig, metrics: Arc<Metrics>, ev_tx: mpsc::Sender<TransportEvent>) {
    let listener = match TcpListener::bind((cfg.bind_ip, cfg.tcp_file_port)).await {
        Ok(l) => l,
        Err(e) => {
            warn!(err = ?e, "tcp file bind failed");
            return;
        }
    };
    info!(port = cfg.tcp_file_port, "tcp file-transfer listener started");

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                warn!(err = ?e, "tcp file accept failed");
                continue;
            }
        };
        let peer_ip = addr.ip().to_string();
        let scratch_dir = cfg.scratch_dir.clone();
        let ev_tx = ev_tx.clone();
        let metrics = metrics.clone();
        tokio::spawn(async move {
            let dest = scratch_dir.join(unique_dir_name());
            if let Err(e) = tokio::fs::create_dir_all(&dest).await {
                warn!(err = ?e, "failed to create scratch dir");
                return;
            }
            if let Err(e) = receive_file_stream(stream, &dest).await {
                warn!(peer = %peer_ip, err = ?e, "incoming file transfer failed");
                metrics.transport_dropped_total.inc();
                return;
            }
            let _ = ev_tx.send(TransportEvent::SnapshotReceived { peer_ip, path: dest }).await;
        });
    }
}

/// Accept loop for `cfg.tcp_sync_port`, forwarding each accepted stream to
/// `serve_snapshot_dir` rather than reading from it: this port answers a
/// peer's `SYNC_REQUEST` pull with a fresh copy of `dir`'s current contents.
async fn run_tcp_sync_accept_loop(cfg: TransportConfig, conn_tx: mpsc::Sender<TcpStream>) {
    let listener = match TcpListener::bind((cfg.bind_ip, cfg.tcp_sync_port)).await {
        Ok(l) => l,
        Err(e) => {
            warn!(err = ?e, "tcp sync bind failed");
            return;
        }
    };
    info!(port = cfg.tcp_sync_port, "tcp sync-serve listener started");

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                if conn_tx.send(stream).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!(err = ?e, "tcp sync accept failed"),
        }
    }
}

/// Spawn the transport subsystem's listener loops.
pub fn spawn_transport(
    cfg: TransportConfig,
    metrics: Arc<Metrics>,
    registry: Arc<HandlerRegistry>,
) -> Result<(TransportHandle, EventRx, JoinHandle<()>), TransportError> {
    std::fs::create_dir_all(&cfg.scratch_dir)?;
    let serve_dir = cfg.scratch_dir.join("serve");
    std::fs::create_dir_all(&serve_dir)?;

    let (out_tx, out_rx) = mpsc::channel::<OutboundCommand>(1024);
    let (ev_tx, ev_rx) = mpsc::channel::<TransportEvent>(128);

    let (udp_out_tx, udp_out_rx) = mpsc::channel::<(bool, Envelope)>(1024);
    let (direct_out_tx, direct_out_rx) = mpsc::channel::<(String, Envelope)>(1024);
    let (sync_conn_tx, sync_conn_rx) = mpsc::channel::<TcpStream>(16);

    let udp_cfg = cfg.clone();
    let udp_metrics = metrics.clone();
    let udp_registry = registry.clone();
    let udp_task = tokio::spawn(run_udp_loop(udp_cfg, udp_metrics, udp_registry, udp_out_rx));

    let direct_cfg = cfg.clone();
    let direct_metrics = metrics.clone();
    let direct_registry = registry.clone();
    let direct_task = tokio::spawn(run_tcp_direct_loop(direct_cfg, direct_metrics, direct_registry, direct_out_rx));

    let file_cfg = cfg.clone();
    let file_metrics = metrics.clone();
    let file_task = tokio::spawn(run_tcp_file_loop(file_cfg, file_metrics, ev_tx));

    let sync_accept_cfg = cfg.clone();
    let sync_accept_task = tokio::spawn(run_tcp_sync_accept_loop(sync_accept_cfg, sync_conn_tx));
    let sync_serve_task = serve_snapshot_dir("tcp_sync_port", serve_dir, sync_conn_rx);

    let router = tokio::spawn(async move {
        let mut out_rx = out_rx;
        while let Some(cmd) = out_rx.recv().await {
            match cmd {
                OutboundCommand::Broadcast(envelope) => {
                    let _ = udp_out_tx.send((false, envelope)).await;
                }
                OutboundCommand::Multicast(envelope) => {
                    let _ = udp_out_tx.send((true, envelope)).await;
                }
                OutboundCommand::Direct { peer_ip, envelope } => {
                    let _ = direct_out_tx.send((peer_ip, envelope)).await;
                }
            }
        }
    });

    let join = tokio::spawn(async move {
        let _ = tokio::join!(udp_task, direct_task, file_task, sync_accept_task, sync_serve_task, router);
    });

    Ok((TransportHandle { outbound_tx: out_tx }, ev_rx, join))
}

/// Track the per-peer send-failure history used when rebroadcasting role
/// announcements to a membership roster, banning peers that have repeatedly
/// failed delivery.
pub fn should_send(peer_failures: &HashMap<String, u32>, peer_ip: &str, ban_after: u32) -> bool {
    peer_failures.get(peer_ip).copied().unwrap_or(0) < ban_after
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::MessageType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        broadcasts: AtomicUsize,
        multicasts: AtomicUsize,
    }
    impl crate::networking::handler::MessageHandler for CountingHandler {
        fn on_broadcast(&self, _envelope: &Envelope) {
            self.broadcasts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_direct(&self, _envelope: &Envelope) {}
        fn on_multicast(&self, _envelope: &Envelope) {
            self.multicasts.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn handle_datagram_routes_to_the_dispatch_it_is_given() {
        let registry = HandlerRegistry::new();
        let handler = Arc::new(CountingHandler { broadcasts: AtomicUsize::new(0), multicasts: AtomicUsize::new(0) });
        registry.register(handler.clone());
        let metrics = Metrics::new().unwrap();
        let scores = Mutex::new(PeerScore::new(ScoreParams::default()));

        let envelope = Envelope::new(MessageType::FetchNodes, "1.2.3.4", "pk", &()).unwrap();
        let line = envelope.to_line().unwrap();
        let from: std::net::SocketAddr = "1.2.3.4:9999".parse().unwrap();

        handle_datagram(line.as_bytes(), from, &scores, &metrics, &registry, HandlerRegistry::dispatch_multicast);
        assert_eq!(handler.multicasts.load(Ordering::SeqCst), 1);
        assert_eq!(handler.broadcasts.load(Ordering::SeqCst), 0);

        handle_datagram(line.as_bytes(), from, &scores, &metrics, &registry, HandlerRegistry::dispatch_broadcast);
        assert_eq!(handler.broadcasts.load(Ordering::SeqCst), 1);
        assert_eq!(handler.multicasts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_config_matches_well_known_ports() {
        let cfg = TransportConfig::default();
        assert_eq!(cfg.udp_port, 6969);
        assert_eq!(cfg.tcp_direct_port, 6970);
        assert_eq!(cfg.tcp_file_port, 6971);
        assert_eq!(cfg.tcp_sync_port, 6972);
        assert_eq!(cfg.multicast_group, Ipv4Addr::new(230, 0, 0, 1));
    }

    #[test]
    fn should_send_respects_failure_count() {
        let mut failures = HashMap::new();
        failures.insert("10.0.0.1".to_string(), 3);
        assert!(!should_send(&failures, "10.0.0.1", 3));
        assert!(should_send(&failures, "10.0.0.1", 4));
        assert!(should_send(&failures, "10.0.0.2", 1));
    }

    #[tokio::test]
    async fn file_stream_roundtrip_preserves_contents() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("src");
        tokio::fs::create_dir_all(src.join("nested")).await.unwrap();
        tokio::fs::write(src.join("a.txt"), b"hello").await.unwrap();
        tokio::fs::write(src.join("nested/b.txt"), b"world").await.unwrap();

        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let src_clone = src.clone();
        let sender = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            send_file_stream(&mut stream, &src_clone).await.unwrap();
        });

        let (stream, _) = listener.accept().await.unwrap();
        let dest = root.path().join("dest");
        tokio::fs::create_dir_all(&dest).await.unwrap();
        receive_file_stream(stream, &dest).await.unwrap();
        sender.await.unwrap();

        assert_eq!(tokio::fs::read(dest.join("a.txt")).await.unwrap(), b"hello");
        assert_eq!(tokio::fs::read(dest.join("nested/b.txt")).await.unwrap(), b"world");
    }
}
