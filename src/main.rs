#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Node entrypoint (systemd-friendly): opens the identity/node/ledger
//! stores, wires the consensus engine to the transport layer, and keeps
//! the process alive, running the round ticker until killed.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use ddns_node::core::apply;
use ddns_node::core::consensus::engine::{BlockApplier, ConsensusEngine};
use ddns_node::core::identity;
use ddns_node::core::ledger::snapshot::{self as ledger_snapshot, SnapshotError};
use ddns_node::core::ledger::{Ledger, TransactionStatus};
use ddns_node::core::membership;
use ddns_node::core::message::{Envelope, MessageType};
use ddns_node::core::node_store::NodeStore;
use ddns_node::core::api::NodeHandle;
use ddns_node::core::security::keystore::{Keystore, P256Backend};
use ddns_node::core::sync;
use ddns_node::core::types::{Block, NodeConfig, Role, Transaction};
use ddns_node::monitoring::metrics::Metrics;
use ddns_node::networking::handler::{HandlerRegistry, MessageHandler};
use ddns_node::networking::transport::{self, TcpSnapshotSource, TransportConfig, TransportEvent, TransportHandle};

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// Pick a peer to pull a catch-up snapshot from: the configured bootstrap
/// node if known, otherwise any other node in the local roster.
fn pick_known_peer(node_store: &NodeStore, self_public_key: &str) -> Option<String> {
    if let Ok(Some(ip)) = node_store.get_bootstrap_ip() {
        return Some(ip);
    }
    node_store
        .get_all_nodes()
        .ok()?
        .into_iter()
        .find(|node| node.public_key != self_public_key)
        .map(|node| node.ip)
}

/// A [`BlockApplier`] over a long-lived, shared ledger handle.
struct SharedLedgerApplier(Arc<Ledger>);

impl BlockApplier for SharedLedgerApplier {
    fn apply_block(&self, block: &Block) -> Vec<(String, TransactionStatus)> {
        apply::apply_block(&self.0, block)
    }
}

/// Routes inbound wire messages to the right subsystem: membership,
/// election (via [`NodeHandle`]), or the consensus engine.
struct NodeMessageHandler {
    node_store: NodeStore,
    engine: Arc<ConsensusEngine>,
    api: Arc<NodeHandle>,
    transport: TransportHandle,
    ledger: Arc<Ledger>,
    self_ip: String,
    self_public_key: String,
    /// Directory `TcpSnapshotSource` stages pulled snapshots into.
    sync_scratch_dir: PathBuf,
    /// Directory served to peers pulling on `sync_port` (see `spawn_transport`).
    serve_dir: PathBuf,
    sync_port: u16,
}

impl NodeMessageHandler {
    /// Export the current ledger and atomically replace `serve_dir` with it,
    /// so the next peer to pull on `sync_port` gets an up-to-date snapshot.
    fn stage_snapshot_for_serving(&self) -> Result<(), SnapshotError> {
        let exported = ledger_snapshot::export_snapshot(self.ledger.db_path(), &self.sync_scratch_dir, now_ms())?;
        let result = ledger_snapshot::import_snapshot(&exported, &self.serve_dir);
        let _ = std::fs::remove_dir_all(&exported);
        result
    }

    /// Send a `SYNC_REQUEST` to `peer_ip` and, in the background, pull the
    /// snapshot it answers with. On success the ledger directory has already
    /// been replaced on disk, so the process exits and relies on the
    /// supervisor to restart it against the freshly imported ledger.
    fn request_sync(&self, peer_ip: &str) {
        match sync::create_sync_request(&self.self_ip, &self.self_public_key) {
            Ok(envelope) => self.transport.send_direct(peer_ip.to_string(), envelope),
            Err(e) => {
                warn!(err = ?e, "failed to build sync request");
                return;
            }
        }

        let sync_port = self.sync_port;
        let sync_scratch_dir = self.sync_scratch_dir.clone();
        let ledger = self.ledger.clone();
        let peer_ip = peer_ip.to_string();
        tokio::spawn(async move {
            let source = TcpSnapshotSource::new(sync_port, sync_scratch_dir);
            let db_path = ledger.db_path().to_path_buf();
            match sync::sync(&db_path, &source, &peer_ip) {
                Ok(_) => {
                    info!(peer = %peer_ip, "catch-up sync complete, restarting to adopt it");
                    std::process::exit(0);
                }
                Err(e) => warn!(peer = %peer_ip, err = ?e, "catch-up sync failed"),
            }
        });
    }

    fn dispatch(&self, envelope: &Envelope) {
        match envelope.message_type {
            MessageType::FetchNodes => {
                let Ok(Some(self_node)) = self.node_store.get_self_node() else {
                    return;
                };
                match membership::build_fetch_response(&self.node_store, &self_node.ip, &self_node.public_key) {
                    Ok(reply) => self.transport.send_direct(envelope.sender_ip.clone(), reply),
                    Err(e) => warn!(err = ?e, "failed to build fetch-nodes response"),
                }
            }
            MessageType::FetchNodesResponse => {
                if let Err(e) = membership::apply_fetch_response(&self.node_store, envelope) {
                    warn!(err = ?e, "failed to apply fetch-nodes response");
                }
            }
            MessageType::AddNode => {
                if let Err(e) = membership::apply_add_node(&self.node_store, envelope) {
                    warn!(err = ?e, "failed to apply add-node");
                }
            }
            MessageType::DeleteNode => {
                if let Err(e) = membership::apply_delete_node(&self.node_store, envelope) {
                    warn!(err = ?e, "failed to apply delete-node");
                }
            }
            MessageType::PromoteNode => {
                if let Err(e) = membership::apply_promote_node(&self.node_store, envelope) {
                    warn!(err = ?e, "failed to apply promote-node");
                }
            }
            MessageType::NominationRequest => {
                if let Err(e) = self.api.on_nomination_request(envelope) {
                    warn!(err = ?e, "failed to record nomination");
                }
            }
            MessageType::CastVote => {
                if let Err(e) = self.api.on_cast_vote(envelope) {
                    warn!(err = ?e, "failed to record vote");
                }
            }
            MessageType::TransactionPublish => match envelope.parse_payload::<Transaction>() {
                Ok(tx) => {
                    self.engine.on_transaction_publish(tx);
                }
                Err(e) => warn!(err = ?e, "malformed transaction-publish payload"),
            },
            MessageType::BlockPublish => match envelope.parse_payload::<Block>() {
                Ok(block) => {
                    let previous_hash = block.previous_hash.clone();
                    if !self.engine.on_block_publish(block, now_ms()) {
                        warn!(peer = %envelope.sender_ip, "rejected block publish (stale tip or duplicate)");
                        if let Ok(tip) = self.ledger.get_latest_block_hash() {
                            if sync::needs_sync(&previous_hash, &tip) {
                                self.request_sync(&envelope.sender_ip);
                            }
                        }
                    }
                }
                Err(e) => warn!(err = ?e, "malformed block-publish payload"),
            },
            MessageType::SyncRequest => {
                if let Err(e) = self.stage_snapshot_for_serving() {
                    warn!(err = ?e, "failed to stage snapshot for sync-serve");
                }
            }
            MessageType::SyncResponse => {
                // No payload to act on; the snapshot itself arrives over the
                // dedicated sync-serve connection opened by `TcpSnapshotSource`.
            }
        }
    }
}

impl MessageHandler for NodeMessageHandler {
    fn on_broadcast(&self, envelope: &Envelope) {
        self.dispatch(envelope);
    }
    fn on_direct(&self, envelope: &Envelope) {
        self.dispatch(envelope);
    }
    fn on_multicast(&self, envelope: &Envelope) {
        self.dispatch(envelope);
    }
}

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt().with_target(false).with_level(true).compact().try_init();

    let data_dir = env("DDNS_DATA_DIR", "./data");
    std::fs::create_dir_all(&data_dir).expect("failed to create data dir");
    let self_ip = env("DDNS_SELF_IP", "127.0.0.1");

    let keystore = Keystore::<P256Backend>::open(&data_dir).expect("keystore init failed");
    let node_store = NodeStore::open(&format!("{data_dir}/utility.db")).expect("node store init failed");

    let self_public_key = identity::encode_public_key(&keystore.public_key());
    let self_node = match node_store.get_self_node().expect("node store read failed") {
        Some(existing) => existing,
        None => {
            let fresh = NodeConfig::new(self_ip.clone(), Role::None, self_public_key.clone());
            node_store.set_self_node(&fresh).expect("failed to persist self node");
            fresh
        }
    };

    let ledger = Arc::new(Ledger::open(&format!("{data_dir}/block.bin")).expect("ledger init failed"));
    let metrics = Arc::new(Metrics::new().expect("metrics init failed"));
    let registry = Arc::new(HandlerRegistry::new());

    let transport_cfg = TransportConfig {
        bind_ip: Ipv4Addr::UNSPECIFIED,
        udp_port: env_u16("DDNS_UDP_PORT", 6969),
        tcp_direct_port: env_u16("DDNS_TCP_DIRECT_PORT", 6970),
        tcp_file_port: env_u16("DDNS_TCP_FILE_PORT", 6971),
        tcp_sync_port: env_u16("DDNS_TCP_SYNC_PORT", 6972),
        multicast_group: Ipv4Addr::new(230, 0, 0, 1),
        scratch_dir: PathBuf::from(format!("{data_dir}/sync-scratch")),
    };
    let sync_scratch_dir = transport_cfg.scratch_dir.clone();
    let serve_dir = sync_scratch_dir.join("serve");
    let sync_port = transport_cfg.tcp_sync_port;

    let (transport_handle, mut transport_events, transport_join) =
        transport::spawn_transport(transport_cfg, metrics.clone(), registry.clone()).expect("transport init failed");

    let engine = Arc::new(ConsensusEngine::new(
        self_node.clone(),
        ledger.clone(),
        Arc::new(transport_handle.clone()),
        Arc::new(SharedLedgerApplier(ledger.clone())),
        now_ms(),
    ));

    for peer in node_store.get_all_nodes().expect("failed to read known peers") {
        engine.leader_queue().insert(peer);
    }

    let node_handle = Arc::new(NodeHandle::new(
        keystore,
        node_store.clone(),
        ledger.clone(),
        engine.clone(),
        Arc::new(transport_handle.clone()),
    ));

    let handler = Arc::new(NodeMessageHandler {
        node_store: node_store.clone(),
        engine: engine.clone(),
        api: node_handle.clone(),
        transport: transport_handle.clone(),
        ledger: ledger.clone(),
        self_ip: self_node.ip.clone(),
        self_public_key: self_public_key.clone(),
        sync_scratch_dir,
        serve_dir,
        sync_port,
    });
    registry.register(handler.clone());

    if let Some(bootstrap_ip) = std::env::var("DDNS_BOOTSTRAP_IP").ok().filter(|s| !s.is_empty()) {
        match node_handle.join(&bootstrap_ip) {
            Ok(env) => transport_handle.send_direct(bootstrap_ip, env),
            Err(e) => warn!(err = ?e, "failed to build join request"),
        }
    } else if let Ok(status) = node_handle.check_fetch_result() {
        info!(?status, "startup membership status");
    }

    if let Some(peer_ip) = pick_known_peer(&node_store, &self_public_key) {
        info!(peer = %peer_ip, "requesting catch-up sync on boot");
        handler.request_sync(&peer_ip);
    }

    info!(self_ip = %self_node.ip, public_key = %self_node.public_key, "ddns node starting");

    let events_ledger = ledger.clone();
    let events_task = tokio::spawn(async move {
        while let Some(event) = transport_events.recv().await {
            match event {
                TransportEvent::SnapshotReceived { peer_ip, path } => {
                    info!(peer = %peer_ip, path = ?path, "snapshot received, importing");
                    match sync::adopt_local_snapshot(events_ledger.db_path(), &path) {
                        Ok(_) => {
                            info!(peer = %peer_ip, "snapshot import complete, restarting to adopt it");
                            std::process::exit(0);
                        }
                        Err(e) => warn!(peer = %peer_ip, err = ?e, "failed to import received snapshot"),
                    }
                }
            }
        }
    });

    let round_engine = engine.clone();
    let round_metrics = metrics.clone();
    let round_ledger = ledger.clone();
    let round_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(2));
        loop {
            ticker.tick().await;
            round_engine.run_round(now_ms());
            round_metrics.mempool_size.set(round_engine.mempool().len() as i64);
            round_metrics.leader_queue_size.set(round_engine.leader_queue().len() as i64);
            if let Ok(blocks) = round_ledger.blocks() {
                round_metrics.block_height.set(blocks.len() as i64);
            }
        }
    });

    tokio::select! {
        _ = transport_join => warn!("transport task exited"),
        _ = events_task => warn!("transport event loop exited"),
        _ = round_task => warn!("round ticker exited"),
        _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
    }
}
