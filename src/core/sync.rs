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
#![warn(missing_docs)]

//! Catch-up sync (C9): detect that the local chain has fallen behind,
//! pull a block-database snapshot from a peer, import it, and rebuild the
//! leader queue from the post-import membership set. Also hosts the two
//! small lifecycle actions the apply layer triggers: enrolling self into
//! the leader queue on acceptance, and announcing a promotion.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::core::consensus::leader_queue::CircularQueue;
use crate::core::ledger::{snapshot, Ledger, LedgerError};
use crate::core::message::{Envelope, MessageError, MessageType, NodePayload};
use crate::core::node_store::{NodeStore, NodeStoreError};
use crate::core::types::{NodeConfig, QueueNode};

/// Sync errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Fetching the snapshot from the peer failed.
    #[error("snapshot transfer failed")]
    Transfer,
    /// The snapshot failed to import.
    #[error("snapshot import failed")]
    Import,
    /// The local ledger could not be reopened after import.
    #[error("ledger reopen failed")]
    Reopen,
}

impl From<snapshot::SnapshotError> for SyncError {
    fn from(_: snapshot::SnapshotError) -> Self {
        SyncError::Import
    }
}

impl From<LedgerError> for SyncError {
    fn from(_: LedgerError) -> Self {
        SyncError::Reopen
    }
}

/// Fetches a block-database snapshot from a peer, writing it somewhere on
/// local disk and returning that path. Implemented by the transport layer
/// (`SYNC_REQUEST` direct send, then a file-transfer receive); faked in
/// tests.
pub trait SnapshotSource: Send + Sync {
    /// Request and receive a snapshot from `peer_ip`, returning the local
    /// path it was written to.
    fn fetch_snapshot(&self, peer_ip: &str) -> Result<PathBuf, SyncError>;
}

/// Whether a just-received block indicates the local chain has fallen
/// behind: its `previousHash` does not match our current tip.
pub fn needs_sync(block_previous_hash: &str, local_tip_hash: &str) -> bool {
    block_previous_hash != local_tip_hash
}

fn reopen(db_path: &Path) -> Result<Ledger, SyncError> {
    Ledger::open(db_path.to_str().ok_or(SyncError::Reopen)?).map_err(SyncError::from)
}

/// Pull a snapshot from `peer_ip` via `source`, import it over the database
/// at `db_path`, and reopen it. The caller is responsible for dropping any
/// previously open [`Ledger`] handle on `db_path` before calling this (the
/// import replaces the directory on disk).
pub fn sync(db_path: &Path, source: &dyn SnapshotSource, peer_ip: &str) -> Result<Ledger, SyncError> {
    info!(peer = peer_ip, "starting catch-up sync");
    let snapshot_path = source.fetch_snapshot(peer_ip)?;
    snapshot::import_snapshot(&snapshot_path, db_path)?;
    let ledger = reopen(db_path)?;
    info!(peer = peer_ip, "catch-up sync complete");
    Ok(ledger)
}

/// Import a snapshot that already landed on local disk (an unsolicited push
/// received over the file-transfer listener, as opposed to a pulled
/// `sync()`) over the database at `db_path`, and reopen it. Same caller
/// contract as `sync`: drop any open [`Ledger`] handle on `db_path` first.
pub fn adopt_local_snapshot(db_path: &Path, snapshot_path: &Path) -> Result<Ledger, SyncError> {
    snapshot::import_snapshot(snapshot_path, db_path)?;
    reopen(db_path)
}

/// Build the envelope requesting a snapshot from a known peer, sent on boot
/// or on seeing a block whose `previousHash` doesn't match our tip.
pub fn create_sync_request(self_ip: &str, self_public_key: &str) -> Result<Envelope, MessageError> {
    Envelope::new(MessageType::SyncRequest, self_ip, self_public_key, &())
}

/// Rebuild the leader queue from the final membership set after a sync,
/// assigning `sno` by ascending public key so every replica that rebuilds
/// from the same membership set produces the same rotation order.
pub fn rebuild_leader_queue(queue: &CircularQueue, members: &[NodeConfig]) {
    let mut sorted = members.to_vec();
    sorted.sort_by(|a, b| a.public_key.cmp(&b.public_key));
    let entries: Vec<QueueNode> =
        sorted.into_iter().enumerate().map(|(i, node_config)| QueueNode { node_config, sno: i as u64 }).collect();
    queue.reset_with(entries);
}

/// Re-derive the materialized DNS table from scratch by replaying every
/// block in chain order. Used after a snapshot import to rebuild state that
/// an apply bug or partial write might otherwise leave stale — the
/// snapshot already carries the DNS table, so this is a consistency check
/// more than a requirement, but it costs nothing to be sure.
pub fn replay_chain(ledger: &Ledger, apply_block: impl Fn(&crate::core::types::Block)) -> Result<(), SyncError> {
    let chain = ledger.chain_in_order()?;
    for block in &chain {
        apply_block(block);
    }
    Ok(())
}

/// Called once a `JOIN` election accepts this node: enroll self into the
/// leader queue so it participates in future rounds.
pub fn setup_normal_node(queue: &CircularQueue, self_node: &NodeConfig) {
    queue.insert(self_node.clone());
}

/// Build the envelope broadcasting this node's role change after a
/// `PROMOTE` election accepts it.
pub fn create_promote_request(self_node: &NodeConfig, self_ip: &str, self_public_key: &str) -> Result<Envelope, MessageError> {
    Envelope::new(MessageType::PromoteNode, self_ip, self_public_key, &NodePayload { node: self_node.clone() })
}

fn try_save_node_role(store: &NodeStore, self_node: &NodeConfig) -> Result<(), NodeStoreError> {
    store.save_role(self_node.role)?;
    store.set_self_node(self_node)
}

/// Persist the self node's promoted role before announcing it, so a crash
/// after broadcast but before persistence can't leave this node claiming a
/// role it never saved.
pub fn persist_promotion(store: &NodeStore, self_node: &NodeConfig) -> Result<(), NodeStoreError> {
    if let Err(e) = try_save_node_role(store, self_node) {
        warn!("failed to persist promotion before announcing it");
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Role;
    use std::fs;

    struct FakeSource {
        snapshot_dir: PathBuf,
    }
    impl SnapshotSource for FakeSource {
        fn fetch_snapshot(&self, _peer_ip: &str) -> Result<PathBuf, SyncError> {
            Ok(self.snapshot_dir.clone())
        }
    }

    #[test]
    fn needs_sync_detects_previous_hash_mismatch() {
        assert!(needs_sync("a", "b"));
        assert!(!needs_sync("a", "a"));
    }

    #[test]
    fn sync_imports_and_reopens_ledger() {
        let root = tempfile::tempdir().unwrap();
        let remote_db = root.path().join("remote.db");
        fs::create_dir_all(&remote_db).unwrap();
        {
            let remote_ledger = Ledger::open(remote_db.to_str().unwrap()).unwrap();
            let block = crate::core::types::Block::genesis(0);
            remote_ledger.insert_block(&block).unwrap();
        }

        let local_db = root.path().join("local.db");
        let source = FakeSource { snapshot_dir: remote_db };
        let ledger = sync(&local_db, &source, "1.2.3.4").unwrap();
        assert!(!ledger.blocks().unwrap().is_empty());
    }

    #[test]
    fn adopt_local_snapshot_imports_and_reopens_ledger() {
        let root = tempfile::tempdir().unwrap();
        let staged = root.path().join("staged.db");
        fs::create_dir_all(&staged).unwrap();
        {
            let staged_ledger = Ledger::open(staged.to_str().unwrap()).unwrap();
            let block = crate::core::types::Block::genesis(0);
            staged_ledger.insert_block(&block).unwrap();
        }

        let local_db = root.path().join("local.db");
        let ledger = adopt_local_snapshot(&local_db, &staged).unwrap();
        assert!(!ledger.blocks().unwrap().is_empty());
    }

    #[test]
    fn create_sync_request_carries_sender_identity() {
        let env = create_sync_request("1.1.1.1", "self-pk").unwrap();
        assert_eq!(env.message_type, MessageType::SyncRequest);
        assert_eq!(env.sender_ip, "1.1.1.1");
        assert_eq!(env.sender_public_key, "self-pk");
    }

    #[test]
    fn rebuild_leader_queue_orders_by_public_key() {
        let queue = CircularQueue::new();
        let members = vec![
            NodeConfig::new("1.1.1.1".into(), Role::None, "zeta".into()),
            NodeConfig::new("2.2.2.2".into(), Role::None, "alpha".into()),
        ];
        rebuild_leader_queue(&queue, &members);
        assert_eq!(queue.peek().unwrap().node_config.public_key, "alpha");
    }

    #[test]
    fn setup_normal_node_enrolls_self() {
        let queue = CircularQueue::new();
        let self_node = NodeConfig::new("1.1.1.1".into(), Role::None, "self-pk".into());
        setup_normal_node(&queue, &self_node);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn create_promote_request_carries_self_node() {
        let self_node = NodeConfig::new("1.1.1.1".into(), Role::Bootstrap, "self-pk".into());
        let env = create_promote_request(&self_node, "1.1.1.1", "self-pk").unwrap();
        let payload: NodePayload = env.parse_payload().unwrap();
        assert_eq!(payload.node, self_node);
    }
}
