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

//! Consensus engine (C8): ties the mempool, leader queue and liveness
//! controller into the round-driven block production loop. Holds no
//! transport of its own — outbound messages go through a [`Broadcaster`]
//! and block application through a [`BlockApplier`], both implemented
//! downstream once the transport and apply layers exist, so this module can
//! be built and tested against fakes first.

use std::sync::Arc;

use crate::core::identity;
use crate::core::ledger::{Ledger, TransactionStatus};
use crate::core::message::{Envelope, MessageError, MessageType};
use crate::core::types::{Block, NodeConfig, Transaction};

use super::leader_queue::CircularQueue;
use super::liveness::LivenessController;
use super::mempool::Mempool;

/// Sends an envelope to every known peer. Implemented by the transport
/// layer; faked in tests.
pub trait Broadcaster: Send + Sync {
    /// Broadcast `envelope` to all known peers. Best-effort: per-peer
    /// failures are the transport's concern, not the engine's.
    fn broadcast(&self, envelope: &Envelope);
}

/// Replays a block's transactions into the materialized DNS table,
/// reporting the resulting status of each. Implemented by C9; faked in
/// tests.
pub trait BlockApplier: Send + Sync {
    /// Apply every transaction in `block`, returning `(transaction_hash,
    /// status)` pairs for each. Per-record invariant failures are the
    /// applier's concern: they are logged and skipped there, never here.
    fn apply_block(&self, block: &Block) -> Vec<(String, TransactionStatus)>;
}

fn verify_transaction_signature(tx: &Transaction) -> bool {
    let Ok(pk) = identity::decode_public_key(&tx.sender_public_key) else {
        return false;
    };
    let Ok(sig) = identity::decode_signature(&tx.signature) else {
        return false;
    };
    identity::verify(&pk, tx.hash.as_bytes(), &sig).is_ok()
}

/// The consensus engine: mempool, leader rotation, liveness and the block
/// production/ingestion round.
pub struct ConsensusEngine {
    self_node: NodeConfig,
    ledger: Arc<Ledger>,
    mempool: Mempool,
    queue: CircularQueue,
    liveness: LivenessController,
    broadcaster: Arc<dyn Broadcaster>,
    applier: Arc<dyn BlockApplier>,
}

impl ConsensusEngine {
    /// Build a new engine for `self_node`, starting its liveness clock at
    /// `now_ms`.
    pub fn new(
        self_node: NodeConfig,
        ledger: Arc<Ledger>,
        broadcaster: Arc<dyn Broadcaster>,
        applier: Arc<dyn BlockApplier>,
        now_ms: u64,
    ) -> Self {
        Self {
            self_node,
            ledger,
            mempool: Mempool::new(),
            queue: CircularQueue::new(),
            liveness: LivenessController::with_default_timeout(now_ms),
            broadcaster,
            applier,
        }
    }

    /// The leader rotation queue, exposed so membership/election outcomes
    /// can enroll and remove peers.
    pub fn leader_queue(&self) -> &CircularQueue {
        &self.queue
    }

    /// The pending-transaction mempool, exposed for inspection (e.g. status
    /// endpoints).
    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    /// A locally originated transaction: verify against its own signature,
    /// insert into the mempool, and broadcast `TRANSACTION_PUBLISH`.
    /// Returns `false` if the signature did not verify.
    pub fn publish_transaction(&self, tx: Transaction) -> bool {
        if !verify_transaction_signature(&tx) {
            return false;
        }
        self.mempool.insert(tx.clone());
        if let Ok(env) = self.envelope(MessageType::TransactionPublish, &tx) {
            self.broadcaster.broadcast(&env);
        }
        true
    }

    /// A transaction received from a peer: verify and insert, no
    /// rebroadcast (the sender already broadcast it).
    pub fn on_transaction_publish(&self, tx: Transaction) -> bool {
        if !verify_transaction_signature(&tx) {
            return false;
        }
        self.mempool.insert(tx);
        true
    }

    /// A block received from a peer: reject if it does not extend the
    /// current tip, otherwise insert, apply and advance round state.
    pub fn on_block_publish(&self, block: Block, now_ms: u64) -> bool {
        let Ok(tip) = self.ledger.get_latest_block_hash() else {
            return false;
        };
        if block.previous_hash != tip {
            return false;
        }
        self.insert_and_apply(&block, now_ms)
    }

    /// The periodic round tick: handle liveness failover, then produce a
    /// block if this node is the current leader and has pending work.
    pub fn run_round(&self, now_ms: u64) {
        if self.liveness.is_stalled(now_ms) && !self.mempool.is_empty() {
            self.skip_turn(now_ms);
        }
        let Some(leader) = self.queue.peek() else {
            return;
        };
        if leader.node_config != self.self_node {
            return;
        }
        if self.mempool.is_empty() {
            return;
        }
        self.publish_block(now_ms);
    }

    /// Bound a stalled leader's impact to the liveness timeout: rotate the
    /// queue once and reset the clock, without touching the mempool.
    fn skip_turn(&self, now_ms: u64) {
        self.queue.rotate();
        self.liveness.record_block(now_ms);
    }

    /// Build a block from the current mempool snapshot, broadcast it, and
    /// apply it locally. Returns `false` if the tip could not be read or
    /// the block failed to insert.
    pub fn publish_block(&self, now_ms: u64) -> bool {
        let Ok(tip) = self.ledger.get_latest_block_hash() else {
            return false;
        };
        let txs = self.mempool.snapshot_sorted();
        let block = Block::build(&tip, txs, now_ms);
        if let Ok(env) = self.envelope(MessageType::BlockPublish, &block) {
            self.broadcaster.broadcast(&env);
        }
        self.insert_and_apply(&block, now_ms)
    }

    fn insert_and_apply(&self, block: &Block, now_ms: u64) -> bool {
        match self.ledger.insert_block(block) {
            Ok(true) => {}
            Ok(false) => return true,
            Err(_) => return false,
        }

        let statuses = self.applier.apply_block(block);
        for (hash, status) in &statuses {
            if let Some(tx) = block.transactions.iter().find(|t| &t.hash == hash) {
                let _ = self.ledger.transactions().insert(tx, &block.hash, *status);
            }
        }

        let hashes: Vec<String> = block.transactions.iter().map(|t| t.hash.clone()).collect();
        self.mempool.remove_many(&hashes);
        self.queue.rotate();
        self.liveness.record_block(now_ms);
        true
    }

    fn envelope<T: serde::Serialize>(&self, message_type: MessageType, payload: &T) -> Result<Envelope, MessageError> {
        Envelope::new(message_type, &self.self_node.ip, &self.self_node.public_key, payload)
    }
}
