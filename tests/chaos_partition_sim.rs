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

//! Simulates a silent leader: one node never gets to publish its block
//! (as if partitioned away), and every other node's liveness controller
//! should rotate the queue past it without panicking or duplicating work.

#![forbid(unsafe_code)]

use std::sync::Arc;

use ddns_node::core::consensus::engine::{BlockApplier, Broadcaster, ConsensusEngine};
use ddns_node::core::consensus::liveness::DEFAULT_TIMEOUT_MS;
use ddns_node::core::identity;
use ddns_node::core::ledger::{Ledger, TransactionStatus};
use ddns_node::core::message::Envelope;
use ddns_node::core::types::{Block, NodeConfig, Role, Transaction, TransactionType};

struct NullBroadcaster;
impl Broadcaster for NullBroadcaster {
    fn broadcast(&self, _envelope: &Envelope) {}
}

struct NoopApplier;
impl BlockApplier for NoopApplier {
    fn apply_block(&self, block: &Block) -> Vec<(String, TransactionStatus)> {
        block.transactions.iter().map(|t| (t.hash.clone(), TransactionStatus::Applied)).collect()
    }
}

fn signed_tx(sk: &identity::PrivateKey, pk_b64: &str, timestamp: u64) -> Transaction {
    let payload_json = "[]".to_string();
    let hash = Transaction::compute_hash(pk_b64, TransactionType::Register, &payload_json, timestamp);
    let signature = identity::encode_signature(&identity::sign(sk, hash.as_bytes()));
    Transaction { sender_public_key: pk_b64.to_string(), r#type: TransactionType::Register, payload: vec![], timestamp, hash, signature }
}

#[test]
fn stalled_leader_is_rotated_past_without_panicking() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(Ledger::open(dir.path().to_str().unwrap()).unwrap());

    let (sk, pk) = identity::generate_keypair();
    let pk_b64 = identity::encode_public_key(&pk);
    let observer = NodeConfig::new("2.2.2.2".into(), Role::None, pk_b64.clone());
    let silent_leader = NodeConfig::new("1.1.1.1".into(), Role::None, "partitioned-away".into());

    let engine = ConsensusEngine::new(observer.clone(), ledger, Arc::new(NullBroadcaster), Arc::new(NoopApplier), 0);
    engine.leader_queue().insert(silent_leader.clone());
    engine.leader_queue().insert(observer.clone());

    engine.publish_transaction(signed_tx(&sk, &pk_b64, 1));
    assert_eq!(engine.leader_queue().peek().unwrap().node_config, silent_leader);

    // The silent leader never publishes. Every round tick up to the
    // liveness timeout should be a no-op, not a panic.
    for tick in (0..DEFAULT_TIMEOUT_MS).step_by(1000) {
        engine.run_round(tick);
        assert_eq!(engine.leader_queue().peek().unwrap().node_config, silent_leader);
    }

    // Past the timeout, the queue rotates and the observer becomes leader,
    // publishing the pending transaction.
    engine.run_round(DEFAULT_TIMEOUT_MS + 1);
    assert_eq!(engine.leader_queue().peek().unwrap().node_config, observer);
    assert!(engine.mempool().is_empty());
}
