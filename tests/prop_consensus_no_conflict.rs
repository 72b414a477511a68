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

use std::sync::Arc;

use ddns_node::core::consensus::engine::{BlockApplier, Broadcaster, ConsensusEngine};
use ddns_node::core::ledger::{Ledger, TransactionStatus};
use ddns_node::core::types::{Block, NodeConfig, Role};
use proptest::prelude::*;

struct NullBroadcaster;
impl Broadcaster for NullBroadcaster {
    fn broadcast(&self, _envelope: &ddns_node::core::message::Envelope) {}
}

struct NoopApplier;
impl BlockApplier for NoopApplier {
    fn apply_block(&self, block: &Block) -> Vec<(String, TransactionStatus)> {
        block.transactions.iter().map(|t| (t.hash.clone(), TransactionStatus::Applied)).collect()
    }
}

proptest! {
    #[test]
    fn prop_no_two_blocks_extend_the_same_stale_tip(
        first_timestamp in 1u64..1000u64,
        rival_timestamp in 1u64..1000u64,
    ) {
        prop_assume!(first_timestamp != rival_timestamp);

        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(Ledger::open(dir.path().to_str().unwrap()).unwrap());
        let self_node = NodeConfig::new("1.1.1.1".into(), Role::None, "pk".into());
        let engine = ConsensusEngine::new(
            self_node,
            ledger.clone(),
            Arc::new(NullBroadcaster),
            Arc::new(NoopApplier),
            0,
        );

        let tip = ledger.get_latest_block_hash().unwrap();
        let first = Block::build(&tip, vec![], first_timestamp);
        let rival = Block::build(&tip, vec![], rival_timestamp);

        prop_assert!(engine.on_block_publish(first, first_timestamp));
        // The tip moved once `first` was accepted; a second block naming the
        // same stale previous_hash must be rejected, never silently adopted.
        prop_assert!(!engine.on_block_publish(rival, rival_timestamp));

        let new_tip = ledger.get_latest_block_hash().unwrap();
        prop_assert_ne!(new_tip, tip);
    }
}
