// Copyright (c) 2026 Ddns-node Contributors
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;

use ddns_node::core::message::{CastVotePayload, NodePayload};
use ddns_node::core::types::{Block, Transaction};

// Fuzzes the inner-payload decode paths an envelope's `payload` string is
// handed to once its outer frame and message type are known. Every one of
// these is reachable with attacker-controlled bytes before any signature
// check runs, so none may panic.
fuzz_target!(|data: &[u8]| {
    let _ = serde_json::from_slice::<Transaction>(data);
    let _ = serde_json::from_slice::<Block>(data);
    let _ = serde_json::from_slice::<NodePayload>(data);
    let _ = serde_json::from_slice::<CastVotePayload>(data);
});
