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

//! A decentralized DNS node: peers publish signed record mutations, a
//! rotating-leader consensus engine orders them into blocks, and every peer
//! replays those blocks into a materialized, ownership-checked DNS table.
//!
//! This crate provides:
//! - Deterministic domain types & canonical hashing (`core::types`)
//! - secp256r1 identity, signing and a hardened on-disk keystore
//! - UDP broadcast/multicast + TCP direct/file-transfer transport with peer scoring
//! - A `sled`-backed ledger (blocks, transactions, materialized DNS table) with
//!   deterministic Merkle roots
//! - Rotating-leader consensus with liveness-driven skip-turn and snapshot catch-up
//! - Monitoring via Prometheus metrics and structured logging

/// Core protocol primitives (types, identity, consensus, ledger, election, API).
pub mod core;
/// Observability (metrics, structured logging helpers).
pub mod monitoring;
/// Transport (UDP/TCP), handler fan-out, and peer scoring.
pub mod networking;
