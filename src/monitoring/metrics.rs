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

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus")]
    Prom,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Known peers gauge (size of the node store's peer table).
    pub known_peers: IntGauge,
    /// Current chain height gauge.
    pub block_height: IntGauge,
    /// Total transactions applied (any status).
    pub transactions_total: IntCounter,
    /// Mempool size gauge.
    pub mempool_size: IntGauge,
    /// Leader queue size gauge.
    pub leader_queue_size: IntGauge,
    /// Leader rotations due to liveness timeout.
    pub leader_rotations_total: IntCounter,
    /// Active (unresolved) elections gauge.
    pub elections_active: IntGauge,
    /// Records skipped at apply time for ownership/existence conflicts.
    pub apply_skipped_total: IntCounter,

    /// Malformed wire messages dropped by a transport listener.
    pub transport_invalid_total: IntCounter,
    /// Messages dropped due to a handler failure or backpressure.
    pub transport_dropped_total: IntCounter,
    /// Direct-send failures (peer unreachable).
    pub transport_send_failed_total: IntCounter,
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let known_peers = IntGauge::new("ddns_known_peers", "Known peers in the node store").map_err(|_| MetricsError::Prom)?;
        let block_height = IntGauge::new("ddns_block_height", "Current chain height").map_err(|_| MetricsError::Prom)?;
        let transactions_total =
            IntCounter::new("ddns_transactions_total", "Total transactions applied").map_err(|_| MetricsError::Prom)?;
        let mempool_size = IntGauge::new("ddns_mempool_size", "Pending transactions in the mempool").map_err(|_| MetricsError::Prom)?;
        let leader_queue_size = IntGauge::new("ddns_leader_queue_size", "Peers enrolled in the leader queue").map_err(|_| MetricsError::Prom)?;
        let leader_rotations_total =
            IntCounter::new("ddns_leader_rotations_total", "Leader rotations due to liveness timeout").map_err(|_| MetricsError::Prom)?;
        let elections_active = IntGauge::new("ddns_elections_active", "Unresolved elections").map_err(|_| MetricsError::Prom)?;
        let apply_skipped_total =
            IntCounter::new("ddns_apply_skipped_total", "Records skipped on apply for ownership/existence conflicts")
                .map_err(|_| MetricsError::Prom)?;

        let transport_invalid_total =
            IntCounter::new("ddns_transport_invalid_total", "Malformed wire messages dropped").map_err(|_| MetricsError::Prom)?;
        let transport_dropped_total =
            IntCounter::new("ddns_transport_dropped_total", "Messages dropped by a handler or backpressure").map_err(|_| MetricsError::Prom)?;
        let transport_send_failed_total =
            IntCounter::new("ddns_transport_send_failed_total", "Direct-send failures").map_err(|_| MetricsError::Prom)?;

        registry.register(Box::new(known_peers.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(block_height.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(transactions_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(mempool_size.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(leader_queue_size.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(leader_rotations_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(elections_active.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(apply_skipped_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(transport_invalid_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(transport_dropped_total.clone())).map_err(|_| MetricsError::Prom)?;
        registry.register(Box::new(transport_send_failed_total.clone())).map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            known_peers,
            block_height,
            transactions_total,
            mempool_size,
            leader_queue_size,
            leader_rotations_total,
            elections_active,
            apply_skipped_total,
            transport_invalid_total,
            transport_dropped_total,
            transport_send_failed_total,
        })
    }
}
