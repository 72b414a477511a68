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

//! The circular leader queue `Q`: a singleton rotation of [`QueueNode`]
//! entries. Every public method acquires the internal lock, so callers
//! never need to synchronize externally.
//!
//! Deviates from a fair reentrant lock (the source's documented intent) by
//! using a plain `std::sync::Mutex`: this queue is never locked recursively
//! by any caller in this node, so the extra fairness/reentrancy machinery
//! would add complexity with no observable benefit here.

use std::sync::Mutex;

use crate::core::types::{NodeConfig, QueueNode};

/// Leader rotation queue.
pub struct CircularQueue {
    inner: Mutex<State>,
}

struct State {
    nodes: Vec<QueueNode>,
    head: usize,
    next_sno: u64,
}

impl Default for CircularQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CircularQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self { inner: Mutex::new(State { nodes: Vec::new(), head: 0, next_sno: 0 }) }
    }

    /// Insert `node_config`, assigning it the next globally monotone `sno`.
    /// A duplicate `node_config` is rejected (no-op, returns `false`). If a
    /// queued node with `sno == k-1` exists for the newly assigned `sno =
    /// k`, the new entry is inserted immediately after it; otherwise it is
    /// appended.
    pub fn insert(&self, node_config: NodeConfig) -> bool {
        let mut state = self.inner.lock().expect("leader queue lock");
        if state.nodes.iter().any(|n| n.node_config == node_config) {
            return false;
        }
        let sno = state.next_sno;
        state.next_sno += 1;

        let entry = QueueNode { node_config, sno };
        let insert_at = state
            .nodes
            .iter()
            .position(|n| n.sno == sno.wrapping_sub(1))
            .map(|idx| idx + 1)
            .unwrap_or(state.nodes.len());
        state.nodes.insert(insert_at, entry);
        true
    }

    /// Current leader, if the queue is non-empty.
    pub fn peek(&self) -> Option<QueueNode> {
        let state = self.inner.lock().expect("leader queue lock");
        if state.nodes.is_empty() {
            return None;
        }
        state.nodes.get(state.head % state.nodes.len()).cloned()
    }

    /// Advance the rotation pointer by one, modulo the queue length.
    pub fn rotate(&self) {
        let mut state = self.inner.lock().expect("leader queue lock");
        if state.nodes.is_empty() {
            return;
        }
        state.head = (state.head + 1) % state.nodes.len();
    }

    /// Replace the full membership with `nodes`, sorted by `sno`. Used when
    /// rebuilding the queue from a freshly imported snapshot.
    pub fn reset_with(&self, mut nodes: Vec<QueueNode>) {
        nodes.sort_by_key(|n| n.sno);
        let mut state = self.inner.lock().expect("leader queue lock");
        state.next_sno = nodes.iter().map(|n| n.sno + 1).max().unwrap_or(0);
        state.nodes = nodes;
        state.head = 0;
    }

    /// Number of peers currently enrolled in the rotation.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("leader queue lock").nodes.len()
    }

    /// Whether the queue currently holds no peers.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot every entry currently in the queue, in rotation order
    /// starting from `head`.
    pub fn snapshot(&self) -> Vec<QueueNode> {
        let state = self.inner.lock().expect("leader queue lock");
        if state.nodes.is_empty() {
            return Vec::new();
        }
        let n = state.nodes.len();
        (0..n).map(|i| state.nodes[(state.head + i) % n].clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Role;

    fn node(pk: &str) -> NodeConfig {
        NodeConfig::new("1.1.1.1".into(), Role::None, pk.into())
    }

    #[test]
    fn duplicate_node_config_is_rejected() {
        let q = CircularQueue::new();
        assert!(q.insert(node("a")));
        assert!(!q.insert(node("a")));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn rotate_advances_through_all_members() {
        let q = CircularQueue::new();
        q.insert(node("a"));
        q.insert(node("b"));
        q.insert(node("c"));

        assert_eq!(q.peek().unwrap().node_config.public_key, "a");
        q.rotate();
        assert_eq!(q.peek().unwrap().node_config.public_key, "b");
        q.rotate();
        assert_eq!(q.peek().unwrap().node_config.public_key, "c");
        q.rotate();
        assert_eq!(q.peek().unwrap().node_config.public_key, "a");
    }

    #[test]
    fn reset_with_sorts_by_sno() {
        let q = CircularQueue::new();
        let entries = vec![
            QueueNode { node_config: node("b"), sno: 1 },
            QueueNode { node_config: node("a"), sno: 0 },
        ];
        q.reset_with(entries);
        assert_eq!(q.peek().unwrap().node_config.public_key, "a");
    }

    #[test]
    fn empty_queue_peek_is_none() {
        let q = CircularQueue::new();
        assert!(q.peek().is_none());
    }
}
