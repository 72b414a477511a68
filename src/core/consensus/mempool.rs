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

//! Set-based mempool keyed by transaction hash. Safe to mutate from any
//! number of threads; the lock is internal so callers never manage it.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::core::types::Transaction;

/// The mempool `M`: transactions verified but not yet included in a block.
pub struct Mempool {
    inner: Mutex<BTreeMap<String, Transaction>>,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

impl Mempool {
    /// An empty mempool.
    pub fn new() -> Self {
        Self { inner: Mutex::new(BTreeMap::new()) }
    }

    /// Insert a transaction, deduplicating by hash. Returns `true` if this
    /// was a new entry.
    pub fn insert(&self, tx: Transaction) -> bool {
        let mut guard = self.inner.lock().expect("mempool lock");
        guard.insert(tx.hash.clone(), tx).is_none()
    }

    /// Whether a transaction hash is present.
    pub fn contains(&self, hash: &str) -> bool {
        self.inner.lock().expect("mempool lock").contains_key(hash)
    }

    /// Number of transactions currently pending.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("mempool lock").len()
    }

    /// Whether the mempool currently holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A snapshot of every pending transaction, sorted by hash ascending so
    /// two replicas that snapshot the same transaction set always get the
    /// same order before block hashing.
    pub fn snapshot_sorted(&self) -> Vec<Transaction> {
        self.inner.lock().expect("mempool lock").values().cloned().collect()
    }

    /// Remove every transaction hash present in `hashes` (called after a
    /// block including them is applied).
    pub fn remove_many(&self, hashes: &[String]) {
        let mut guard = self.inner.lock().expect("mempool lock");
        for h in hashes {
            guard.remove(h);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TransactionType;

    fn tx(hash: &str) -> Transaction {
        Transaction {
            sender_public_key: "pk".into(),
            r#type: TransactionType::Register,
            payload: vec![],
            timestamp: 0,
            hash: hash.into(),
            signature: "sig".into(),
        }
    }

    #[test]
    fn insert_deduplicates_by_hash() {
        let m = Mempool::new();
        assert!(m.insert(tx("a")));
        assert!(!m.insert(tx("a")));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn snapshot_is_sorted_by_hash() {
        let m = Mempool::new();
        m.insert(tx("c"));
        m.insert(tx("a"));
        m.insert(tx("b"));
        let snap = m.snapshot_sorted();
        let hashes: Vec<&str> = snap.iter().map(|t| t.hash.as_str()).collect();
        assert_eq!(hashes, vec!["a", "b", "c"]);
    }

    #[test]
    fn remove_many_clears_included_transactions() {
        let m = Mempool::new();
        m.insert(tx("a"));
        m.insert(tx("b"));
        m.remove_many(&["a".to_string()]);
        assert!(!m.contains("a"));
        assert!(m.contains("b"));
    }

    #[test]
    fn empty_mempool_reports_empty() {
        let m = Mempool::new();
        assert!(m.is_empty());
        m.insert(tx("x"));
        assert!(!m.is_empty());
    }
}
