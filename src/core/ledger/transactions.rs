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

//! Transactions table: `transactions(hash PK, block_hash FK, sender_pk,
//! type, payload_json, timestamp, status)`.

use serde::{Deserialize, Serialize};

use crate::core::state::kv::KvTable;
use crate::core::types::Transaction;

use super::LedgerError;

/// Lifecycle status of a transaction once recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Included in a block but not yet replayed into the DNS table.
    Pending,
    /// Every record in its payload was applied successfully.
    Applied,
    /// At least one record in its payload was skipped on apply (ownership
    /// or existence conflict); the transaction itself is still recorded.
    PartiallySkipped,
}

/// A stored transaction row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// The transaction itself.
    pub transaction: Transaction,
    /// Hash of the block that included it.
    pub block_hash: String,
    /// Apply-time status.
    pub status: TransactionStatus,
}

/// Wrapper over the `transactions` table.
pub struct TransactionsTable {
    tree: KvTable,
}

impl TransactionsTable {
    pub(super) fn new(tree: KvTable) -> Self {
        Self { tree }
    }

    /// Record a transaction against the block that included it. Idempotent
    /// by transaction hash: re-inserting the same hash overwrites the row
    /// with the same content it already held (block replay is idempotent).
    pub fn insert(&self, tx: &Transaction, block_hash: &str, status: TransactionStatus) -> Result<(), LedgerError> {
        let record = TransactionRecord { transaction: tx.clone(), block_hash: block_hash.to_string(), status };
        let bytes = serde_json::to_vec(&record).map_err(|_| LedgerError::Corrupt)?;
        self.tree.put(tx.hash.as_bytes(), &bytes)?;
        Ok(())
    }

    /// Look up a transaction by hash.
    pub fn get(&self, hash: &str) -> Result<Option<TransactionRecord>, LedgerError> {
        match self.tree.get(hash.as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|_| LedgerError::Corrupt),
            None => Ok(None),
        }
    }

    /// Whether a transaction hash has already been recorded.
    pub fn contains(&self, hash: &str) -> Result<bool, LedgerError> {
        Ok(self.tree.contains(hash.as_bytes())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::kv::KvStore;
    use crate::core::types::TransactionType;

    fn tx() -> Transaction {
        Transaction {
            sender_public_key: "pk".into(),
            r#type: TransactionType::Register,
            payload: vec![],
            timestamp: 1,
            hash: "abc".into(),
            signature: "sig".into(),
        }
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::open(dir.path().to_str().unwrap()).unwrap();
        let table = TransactionsTable::new(store.table("transactions").unwrap());

        let t = tx();
        table.insert(&t, "block-1", TransactionStatus::Applied).unwrap();
        let row = table.get("abc").unwrap().unwrap();
        assert_eq!(row.block_hash, "block-1");
        assert_eq!(row.status, TransactionStatus::Applied);
    }
}
