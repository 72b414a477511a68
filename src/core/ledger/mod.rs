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

//! Ledger stores (C7): blocks, transactions and the materialized DNS table,
//! each a named table over [`crate::core::state::kv`]. Snapshot export/import
//! lets a lagging peer catch up by copying the whole block database rather
//! than replaying individual transactions over the wire.

pub mod dns;
pub mod snapshot;
pub mod transactions;

use thiserror::Error;

use crate::core::state::kv::{KvStore, KvTable, StateError};
use crate::core::types::{genesis_previous_hash, Block};

pub use dns::DnsTable;
pub use transactions::{TransactionRecord, TransactionStatus, TransactionsTable};

/// Ledger errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Underlying key-value failure.
    #[error("storage")]
    Storage,
    /// Stored bytes did not parse.
    #[error("corrupt record")]
    Corrupt,
}

impl From<StateError> for LedgerError {
    fn from(_: StateError) -> Self {
        LedgerError::Storage
    }
}

/// The three ledger tables plus the genesis fallback for an empty chain.
pub struct Ledger {
    blocks: KvTable,
    transactions: TransactionsTable,
    dns: DnsTable,
    db_path: std::path::PathBuf,
}

impl Ledger {
    /// Open (or create) the ledger at `path` (conventionally `block.bin`).
    pub fn open(path: &str) -> Result<Self, LedgerError> {
        let store = KvStore::open(path)?;
        let blocks = store.table("blocks")?;
        let transactions = TransactionsTable::new(store.table("transactions")?);
        let dns = DnsTable::new(store.table("dns")?, store.table("dns_by_rdata")?);
        Ok(Self { blocks, transactions, dns, db_path: store.path() })
    }

    /// The path this ledger's database file lives at, used by snapshot
    /// export/import.
    pub fn db_path(&self) -> &std::path::Path {
        &self.db_path
    }

    /// Hash of the current chain tip, or the fixed genesis previous-hash
    /// value if no block has been inserted yet.
    pub fn get_latest_block_hash(&self) -> Result<String, LedgerError> {
        let mut hashes: Vec<String> = self
            .blocks
            .iter_all()?
            .into_iter()
            .filter_map(|(_, v)| serde_json::from_slice::<Block>(&v).ok())
            .map(|b| b.hash)
            .collect();
        if hashes.is_empty() {
            return Ok(genesis_previous_hash());
        }
        // Walk the chain to find the true tip: the block no other block
        // points to as its previousHash.
        let blocks = self.all_blocks()?;
        let referenced: std::collections::HashSet<&str> =
            blocks.iter().map(|b| b.previous_hash.as_str()).collect();
        if let Some(tip) = blocks.iter().find(|b| !referenced.contains(b.hash.as_str())) {
            return Ok(tip.hash.clone());
        }
        hashes.sort();
        Ok(hashes.remove(0))
    }

    fn all_blocks(&self) -> Result<Vec<Block>, LedgerError> {
        let mut out = Vec::new();
        for (_, v) in self.blocks.iter_all()? {
            out.push(serde_json::from_slice(&v).map_err(|_| LedgerError::Corrupt)?);
        }
        Ok(out)
    }

    /// Insert a block, keyed by its hash. A duplicate hash is a silent
    /// no-op (idempotent replay on sync).
    pub fn insert_block(&self, block: &Block) -> Result<bool, LedgerError> {
        if self.blocks.contains(block.hash.as_bytes())? {
            return Ok(false);
        }
        let bytes = serde_json::to_vec(block).map_err(|_| LedgerError::Corrupt)?;
        self.blocks.put(block.hash.as_bytes(), &bytes)?;
        Ok(true)
    }

    /// Look up a block by hash.
    pub fn get_block(&self, hash: &str) -> Result<Option<Block>, LedgerError> {
        match self.blocks.get(hash.as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|_| LedgerError::Corrupt),
            None => Ok(None),
        }
    }

    /// All blocks in insertion order (ascending hash-derived key order in
    /// the underlying tree; callers that need chain order should walk via
    /// `previous_hash` starting from genesis).
    pub fn blocks(&self) -> Result<Vec<Block>, LedgerError> {
        self.all_blocks()
    }

    /// Walk the chain from genesis to tip, following `previous_hash` links.
    /// Returns blocks oldest-first.
    pub fn chain_in_order(&self) -> Result<Vec<Block>, LedgerError> {
        let blocks = self.all_blocks()?;
        let by_prev: std::collections::HashMap<&str, &Block> =
            blocks.iter().map(|b| (b.previous_hash.as_str(), b)).collect();
        let genesis_prev = genesis_previous_hash();
        let mut out = Vec::with_capacity(blocks.len());
        let mut cursor = genesis_prev;
        while let Some(b) = by_prev.get(cursor.as_str()) {
            out.push((*b).clone());
            cursor = b.hash.clone();
        }
        Ok(out)
    }

    /// Access the transactions table.
    pub fn transactions(&self) -> &TransactionsTable {
        &self.transactions
    }

    /// Access the materialized DNS table.
    pub fn dns(&self) -> &DnsTable {
        &self.dns
    }
}
