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

//! Persistent key-value substrate used by every durable table in the node
//! (`NodeStore`'s `meta`/`nodes` trees, `Ledger`'s `blocks`/`transactions`/`dns`
//! trees). Backed by `sled`; each logical table is a named `sled::Tree` within
//! one `sled::Db` file, playing the role the spec assigns to a "SQLite-compatible
//! embedded database".
//!
//! Deterministic Merkle roots over a tree (see [`crate::core::state::merkle`])
//! let two replicas assert byte-equal state after processing the same blocks.

use sled::transaction::ConflictableTransactionError;
use thiserror::Error;

use super::merkle::{merkle_proof_sorted, merkle_root_sorted, verify_proof, Hash32, MerkleProof};

/// State errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// Failed to open the database file.
    #[error("db open")]
    DbOpen,
    /// I/O failure reading or writing a tree.
    #[error("db io")]
    DbIo,
    /// A transaction could not be committed due to a conflict.
    #[error("tx conflict")]
    TxConflict,
}

/// A single mutation within an atomic commit.
#[derive(Clone, Debug)]
pub enum KvOp {
    /// Put key/value.
    Put {
        /// Key bytes.
        key: Vec<u8>,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// Delete key.
    Del {
        /// Key bytes.
        key: Vec<u8>,
    },
}

/// A sled-backed database file holding one or more named tables (trees).
#[derive(Clone)]
pub struct KvStore {
    db: sled::Db,
}

impl KvStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &str) -> Result<Self, StateError> {
        let db = sled::open(path).map_err(|_| StateError::DbOpen)?;
        Ok(Self { db })
    }

    /// Open a named table within this database.
    pub fn table(&self, name: &str) -> Result<KvTable, StateError> {
        let tree = self.db.open_tree(name).map_err(|_| StateError::DbOpen)?;
        Ok(KvTable { tree })
    }

    /// Flush all trees to disk.
    pub fn flush(&self) -> Result<(), StateError> {
        self.db.flush().map_err(|_| StateError::DbIo)?;
        Ok(())
    }

    /// Path this database was opened from (used by snapshot export/import).
    pub fn path(&self) -> std::path::PathBuf {
        self.db.path().to_path_buf()
    }
}

/// One named table (tree) within a [`KvStore`].
#[derive(Clone)]
pub struct KvTable {
    tree: sled::Tree,
}

impl KvTable {
    /// Get a value by key.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        let v = self.tree.get(key).map_err(|_| StateError::DbIo)?;
        Ok(v.map(|iv| iv.to_vec()))
    }

    /// Whether a key exists.
    pub fn contains(&self, key: &[u8]) -> Result<bool, StateError> {
        self.tree.contains_key(key).map_err(|_| StateError::DbIo)
    }

    /// Put a single key/value, returning the previous value if any.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        let prev = self
            .tree
            .insert(key, value)
            .map_err(|_| StateError::DbIo)?;
        Ok(prev.map(|v| v.to_vec()))
    }

    /// Remove a key, returning the previous value if any.
    pub fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        let prev = self.tree.remove(key).map_err(|_| StateError::DbIo)?;
        Ok(prev.map(|v| v.to_vec()))
    }

    /// Iterate all key/value pairs in key order.
    pub fn iter_all(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StateError> {
        let mut out = Vec::new();
        for item in self.tree.iter() {
            let (k, v) = item.map_err(|_| StateError::DbIo)?;
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }

    /// Iterate all values whose keys start with `prefix`.
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StateError> {
        let mut out = Vec::new();
        for item in self.tree.scan_prefix(prefix) {
            let (k, v) = item.map_err(|_| StateError::DbIo)?;
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }

    /// Apply a batch of operations atomically.
    pub fn commit_atomic(&self, ops: Vec<KvOp>) -> Result<(), StateError> {
        let res: Result<(), ConflictableTransactionError<StateError>> = self
            .tree
            .transaction(|t| {
                for op in ops.iter() {
                    match op {
                        KvOp::Put { key, value } => {
                            t.insert(key.as_slice(), value.as_slice()).map_err(|_| {
                                ConflictableTransactionError::Abort(StateError::DbIo)
                            })?;
                        }
                        KvOp::Del { key } => {
                            t.remove(key.as_slice()).map_err(|_| {
                                ConflictableTransactionError::Abort(StateError::DbIo)
                            })?;
                        }
                    }
                }
                Ok(())
            })
            .map_err(|e| match e {
                sled::transaction::TransactionError::Abort(se) => {
                    ConflictableTransactionError::Abort(se)
                }
                sled::transaction::TransactionError::Storage(_) => {
                    ConflictableTransactionError::Abort(StateError::DbIo)
                }
            });

        match res {
            Ok(()) => Ok(()),
            Err(ConflictableTransactionError::Abort(e)) => Err(e),
            Err(ConflictableTransactionError::Conflict) => Err(StateError::TxConflict),
            Err(ConflictableTransactionError::Storage(_)) => Err(StateError::DbIo),
        }
    }

    /// Deterministic Merkle root over all pairs currently in the table.
    pub fn root(&self) -> Result<Hash32, StateError> {
        let mut pairs = self.iter_all()?;
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(merkle_root_sorted(&pairs))
    }

    /// Produce an inclusion proof for `key`, if present.
    pub fn prove(
        &self,
        key: &[u8],
    ) -> Result<Option<(Vec<u8>, Hash32, MerkleProof)>, StateError> {
        if self.get(key)?.is_none() {
            return Ok(None);
        }
        let mut pairs = self.iter_all()?;
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        let root = merkle_root_sorted(&pairs);
        let Ok(idx) = pairs.binary_search_by(|p| p.0.as_slice().cmp(key)) else {
            return Ok(None);
        };
        let Some(proof) = merkle_proof_sorted(&pairs, idx) else {
            return Ok(None);
        };
        Ok(Some((pairs[idx].1.clone(), root, proof)))
    }

    /// Verify a Merkle proof against a root.
    pub fn verify(root: Hash32, proof: &MerkleProof) -> bool {
        verify_proof(root, proof)
    }
}
