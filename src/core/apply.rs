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

//! Block application (C9): replays a block's transactions into the
//! materialized DNS table, enforcing the per-record ownership/existence
//! invariants. A failing record is logged and skipped; it never rejects
//! the rest of the block.

use thiserror::Error;
use tracing::warn;

use crate::core::consensus::engine::BlockApplier;
use crate::core::ledger::{Ledger, TransactionStatus};
use crate::core::types::{Block, DnsModel, TransactionType};

/// Apply errors.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The underlying ledger rejected a read or write.
    #[error("ledger access failed")]
    Ledger,
}

impl From<crate::core::ledger::LedgerError> for ApplyError {
    fn from(_: crate::core::ledger::LedgerError) -> Self {
        ApplyError::Ledger
    }
}

/// Apply one record according to its transaction's type and the ownership
/// invariant. Returns `true` if the record was applied, `false` if it was
/// skipped.
fn apply_record(ledger: &Ledger, sender_public_key: &str, ty: TransactionType, record: &DnsModel) -> Result<bool, ApplyError> {
    let name = DnsModel::normalized_name(&record.name);
    let dns = ledger.dns();

    match ty {
        TransactionType::Register => {
            if dns.exists(&name, record.r#type, &record.rdata)? {
                warn!(name = %name, rtype = record.r#type, "skipping register: record already exists");
                return Ok(false);
            }
            let mut stored = record.clone();
            stored.name = name;
            dns.put(&stored)?;
            Ok(true)
        }
        TransactionType::UpdateRecords => {
            let Some(existing) = dns.get(&name, record.r#type, &record.rdata)? else {
                warn!(name = %name, rtype = record.r#type, "skipping update: record does not exist");
                return Ok(false);
            };
            if existing.owner != sender_public_key {
                warn!(name = %name, rtype = record.r#type, "skipping update: ownership mismatch");
                return Ok(false);
            }
            let mut stored = record.clone();
            stored.name = name;
            dns.put(&stored)?;
            Ok(true)
        }
        TransactionType::DeleteRecords => {
            let Some(existing) = dns.get(&name, record.r#type, &record.rdata)? else {
                warn!(name = %name, rtype = record.r#type, "skipping delete: record does not exist");
                return Ok(false);
            };
            if existing.owner != sender_public_key {
                warn!(name = %name, rtype = record.r#type, "skipping delete: ownership mismatch");
                return Ok(false);
            }
            dns.remove(&name, record.r#type, &record.rdata)?;
            Ok(true)
        }
    }
}

/// Replay every transaction in `block` into the materialized DNS table,
/// returning the resulting status of each transaction by hash.
pub fn apply_block(ledger: &Ledger, block: &Block) -> Vec<(String, TransactionStatus)> {
    let mut out = Vec::with_capacity(block.transactions.len());
    for tx in &block.transactions {
        let mut any_applied = false;
        let mut any_skipped = false;
        for record in &tx.payload {
            match apply_record(ledger, &tx.sender_public_key, tx.r#type, record) {
                Ok(true) => any_applied = true,
                Ok(false) => any_skipped = true,
                Err(_) => any_skipped = true,
            }
        }
        let status = if tx.payload.is_empty() || (any_applied && !any_skipped) {
            TransactionStatus::Applied
        } else {
            TransactionStatus::PartiallySkipped
        };
        out.push((tx.hash.clone(), status));
    }
    out
}

/// A [`BlockApplier`] backed by a concrete [`Ledger`].
pub struct LedgerApplier<'a> {
    ledger: &'a Ledger,
}

impl<'a> LedgerApplier<'a> {
    /// Wrap `ledger` as a [`BlockApplier`].
    pub fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }
}

impl BlockApplier for LedgerApplier<'_> {
    fn apply_block(&self, block: &Block) -> Vec<(String, TransactionStatus)> {
        apply_block(self.ledger, block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{genesis_previous_hash, Transaction};

    fn record(name: &str, rdata: &str, owner: &str) -> DnsModel {
        DnsModel {
            name: name.to_string(),
            r#type: crate::core::types::record_type::A,
            ttl: 300,
            rdata: rdata.to_string(),
            owner: owner.to_string(),
            transaction_hash: "tx".to_string(),
        }
    }

    fn tx(ty: TransactionType, sender: &str, payload: Vec<DnsModel>) -> Transaction {
        Transaction {
            sender_public_key: sender.to_string(),
            r#type: ty,
            payload,
            timestamp: 0,
            hash: format!("{:?}-{}", ty, sender),
            signature: "sig".to_string(),
        }
    }

    #[test]
    fn register_applies_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path().to_str().unwrap()).unwrap();

        let block = Block::build(
            &genesis_previous_hash(),
            vec![tx(TransactionType::Register, "owner", vec![record("example.com", "1.2.3.4", "owner")])],
            1,
        );
        let statuses = apply_block(&ledger, &block);
        assert_eq!(statuses[0].1, TransactionStatus::Applied);
        assert!(ledger.dns().exists("example.com", crate::core::types::record_type::A, "1.2.3.4").unwrap());
    }

    #[test]
    fn register_skips_when_already_present() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path().to_str().unwrap()).unwrap();
        ledger.dns().put(&record("example.com", "1.2.3.4", "owner")).unwrap();

        let block = Block::build(
            &genesis_previous_hash(),
            vec![tx(TransactionType::Register, "owner", vec![record("example.com", "1.2.3.4", "other")])],
            1,
        );
        let statuses = apply_block(&ledger, &block);
        assert_eq!(statuses[0].1, TransactionStatus::PartiallySkipped);
    }

    #[test]
    fn update_requires_matching_owner() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path().to_str().unwrap()).unwrap();
        ledger.dns().put(&record("example.com", "1.2.3.4", "owner")).unwrap();

        let block = Block::build(
            &genesis_previous_hash(),
            vec![tx(TransactionType::UpdateRecords, "intruder", vec![record("example.com", "1.2.3.4", "intruder")])],
            1,
        );
        let statuses = apply_block(&ledger, &block);
        assert_eq!(statuses[0].1, TransactionStatus::PartiallySkipped);
        let stored = ledger.dns().get("example.com", crate::core::types::record_type::A, "1.2.3.4").unwrap().unwrap();
        assert_eq!(stored.owner, "owner");
    }

    #[test]
    fn delete_by_owner_removes_record() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path().to_str().unwrap()).unwrap();
        ledger.dns().put(&record("example.com", "1.2.3.4", "owner")).unwrap();

        let block = Block::build(
            &genesis_previous_hash(),
            vec![tx(TransactionType::DeleteRecords, "owner", vec![record("example.com", "1.2.3.4", "owner")])],
            1,
        );
        let statuses = apply_block(&ledger, &block);
        assert_eq!(statuses[0].1, TransactionStatus::Applied);
        assert!(!ledger.dns().exists("example.com", crate::core::types::record_type::A, "1.2.3.4").unwrap());
    }

    #[test]
    fn empty_payload_transaction_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path().to_str().unwrap()).unwrap();

        let block = Block::build(&genesis_previous_hash(), vec![tx(TransactionType::Register, "owner", vec![])], 1);
        let statuses = apply_block(&ledger, &block);
        assert_eq!(statuses[0].1, TransactionStatus::Applied);
    }
}
