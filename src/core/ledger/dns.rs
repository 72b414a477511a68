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

//! Materialized DNS table: `dns(name, type, rdata, ttl, owner_pk, tx_hash,
//! PRIMARY KEY(name,type,rdata))` plus a secondary index on `rdata` for
//! reverse lookup.

use crate::core::state::kv::KvTable;
use crate::core::types::DnsModel;

use super::LedgerError;

fn natural_key(name: &str, r#type: u16, rdata: &str) -> Vec<u8> {
    let mut key = Vec::new();
    key.extend_from_slice(name.as_bytes());
    key.push(0);
    key.extend_from_slice(format!("{:05}", r#type).as_bytes());
    key.push(0);
    key.extend_from_slice(rdata.as_bytes());
    key
}

fn name_type_prefix(name: &str, r#type: u16) -> Vec<u8> {
    let mut key = Vec::new();
    key.extend_from_slice(name.as_bytes());
    key.push(0);
    key.extend_from_slice(format!("{:05}", r#type).as_bytes());
    key.push(0);
    key
}

/// Wrapper over the `dns` table and its `rdata` secondary index.
pub struct DnsTable {
    records: KvTable,
    by_rdata: KvTable,
}

impl DnsTable {
    pub(super) fn new(records: KvTable, by_rdata: KvTable) -> Self {
        Self { records, by_rdata }
    }

    /// Whether `(name, type, rdata)` already exists.
    pub fn exists(&self, name: &str, r#type: u16, rdata: &str) -> Result<bool, LedgerError> {
        Ok(self.records.contains(&natural_key(name, r#type, rdata))?)
    }

    /// Fetch one record by its natural key.
    pub fn get(&self, name: &str, r#type: u16, rdata: &str) -> Result<Option<DnsModel>, LedgerError> {
        match self.records.get(&natural_key(name, r#type, rdata))? {
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|_| LedgerError::Corrupt),
            None => Ok(None),
        }
    }

    /// Insert or overwrite a record, maintaining the rdata secondary index.
    pub fn put(&self, record: &DnsModel) -> Result<(), LedgerError> {
        let key = natural_key(&record.name, record.r#type, &record.rdata);
        let bytes = serde_json::to_vec(record).map_err(|_| LedgerError::Corrupt)?;
        self.records.put(&key, &bytes)?;
        self.append_to_rdata_index(&record.rdata, &key)?;
        Ok(())
    }

    /// Remove a record by natural key, maintaining the rdata secondary index.
    pub fn remove(&self, name: &str, r#type: u16, rdata: &str) -> Result<(), LedgerError> {
        let key = natural_key(name, r#type, rdata);
        self.records.remove(&key)?;
        self.remove_from_rdata_index(rdata, &key)?;
        Ok(())
    }

    /// All records matching `(name, type)`, across any `rdata` value.
    pub fn lookup(&self, name: &str, r#type: u16) -> Result<Vec<DnsModel>, LedgerError> {
        let prefix = name_type_prefix(name, r#type);
        let mut out = Vec::new();
        for (_, v) in self.records.scan_prefix(&prefix)? {
            out.push(serde_json::from_slice(&v).map_err(|_| LedgerError::Corrupt)?);
        }
        Ok(out)
    }

    /// All records sharing `rdata`, in the order they were first inserted.
    pub fn reverse(&self, rdata: &str) -> Result<Vec<DnsModel>, LedgerError> {
        let index_key = rdata.as_bytes();
        let Some(bytes) = self.by_rdata.get(index_key)? else {
            return Ok(Vec::new());
        };
        let keys: Vec<Vec<u8>> = serde_json::from_slice(&bytes).map_err(|_| LedgerError::Corrupt)?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(v) = self.records.get(&key)? {
                out.push(serde_json::from_slice(&v).map_err(|_| LedgerError::Corrupt)?);
            }
        }
        Ok(out)
    }

    fn append_to_rdata_index(&self, rdata: &str, key: &[u8]) -> Result<(), LedgerError> {
        let index_key = rdata.as_bytes();
        let mut keys: Vec<Vec<u8>> = match self.by_rdata.get(index_key)? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|_| LedgerError::Corrupt)?,
            None => Vec::new(),
        };
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_vec());
        }
        let bytes = serde_json::to_vec(&keys).map_err(|_| LedgerError::Corrupt)?;
        self.by_rdata.put(index_key, &bytes)?;
        Ok(())
    }

    fn remove_from_rdata_index(&self, rdata: &str, key: &[u8]) -> Result<(), LedgerError> {
        let index_key = rdata.as_bytes();
        let Some(bytes) = self.by_rdata.get(index_key)? else {
            return Ok(());
        };
        let mut keys: Vec<Vec<u8>> = serde_json::from_slice(&bytes).map_err(|_| LedgerError::Corrupt)?;
        keys.retain(|k| k != key);
        if keys.is_empty() {
            self.by_rdata.remove(index_key)?;
        } else {
            let bytes = serde_json::to_vec(&keys).map_err(|_| LedgerError::Corrupt)?;
            self.by_rdata.put(index_key, &bytes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::kv::KvStore;
    use crate::core::types::record_type;

    fn record(name: &str, rdata: &str) -> DnsModel {
        DnsModel {
            name: name.to_string(),
            r#type: record_type::A,
            ttl: 300,
            rdata: rdata.to_string(),
            owner: "pk".to_string(),
            transaction_hash: "h".to_string(),
        }
    }

    fn table(dir: &std::path::Path) -> DnsTable {
        let store = KvStore::open(dir.to_str().unwrap()).unwrap();
        DnsTable::new(store.table("dns").unwrap(), store.table("dns_by_rdata").unwrap())
    }

    #[test]
    fn put_then_lookup_by_name_and_type() {
        let dir = tempfile::tempdir().unwrap();
        let t = table(dir.path());

        t.put(&record("example.com", "1.2.3.4")).unwrap();
        let found = t.lookup("example.com", record_type::A).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rdata, "1.2.3.4");
    }

    #[test]
    fn reverse_lookup_returns_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let t = table(dir.path());

        t.put(&record("api.example.com", "1.2.3.4")).unwrap();
        t.put(&record("www.example.com", "1.2.3.4")).unwrap();

        let found = t.reverse("1.2.3.4").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "api.example.com");
        assert_eq!(found[1].name, "www.example.com");
    }

    #[test]
    fn remove_clears_both_primary_and_secondary_index() {
        let dir = tempfile::tempdir().unwrap();
        let t = table(dir.path());

        t.put(&record("example.com", "1.2.3.4")).unwrap();
        t.remove("example.com", record_type::A, "1.2.3.4").unwrap();

        assert!(t.lookup("example.com", record_type::A).unwrap().is_empty());
        assert!(t.reverse("1.2.3.4").unwrap().is_empty());
    }
}
