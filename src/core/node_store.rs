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

//! Config/node store (C2): a single-writer, multi-reader persistent
//! key-value store holding self identity, bootstrap IP, role/accepted
//! flags and the set of known peers. Backed by [`crate::core::state::kv`],
//! playing the role the spec assigns to a "SQLite-compatible" local
//! embedded database.
//!
//! Reads against a `sled::Tree` never block each other; writes serialize
//! inside `sled` itself, so every operation here is safe to call from any
//! number of concurrent readers and a single writer without external
//! locking. Every operation is idempotent: re-applying the same put/add/
//! remove leaves the store in the same state.

use thiserror::Error;

use crate::core::state::kv::{KvStore, KvTable, StateError};
use crate::core::types::{NodeConfig, Role, SelfFlags};

/// Node store errors.
#[derive(Debug, Error)]
pub enum NodeStoreError {
    /// Underlying key-value failure.
    #[error("storage")]
    Storage,
    /// Stored bytes did not parse as the expected JSON shape.
    #[error("corrupt record")]
    Corrupt,
}

impl From<StateError> for NodeStoreError {
    fn from(_: StateError) -> Self {
        NodeStoreError::Storage
    }
}

const KEY_BOOTSTRAP_IP: &[u8] = b"bootstrap_ip";
const KEY_SELF_NODE: &[u8] = b"self_node";
const KEY_ROLE: &[u8] = b"role";
const KEY_SELF_FLAGS: &[u8] = b"self_flags";
const KEY_PRIVATE_KEY_B64: &[u8] = b"private_key_b64";

/// Persistent store for this peer's identity and its view of the network.
/// Cheap to clone: both trees are `sled::Tree` handles.
#[derive(Clone)]
pub struct NodeStore {
    meta: KvTable,
    nodes: KvTable,
}

impl NodeStore {
    /// Open (or create) the node store at `path` (conventionally `utility.db`).
    pub fn open(path: &str) -> Result<Self, NodeStoreError> {
        let db = KvStore::open(path)?;
        let meta = db.table("meta")?;
        let nodes = db.table("nodes")?;
        Ok(Self { meta, nodes })
    }

    /// Generic string put/get/delete, exposed for ambient config values that
    /// do not warrant a dedicated typed helper.
    pub fn put_string(&self, key: &str, value: &str) -> Result<(), NodeStoreError> {
        self.meta.put(key.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    /// Read back a string previously stored with [`Self::put_string`].
    pub fn get_string(&self, key: &str) -> Result<Option<String>, NodeStoreError> {
        match self.meta.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(None),
        }
    }

    /// Generic integer put/get, stored as decimal text.
    pub fn put_int(&self, key: &str, value: i64) -> Result<(), NodeStoreError> {
        self.put_string(key, &value.to_string())
    }

    /// Read back an integer previously stored with [`Self::put_int`].
    pub fn get_int(&self, key: &str) -> Result<Option<i64>, NodeStoreError> {
        match self.get_string(key)? {
            Some(s) => s.parse().map(Some).map_err(|_| NodeStoreError::Corrupt),
            None => Ok(None),
        }
    }

    /// Delete a generic key.
    pub fn delete(&self, key: &str) -> Result<(), NodeStoreError> {
        self.meta.remove(key.as_bytes())?;
        Ok(())
    }

    /// Persist the bootstrap peer's IP.
    pub fn save_bootstrap_ip(&self, ip: &str) -> Result<(), NodeStoreError> {
        self.put_string_raw(KEY_BOOTSTRAP_IP, ip)
    }

    /// Read the persisted bootstrap peer IP, if any.
    pub fn get_bootstrap_ip(&self) -> Result<Option<String>, NodeStoreError> {
        self.get_string_raw(KEY_BOOTSTRAP_IP)
    }

    /// Persist this peer's own identity key pair, as the base64 private key
    /// text alongside the derived `NodeConfig`.
    pub fn save_keys(&self, private_key_b64: &str, self_node: &NodeConfig) -> Result<(), NodeStoreError> {
        self.put_string_raw(KEY_PRIVATE_KEY_B64, private_key_b64)?;
        self.set_self_node(self_node)
    }

    /// Read this peer's own persisted private key text, if any.
    pub fn get_private_key_b64(&self) -> Result<Option<String>, NodeStoreError> {
        self.get_string_raw(KEY_PRIVATE_KEY_B64)
    }

    /// Persist this peer's own `NodeConfig`.
    pub fn set_self_node(&self, node: &NodeConfig) -> Result<(), NodeStoreError> {
        let bytes = serde_json::to_vec(node).map_err(|_| NodeStoreError::Corrupt)?;
        self.meta.put(KEY_SELF_NODE, &bytes)?;
        Ok(())
    }

    /// Read this peer's own persisted `NodeConfig`.
    pub fn get_self_node(&self) -> Result<Option<NodeConfig>, NodeStoreError> {
        match self.meta.get(KEY_SELF_NODE)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|_| NodeStoreError::Corrupt),
            None => Ok(None),
        }
    }

    /// Persist this peer's role flag.
    pub fn save_role(&self, role: Role) -> Result<(), NodeStoreError> {
        let text = match role {
            Role::None => "NONE",
            Role::Bootstrap => "BOOTSTRAP",
        };
        self.put_string_raw(KEY_ROLE, text)
    }

    /// Read this peer's persisted role flag, defaulting to `Role::None`.
    pub fn get_role(&self) -> Result<Role, NodeStoreError> {
        match self.get_string_raw(KEY_ROLE)? {
            Some(text) => Ok(Role::parse_legacy(&text)),
            None => Ok(Role::None),
        }
    }

    /// Persist the self flags (accepted state, session token/expiry).
    ///
    /// `isAccepted` is enforced monotonic here: once set, a later call with
    /// `is_accepted = false` is silently ignored for that field.
    pub fn save_self_flags(&self, flags: &SelfFlags) -> Result<(), NodeStoreError> {
        let mut merged = self.get_self_flags()?.unwrap_or_default();
        merged.is_accepted = merged.is_accepted || flags.is_accepted;
        merged.session_token = flags.session_token.clone();
        merged.session_expires_at = flags.session_expires_at;
        let bytes = serde_json::to_vec(&merged).map_err(|_| NodeStoreError::Corrupt)?;
        self.meta.put(KEY_SELF_FLAGS, &bytes)?;
        Ok(())
    }

    /// Read the persisted self flags.
    pub fn get_self_flags(&self) -> Result<Option<SelfFlags>, NodeStoreError> {
        match self.meta.get(KEY_SELF_FLAGS)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|_| NodeStoreError::Corrupt),
            None => Ok(None),
        }
    }

    /// Whether this peer is currently accepted.
    pub fn is_accepted(&self) -> Result<bool, NodeStoreError> {
        Ok(self.get_self_flags()?.map(|f| f.is_accepted).unwrap_or(false))
    }

    /// Add (or idempotently overwrite) a known peer, keyed by its public key.
    pub fn add_node(&self, node: &NodeConfig) -> Result<(), NodeStoreError> {
        let bytes = serde_json::to_vec(node).map_err(|_| NodeStoreError::Corrupt)?;
        self.nodes.put(node.public_key.as_bytes(), &bytes)?;
        Ok(())
    }

    /// Remove a known peer by public key. No-op if absent.
    pub fn remove_node(&self, public_key: &str) -> Result<(), NodeStoreError> {
        self.nodes.remove(public_key.as_bytes())?;
        Ok(())
    }

    /// All currently known peers, including self if it was added.
    pub fn get_all_nodes(&self) -> Result<Vec<NodeConfig>, NodeStoreError> {
        let mut out = Vec::new();
        for (_, bytes) in self.nodes.iter_all()? {
            let node: NodeConfig = serde_json::from_slice(&bytes).map_err(|_| NodeStoreError::Corrupt)?;
            out.push(node);
        }
        Ok(out)
    }

    /// Look up one known peer by public key.
    pub fn get_node(&self, public_key: &str) -> Result<Option<NodeConfig>, NodeStoreError> {
        match self.nodes.get(public_key.as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|_| NodeStoreError::Corrupt),
            None => Ok(None),
        }
    }

    fn put_string_raw(&self, key: &[u8], value: &str) -> Result<(), NodeStoreError> {
        self.meta.put(key, value.as_bytes())?;
        Ok(())
    }

    fn get_string_raw(&self, key: &[u8]) -> Result<Option<String>, NodeStoreError> {
        match self.meta.get(key)? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(ip: &str, pk: &str) -> NodeConfig {
        NodeConfig::new(ip.to_string(), Role::None, pk.to_string())
    }

    #[test]
    fn self_node_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = NodeStore::open(dir.path().join("utility.db").to_str().unwrap()).unwrap();
        assert_eq!(store.get_self_node().unwrap(), None);

        let me = node("127.0.0.1", "pk-self");
        store.set_self_node(&me).unwrap();
        assert_eq!(store.get_self_node().unwrap(), Some(me));
    }

    #[test]
    fn add_and_remove_node_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = NodeStore::open(dir.path().join("utility.db").to_str().unwrap()).unwrap();

        let peer = node("10.0.0.2", "pk-peer");
        store.add_node(&peer).unwrap();
        store.add_node(&peer).unwrap();
        assert_eq!(store.get_all_nodes().unwrap().len(), 1);

        store.remove_node("pk-peer").unwrap();
        store.remove_node("pk-peer").unwrap();
        assert!(store.get_all_nodes().unwrap().is_empty());
    }

    #[test]
    fn is_accepted_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let store = NodeStore::open(dir.path().join("utility.db").to_str().unwrap()).unwrap();
        assert!(!store.is_accepted().unwrap());

        store
            .save_self_flags(&SelfFlags { is_accepted: true, session_token: None, session_expires_at: None })
            .unwrap();
        assert!(store.is_accepted().unwrap());

        store
            .save_self_flags(&SelfFlags { is_accepted: false, session_token: None, session_expires_at: None })
            .unwrap();
        assert!(store.is_accepted().unwrap());
    }

    #[test]
    fn role_defaults_to_none_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = NodeStore::open(dir.path().join("utility.db").to_str().unwrap()).unwrap();
        assert_eq!(store.get_role().unwrap(), Role::None);

        store.save_role(Role::Bootstrap).unwrap();
        assert_eq!(store.get_role().unwrap(), Role::Bootstrap);
    }
}
