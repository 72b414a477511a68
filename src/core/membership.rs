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

//! Membership/bootstrap (C5): fetching the known-peer list from a bootstrap
//! peer at join time, and applying `ADD_NODE`/`DELETE_NODE`/`PROMOTE_NODE`
//! announcements idempotently to the local node store.

use crate::core::message::{Envelope, FetchNodesResponsePayload, MessageType, NodePayload};
use crate::core::node_store::{NodeStore, NodeStoreError};
use crate::core::types::NodeConfig;

/// Membership errors.
#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    /// The store returned an error.
    #[error("storage")]
    Storage,
    /// The message did not parse.
    #[error("malformed message")]
    Malformed,
}

impl From<NodeStoreError> for MembershipError {
    fn from(_: NodeStoreError) -> Self {
        MembershipError::Storage
    }
}

impl From<crate::core::message::MessageError> for MembershipError {
    fn from(_: crate::core::message::MessageError) -> Self {
        MembershipError::Malformed
    }
}

/// Build the `FETCH_NODES` request this peer sends directly to its
/// configured bootstrap IP at join time.
pub fn create_fetch_request(self_ip: &str, self_public_key: &str) -> Result<Envelope, MembershipError> {
    Ok(Envelope::new(MessageType::FetchNodes, self_ip, self_public_key, &())?)
}

/// Build the bootstrap's `FETCH_NODES_RESPONSE` reply, carrying every peer
/// currently known to this node.
pub fn build_fetch_response(
    store: &NodeStore,
    self_ip: &str,
    self_public_key: &str,
) -> Result<Envelope, MembershipError> {
    let nodes = store.get_all_nodes()?;
    let payload = FetchNodesResponsePayload { nodes };
    Ok(Envelope::new(MessageType::FetchNodesResponse, self_ip, self_public_key, &payload)?)
}

/// Apply a `FETCH_NODES_RESPONSE`: merge every peer it carries into the
/// local store. Idempotent — re-merging the same list is a no-op.
pub fn apply_fetch_response(store: &NodeStore, env: &Envelope) -> Result<usize, MembershipError> {
    let payload: FetchNodesResponsePayload = env.parse_payload()?;
    for node in &payload.nodes {
        store.add_node(node)?;
    }
    Ok(payload.nodes.len())
}

/// Apply an `ADD_NODE` announcement. Idempotent.
pub fn apply_add_node(store: &NodeStore, env: &Envelope) -> Result<NodeConfig, MembershipError> {
    let payload: NodePayload = env.parse_payload()?;
    store.add_node(&payload.node)?;
    Ok(payload.node)
}

/// Apply a `DELETE_NODE` announcement. Idempotent; a no-op if the peer was
/// already unknown.
pub fn apply_delete_node(store: &NodeStore, env: &Envelope) -> Result<NodeConfig, MembershipError> {
    let payload: NodePayload = env.parse_payload()?;
    store.remove_node(&payload.node.public_key)?;
    Ok(payload.node)
}

/// Apply a `PROMOTE_NODE` announcement. Changes only the role flag on the
/// stored peer entry; it does not itself grant acceptance (acceptance comes
/// only from a successful election).
pub fn apply_promote_node(store: &NodeStore, env: &Envelope) -> Result<NodeConfig, MembershipError> {
    let payload: NodePayload = env.parse_payload()?;
    store.add_node(&payload.node)?;
    Ok(payload.node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Role;

    fn node(ip: &str, pk: &str) -> NodeConfig {
        NodeConfig::new(ip.to_string(), Role::None, pk.to_string())
    }

    #[test]
    fn fetch_response_merge_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = NodeStore::open(dir.path().join("utility.db").to_str().unwrap()).unwrap();

        let payload = FetchNodesResponsePayload { nodes: vec![node("1.2.3.4", "pk-a"), node("5.6.7.8", "pk-b")] };
        let env = Envelope::new(MessageType::FetchNodesResponse, "0.0.0.0", "bootstrap-pk", &payload).unwrap();

        apply_fetch_response(&store, &env).unwrap();
        apply_fetch_response(&store, &env).unwrap();

        assert_eq!(store.get_all_nodes().unwrap().len(), 2);
    }

    #[test]
    fn add_then_delete_node_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = NodeStore::open(dir.path().join("utility.db").to_str().unwrap()).unwrap();

        let n = node("9.9.9.9", "pk-x");
        let add_env = Envelope::new(MessageType::AddNode, "0.0.0.0", "pk-x", &NodePayload { node: n.clone() }).unwrap();
        apply_add_node(&store, &add_env).unwrap();
        assert_eq!(store.get_all_nodes().unwrap(), vec![n.clone()]);

        let del_env = Envelope::new(MessageType::DeleteNode, "0.0.0.0", "pk-x", &NodePayload { node: n }).unwrap();
        apply_delete_node(&store, &del_env).unwrap();
        assert!(store.get_all_nodes().unwrap().is_empty());
    }

    #[test]
    fn promote_node_changes_role_without_granting_acceptance() {
        let dir = tempfile::tempdir().unwrap();
        let store = NodeStore::open(dir.path().join("utility.db").to_str().unwrap()).unwrap();

        let n = NodeConfig::new("1.1.1.1".into(), Role::Bootstrap, "pk-y".into());
        let env = Envelope::new(MessageType::PromoteNode, "0.0.0.0", "pk-y", &NodePayload { node: n.clone() }).unwrap();
        apply_promote_node(&store, &env).unwrap();

        let stored = store.get_node("pk-y").unwrap().unwrap();
        assert_eq!(stored.role, Role::Bootstrap);
        assert!(!store.is_accepted().unwrap());
    }
}
