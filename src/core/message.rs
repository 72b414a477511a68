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

//! Wire message envelope and the enumerated message types carried over the
//! transport (C4). The inner `payload` is intentionally double-encoded: a
//! JSON string embedded inside the outer JSON object, preserving wire
//! compatibility with peers that parse it type-neutrally before routing to
//! a handler.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::election::Nomination;
use crate::core::types::{Block, NodeConfig, Transaction};

/// Message codec errors.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The envelope or its inner payload did not parse as the expected shape.
    #[error("malformed message")]
    Malformed,
}

/// Enumerated wire message kinds (authoritative list).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Request the recipient's known peer list.
    FetchNodes,
    /// Reply to `FetchNodes` carrying the recipient's known peer list.
    FetchNodesResponse,
    /// Announce a new peer to add to the local store.
    AddNode,
    /// Announce a peer to remove from the local store.
    DeleteNode,
    /// Announce a peer's role change.
    PromoteNode,
    /// Request a block-database snapshot for catch-up.
    SyncRequest,
    /// Acknowledge that a snapshot transfer has completed.
    SyncResponse,
    /// Broadcast a new election nomination.
    NominationRequest,
    /// Direct-send a vote to a nomination's candidate.
    CastVote,
    /// Broadcast a new mempool transaction.
    TransactionPublish,
    /// Broadcast a newly produced block.
    BlockPublish,
}

/// The outer wire envelope carried by every message except raw file
/// transfer. `payload` is the inner message JSON, embedded as a string.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Message kind.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Sender's IPv4 address text.
    pub sender_ip: String,
    /// Sender's base64 public key.
    pub sender_public_key: String,
    /// Inner JSON, embedded as a string to preserve type-neutral routing.
    pub payload: String,
    /// Optional envelope-level signature, unused by message types that are
    /// authenticated at the payload level (transactions, votes).
    #[serde(default)]
    pub signature: Option<String>,
}

impl Envelope {
    /// Build an envelope, serializing `payload` to its inner JSON string.
    pub fn new<T: Serialize>(
        message_type: MessageType,
        sender_ip: &str,
        sender_public_key: &str,
        payload: &T,
    ) -> Result<Self, MessageError> {
        let payload = serde_json::to_string(payload).map_err(|_| MessageError::Malformed)?;
        Ok(Self {
            message_type,
            sender_ip: sender_ip.to_string(),
            sender_public_key: sender_public_key.to_string(),
            payload,
            signature: None,
        })
    }

    /// Serialize this envelope as one newline-terminated JSON line, the
    /// framing used by the TCP direct-message listener.
    pub fn to_line(&self) -> Result<String, MessageError> {
        let mut s = serde_json::to_string(self).map_err(|_| MessageError::Malformed)?;
        s.push('\n');
        Ok(s)
    }

    /// Parse one newline-terminated (or bare) JSON line into an envelope.
    /// Unknown fields are ignored; missing optional fields default.
    pub fn from_line(line: &str) -> Result<Self, MessageError> {
        serde_json::from_str(line.trim_end()).map_err(|_| MessageError::Malformed)
    }

    /// Parse the inner payload string into a typed value.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, MessageError> {
        serde_json::from_str(&self.payload).map_err(|_| MessageError::Malformed)
    }
}

/// `FETCH_NODES_RESPONSE` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchNodesResponsePayload {
    /// The responder's full known-peer list.
    pub nodes: Vec<NodeConfig>,
}

/// `ADD_NODE` / `DELETE_NODE` / `PROMOTE_NODE` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodePayload {
    /// The peer this announcement concerns.
    pub node: NodeConfig,
}

/// `NOMINATION_REQUEST` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NominationRequestPayload {
    /// The nomination being broadcast.
    pub nomination: Nomination,
}

/// `CAST_VOTE` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVotePayload {
    /// Identifier of the nomination being voted on.
    pub nomination_id: String,
    /// Base64 public key of the voter.
    pub voter: String,
    /// Whether the voter approves the nomination.
    pub approve: bool,
}

/// `TRANSACTION_PUBLISH` payload is a bare `Transaction`.
pub type TransactionPublishPayload = Transaction;

/// `BLOCK_PUBLISH` payload is a bare `Block`.
pub type BlockPublishPayload = Block;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_line_roundtrip() {
        let payload = NodePayload {
            node: NodeConfig::new("1.2.3.4".into(), crate::core::types::Role::None, "pk".into()),
        };
        let env = Envelope::new(MessageType::AddNode, "9.9.9.9", "sender-pk", &payload).unwrap();
        let line = env.to_line().unwrap();
        assert!(line.ends_with('\n'));

        let parsed = Envelope::from_line(&line).unwrap();
        assert_eq!(parsed.message_type, MessageType::AddNode);
        let back: NodePayload = parsed.parse_payload().unwrap();
        assert_eq!(back.node, payload.node);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let line = r#"{"type":"FETCH_NODES","senderIp":"1.1.1.1","senderPublicKey":"pk","payload":"{}","extra":"ignored"}"#;
        let env = Envelope::from_line(line).unwrap();
        assert_eq!(env.message_type, MessageType::FetchNodes);
    }
}
