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

//! Deterministic domain types shared by every component: node identity,
//! transactions, blocks, DNS records and the canonical bincode encoding used
//! to hash them.

use bincode::Options;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::core::identity::sha256_hex;

/// Canonical serialization error.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value failed to serialize.
    #[error("serialization")]
    Serialize,
    /// The bytes failed to deserialize.
    #[error("deserialization")]
    Deserialize,
    /// The input exceeded the configured size limit.
    #[error("size limit exceeded")]
    TooLarge,
}

fn bincode_opts() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Encode with deterministic rules. Requires deterministic container ordering (use BTreeMap/BTreeSet).
pub fn encode_canonical<T: Serialize>(v: &T) -> Result<Vec<u8>, CodecError> {
    bincode_opts()
        .serialize(v)
        .map_err(|_| CodecError::Serialize)
}

/// Decode with a hard size cap.
pub fn decode_canonical_limited<T: DeserializeOwned>(
    bytes: &[u8],
    max: usize,
) -> Result<T, CodecError> {
    if bytes.len() > max {
        return Err(CodecError::TooLarge);
    }
    bincode_opts()
        .with_limit(max as u64)
        .deserialize(bytes)
        .map_err(|_| CodecError::Deserialize)
}

/// Canonical map type alias, used wherever the wire/hash format requires
/// deterministic key ordering.
pub type CanonicalMap<K, V> = BTreeMap<K, V>;

/// Node role. `None` is the default for every peer; `Bootstrap` marks the
/// well-known peer new joiners fetch the membership list from. The legacy
/// source carried a second, conflicting enumeration (`GENESIS`, `LEADER_NODE`,
/// `NORMAL_NODE`); all legacy values collapse to `None` on decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Ordinary peer. Equal standing with every other accepted peer.
    None,
    /// Bootstrap peer: the contact point new joiners fetch the node list from.
    Bootstrap,
}

impl Role {
    /// Parse a role from its wire/legacy text form, mapping every legacy
    /// variant (`GENESIS`, `LEADER_NODE`, `NORMAL_NODE`) onto `None`.
    pub fn parse_legacy(text: &str) -> Role {
        match text {
            "BOOTSTRAP" => Role::Bootstrap,
            _ => Role::None,
        }
    }
}

/// `(ip, role, publicKey)` identity triple for a peer. Equality uses all
/// three fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// IPv4 address text.
    pub ip: String,
    /// Declared role.
    pub role: Role,
    /// Base64 X.509 public key text, doubling as this peer's identifier.
    pub public_key: String,
}

impl NodeConfig {
    /// Construct a new node identity triple.
    pub fn new(ip: String, role: Role, public_key: String) -> Self {
        Self { ip, role, public_key }
    }
}

/// Leader rotation entry: a `NodeConfig` plus its globally monotone insertion
/// sequence number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueNode {
    /// The peer this entry represents.
    pub node_config: NodeConfig,
    /// Monotonically assigned sequence number, fixed at first insertion.
    pub sno: u64,
}

/// Supported DNS record type codes (RFC 1035 subset).
pub mod record_type {
    /// Address record.
    pub const A: u16 = 1;
    /// Name server record.
    pub const NS: u16 = 2;
    /// Canonical name record.
    pub const CNAME: u16 = 5;
    /// Start of authority record.
    pub const SOA: u16 = 6;
    /// Pointer record.
    pub const PTR: u16 = 12;
    /// Mail exchange record.
    pub const MX: u16 = 15;
    /// Text record.
    pub const TXT: u16 = 16;
    /// IPv6 address record.
    pub const AAAA: u16 = 28;

    /// All record types this node accepts.
    pub const SUPPORTED: [u16; 8] = [A, NS, CNAME, SOA, PTR, MX, TXT, AAAA];

    /// Whether `t` is one of the supported record type codes.
    pub fn is_supported(t: u16) -> bool {
        SUPPORTED.contains(&t)
    }
}

/// One DNS record. Natural key is `(name, type, rdata)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsModel {
    /// Lowercased fully-qualified domain name.
    pub name: String,
    /// Record type code (see [`record_type`]).
    pub r#type: u16,
    /// Time-to-live in seconds; must be greater than zero.
    pub ttl: u32,
    /// Record data (address, target name, text, ...).
    pub rdata: String,
    /// Base64 public key of the owning identity.
    pub owner: String,
    /// Hash of the transaction that most recently wrote this record.
    pub transaction_hash: String,
}

impl DnsModel {
    /// Lowercase the name, matching the wire-level normalization every
    /// record goes through before it is hashed or stored.
    pub fn normalized_name(name: &str) -> String {
        name.to_ascii_lowercase()
    }
}

/// The three transaction kinds a client may submit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    /// Create records that must not already exist.
    Register,
    /// Overwrite records that already exist and are owned by the sender.
    UpdateRecords,
    /// Remove records that already exist and are owned by the sender.
    DeleteRecords,
}

/// A signed mutation to the DNS table, the unit of mempool membership and
/// block inclusion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    /// Base64 public key of the signer.
    pub sender_public_key: String,
    /// The kind of mutation this transaction performs.
    pub r#type: TransactionType,
    /// Records this transaction touches.
    pub payload: Vec<DnsModel>,
    /// Sender wall-clock timestamp, milliseconds since the UNIX epoch.
    pub timestamp: u64,
    /// SHA-256 hex digest over `(senderPublicKey || type || sortedPayloadJson || timestamp)`.
    pub hash: String,
    /// Base64 signature over `hash`.
    pub signature: String,
}

impl Transaction {
    /// Compute the canonical hash input bytes for this transaction, given
    /// its payload already serialized to the sorted-JSON string that will be
    /// hashed. Sorting by record natural key happens at construction time,
    /// before this function is called, so the same payload always produces
    /// the same bytes regardless of client-supplied ordering.
    pub fn hash_preimage(sender_public_key: &str, ty: TransactionType, payload_json: &str, timestamp: u64) -> Vec<u8> {
        let type_tag = match ty {
            TransactionType::Register => "REGISTER",
            TransactionType::UpdateRecords => "UPDATE_RECORDS",
            TransactionType::DeleteRecords => "DELETE_RECORDS",
        };
        let mut buf = Vec::with_capacity(sender_public_key.len() + type_tag.len() + payload_json.len() + 20);
        buf.extend_from_slice(sender_public_key.as_bytes());
        buf.extend_from_slice(type_tag.as_bytes());
        buf.extend_from_slice(payload_json.as_bytes());
        buf.extend_from_slice(timestamp.to_string().as_bytes());
        buf
    }

    /// Compute `hash_preimage` and SHA-256 hex digest it in one step.
    pub fn compute_hash(sender_public_key: &str, ty: TransactionType, payload_json: &str, timestamp: u64) -> String {
        sha256_hex(&Self::hash_preimage(sender_public_key, ty, payload_json, timestamp))
    }
}

/// A block: an ordered batch of transactions chained to its predecessor by
/// hash.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    /// Hash of the previous block. The genesis block uses 64 `'0'` characters.
    pub previous_hash: String,
    /// Transactions in this block, sorted by transaction hash ascending.
    pub transactions: Vec<Transaction>,
    /// Block construction timestamp, milliseconds since the UNIX epoch.
    pub timestamp: u64,
    /// SHA-256 hex digest over `(previousHash || concatenated tx hashes || timestamp)`.
    pub hash: String,
}

/// The fixed previous-hash value used by the genesis block: 64 `'0'` characters.
pub fn genesis_previous_hash() -> String {
    "0".repeat(64)
}

impl Block {
    /// Build the genesis block: no transactions, fixed previous hash,
    /// hash computed the same way as any other block.
    pub fn genesis(timestamp: u64) -> Self {
        let previous_hash = genesis_previous_hash();
        let hash = Self::compute_hash(&previous_hash, &[], timestamp);
        Self {
            previous_hash,
            transactions: Vec::new(),
            timestamp,
            hash,
        }
    }

    /// Build a new block from a tip hash and a transaction set, sorting the
    /// transactions by hash ascending first so the resulting block hash is
    /// deterministic regardless of mempool iteration order.
    pub fn build(previous_hash: &str, mut transactions: Vec<Transaction>, timestamp: u64) -> Self {
        transactions.sort_by(|a, b| a.hash.cmp(&b.hash));
        let hash = Self::compute_hash(previous_hash, &transactions, timestamp);
        Self {
            previous_hash: previous_hash.to_string(),
            transactions,
            timestamp,
            hash,
        }
    }

    fn compute_hash(previous_hash: &str, transactions: &[Transaction], timestamp: u64) -> String {
        let mut buf = Vec::new();
        buf.extend_from_slice(previous_hash.as_bytes());
        for tx in transactions {
            buf.extend_from_slice(tx.hash.as_bytes());
        }
        buf.extend_from_slice(timestamp.to_string().as_bytes());
        sha256_hex(&buf)
    }

    /// Recompute this block's hash and compare against the stored one,
    /// guarding against a tampered `hash` field slipping through decode.
    pub fn hash_is_consistent(&self) -> bool {
        Self::compute_hash(&self.previous_hash, &self.transactions, self.timestamp) == self.hash
    }
}

/// The self-node's persisted process-wide flags (C2).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SelfFlags {
    /// Whether this peer has been granted acceptance. Monotonic 0 -> 1.
    pub is_accepted: bool,
    /// HTTP façade session token. Not read by the core beyond storage.
    #[serde(default)]
    pub session_token: Option<String>,
    /// HTTP façade session expiry, milliseconds since the UNIX epoch.
    #[serde(default)]
    pub session_expires_at: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_legacy_values_collapse_to_none() {
        assert_eq!(Role::parse_legacy("GENESIS"), Role::None);
        assert_eq!(Role::parse_legacy("LEADER_NODE"), Role::None);
        assert_eq!(Role::parse_legacy("NORMAL_NODE"), Role::None);
        assert_eq!(Role::parse_legacy("BOOTSTRAP"), Role::Bootstrap);
    }

    #[test]
    fn genesis_previous_hash_is_64_zeros() {
        let g = Block::genesis(0);
        assert_eq!(g.previous_hash, "0".repeat(64));
        assert!(g.transactions.is_empty());
        assert!(g.hash_is_consistent());
    }

    #[test]
    fn block_transactions_are_sorted_by_hash() {
        let tx_a = Transaction {
            sender_public_key: "pk".into(),
            r#type: TransactionType::Register,
            payload: vec![],
            timestamp: 1,
            hash: "bbbb".into(),
            signature: "sig".into(),
        };
        let tx_b = Transaction {
            hash: "aaaa".into(),
            ..tx_a.clone()
        };
        let block = Block::build("prev", vec![tx_a, tx_b], 42);
        assert_eq!(block.transactions[0].hash, "aaaa");
        assert_eq!(block.transactions[1].hash, "bbbb");
        assert!(block.hash_is_consistent());
    }

    #[test]
    fn record_type_support_matches_spec_subset() {
        assert!(record_type::is_supported(record_type::A));
        assert!(record_type::is_supported(record_type::AAAA));
        assert!(!record_type::is_supported(99));
    }

    #[test]
    fn canonical_encode_decode_roundtrip() {
        let model = DnsModel {
            name: "example.com".into(),
            r#type: record_type::A,
            ttl: 300,
            rdata: "1.2.3.4".into(),
            owner: "pk".into(),
            transaction_hash: "hash".into(),
        };
        let bytes = encode_canonical(&model).unwrap();
        let back: DnsModel = decode_canonical_limited(&bytes, 1 << 20).unwrap();
        assert_eq!(model, back);
    }
}
