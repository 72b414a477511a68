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

//! External entry points (C10): the plain-method shapes an HTTP façade
//! would wrap. No routing or status-code mapping lives here — only the
//! domain operations and the result values callers need.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::core::consensus::engine::{Broadcaster, ConsensusEngine};
use crate::core::election::{self, CreateElectionOutcome, ElectionResult, ElectionType, Nomination};
use crate::core::identity;
use crate::core::ledger::{Ledger, TransactionRecord};
use crate::core::membership;
use crate::core::message::{CastVotePayload, Envelope, MessageType, NominationRequestPayload};
use crate::core::node_store::{NodeStore, NodeStoreError};
use crate::core::security::keystore::{Keystore, P256Backend};
use crate::core::sync;
use crate::core::types::{DnsModel, NodeConfig, Transaction, TransactionType};

/// API-layer errors. The HTTP façade maps these to status codes; this
/// crate only distinguishes the kinds callers need to branch on.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller-supplied input failed validation.
    #[error("invalid input")]
    InputInvalid,
    /// The referenced record, transaction or nomination does not exist.
    #[error("not found")]
    NotFound,
    /// Create found an existing record, or update/delete found none.
    #[error("conflict")]
    Conflict,
    /// The node store or ledger failed.
    #[error("storage")]
    Storage,
    /// No identity is loaded yet (self node not set).
    #[error("no self identity")]
    NoIdentity,
}

impl From<NodeStoreError> for ApiError {
    fn from(_: NodeStoreError) -> Self {
        ApiError::Storage
    }
}

impl From<crate::core::ledger::LedgerError> for ApiError {
    fn from(_: crate::core::ledger::LedgerError) -> Self {
        ApiError::Storage
    }
}

impl From<crate::core::message::MessageError> for ApiError {
    fn from(_: crate::core::message::MessageError) -> Self {
        ApiError::InputInvalid
    }
}

/// Outcome of a DNS create/update/delete call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DnsOpStatus {
    /// Signed, broadcast and queued in the mempool.
    Ok,
    /// Create found an existing `(name, type, rdata)`.
    Conflict,
    /// Update/delete found no matching record.
    NotFound,
    /// The record failed input validation (unsupported type, non-positive TTL).
    Invalid,
}

/// Result of a DNS create/update/delete call.
#[derive(Clone, Debug)]
pub struct DnsOpResult {
    /// Whether the write was queued.
    pub status: DnsOpStatus,
    /// Human-readable detail.
    pub message: String,
    /// Hash of the transaction that was queued, if any.
    pub tx_hash: Option<String>,
}

/// Result of `checkFetchResult`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchStatus {
    /// Whether this node is currently waiting on a join/promote election.
    pub election: bool,
    /// Whether this node is the very first node of a fresh network.
    pub first_node: bool,
    /// Whether this node is currently an accepted member.
    pub accepted: bool,
}

struct StoredNomination {
    nomination: Nomination,
    required_approvals: usize,
}

/// The node's external entry points: DNS CRUD/lookup, membership join, and
/// election operations. Holds the in-memory nomination registry (C6 has no
/// storage of its own — `Nomination` is a pure value type); everything else
/// delegates to C2/C7/C8.
pub struct NodeHandle {
    keystore: Keystore<P256Backend>,
    node_store: NodeStore,
    ledger: Arc<Ledger>,
    engine: Arc<ConsensusEngine>,
    broadcaster: Arc<dyn Broadcaster>,
    nominations: Mutex<BTreeMap<String, StoredNomination>>,
}

impl NodeHandle {
    /// Assemble a handle over already-opened components.
    pub fn new(
        keystore: Keystore<P256Backend>,
        node_store: NodeStore,
        ledger: Arc<Ledger>,
        engine: Arc<ConsensusEngine>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self { keystore, node_store, ledger, engine, broadcaster, nominations: Mutex::new(BTreeMap::new()) }
    }

    fn self_node(&self) -> Result<NodeConfig, ApiError> {
        self.node_store.get_self_node()?.ok_or(ApiError::NoIdentity)
    }

    fn canonical_payload_json(payload: &[DnsModel]) -> Result<String, ApiError> {
        let mut sorted = payload.to_vec();
        sorted.sort_by(|a, b| (&a.name, a.r#type, &a.rdata).cmp(&(&b.name, b.r#type, &b.rdata)));
        serde_json::to_string(&sorted).map_err(|_| ApiError::InputInvalid)
    }

    fn sign_transaction(&self, ty: TransactionType, payload: Vec<DnsModel>, now_ms: u64) -> Result<Transaction, ApiError> {
        let self_pk_b64 = identity::encode_public_key(&self.keystore.public_key());
        let payload_json = Self::canonical_payload_json(&payload)?;
        let hash = Transaction::compute_hash(&self_pk_b64, ty, &payload_json, now_ms);
        let signature = self.keystore.sign(hash.as_bytes()).map_err(|_| ApiError::Storage)?;
        Ok(Transaction {
            sender_public_key: self_pk_b64,
            r#type: ty,
            payload,
            timestamp: now_ms,
            hash,
            signature: identity::encode_signature(&signature),
        })
    }

    fn submit(&self, ty: TransactionType, record: DnsModel, now_ms: u64) -> Result<DnsOpResult, ApiError> {
        if !crate::core::types::record_type::is_supported(record.r#type) || record.ttl == 0 {
            return Ok(DnsOpResult { status: DnsOpStatus::Invalid, message: "unsupported type or non-positive ttl".into(), tx_hash: None });
        }
        let name = DnsModel::normalized_name(&record.name);
        let exists = self.ledger.dns().exists(&name, record.r#type, &record.rdata)?;
        match ty {
            TransactionType::Register if exists => {
                return Ok(DnsOpResult { status: DnsOpStatus::Conflict, message: "record already exists".into(), tx_hash: None });
            }
            TransactionType::UpdateRecords | TransactionType::DeleteRecords if !exists => {
                return Ok(DnsOpResult { status: DnsOpStatus::NotFound, message: "record does not exist".into(), tx_hash: None });
            }
            _ => {}
        }

        let mut record = record;
        record.name = name;
        let tx = self.sign_transaction(ty, vec![record], now_ms)?;
        let tx_hash = tx.hash.clone();
        if !self.engine.publish_transaction(tx) {
            return Ok(DnsOpResult { status: DnsOpStatus::Invalid, message: "signature verification failed".into(), tx_hash: None });
        }
        Ok(DnsOpResult { status: DnsOpStatus::Ok, message: "queued".into(), tx_hash: Some(tx_hash) })
    }

    /// Create a DNS record: rejects if `(name, type, rdata)` already exists.
    pub fn dns_create(&self, record: DnsModel, now_ms: u64) -> Result<DnsOpResult, ApiError> {
        self.submit(TransactionType::Register, record, now_ms)
    }

    /// Update a DNS record: requires the record to already exist (ownership
    /// is enforced at apply time, not here).
    pub fn dns_update(&self, record: DnsModel, now_ms: u64) -> Result<DnsOpResult, ApiError> {
        self.submit(TransactionType::UpdateRecords, record, now_ms)
    }

    /// Delete a DNS record: requires the record to already exist.
    pub fn dns_delete(&self, record: DnsModel, now_ms: u64) -> Result<DnsOpResult, ApiError> {
        self.submit(TransactionType::DeleteRecords, record, now_ms)
    }

    /// Look up every record matching `(name, type)`.
    pub fn dns_lookup(&self, name: &str, r#type: u16) -> Result<Vec<DnsModel>, ApiError> {
        Ok(self.ledger.dns().lookup(&DnsModel::normalized_name(name), r#type)?)
    }

    /// Look up every record sharing `rdata`, in insertion order.
    pub fn dns_reverse(&self, rdata: &str) -> Result<Vec<DnsModel>, ApiError> {
        Ok(self.ledger.dns().reverse(rdata)?)
    }

    /// Query a transaction's recorded status by hash.
    pub fn dns_status(&self, tx_hash: &str) -> Result<Option<TransactionRecord>, ApiError> {
        Ok(self.ledger.transactions().get(tx_hash)?)
    }

    /// Join a network via `bootstrap_ip`: persist it and return the
    /// `FETCH_NODES` envelope the transport should send directly to it.
    pub fn join(&self, bootstrap_ip: &str) -> Result<Envelope, ApiError> {
        self.node_store.save_bootstrap_ip(bootstrap_ip)?;
        let self_node = self.self_node()?;
        Ok(membership::create_fetch_request(&self_node.ip, &self_node.public_key)?)
    }

    /// Whether this node needs an election, is the first node of a fresh
    /// network, or is already accepted. A node store with no known peers is
    /// treated as the genesis node of its network and auto-accepted.
    pub fn check_fetch_result(&self) -> Result<FetchStatus, ApiError> {
        let nodes = self.node_store.get_all_nodes()?;
        if nodes.is_empty() {
            let mut flags = self.node_store.get_self_flags()?.unwrap_or_default();
            flags.is_accepted = true;
            self.node_store.save_self_flags(&flags)?;
            if let Ok(self_node) = self.self_node() {
                sync::setup_normal_node(self.engine.leader_queue(), &self_node);
            }
            return Ok(FetchStatus { election: false, first_node: true, accepted: true });
        }
        let accepted = self.node_store.is_accepted()?;
        Ok(FetchStatus { election: !accepted, first_node: false, accepted })
    }

    fn required_approvals(&self) -> Result<usize, ApiError> {
        let nodes = self.node_store.get_all_nodes()?;
        let self_pk_b64 = identity::encode_public_key(&self.keystore.public_key());
        Ok(nodes.iter().filter(|n| n.public_key != self_pk_b64).count().max(1))
    }

    fn create_election_inner(
        &self,
        candidate: NodeConfig,
        password: &str,
        node_name: &str,
        time_minutes: u64,
        description: &str,
        election_type: ElectionType,
        now_ms: u64,
    ) -> Result<(CreateElectionOutcome, Option<Envelope>), ApiError> {
        let (outcome, nomination) =
            election::create_election(candidate, password, node_name, time_minutes, description, election_type, now_ms);
        let Some(nomination) = nomination else {
            return Ok((outcome, None));
        };

        let required_approvals = self.required_approvals()?;
        let self_node = self.self_node()?;
        let env = Envelope::new(
            MessageType::NominationRequest,
            &self_node.ip,
            &self_node.public_key,
            &NominationRequestPayload { nomination: nomination.clone() },
        )?;
        self.nominations.lock().unwrap().insert(nomination.id.clone(), StoredNomination { nomination, required_approvals });
        Ok((outcome, Some(env)))
    }

    /// Create a `JOIN` election for `candidate`, broadcasting the
    /// nomination to all known peers.
    pub fn create_join_election(
        &self,
        candidate: NodeConfig,
        password: &str,
        node_name: &str,
        time_minutes: u64,
        description: &str,
        now_ms: u64,
    ) -> Result<(CreateElectionOutcome, Option<Envelope>), ApiError> {
        self.create_election_inner(candidate, password, node_name, time_minutes, description, ElectionType::Join, now_ms)
    }

    /// Create a `PROMOTE` election for `candidate`.
    pub fn create_promote_election(
        &self,
        candidate: NodeConfig,
        password: &str,
        node_name: &str,
        time_minutes: u64,
        description: &str,
        now_ms: u64,
    ) -> Result<(CreateElectionOutcome, Option<Envelope>), ApiError> {
        self.create_election_inner(candidate, password, node_name, time_minutes, description, ElectionType::Promote, now_ms)
    }

    /// Store a nomination broadcast by its creator.
    pub fn on_nomination_request(&self, env: &Envelope) -> Result<(), ApiError> {
        let payload: NominationRequestPayload = env.parse_payload()?;
        let required_approvals = self.required_approvals()?;
        self.nominations
            .lock()
            .unwrap()
            .insert(payload.nomination.id.clone(), StoredNomination { nomination: payload.nomination, required_approvals });
        Ok(())
    }

    /// Tally an incoming `CAST_VOTE` against the locally held nomination.
    pub fn on_cast_vote(&self, env: &Envelope) -> Result<(), ApiError> {
        let payload: CastVotePayload = env.parse_payload()?;
        let mut guard = self.nominations.lock().unwrap();
        let Some(stored) = guard.get_mut(&payload.nomination_id) else {
            return Err(ApiError::NotFound);
        };
        election::cast_vote(&mut stored.nomination, &payload.voter, payload.approve);
        Ok(())
    }

    /// Every nomination currently held, most recently created first.
    pub fn list_nominations(&self) -> Vec<Nomination> {
        let guard = self.nominations.lock().unwrap();
        let mut out: Vec<Nomination> = guard.values().map(|s| s.nomination.clone()).collect();
        out.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        out
    }

    /// Build the direct `CAST_VOTE` envelope an operator sends to a
    /// nomination's candidate.
    pub fn cast_vote(&self, nomination_id: &str, approve: bool) -> Result<Envelope, ApiError> {
        let self_node = self.self_node()?;
        let payload = CastVotePayload { nomination_id: nomination_id.to_string(), voter: self_node.public_key.clone(), approve };
        Ok(Envelope::new(MessageType::CastVote, &self_node.ip, &self_node.public_key, &payload)?)
    }

    /// Resolve a nomination's outcome, applying acceptance/promotion
    /// effects on success.
    pub fn election_result(&self, nomination_id: &str, password: &str, now_ms: u64) -> Result<ElectionResult, ApiError> {
        let (result, candidate, election_type) = {
            let guard = self.nominations.lock().unwrap();
            let Some(stored) = guard.get(nomination_id) else {
                return Err(ApiError::NotFound);
            };
            let result = election::get_result(&stored.nomination, stored.required_approvals, password, now_ms);
            (result, stored.nomination.node_config.clone(), stored.nomination.election_type)
        };

        if result == ElectionResult::Accepted {
            self.node_store.add_node(&candidate)?;
            let is_self = self.self_node().map(|n| n == candidate).unwrap_or(false);
            match election_type {
                ElectionType::Join => {
                    if is_self {
                        let mut flags = self.node_store.get_self_flags()?.unwrap_or_default();
                        flags.is_accepted = true;
                        self.node_store.save_self_flags(&flags)?;
                    }
                    sync::setup_normal_node(self.engine.leader_queue(), &candidate);
                }
                ElectionType::Promote => {
                    if is_self {
                        self.node_store.save_role(crate::core::types::Role::Bootstrap)?;
                        if let Ok(env) = sync::create_promote_request(&candidate, &candidate.ip, &candidate.public_key) {
                            self.broadcaster.broadcast(&env);
                        }
                    }
                }
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::consensus::engine::BlockApplier;
    use crate::core::ledger::TransactionStatus;
    use crate::core::types::{record_type, Block, Role};

    struct NullBroadcaster;
    impl Broadcaster for NullBroadcaster {
        fn broadcast(&self, _envelope: &Envelope) {}
    }

    struct NoopApplier;
    impl BlockApplier for NoopApplier {
        fn apply_block(&self, block: &Block) -> Vec<(String, TransactionStatus)> {
            block.transactions.iter().map(|t| (t.hash.clone(), TransactionStatus::Applied)).collect()
        }
    }

    fn handle(dir: &std::path::Path) -> NodeHandle {
        let keystore = Keystore::<P256Backend>::open(dir.join("keys").to_str().unwrap()).unwrap();
        let node_store = NodeStore::open(dir.join("utility.db").to_str().unwrap()).unwrap();
        let self_node = NodeConfig::new("1.1.1.1".into(), Role::None, identity::encode_public_key(&keystore.public_key()));
        node_store.set_self_node(&self_node).unwrap();
        let ledger = Arc::new(Ledger::open(dir.join("block.bin").to_str().unwrap()).unwrap());
        let engine = Arc::new(ConsensusEngine::new(self_node, ledger.clone(), Arc::new(NullBroadcaster), Arc::new(NoopApplier), 0));
        NodeHandle::new(keystore, node_store, ledger, engine, Arc::new(NullBroadcaster))
    }

    fn record(name: &str, rdata: &str) -> DnsModel {
        DnsModel { name: name.into(), r#type: record_type::A, ttl: 300, rdata: rdata.into(), owner: "pk".into(), transaction_hash: String::new() }
    }

    #[test]
    fn dns_create_then_lookup_returns_pending_after_mempool_insert() {
        let dir = tempfile::tempdir().unwrap();
        let handle = handle(dir.path());

        let result = handle.dns_create(record("example.com", "1.2.3.4"), 1).unwrap();
        assert_eq!(result.status, DnsOpStatus::Ok);
        assert!(result.tx_hash.is_some());
    }

    #[test]
    fn dns_create_conflict_when_record_exists() {
        let dir = tempfile::tempdir().unwrap();
        let handle = handle(dir.path());
        handle.ledger.dns().put(&record("example.com", "1.2.3.4")).unwrap();

        let result = handle.dns_create(record("example.com", "1.2.3.4"), 1).unwrap();
        assert_eq!(result.status, DnsOpStatus::Conflict);
    }

    #[test]
    fn dns_update_not_found_when_record_absent() {
        let dir = tempfile::tempdir().unwrap();
        let handle = handle(dir.path());

        let result = handle.dns_update(record("example.com", "1.2.3.4"), 1).unwrap();
        assert_eq!(result.status, DnsOpStatus::NotFound);
    }

    #[test]
    fn dns_create_invalid_for_unsupported_type() {
        let dir = tempfile::tempdir().unwrap();
        let handle = handle(dir.path());

        let mut r = record("example.com", "1.2.3.4");
        r.r#type = 999;
        let result = handle.dns_create(r, 1).unwrap();
        assert_eq!(result.status, DnsOpStatus::Invalid);
    }

    #[test]
    fn check_fetch_result_auto_accepts_first_node() {
        let dir = tempfile::tempdir().unwrap();
        let handle = handle(dir.path());

        let status = handle.check_fetch_result().unwrap();
        assert_eq!(status, FetchStatus { election: false, first_node: true, accepted: true });
    }

    #[test]
    fn election_flow_accepts_after_quorum_and_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let handle = handle(dir.path());
        handle.node_store.add_node(&NodeConfig::new("2.2.2.2".into(), Role::None, "peer-b".into())).unwrap();
        handle.node_store.add_node(&NodeConfig::new("3.3.3.3".into(), Role::None, "peer-c".into())).unwrap();

        let candidate = NodeConfig::new("4.4.4.4".into(), Role::None, "candidate-pk".into());
        let (outcome, env) = handle.create_join_election(candidate.clone(), "secret", "node-d", 1, "joining", 0).unwrap();
        assert_eq!(outcome, CreateElectionOutcome::Ok);
        let env = env.unwrap();

        let nominations = handle.list_nominations();
        assert_eq!(nominations.len(), 1);
        let nomination_id = nominations[0].id.clone();

        handle.on_nomination_request(&env).unwrap();
        handle.on_cast_vote(&handle.cast_vote(&nomination_id, true).unwrap()).unwrap();
        election::cast_vote(
            &mut handle.nominations.lock().unwrap().get_mut(&nomination_id).unwrap().nomination,
            "peer-c",
            true,
        );

        let expire = handle.list_nominations()[0].expire_time;
        let result = handle.election_result(&nomination_id, "secret", expire + 1).unwrap();
        assert_eq!(result, ElectionResult::Accepted);
        assert!(handle.node_store.get_all_nodes().unwrap().iter().any(|n| n.public_key == "candidate-pk"));
    }
}
