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

//! Election engine (C6): nomination creation, direct-vote collection,
//! tallying and acceptance/promotion effect.
//!
//! Vote deduplication by voter public key, and the quorum-of-accepted-peers
//! tally rule, follow the same shape as a BFT-lite vote tally keyed by
//! voter identity: a `BTreeMap` keyed by voter, last-writer-wins per voter,
//! so a replayed or duplicate `CAST_VOTE` never counts twice.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::core::identity::sha256_hex;
use crate::core::types::NodeConfig;

/// The two election kinds. `Join` grants acceptance; `Promote` grants the
/// bootstrap role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionType {
    /// A new peer requests acceptance into the network.
    Join,
    /// An accepted peer requests the bootstrap role.
    Promote,
}

/// A pending election, broadcast to every known peer as a `NOMINATION_REQUEST`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Nomination {
    /// Identifier, derived deterministically from its contents at creation.
    pub id: String,
    /// The candidate peer.
    pub node_config: NodeConfig,
    /// Which kind of election this is.
    pub election_type: ElectionType,
    /// Operator-supplied candidate display name.
    pub node_name: String,
    /// Operator-supplied description.
    pub description: String,
    /// Creation time, milliseconds since the UNIX epoch.
    pub start_time: u64,
    /// Expiry time, milliseconds since the UNIX epoch.
    pub expire_time: u64,
    /// Votes collected so far, keyed by voter public key for deduplication.
    pub voters: BTreeMap<String, bool>,
    /// SHA-256 hex digest of the creator-chosen password, the gate on
    /// privileged result reads. Not an account credential.
    pub password_hash: String,
}

impl Nomination {
    /// Approval count currently tallied.
    pub fn approvals(&self) -> usize {
        self.voters.values().filter(|v| **v).count()
    }
}

/// Outcome of creating an election.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateElectionOutcome {
    /// Accepted and broadcast.
    Ok,
    /// The candidate description was invalid (empty name).
    InvalidName,
    /// `timeMinutes` was zero or absurdly large.
    InvalidDuration,
}

/// Result of resolving an election.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElectionResult {
    /// Quorum reached before or at expiry.
    Accepted,
    /// Expired without quorum.
    Rejected,
    /// Still within its voting window.
    InProgress,
    /// The caller-supplied password did not match the creator's.
    WrongPassword,
    /// No nomination exists for the given session/candidate.
    NoSession,
}

const MAX_DURATION_MINUTES: u64 = 7 * 24 * 60;

/// Create a new nomination. `now_ms` is the caller-supplied wall-clock time
/// (see the deterministic `tick`-style testing convention used across the
/// consensus engine).
#[allow(clippy::too_many_arguments)]
pub fn create_election(
    candidate: NodeConfig,
    password: &str,
    node_name: &str,
    time_minutes: u64,
    description: &str,
    election_type: ElectionType,
    now_ms: u64,
) -> (CreateElectionOutcome, Option<Nomination>) {
    if node_name.trim().is_empty() {
        return (CreateElectionOutcome::InvalidName, None);
    }
    if time_minutes == 0 || time_minutes > MAX_DURATION_MINUTES {
        return (CreateElectionOutcome::InvalidDuration, None);
    }

    let expire_time = now_ms + time_minutes * 60_000;
    let id_preimage = format!("{}{}{}{}", candidate.public_key, node_name, now_ms, description);
    let id = sha256_hex(id_preimage.as_bytes());
    let password_hash = sha256_hex(password.as_bytes());

    let nomination = Nomination {
        id,
        node_config: candidate,
        election_type,
        node_name: node_name.to_string(),
        description: description.to_string(),
        start_time: now_ms,
        expire_time,
        voters: BTreeMap::new(),
        password_hash,
    };
    (CreateElectionOutcome::Ok, Some(nomination))
}

/// Apply an incoming vote to a nomination, deduplicating by voter public
/// key (last vote from a given voter wins, matching a replayed `CAST_VOTE`
/// being harmless).
pub fn cast_vote(nomination: &mut Nomination, voter_public_key: &str, approve: bool) {
    nomination.voters.insert(voter_public_key.to_string(), approve);
}

/// Resolve a nomination's current outcome given the quorum size (number of
/// currently accepted peers excluding the candidate at election start) and
/// the caller-supplied password.
pub fn get_result(
    nomination: &Nomination,
    required_approvals: usize,
    password: &str,
    now_ms: u64,
) -> ElectionResult {
    let password_hash = sha256_hex(password.as_bytes());
    if password_hash != nomination.password_hash {
        return ElectionResult::WrongPassword;
    }

    if now_ms <= nomination.expire_time {
        return ElectionResult::InProgress;
    }

    if nomination.approvals() >= required_approvals {
        ElectionResult::Accepted
    } else {
        ElectionResult::Rejected
    }
}

/// Current wall-clock time in milliseconds since the UNIX epoch, the
/// default `now_ms` source for callers outside tests.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Role;

    fn candidate() -> NodeConfig {
        NodeConfig::new("10.0.0.5".into(), Role::None, "pk-candidate".into())
    }

    #[test]
    fn duplicate_votes_from_same_voter_do_not_double_count() {
        let (outcome, nomination) =
            create_election(candidate(), "secret", "node-b", 1, "joining", ElectionType::Join, 0);
        assert_eq!(outcome, CreateElectionOutcome::Ok);
        let mut nomination = nomination.unwrap();

        cast_vote(&mut nomination, "voter-1", true);
        cast_vote(&mut nomination, "voter-1", true);
        cast_vote(&mut nomination, "voter-1", true);
        assert_eq!(nomination.approvals(), 1);
    }

    #[test]
    fn resolves_accepted_when_quorum_reached_after_expiry() {
        let (_, nomination) = create_election(candidate(), "pw", "node-b", 1, "d", ElectionType::Join, 0);
        let mut nomination = nomination.unwrap();
        cast_vote(&mut nomination, "v1", true);
        cast_vote(&mut nomination, "v2", true);

        let after_expiry = nomination.expire_time + 1;
        assert_eq!(get_result(&nomination, 2, "pw", after_expiry), ElectionResult::Accepted);
    }

    #[test]
    fn resolves_rejected_when_quorum_not_reached_after_expiry() {
        let (_, nomination) = create_election(candidate(), "pw", "node-b", 1, "d", ElectionType::Join, 0);
        let mut nomination = nomination.unwrap();
        cast_vote(&mut nomination, "v1", true);

        let after_expiry = nomination.expire_time + 1;
        assert_eq!(get_result(&nomination, 2, "pw", after_expiry), ElectionResult::Rejected);
    }

    #[test]
    fn in_progress_before_expiry_regardless_of_votes() {
        let (_, nomination) = create_election(candidate(), "pw", "node-b", 5, "d", ElectionType::Join, 1_000);
        let nomination = nomination.unwrap();
        assert_eq!(get_result(&nomination, 1, "pw", 1_500), ElectionResult::InProgress);
    }

    #[test]
    fn wrong_password_never_reveals_state() {
        let (_, nomination) = create_election(candidate(), "pw", "node-b", 1, "d", ElectionType::Join, 0);
        let nomination = nomination.unwrap();
        let after_expiry = nomination.expire_time + 1;
        assert_eq!(get_result(&nomination, 1, "nope", after_expiry), ElectionResult::WrongPassword);
    }
}
