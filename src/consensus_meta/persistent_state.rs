use crate::quorum::RaftConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum valid raft term. Terms start here; the first election is term 1.
pub const MIN_TERM: i64 = 0;

/// Sentinel for `last_pruned_term` before any vote history has been pruned.
pub(crate) const NO_PRUNED_TERM: i64 = -1;

/// A vote this node granted in some prior term.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PreviousVote {
    pub candidate_uuid: String,
    pub election_term: i64,
}

/// The most recent leader this node has accepted, made durable lazily via
/// `ConsensusMetadata::sync_last_known_leader`. An empty uuid with term 0
/// means no leader has ever been known.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct LastKnownLeader {
    pub uuid: String,
    pub election_term: i64,
}

impl LastKnownLeader {
    pub(crate) fn none() -> Self {
        LastKnownLeader {
            uuid: String::new(),
            election_term: 0,
        }
    }
}

/// The durable portion of consensus metadata, exactly what goes in the
/// on-disk record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PersistedRecord {
    pub current_term: i64,
    /// Present iff this node granted a vote in `current_term`.
    pub voted_for: Option<String>,
    /// Always present once the metadata has been created or loaded.
    pub committed_config: Option<RaftConfig>,
    /// Sparse history of prior votes, keyed and ordered by term.
    pub previous_vote_history: BTreeMap<i64, PreviousVote>,
    pub last_known_leader: LastKnownLeader,
    /// Highest term evicted from `previous_vote_history`.
    pub last_pruned_term: i64,
}

impl PersistedRecord {
    pub(crate) fn new() -> Self {
        PersistedRecord {
            current_term: MIN_TERM,
            voted_for: None,
            committed_config: None,
            previous_vote_history: BTreeMap::new(),
            last_known_leader: LastKnownLeader::none(),
            last_pruned_term: NO_PRUNED_TERM,
        }
    }
}
