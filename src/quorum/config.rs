use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// MemberType is how a peer participates in the replication group. Voters
/// count towards election and commit majorities; non-voters and learners
/// receive replicated data but have no say in either.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum MemberType {
    Voter,
    NonVoter,
    Learner,
}

/// Last known address a peer advertised.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct HostPort {
    pub host: String,
    pub port: u32,
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A single peer in a replication group's configuration.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct RaftPeer {
    pub uuid: String,
    pub member_type: MemberType,
    pub last_known_addr: Option<HostPort>,
    /// Opaque tag grouping voters for flexible-quorum policies.
    pub quorum_id: Option<String>,
}

impl RaftPeer {
    pub fn new(uuid: impl Into<String>, member_type: MemberType) -> Self {
        RaftPeer {
            uuid: uuid.into(),
            member_type,
            last_known_addr: None,
            quorum_id: None,
        }
    }

    pub fn with_addr(mut self, host: impl Into<String>, port: u32) -> Self {
        self.last_known_addr = Some(HostPort {
            host: host.into(),
            port,
        });
        self
    }

    pub fn with_quorum_id(mut self, quorum_id: impl Into<String>) -> Self {
        self.quorum_id = Some(quorum_id.into());
        self
    }
}

/// The membership of a replication group at a point in the log.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RaftConfig {
    /// The log position at which this config was proposed. Monotonically
    /// increasing across config changes.
    pub opid_index: i64,
    pub peers: Vec<RaftPeer>,
    /// Required voter count per quorum group, for flexible-quorum variants.
    /// Empty for plain majority quorums.
    pub voter_distribution: BTreeMap<String, i32>,
}

impl RaftConfig {
    pub fn new(peers: Vec<RaftPeer>) -> Self {
        RaftConfig {
            opid_index: 0,
            peers,
            voter_distribution: BTreeMap::new(),
        }
    }
}
