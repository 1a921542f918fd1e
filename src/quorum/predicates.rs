use crate::quorum::config::{MemberType, RaftConfig, RaftPeer};
use std::collections::HashSet;

/// The role a peer plays in consensus, derived from its place in the active
/// config and the currently observed leader.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConsensusRole {
    Leader,
    Follower,
    Learner,
    NonParticipant,
}

/// Connection detail for a member, as looked up by `member_detail`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MemberDetail {
    /// `host:port` of the member's last known address, if it advertised one.
    pub hostport: Option<String>,
    pub is_voter: bool,
    pub quorum_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum InvalidConfig {
    #[error("duplicate peer '{0}' in config")]
    DuplicatePeerUuid(String),
    #[error("voter '{0}' has no last known address")]
    VoterMissingAddress(String),
    #[error("peer '{0}' has unparseable port {1}")]
    UnparseablePort(String, u32),
    #[error("config has no voters")]
    NoVoters,
}

fn find_peer<'a>(uuid: &str, config: &'a RaftConfig) -> Option<&'a RaftPeer> {
    config.peers.iter().find(|peer| peer.uuid == uuid)
}

pub fn is_member(uuid: &str, config: &RaftConfig) -> bool {
    find_peer(uuid, config).is_some()
}

pub fn is_voter(uuid: &str, config: &RaftConfig) -> bool {
    matches!(
        find_peer(uuid, config),
        Some(peer) if peer.member_type == MemberType::Voter
    )
}

pub fn count_voters(config: &RaftConfig) -> usize {
    config
        .peers
        .iter()
        .filter(|peer| peer.member_type == MemberType::Voter)
        .count()
}

pub fn member_detail(uuid: &str, config: &RaftConfig) -> Option<MemberDetail> {
    find_peer(uuid, config).map(|peer| MemberDetail {
        hostport: peer.last_known_addr.as_ref().map(|addr| addr.to_string()),
        is_voter: peer.member_type == MemberType::Voter,
        quorum_id: peer.quorum_id.clone(),
    })
}

/// Structural validation of a config before it is trusted or persisted.
pub fn verify_config(config: &RaftConfig) -> Result<(), InvalidConfig> {
    let mut seen_uuids: HashSet<&str> = HashSet::with_capacity(config.peers.len());

    for peer in &config.peers {
        if !seen_uuids.insert(&peer.uuid) {
            return Err(InvalidConfig::DuplicatePeerUuid(peer.uuid.clone()));
        }

        match &peer.last_known_addr {
            Some(addr) => {
                if addr.port == 0 || addr.port > u16::MAX as u32 {
                    return Err(InvalidConfig::UnparseablePort(peer.uuid.clone(), addr.port));
                }
            }
            None => {
                if peer.member_type == MemberType::Voter {
                    return Err(InvalidConfig::VoterMissingAddress(peer.uuid.clone()));
                }
            }
        }
    }

    if count_voters(config) == 0 {
        return Err(InvalidConfig::NoVoters);
    }

    Ok(())
}

/// Derives the consensus role `self_uuid` plays given the observed leader and
/// a config:
/// - Leader: it is the leader and a voter.
/// - Follower: a voter that knows of a leader other than itself.
/// - Learner: a member without a vote.
/// - NonParticipant: everything else, including voters with no known leader.
pub fn compute_role(self_uuid: &str, leader_uuid: &str, config: &RaftConfig) -> ConsensusRole {
    let self_is_voter = is_voter(self_uuid, config);

    if !leader_uuid.is_empty() && self_is_voter {
        if self_uuid == leader_uuid {
            return ConsensusRole::Leader;
        }
        return ConsensusRole::Follower;
    }

    if is_member(self_uuid, config) && !self_is_voter {
        return ConsensusRole::Learner;
    }

    ConsensusRole::NonParticipant
}
