mod config;
mod predicates;

pub use config::HostPort;
pub use config::MemberType;
pub use config::RaftConfig;
pub use config::RaftPeer;
pub use predicates::compute_role;
pub use predicates::count_voters;
pub use predicates::is_member;
pub use predicates::is_voter;
pub use predicates::member_detail;
pub use predicates::verify_config;
pub use predicates::ConsensusRole;
pub use predicates::InvalidConfig;
pub use predicates::MemberDetail;
