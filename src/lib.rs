mod consensus_meta;
mod fault;
mod fs;
mod options;
mod peer_buffer;
mod quorum;

pub use consensus_meta::CMetaError;
pub use consensus_meta::ConfigKind;
pub use consensus_meta::ConsensusMetadata;
pub use consensus_meta::ConsensusState;
pub use consensus_meta::CreateMode;
pub use consensus_meta::FlushMode;
pub use consensus_meta::LastKnownLeader;
pub use consensus_meta::PreviousVote;
pub use consensus_meta::MIN_TERM;
pub use fs::Env;
pub use fs::FsManager;
pub use fs::RecordError;
pub use fs::StdEnv;
pub use fs::SyncMode;
pub use fs::WriteMode;
pub use options::BufferOptions;
pub use options::CMetaOptions;
pub use options::InvalidOptions;
pub use peer_buffer::AppendError;
pub use peer_buffer::BufferData;
pub use peer_buffer::FillResult;
pub use peer_buffer::HandedOffBufferData;
pub use peer_buffer::HandoffReceiver;
pub use peer_buffer::LockedBufferHandle;
pub use peer_buffer::LogCache;
pub use peer_buffer::OpId;
pub use peer_buffer::PeerMessageBuffer;
pub use peer_buffer::ReadContext;
pub use peer_buffer::ReadOps;
pub use peer_buffer::ReadOpsError;
pub use peer_buffer::ReplicateMsg;
pub use peer_buffer::ReplicateRef;
pub use quorum::compute_role;
pub use quorum::count_voters;
pub use quorum::is_member;
pub use quorum::is_voter;
pub use quorum::member_detail;
pub use quorum::verify_config;
pub use quorum::ConsensusRole;
pub use quorum::HostPort;
pub use quorum::InvalidConfig;
pub use quorum::MemberDetail;
pub use quorum::MemberType;
pub use quorum::RaftConfig;
pub use quorum::RaftPeer;

// The crate root has no code of its own: `mod` statements are private and the
// public surface is exactly the `pub use` list above.
