mod metadata;
mod persistent_state;
mod removed_peers;

pub use metadata::CMetaError;
pub use metadata::ConfigKind;
pub use metadata::ConsensusMetadata;
pub use metadata::ConsensusState;
pub use metadata::CreateMode;
pub use metadata::FlushMode;
pub use persistent_state::LastKnownLeader;
pub use persistent_state::PreviousVote;
pub use persistent_state::MIN_TERM;
