use crate::peer_buffer::replicate::{OpId, ReplicateRef};
use std::io;

/// Identifies the peer a cache read is assembling messages for, and whether
/// those messages will be routed through a proxy node.
#[derive(Debug, Clone)]
pub struct ReadContext {
    pub for_peer_uuid: String,
    pub for_peer_host: String,
    pub for_peer_port: u32,
    pub route_via_proxy: bool,
}

/// Result of a successful `LogCache::read_ops` call.
pub struct ReadOps {
    /// Messages in strictly increasing index order, starting immediately
    /// after the requested index.
    pub msgs: Vec<ReplicateRef>,
    /// The OpId of the entry at the requested index itself, used by the
    /// consumer to validate the follower's log.
    pub preceding_op: OpId,
    /// True if the cache stopped before reaching the requested byte limit;
    /// the caller may resume from where it left off.
    pub stopped_early: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ReadOpsError {
    /// The op at the requested index has not finished its append yet. The
    /// read can simply be retried; nothing is wrong with the buffer.
    #[error("op at index {0} is pending append")]
    Incomplete(i64),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The log cache this buffer fills from. Implemented by the log subsystem;
/// this crate only consumes it.
pub trait LogCache: Send + Sync {
    /// Reads up to `max_bytes` worth of ops with indexes greater than
    /// `after_index`.
    fn read_ops(
        &self,
        after_index: i64,
        max_bytes: i64,
        context: &ReadContext,
    ) -> Result<ReadOps, ReadOpsError>;
}
