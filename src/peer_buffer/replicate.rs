use bytes::Bytes;
use std::sync::Arc;

/// OpId uniquely identifies a log entry as a (term, index) pair.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct OpId {
    pub term: i64,
    pub index: i64,
}

impl OpId {
    pub fn new(term: i64, index: i64) -> Self {
        OpId { term, index }
    }
}

/// A replicate message destined for a follower's log.
#[derive(Debug)]
pub struct ReplicateMsg {
    id: OpId,
    payload: Bytes,
}

impl ReplicateMsg {
    pub fn new(id: OpId, payload: Bytes) -> Self {
        ReplicateMsg { id, payload }
    }

    pub fn id(&self) -> OpId {
        self.id
    }

    pub fn index(&self) -> i64 {
        self.id.index
    }

    pub fn size_bytes(&self) -> i64 {
        self.payload.len() as i64
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

/// Shared-ownership handle to a replicate message. The log cache, the
/// per-peer buffers and in-flight RPCs all hold the same allocation.
pub type ReplicateRef = Arc<ReplicateMsg>;
