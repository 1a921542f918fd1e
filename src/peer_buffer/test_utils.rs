use crate::peer_buffer::log_cache::{LogCache, ReadContext, ReadOps, ReadOpsError};
use crate::peer_buffer::replicate::{OpId, ReplicateMsg, ReplicateRef};
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub(crate) fn msg(term: i64, index: i64, size: usize) -> ReplicateRef {
    Arc::new(ReplicateMsg::new(
        OpId::new(term, index),
        Bytes::from(vec![0u8; size]),
    ))
}

pub(crate) fn direct_context() -> ReadContext {
    ReadContext {
        for_peer_uuid: "peer-f".to_string(),
        for_peer_host: "host-f".to_string(),
        for_peer_port: 7000,
        route_via_proxy: false,
    }
}

pub(crate) fn proxy_context() -> ReadContext {
    ReadContext {
        route_via_proxy: true,
        ..direct_context()
    }
}

/// LogCache whose responses are scripted up front, recording each call's
/// (after_index, max_bytes) for assertions.
pub(crate) struct ScriptedLogCache {
    responses: Mutex<VecDeque<Result<ReadOps, ReadOpsError>>>,
    calls: Mutex<Vec<(i64, i64)>>,
}

impl ScriptedLogCache {
    pub(crate) fn new() -> Self {
        ScriptedLogCache {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push_response(&self, response: Result<ReadOps, ReadOpsError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub(crate) fn calls(&self) -> Vec<(i64, i64)> {
        self.calls.lock().unwrap().clone()
    }
}

impl LogCache for ScriptedLogCache {
    fn read_ops(
        &self,
        after_index: i64,
        max_bytes: i64,
        _context: &ReadContext,
    ) -> Result<ReadOps, ReadOpsError> {
        self.calls.lock().unwrap().push((after_index, max_bytes));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedLogCache ran out of scripted responses")
    }
}
