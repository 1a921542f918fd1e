use crate::options::{BufferOptions, BufferOptionsValidated, InvalidOptions};
use crate::peer_buffer::log_cache::{LogCache, ReadContext, ReadOpsError};
use crate::peer_buffer::replicate::{OpId, ReplicateRef};
use std::convert::TryFrom;

/// Outcome of a successful cache fill.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FillResult {
    /// The cache returned everything asked of it.
    Complete,
    /// The cache stopped short of the requested fill; the caller may resume
    /// from where the buffer now ends. Informational, never resets anything.
    StoppedEarly,
}

#[derive(Debug, thiserror::Error)]
pub enum AppendError {
    #[error("message index {msg_index} does not follow buffer at {last_buffered}")]
    IndexGap { msg_index: i64, last_buffered: i64 },
}

/// Value-type buffer of contiguous pending replicate messages for one peer.
/// Fills either from direct appends on the log append path, or from reads
/// against the log cache when the peer is behind.
pub struct BufferData {
    msg_buffer_refs: Vec<ReplicateRef>,
    /// OpId of the replicate immediately before the start of the buffer.
    preceding_opid: OpId,
    /// The last index buffered. Buffering picks up from here; -1 until the
    /// buffer is first anchored. Survives a handoff so subsequent appends
    /// stay contiguous.
    last_buffered: i64,
    buffered_for_proxying: bool,
    bytes_buffered: i64,
    options: BufferOptionsValidated,
}

impl BufferData {
    pub fn new(options: BufferOptions) -> Result<Self, InvalidOptions> {
        Ok(Self::with_options(BufferOptionsValidated::try_from(options)?))
    }

    pub(crate) fn with_options(options: BufferOptionsValidated) -> Self {
        BufferData {
            msg_buffer_refs: Vec::new(),
            preceding_opid: OpId::default(),
            last_buffered: -1,
            buffered_for_proxying: false,
            bytes_buffered: 0,
            options,
        }
    }

    /// Clears the buffer and re-anchors it at `last_index` with the given
    /// routing mode.
    pub fn reset(&mut self, for_proxy: bool, last_index: i64) {
        self.msg_buffer_refs.clear();
        self.preceding_opid = OpId::default();
        self.last_buffered = last_index;
        self.buffered_for_proxying = for_proxy;
        self.bytes_buffered = 0;
    }

    /// Appends the next message in index order. The first message appended
    /// into an empty buffer anchors `preceding_opid` to its own id, so the
    /// caller is expected to feed the entry preceding the peer's next needed
    /// op first.
    pub fn append(&mut self, msg: ReplicateRef) -> Result<(), AppendError> {
        let msg_index = msg.index();
        if msg_index != self.last_buffered + 1 {
            return Err(AppendError::IndexGap {
                msg_index,
                last_buffered: self.last_buffered,
            });
        }

        self.last_buffered = msg_index;
        if self.msg_buffer_refs.is_empty() {
            self.preceding_opid = msg.id();
        }
        self.bytes_buffered += msg.size_bytes();
        self.msg_buffer_refs.push(msg);
        Ok(())
    }

    /// Fills the buffer from the log cache, continuing from `last_index()`.
    ///
    /// `Incomplete` from the cache means the requested op is still pending
    /// append; the buffer is left untouched and the read can be retried. Any
    /// other cache error resets the buffer.
    pub fn read_from_cache(
        &mut self,
        logger: &slog::Logger,
        context: &ReadContext,
        cache: &dyn LogCache,
    ) -> Result<FillResult, ReadOpsError> {
        let fill_size = std::cmp::min(
            self.options.max_buffer_fill_size_bytes,
            std::cmp::max(
                self.options.consensus_max_batch_size_bytes - self.bytes_buffered,
                0,
            ),
        );

        slog::trace!(
            logger,
            "filling buffer for peer {} [{}:{}] with {} bytes starting from index {}, route_via_proxy: {}",
            context.for_peer_uuid,
            context.for_peer_host,
            context.for_peer_port,
            fill_size,
            self.last_buffered,
            context.route_via_proxy
        );

        let buffer_was_empty = self.msg_buffer_refs.is_empty();
        match cache.read_ops(self.last_buffered, fill_size, context) {
            Ok(read) => {
                if let Some(first) = read.msgs.first() {
                    debug_assert_eq!(
                        first.index(),
                        self.last_buffered + 1,
                        "cache read must continue the buffer contiguously"
                    );
                }
                if let Some(last) = read.msgs.last() {
                    self.last_buffered = last.index();
                    self.buffered_for_proxying = context.route_via_proxy;
                }
                for msg in &read.msgs {
                    self.bytes_buffered += msg.size_bytes();
                }
                self.msg_buffer_refs.extend(read.msgs);
                if buffer_was_empty {
                    self.preceding_opid = read.preceding_op;
                }

                if read.stopped_early {
                    Ok(FillResult::StoppedEarly)
                } else {
                    Ok(FillResult::Complete)
                }
            }
            Err(incomplete @ ReadOpsError::Incomplete(_)) => Err(incomplete),
            Err(e) => {
                self.reset(false, -1);
                Err(e)
            }
        }
    }

    /// Hands the buffered messages off, leaving the buffer empty but still
    /// anchored: `last_buffered` and the routing mode survive, so the next
    /// append or fill resumes where this batch ended.
    pub fn move_and_reset(&mut self) -> (Vec<ReplicateRef>, OpId) {
        let messages = std::mem::take(&mut self.msg_buffer_refs);
        let preceding_opid = self.preceding_opid;

        self.reset(self.buffered_for_proxying, self.last_buffered);

        (messages, preceding_opid)
    }

    /// First buffered index, or -1 when the buffer holds no messages.
    pub fn first_index(&self) -> i64 {
        self.msg_buffer_refs.first().map_or(-1, |msg| msg.index())
    }

    /// The index buffering will continue from. Not necessarily in the buffer
    /// itself after a handoff.
    pub fn last_index(&self) -> i64 {
        self.last_buffered
    }

    pub fn is_empty(&self) -> bool {
        self.last_buffered == -1 || self.msg_buffer_refs.is_empty()
    }

    /// Whether buffered ops were assembled for routing through a proxy node.
    /// Proxied ops may not be compressed and may not carry checksums.
    pub fn for_proxying(&self) -> bool {
        self.buffered_for_proxying
    }

    pub fn bytes_buffered(&self) -> i64 {
        self.bytes_buffered
    }

    pub fn preceding_opid(&self) -> OpId {
        self.preceding_opid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer_buffer::test_utils::{direct_context, msg, proxy_context, ScriptedLogCache};
    use crate::peer_buffer::log_cache::ReadOps;
    use std::io;

    fn test_logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    fn small_options() -> BufferOptions {
        BufferOptions {
            max_buffer_fill_size_bytes: Some(100),
            consensus_max_batch_size_bytes: Some(60),
        }
    }

    #[test]
    fn append_requires_contiguous_indexes() {
        let mut buffer = BufferData::new(BufferOptions::default()).unwrap();
        buffer.reset(false, 10);

        buffer.append(msg(1, 11, 8)).unwrap();
        assert_eq!(buffer.last_index(), 11);
        assert_eq!(buffer.first_index(), 11);
        assert_eq!(buffer.bytes_buffered(), 8);

        let err = buffer.append(msg(1, 13, 8)).unwrap_err();
        assert!(matches!(
            err,
            AppendError::IndexGap {
                msg_index: 13,
                last_buffered: 11
            }
        ));
        // Failed append leaves the buffer unchanged.
        assert_eq!(buffer.last_index(), 11);
        assert_eq!(buffer.bytes_buffered(), 8);

        buffer.append(msg(1, 12, 8)).unwrap();
        assert_eq!(buffer.last_index(), 12);
        assert_eq!(buffer.bytes_buffered(), 16);
    }

    #[test]
    fn first_append_anchors_preceding_opid() {
        let mut buffer = BufferData::new(BufferOptions::default()).unwrap();
        buffer.reset(false, 20);

        buffer.append(msg(3, 21, 8)).unwrap();
        buffer.append(msg(3, 22, 8)).unwrap();

        // Observed contract: the first appended message's own id becomes the
        // preceding opid.
        assert_eq!(buffer.preceding_opid(), OpId::new(3, 21));
    }

    #[test]
    fn read_from_cache_fills_and_anchors_empty_buffer() {
        let mut buffer = BufferData::new(BufferOptions::default()).unwrap();
        buffer.reset(false, 10);

        let cache = ScriptedLogCache::new();
        cache.push_response(Ok(ReadOps {
            msgs: vec![msg(2, 11, 10), msg(2, 12, 10), msg(2, 13, 10)],
            preceding_op: OpId::new(2, 10),
            stopped_early: false,
        }));

        let result = buffer
            .read_from_cache(&test_logger(), &direct_context(), &cache)
            .unwrap();

        assert_eq!(result, FillResult::Complete);
        assert_eq!(buffer.first_index(), 11);
        assert_eq!(buffer.last_index(), 13);
        assert_eq!(buffer.preceding_opid(), OpId::new(2, 10));
        assert_eq!(buffer.bytes_buffered(), 30);
        assert!(!buffer.for_proxying());

        // The read continued from the buffer's anchor.
        assert_eq!(cache.calls(), vec![(10, 1024 * 1024)]);
    }

    #[test]
    fn read_from_cache_extends_non_empty_buffer() {
        let mut buffer = BufferData::new(BufferOptions::default()).unwrap();
        buffer.reset(false, 10);
        buffer.append(msg(2, 11, 10)).unwrap();

        let cache = ScriptedLogCache::new();
        cache.push_response(Ok(ReadOps {
            msgs: vec![msg(2, 12, 10)],
            preceding_op: OpId::new(2, 11),
            stopped_early: false,
        }));

        buffer
            .read_from_cache(&test_logger(), &direct_context(), &cache)
            .unwrap();

        // The anchor from the first append survives; the cache's preceding
        // op is only adopted into an empty buffer.
        assert_eq!(buffer.preceding_opid(), OpId::new(2, 11));
        assert_eq!(buffer.last_index(), 12);
        assert_eq!(cache.calls(), vec![(11, 1024 * 1024)]);
    }

    #[test]
    fn read_from_cache_marks_proxy_routing() {
        let mut buffer = BufferData::new(BufferOptions::default()).unwrap();
        buffer.reset(false, 10);

        let cache = ScriptedLogCache::new();
        cache.push_response(Ok(ReadOps {
            msgs: vec![msg(2, 11, 10)],
            preceding_op: OpId::new(2, 10),
            stopped_early: false,
        }));

        buffer
            .read_from_cache(&test_logger(), &proxy_context(), &cache)
            .unwrap();

        assert!(buffer.for_proxying());
    }

    #[test]
    fn read_from_cache_stopped_early_is_resumable() {
        let mut buffer = BufferData::new(BufferOptions::default()).unwrap();
        buffer.reset(false, 10);

        let cache = ScriptedLogCache::new();
        cache.push_response(Ok(ReadOps {
            msgs: vec![msg(2, 11, 10)],
            preceding_op: OpId::new(2, 10),
            stopped_early: true,
        }));
        cache.push_response(Ok(ReadOps {
            msgs: vec![msg(2, 12, 10)],
            preceding_op: OpId::new(2, 11),
            stopped_early: false,
        }));

        let first = buffer
            .read_from_cache(&test_logger(), &direct_context(), &cache)
            .unwrap();
        assert_eq!(first, FillResult::StoppedEarly);
        assert_eq!(buffer.last_index(), 11);

        let second = buffer
            .read_from_cache(&test_logger(), &direct_context(), &cache)
            .unwrap();
        assert_eq!(second, FillResult::Complete);
        assert_eq!(buffer.last_index(), 12);
    }

    #[test]
    fn read_from_cache_incomplete_leaves_buffer_untouched() {
        let mut buffer = BufferData::new(BufferOptions::default()).unwrap();
        buffer.reset(false, 10);
        buffer.append(msg(2, 11, 10)).unwrap();

        let cache = ScriptedLogCache::new();
        cache.push_response(Err(ReadOpsError::Incomplete(12)));

        let err = buffer
            .read_from_cache(&test_logger(), &direct_context(), &cache)
            .unwrap_err();

        assert!(matches!(err, ReadOpsError::Incomplete(12)));
        assert_eq!(buffer.last_index(), 11);
        assert_eq!(buffer.first_index(), 11);
        assert_eq!(buffer.bytes_buffered(), 10);
    }

    #[test]
    fn read_from_cache_hard_error_resets_buffer() {
        let mut buffer = BufferData::new(BufferOptions::default()).unwrap();
        buffer.reset(true, 10);
        buffer.append(msg(2, 11, 10)).unwrap();

        let cache = ScriptedLogCache::new();
        cache.push_response(Err(ReadOpsError::Io(io::Error::new(
            io::ErrorKind::Other,
            "disk gone",
        ))));

        let err = buffer
            .read_from_cache(&test_logger(), &direct_context(), &cache)
            .unwrap_err();

        assert!(matches!(err, ReadOpsError::Io(_)));
        assert!(buffer.is_empty());
        assert_eq!(buffer.last_index(), -1);
        assert!(!buffer.for_proxying());
        assert_eq!(buffer.bytes_buffered(), 0);
    }

    #[test]
    fn fill_size_respects_batch_budget() {
        let mut buffer = BufferData::new(small_options()).unwrap();
        buffer.reset(false, 0);

        let cache = ScriptedLogCache::new();
        // Empty buffer: full batch budget, below the fill cap.
        cache.push_response(Ok(ReadOps {
            msgs: vec![msg(1, 1, 40)],
            preceding_op: OpId::new(1, 0),
            stopped_early: false,
        }));
        // 40 bytes buffered: only 20 of the 60-byte budget left.
        cache.push_response(Ok(ReadOps {
            msgs: vec![msg(1, 2, 30)],
            preceding_op: OpId::new(1, 1),
            stopped_early: false,
        }));
        // Over budget: the fill size clamps to zero rather than going
        // negative.
        cache.push_response(Ok(ReadOps {
            msgs: vec![],
            preceding_op: OpId::new(1, 2),
            stopped_early: false,
        }));

        for _ in 0..3 {
            buffer
                .read_from_cache(&test_logger(), &direct_context(), &cache)
                .unwrap();
        }

        assert_eq!(cache.calls(), vec![(0, 60), (1, 20), (2, 0)]);
    }

    #[test]
    fn move_and_reset_preserves_position_and_routing() {
        let mut buffer = BufferData::new(BufferOptions::default()).unwrap();
        buffer.reset(true, 20);
        buffer.append(msg(4, 21, 10)).unwrap();
        buffer.append(msg(4, 22, 10)).unwrap();

        let (messages, preceding) = buffer.move_and_reset();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].index(), 21);
        assert_eq!(messages[1].index(), 22);
        assert_eq!(preceding, OpId::new(4, 21));

        assert!(buffer.is_empty());
        assert_eq!(buffer.last_index(), 22);
        assert!(buffer.for_proxying());
        assert_eq!(buffer.bytes_buffered(), 0);

        // Contiguity is preserved across the handoff.
        buffer.append(msg(4, 23, 10)).unwrap();
        assert_eq!(buffer.first_index(), 23);
    }
}
