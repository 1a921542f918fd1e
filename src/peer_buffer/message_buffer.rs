use crate::options::{BufferOptions, BufferOptionsValidated, InvalidOptions};
use crate::peer_buffer::buffer_data::{BufferData, FillResult};
use crate::peer_buffer::log_cache::ReadOpsError;
use crate::peer_buffer::replicate::{OpId, ReplicateRef};
use std::convert::TryFrom;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;

const NO_PENDING_HANDOFF: i64 = -1;

/// The batch a fulfilled handoff delivers to the replication sender.
pub struct HandedOffBufferData {
    /// Outcome of the fill that produced this batch. An error here carries
    /// whatever the last cache read reported.
    pub status: Result<FillResult, ReadOpsError>,
    pub messages: Vec<ReplicateRef>,
    pub preceding_opid: OpId,
}

/// The consumer's side of a pending handoff. Resolves when a producer
/// fulfills the request; errors if the buffer is dropped first.
pub type HandoffReceiver = oneshot::Receiver<HandedOffBufferData>;

/// Per-follower staging buffer mediating between the log append path
/// (producer) and the replication sender (consumer).
///
/// Access to the buffered data is try-lock only: contention means another
/// path is already making progress, and the loser surrenders instead of
/// blocking. The consumer signals demand through a single-slot rendezvous
/// (`request_handoff`); producers check for it with `index_for_handoff`
/// whenever they hold the lock, and deliver the batch through a one-shot
/// channel. At most one handoff may be outstanding per peer.
pub struct PeerMessageBuffer {
    logger: slog::Logger,
    data: Mutex<BufferData>,
    handoff_slot: HandoffSlot,
    /// Index the consumer wants ops from; NO_PENDING_HANDOFF when no handoff
    /// is outstanding. Exchanged atomically outside the data lock.
    handoff_initial_index: AtomicI64,
    /// Routing requirement of the pending handoff. Written only by the
    /// consumer while no handoff is outstanding; read by producers holding
    /// the data lock.
    proxy_ops_needed: AtomicBool,
}

impl PeerMessageBuffer {
    pub fn new(logger: slog::Logger, options: BufferOptions) -> Result<Self, InvalidOptions> {
        let options = BufferOptionsValidated::try_from(options)?;
        Ok(PeerMessageBuffer {
            logger,
            data: Mutex::new(BufferData::with_options(options)),
            handoff_slot: HandoffSlot::new(),
            handoff_initial_index: AtomicI64::new(NO_PENDING_HANDOFF),
            proxy_ops_needed: AtomicBool::new(false),
        })
    }

    /// Attempts to take the buffer. Never blocks: `None` means another
    /// producer or consumer holds it, and the caller should surrender and
    /// retry on its next trigger.
    pub fn try_lock(&self) -> Option<LockedBufferHandle<'_>> {
        match self.data.try_lock() {
            Ok(guard) => Some(LockedBufferHandle {
                guard,
                buffer: self,
            }),
            Err(_) => None,
        }
    }

    /// Posts a request for ops starting at `index` and returns the future
    /// the batch will arrive on. Panics if a previous handoff is still
    /// outstanding; the rendezvous is single-slot by design.
    pub fn request_handoff(&self, index: i64, proxy_ops_needed: bool) -> HandoffReceiver {
        let (sender, receiver) = oneshot::channel();
        self.handoff_slot.replace(sender);
        self.proxy_ops_needed.store(proxy_ops_needed, Ordering::Release);

        let previous = self.handoff_initial_index.swap(index, Ordering::AcqRel);
        assert_eq!(
            previous, NO_PENDING_HANDOFF,
            "handoff requested while a previous handoff is still outstanding"
        );

        receiver
    }
}

/// Exclusive access to the buffered data, released on drop. Producers use
/// it to append or refill, and to serve a pending handoff if one is posted.
pub struct LockedBufferHandle<'a> {
    guard: MutexGuard<'a, BufferData>,
    buffer: &'a PeerMessageBuffer,
}

impl LockedBufferHandle<'_> {
    /// Claims the pending handoff request, if any. The slot is consumed:
    /// exactly one producer observes a given request.
    pub fn index_for_handoff(&self) -> Option<i64> {
        let initial_index = self
            .buffer
            .handoff_initial_index
            .swap(NO_PENDING_HANDOFF, Ordering::AcqRel);

        if initial_index == NO_PENDING_HANDOFF {
            None
        } else {
            Some(initial_index)
        }
    }

    /// Routing mode the pending handoff requires.
    pub fn proxy_ops_needed(&self) -> bool {
        self.buffer.proxy_ops_needed.load(Ordering::Acquire)
    }

    /// Whether the buffer contents match the pending handoff's routing
    /// requirement. On a mismatch the producer discards the buffer via
    /// `reset` and refills with the right framing.
    pub fn proxy_requirement_satisfied(&self) -> bool {
        self.proxy_ops_needed() == self.guard.for_proxying()
    }

    /// Delivers the buffered batch to the waiting consumer and empties the
    /// buffer, keeping its position so subsequent appends stay contiguous.
    /// A consumer that gave up and dropped its receiver is tolerated; the
    /// batch is simply dropped with it.
    pub fn fulfill(mut self, status: Result<FillResult, ReadOpsError>) {
        let (messages, preceding_opid) = self.guard.move_and_reset();
        let handed_off = HandedOffBufferData {
            status,
            messages,
            preceding_opid,
        };

        match self.buffer.handoff_slot.take() {
            Some(sender) => {
                let _ = sender.send(handed_off);
            }
            None => {
                slog::warn!(
                    self.buffer.logger,
                    "fulfill without an outstanding handoff request; dropping batch"
                );
            }
        }
    }
}

impl Deref for LockedBufferHandle<'_> {
    type Target = BufferData;

    fn deref(&self) -> &BufferData {
        &self.guard
    }
}

impl DerefMut for LockedBufferHandle<'_> {
    fn deref_mut(&mut self) -> &mut BufferData {
        &mut self.guard
    }
}

/// Parking spot for the one-shot sender between `request_handoff` and the
/// producer that fulfills it.
struct HandoffSlot {
    sender: Mutex<Option<oneshot::Sender<HandedOffBufferData>>>,
}

impl HandoffSlot {
    fn new() -> Self {
        HandoffSlot {
            sender: Mutex::new(None),
        }
    }

    fn replace(&self, new_sender: oneshot::Sender<HandedOffBufferData>) {
        self.sender
            .lock()
            .expect("HandoffSlot.replace() mutex guard poison")
            .replace(new_sender);
    }

    fn take(&self) -> Option<oneshot::Sender<HandedOffBufferData>> {
        self.sender
            .lock()
            .expect("HandoffSlot.take() mutex guard poison")
            .take()
    }
}
