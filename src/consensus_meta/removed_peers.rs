use std::collections::VecDeque;

/// Bounded FIFO registry of peers recently removed from the committed config.
/// Lets config-change arbitration distinguish a deliberately removed peer
/// from one that was never known. Not persisted.
#[derive(Debug)]
pub(crate) struct RemovedPeers {
    capacity: usize,
    peers: VecDeque<String>,
}

impl RemovedPeers {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        RemovedPeers {
            capacity,
            peers: VecDeque::with_capacity(capacity),
        }
    }

    pub(crate) fn insert(&mut self, uuid: String) {
        // Evict before push so the ring never exceeds capacity.
        if self.peers.len() == self.capacity {
            self.peers.pop_front();
        }
        self.peers.push_back(uuid);
    }

    pub(crate) fn contains(&self, uuid: &str) -> bool {
        self.peers.iter().any(|p| p == uuid)
    }

    /// Removes the first matching entry. Duplicates cannot exist: insertion
    /// is gated on the peer being absent from the active config and the ring
    /// evicts FIFO, so one erase is total.
    pub(crate) fn remove(&mut self, uuid: &str) {
        if let Some(position) = self.peers.iter().position(|p| p == uuid) {
            self.peers.remove(position);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.peers.clear();
    }

    pub(crate) fn snapshot(&self) -> Vec<String> {
        self.peers.iter().cloned().collect()
    }
}
