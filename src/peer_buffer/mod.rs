mod buffer_data;
mod log_cache;
mod message_buffer;
mod replicate;
#[cfg(test)]
mod test_utils;

pub use buffer_data::AppendError;
pub use buffer_data::BufferData;
pub use buffer_data::FillResult;
pub use log_cache::LogCache;
pub use log_cache::ReadContext;
pub use log_cache::ReadOps;
pub use log_cache::ReadOpsError;
pub use message_buffer::HandedOffBufferData;
pub use message_buffer::HandoffReceiver;
pub use message_buffer::LockedBufferHandle;
pub use message_buffer::PeerMessageBuffer;
pub use replicate::OpId;
pub use replicate::ReplicateMsg;
pub use replicate::ReplicateRef;
