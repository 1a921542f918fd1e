//! Length-prefixed, checksummed record files.
//!
//! A record file holds exactly one serialized structure framed as
//! `u32 payload length (LE) | payload | u32 crc32 of payload (LE)`.
//! Readers reject truncation and checksum mismatch outright; the higher
//! layer decides whether a corrupt record warrants reinitialization.

use crate::fs::env::{Env, SyncMode, WriteMode};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::path::Path;

const LENGTH_PREFIX_LEN: usize = 4;
const CHECKSUM_LEN: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("record file not found")]
    NotFound,
    #[error("record file already exists")]
    AlreadyExists,
    #[error("record is corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for RecordError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => RecordError::NotFound,
            io::ErrorKind::AlreadyExists => RecordError::AlreadyExists,
            _ => RecordError::Io(e),
        }
    }
}

pub fn write_record<T: Serialize>(
    env: &dyn Env,
    path: &Path,
    record: &T,
    write_mode: WriteMode,
    sync_mode: SyncMode,
) -> Result<(), RecordError> {
    let payload =
        bincode::serialize(record).map_err(|e| RecordError::Corrupt(format!("encode: {}", e)))?;

    let mut framed = BytesMut::with_capacity(LENGTH_PREFIX_LEN + payload.len() + CHECKSUM_LEN);
    framed.put_u32_le(payload.len() as u32);
    framed.put_slice(&payload);
    framed.put_u32_le(crc32fast::hash(&payload));

    env.write_file(path, &framed, write_mode, sync_mode)?;
    Ok(())
}

pub fn read_record<T: DeserializeOwned>(env: &dyn Env, path: &Path) -> Result<T, RecordError> {
    let mut framed: Bytes = env.read_file(path)?;

    if framed.len() < LENGTH_PREFIX_LEN + CHECKSUM_LEN {
        return Err(RecordError::Corrupt(format!(
            "file too short to hold a record: {} bytes",
            framed.len()
        )));
    }

    let payload_len = framed.get_u32_le() as usize;
    if framed.len() != payload_len + CHECKSUM_LEN {
        return Err(RecordError::Corrupt(format!(
            "declared payload length {} does not match file",
            payload_len
        )));
    }

    let payload = framed.split_to(payload_len);
    let stored_crc = framed.get_u32_le();
    let computed_crc = crc32fast::hash(&payload);
    if stored_crc != computed_crc {
        return Err(RecordError::Corrupt(format!(
            "crc mismatch: stored {:#010x}, computed {:#010x}",
            stored_crc, computed_crc
        )));
    }

    bincode::deserialize(&payload).map_err(|e| RecordError::Corrupt(format!("decode: {}", e)))
}
