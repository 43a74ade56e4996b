//! Persisted record format for scheduled entries.
//!
//! ```text
//! [retry_count: u8][due_at: u32 BE][encoded message per wire format]
//! ```

use super::{ScheduledEntry, StoreError};
use crate::codec;

const RECORD_HEADER_LEN: usize = 5;

pub fn encode(entry: &ScheduledEntry) -> Result<Vec<u8>, StoreError> {
    let mut raw = Vec::with_capacity(RECORD_HEADER_LEN + entry.message.total_length());
    raw.push(entry.retry_count);
    raw.extend_from_slice(&entry.due_at.to_be_bytes());
    codec::encode_into(&entry.message, &mut raw)?;
    Ok(raw)
}

pub fn decode(raw: &[u8]) -> Result<ScheduledEntry, StoreError> {
    let due_at = due_at(raw)?;
    let (message, consumed) = codec::decode(&raw[RECORD_HEADER_LEN..])
        .map_err(|e| StoreError::CorruptRecord(e.to_string()))?;
    if RECORD_HEADER_LEN + consumed != raw.len() {
        return Err(StoreError::CorruptRecord(format!(
            "{} trailing bytes after message",
            raw.len() - RECORD_HEADER_LEN - consumed
        )));
    }
    Ok(ScheduledEntry {
        message,
        retry_count: raw[0],
        due_at,
    })
}

/// Read only the due time, without decoding the message.
pub fn due_at(raw: &[u8]) -> Result<u32, StoreError> {
    if raw.len() < RECORD_HEADER_LEN {
        return Err(StoreError::CorruptRecord(format!(
            "record of {} bytes is shorter than its header",
            raw.len()
        )));
    }
    Ok(u32::from_be_bytes([raw[1], raw[2], raw[3], raw[4]]))
}
