//! The `persistence` module provides the durable scheduling store.
//!
//! Per scope the store keeps an indexable priority queue of outbound messages
//! ordered by due time, an identifier counter, and a staging map that holds
//! exactly-once payloads between the RECEIVED and RELEASE steps. Every
//! operation of `ScheduleStore` is atomic on its own; the session engine holds
//! no lock across operations and relies on that atomicity alone.
//!
//! Two backends are provided:
//! - `SledStore`, backed by `sled` trees and its multi-tree transactions
//! - `MemoryStore`, a mutex-guarded in-process map used for tests and
//!   embedding

pub mod memory_store;
pub mod record;
pub mod sled_store;

pub use memory_store::MemoryStore;
pub use sled_store::SledStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::codec::{CodecError, Message};

/// Identifiers are allocated above this value; the low range is reserved.
pub const IDENTIFIER_BASE: u16 = 1 << 15;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("corrupt persisted record: {0}")]
    CorruptRecord(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// An outbound message waiting in a scope's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEntry {
    pub message: Message,
    /// Number of times this message has been rescheduled; 0 until first retry.
    pub retry_count: u8,
    /// Unix seconds at which the message becomes eligible for transmission.
    pub due_at: u32,
}

impl ScheduledEntry {
    pub fn new(message: Message, due_at: u32) -> Self {
        Self {
            message,
            retry_count: 0,
            due_at,
        }
    }

    pub fn identifier(&self) -> u16 {
        self.message.identifier
    }
}

/// Atomic per-scope operations the session engine needs from its store.
///
/// Operations on different scopes are independent. Operations on the same
/// scope are linearizable with respect to each other.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Next identifier for `scope`, counting up from `IDENTIFIER_BASE + 1`.
    async fn allocate_identifier(&self, scope: &str) -> Result<u16, StoreError>;

    /// Insert or replace the entry for `entry.message.identifier`.
    async fn schedule(&self, scope: &str, entry: &ScheduledEntry) -> Result<(), StoreError>;

    /// Remove and return up to `limit` entries with `due_at <= now`, in
    /// ascending due order.
    async fn pop_due(
        &self,
        scope: &str,
        limit: usize,
        now: u32,
    ) -> Result<Vec<ScheduledEntry>, StoreError>;

    /// Drop the entry for `identifier`. Absent entries are a no-op.
    async fn confirm(&self, scope: &str, identifier: u16) -> Result<(), StoreError>;

    /// Hold an exactly-once payload until its RELEASE arrives.
    async fn stage_payload(
        &self,
        scope: &str,
        identifier: u16,
        payload: &[u8],
    ) -> Result<(), StoreError>;

    /// Read and clear the staged payload for `identifier`.
    async fn take_staged_payload(
        &self,
        scope: &str,
        identifier: u16,
    ) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Map a per-scope counter value onto the 16-bit identifier space. Counters
/// past the top of the space wrap around silently.
pub(crate) fn identifier_for(counter: u64) -> u16 {
    IDENTIFIER_BASE.wrapping_add(counter as u16)
}
