//! Scheduling store backed by `sled`
//!
//! Four trees are opened per namespace:
//! - `<ns>.queue`: ordered index, key = scope prefix + due_at (BE) +
//!   identifier (BE), empty value. Iteration yields entries by due time.
//! - `<ns>.index`: key = scope prefix + identifier, value = persisted record
//!   (see `record`).
//! - `<ns>.staged`: key = scope prefix + identifier, value = staged payload.
//! - `<ns>.counters`: key = scope prefix, value = BE u64 counter.
//!
//! The scope prefix is the scope length as BE u32 followed by its bytes, so
//! one scope's keys can never fall inside another scope's range.
//!
//! `schedule`, `confirm` and `pop_due` run as serializable transactions over
//! the `index` and `queue` trees, keeping the sort key and the record in step.
//! Popping also frees the record.

use std::path::Path;

use async_trait::async_trait;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
};
use sled::{Db, IVec, Transactional, Tree};
use tracing::trace;

use super::{ScheduleStore, ScheduledEntry, StoreError, identifier_for, record};

#[derive(Clone)]
pub struct SledStore {
    db: Db,
    queue: Tree,
    index: Tree,
    staged: Tree,
    counters: Tree,
}

/// Why a pop transaction gave up.
#[derive(Debug)]
enum PopAbort {
    /// A scanned key moved before the transaction ran; scan again.
    Stale,
    Store(StoreError),
}

impl SledStore {
    /// Open or create a sled database at `path`.
    pub fn open(path: impl AsRef<Path>, namespace: &str) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::from_db(db, namespace)
    }

    /// A throwaway database that is removed when the last handle drops.
    pub fn temporary(namespace: &str) -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db, namespace)
    }

    pub fn from_db(db: Db, namespace: &str) -> Result<Self, StoreError> {
        Ok(Self {
            queue: db.open_tree(format!("{namespace}.queue"))?,
            index: db.open_tree(format!("{namespace}.index"))?,
            staged: db.open_tree(format!("{namespace}.staged"))?,
            counters: db.open_tree(format!("{namespace}.counters"))?,
            db,
        })
    }

    /// Flush dirty pages to disk.
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.db.flush_async().await?;
        Ok(())
    }
}

fn scope_prefix(scope: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(4 + scope.len());
    prefix.extend_from_slice(&(scope.len() as u32).to_be_bytes());
    prefix.extend_from_slice(scope.as_bytes());
    prefix
}

fn id_key(prefix: &[u8], identifier: u16) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 2);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&identifier.to_be_bytes());
    key
}

fn queue_key(prefix: &[u8], due_at: u32, identifier: u16) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 6);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&due_at.to_be_bytes());
    key.extend_from_slice(&identifier.to_be_bytes());
    key
}

fn identifier_from_queue_key(key: &[u8]) -> u16 {
    let n = key.len();
    u16::from_be_bytes([key[n - 2], key[n - 1]])
}

fn abort<T>(e: StoreError) -> ConflictableTransactionResult<T, StoreError> {
    Err(ConflictableTransactionError::Abort(e))
}

impl From<TransactionError<StoreError>> for StoreError {
    fn from(e: TransactionError<StoreError>) -> Self {
        match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => StoreError::Sled(e),
        }
    }
}

#[async_trait]
impl ScheduleStore for SledStore {
    async fn allocate_identifier(&self, scope: &str) -> Result<u16, StoreError> {
        let next = self
            .counters
            .update_and_fetch(scope_prefix(scope), |old| {
                let current = old
                    .and_then(|raw| <[u8; 8]>::try_from(raw).ok())
                    .map(u64::from_be_bytes)
                    .unwrap_or(0);
                Some(current.wrapping_add(1).to_be_bytes().to_vec())
            })?
            .ok_or_else(|| StoreError::CorruptRecord("counter vanished".to_string()))?;

        let raw = <[u8; 8]>::try_from(next.as_ref())
            .map_err(|_| StoreError::CorruptRecord("counter is not 8 bytes".to_string()))?;
        Ok(identifier_for(u64::from_be_bytes(raw)))
    }

    async fn schedule(&self, scope: &str, entry: &ScheduledEntry) -> Result<(), StoreError> {
        let prefix = scope_prefix(scope);
        let id = entry.identifier();
        let index_key = id_key(&prefix, id);
        let new_queue_key = queue_key(&prefix, entry.due_at, id);
        let raw = record::encode(entry)?;
        let empty: &[u8] = &[];

        (&self.index, &self.queue).transaction(
            |(index, queue)| -> ConflictableTransactionResult<(), StoreError> {
                if let Some(previous) = index.insert(index_key.as_slice(), raw.as_slice())? {
                    let due_at = match record::due_at(&previous) {
                        Ok(due_at) => due_at,
                        Err(e) => return abort(e),
                    };
                    queue.remove(queue_key(&prefix, due_at, id))?;
                }
                queue.insert(new_queue_key.as_slice(), empty)?;
                Ok(())
            },
        )?;
        Ok(())
    }

    async fn pop_due(
        &self,
        scope: &str,
        limit: usize,
        now: u32,
    ) -> Result<Vec<ScheduledEntry>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let prefix = scope_prefix(scope);
        let upper = queue_key(&prefix, now, u16::MAX);

        loop {
            let keys = self
                .queue
                .range(prefix.as_slice()..=upper.as_slice())
                .take(limit)
                .map(|res| res.map(|(key, _)| key))
                .collect::<Result<Vec<IVec>, _>>()?;
            if keys.is_empty() {
                return Ok(Vec::new());
            }

            let popped = (&self.index, &self.queue).transaction(
                |(index, queue)| -> ConflictableTransactionResult<Vec<ScheduledEntry>, PopAbort> {
                    let mut entries = Vec::with_capacity(keys.len());
                    for key in &keys {
                        if queue.remove(&key[..])?.is_none() {
                            return Err(ConflictableTransactionError::Abort(PopAbort::Stale));
                        }
                        let id = identifier_from_queue_key(key);
                        let raw = index.remove(id_key(&prefix, id))?.ok_or_else(|| {
                            ConflictableTransactionError::Abort(PopAbort::Store(
                                StoreError::CorruptRecord(format!("no record for queued id {id}")),
                            ))
                        })?;
                        let entry = record::decode(&raw).map_err(|e| {
                            ConflictableTransactionError::Abort(PopAbort::Store(e))
                        })?;
                        entries.push(entry);
                    }
                    Ok(entries)
                },
            );

            match popped {
                Ok(entries) => return Ok(entries),
                Err(TransactionError::Abort(PopAbort::Stale)) => {
                    trace!(scope, "queue changed during pop, rescanning");
                }
                Err(TransactionError::Abort(PopAbort::Store(e))) => return Err(e),
                Err(TransactionError::Storage(e)) => return Err(e.into()),
            }
        }
    }

    async fn confirm(&self, scope: &str, identifier: u16) -> Result<(), StoreError> {
        let prefix = scope_prefix(scope);
        let index_key = id_key(&prefix, identifier);

        (&self.index, &self.queue).transaction(
            |(index, queue)| -> ConflictableTransactionResult<(), StoreError> {
                if let Some(raw) = index.remove(index_key.as_slice())? {
                    let due_at = match record::due_at(&raw) {
                        Ok(due_at) => due_at,
                        Err(e) => return abort(e),
                    };
                    queue.remove(queue_key(&prefix, due_at, identifier))?;
                }
                Ok(())
            },
        )?;
        Ok(())
    }

    async fn stage_payload(
        &self,
        scope: &str,
        identifier: u16,
        payload: &[u8],
    ) -> Result<(), StoreError> {
        self.staged
            .insert(id_key(&scope_prefix(scope), identifier), payload)?;
        Ok(())
    }

    async fn take_staged_payload(
        &self,
        scope: &str,
        identifier: u16,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let taken = self
            .staged
            .remove(id_key(&scope_prefix(scope), identifier))?;
        Ok(taken.map(|payload| payload.to_vec()))
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("db", &"sled::Db")
            .finish()
    }
}
