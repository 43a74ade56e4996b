//! In-process scheduling store.
//!
//! All scopes live behind a single `Mutex`; each operation takes the lock once,
//! which makes every operation atomic. Nothing survives a restart.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ScheduleStore, ScheduledEntry, StoreError, identifier_for};

#[derive(Debug, Default)]
struct ScopeState {
    counter: u64,
    queue: BTreeSet<(u32, u16)>,
    entries: HashMap<u16, ScheduledEntry>,
    staged: HashMap<u16, Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    scopes: Mutex<HashMap<String, ScopeState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_scope<R>(
        &self,
        scope: &str,
        f: impl FnOnce(&mut ScopeState) -> R,
    ) -> Result<R, StoreError> {
        let mut scopes = self.scopes.lock().map_err(|_| StoreError::Poisoned)?;
        let state = scopes.entry(scope.to_string()).or_default();
        Ok(f(state))
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn allocate_identifier(&self, scope: &str) -> Result<u16, StoreError> {
        self.with_scope(scope, |state| {
            state.counter += 1;
            identifier_for(state.counter)
        })
    }

    async fn schedule(&self, scope: &str, entry: &ScheduledEntry) -> Result<(), StoreError> {
        self.with_scope(scope, |state| {
            let id = entry.identifier();
            if let Some(previous) = state.entries.insert(id, entry.clone()) {
                state.queue.remove(&(previous.due_at, id));
            }
            state.queue.insert((entry.due_at, id));
        })
    }

    async fn pop_due(
        &self,
        scope: &str,
        limit: usize,
        now: u32,
    ) -> Result<Vec<ScheduledEntry>, StoreError> {
        self.with_scope(scope, |state| {
            let due: Vec<(u32, u16)> = state
                .queue
                .iter()
                .take_while(|(due_at, _)| *due_at <= now)
                .take(limit)
                .copied()
                .collect();

            due.into_iter()
                .filter_map(|key| {
                    state.queue.remove(&key);
                    state.entries.remove(&key.1)
                })
                .collect()
        })
    }

    async fn confirm(&self, scope: &str, identifier: u16) -> Result<(), StoreError> {
        self.with_scope(scope, |state| {
            if let Some(entry) = state.entries.remove(&identifier) {
                state.queue.remove(&(entry.due_at, identifier));
            }
        })
    }

    async fn stage_payload(
        &self,
        scope: &str,
        identifier: u16,
        payload: &[u8],
    ) -> Result<(), StoreError> {
        self.with_scope(scope, |state| {
            state.staged.insert(identifier, payload.to_vec());
        })
    }

    async fn take_staged_payload(
        &self,
        scope: &str,
        identifier: u16,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        self.with_scope(scope, |state| state.staged.remove(&identifier))
    }
}
