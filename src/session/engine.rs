//! Session engine
//!
//! `Session` executes the steps produced by `transition` against a
//! `ScheduleStore` and hands deliverable payloads to the application through a
//! `DeliveryHandler`. It is responsible for:
//! - originating outbound SENDs (`commit`)
//! - handling one received message at a time (`handle`)
//! - draining due entries and writing back their retries (`outbound`)
//!
//! Concurrency notes:
//! - The engine holds no lock of its own. Each store call is atomic, and
//!   overlapping cycles on the same scope are tolerated: the worst case is one
//!   extra retransmission, which the QoS contract already absorbs.
//! - Store errors are propagated, never retried here. Retrying is a protocol
//!   concern handled by the backoff schedule.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, trace, warn};

use super::clock::{Clock, SystemClock};
use super::transition::{Step, retry_of, transition};
use crate::codec::{CodecError, MAX_PAYLOAD_LEN, Message, Qos};
use crate::config::SessionSettings;
use crate::persistence::{ScheduleStore, ScheduledEntry};
use crate::utils::error::Result;

/// Receives payloads once they become deliverable to the application.
pub trait DeliveryHandler: Send + Sync {
    fn deliver(&self, scope: &str, payload: &[u8]);
}

impl<F> DeliveryHandler for F
where
    F: Fn(&str, &[u8]) + Send + Sync,
{
    fn deliver(&self, scope: &str, payload: &[u8]) {
        self(scope, payload)
    }
}

pub struct Session<S> {
    store: Arc<S>,
    handler: Arc<dyn DeliveryHandler>,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
}

impl<S> Clone for Session<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            handler: self.handler.clone(),
            clock: self.clock.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S: ScheduleStore> Session<S> {
    pub fn new(store: Arc<S>, handler: impl DeliveryHandler + 'static) -> Self {
        Self {
            store,
            handler: Arc::new(handler),
            clock: Arc::new(SystemClock),
            settings: SessionSettings::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Queue a new outbound payload for `scope`. The SEND is due immediately
    /// and goes out with the next non-empty cycle.
    pub async fn commit(&self, scope: &str, payload: impl Into<Vec<u8>>, qos: Qos) -> Result<u16> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(CodecError::PayloadTooLarge(payload.len()).into());
        }

        let identifier = self.store.allocate_identifier(scope).await?;
        let entry = ScheduledEntry::new(
            Message::send(identifier, qos, payload),
            self.clock.now(),
        );
        self.store.schedule(scope, &entry).await?;
        info!(scope, identifier, ?qos, "committed outbound message");
        Ok(identifier)
    }

    /// Apply one received message. Its steps run strictly in order.
    pub async fn handle(&self, scope: &str, msg: Message) -> Result<()> {
        debug!(
            scope,
            kind = %msg.kind,
            qos = ?msg.qos,
            identifier = msg.identifier,
            dup = msg.dup,
            "handling message"
        );
        let now = self.clock.now();

        for step in transition(msg) {
            match step {
                Step::Deliver(payload) => self.handler.deliver(scope, &payload),
                Step::Schedule(reply) => {
                    self.store
                        .schedule(scope, &ScheduledEntry::new(reply, now))
                        .await?
                }
                Step::Confirm(identifier) => self.store.confirm(scope, identifier).await?,
                Step::Stage {
                    identifier,
                    payload,
                } => {
                    self.store
                        .stage_payload(scope, identifier, &payload)
                        .await?
                }
                Step::Release(identifier) => {
                    match self.store.take_staged_payload(scope, identifier).await? {
                        Some(payload) => self.handler.deliver(scope, &payload),
                        None => trace!(scope, identifier, "release without staged payload"),
                    }
                }
            }
        }
        Ok(())
    }

    /// Write back the retry for a popped entry (if its qos retries) and return
    /// the message to transmit now.
    pub async fn retransmit(&self, scope: &str, entry: ScheduledEntry) -> Result<Message> {
        if let Some(retry) = retry_of(&entry, self.clock.now(), self.settings.retry_interval_secs)
        {
            if entry.retry_count > 0 {
                warn!(
                    scope,
                    identifier = entry.identifier(),
                    retry_count = entry.retry_count,
                    "retransmitting unconfirmed message"
                );
            }
            self.store.schedule(scope, &retry).await?;
        }
        Ok(entry.message)
    }

    /// Pop up to `batch_size` due entries and return them, in due order, as
    /// the messages to send in the next response.
    ///
    /// Every popped entry gets its retry written back even when a sibling's
    /// write-back fails; the first error is returned afterwards.
    pub async fn outbound(&self, scope: &str) -> Result<Vec<Message>> {
        let due = self
            .store
            .pop_due(scope, self.settings.batch_size, self.clock.now())
            .await?;
        join_all(due.into_iter().map(|entry| self.retransmit(scope, entry)))
            .await
            .into_iter()
            .collect()
    }
}

impl<S> std::fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("settings", &self.settings)
            .finish()
    }
}
