//! Request/response cycle driver
//!
//! One HTTP round trip is one cycle: decode the request body, apply every
//! message to the session, then answer with whatever is due for the scope.
//! The HTTP listener itself lives outside this crate; it only needs to call
//! `process_cycle` with the scope and raw body and write the returned bytes
//! as the response.
//!
//! Ordering rules:
//! - messages within one body are handled concurrently, each message's own
//!   steps in order, and every message runs to completion even if another
//!   one fails
//! - the body is decoded in full before anything is handled, so a malformed
//!   body triggers no deliveries at all
//! - an empty body returns an empty response without touching the store

use futures::future::join_all;
use tracing::debug;

use crate::codec::{self, Qos};
use crate::persistence::ScheduleStore;
use crate::session::Session;
use crate::utils::error::Result;

#[derive(Debug, Clone)]
pub struct CycleDriver<S> {
    session: Session<S>,
}

impl<S: ScheduleStore> CycleDriver<S> {
    pub fn new(session: Session<S>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    /// Run one cycle for `scope` and return the response body.
    pub async fn process_cycle(&self, scope: &str, inbound: &[u8]) -> Result<Vec<u8>> {
        if inbound.is_empty() {
            return Ok(Vec::new());
        }

        let messages = codec::decode_all(inbound)?;
        debug!(scope, count = messages.len(), "decoded inbound body");
        join_all(
            messages
                .into_iter()
                .map(|msg| self.session.handle(scope, msg)),
        )
        .await
        .into_iter()
        .collect::<Result<Vec<()>>>()?;

        let outbound = self.session.outbound(scope).await?;
        debug!(scope, count = outbound.len(), "encoding outbound body");
        Ok(codec::encode_all(&outbound)?)
    }

    /// Submit an application payload for delivery to the peer of `scope`.
    pub async fn commit(&self, scope: &str, payload: impl Into<Vec<u8>>, qos: Qos) -> Result<u16> {
        self.session.commit(scope, payload, qos).await
    }
}
