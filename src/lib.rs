//! # PollPack
//!
//! `pollpack` delivers application payloads between two HTTP-polling endpoints
//! with MQTT-style delivery guarantees (at-most-once, at-least-once and
//! exactly-once), tunnelled through stateless request/response cycles.
//!
//! ## Core Modules
//!
//! - `codec`: the 5-byte-header binary wire format and multi-message framing.
//! - `persistence`: the durable, per-scope scheduling store (`sled` backed,
//!   with an in-memory alternative).
//! - `session`: the QoS state machine, retry generation and outbound batching.
//! - `transport`: one request body in, one response body out.
//! - `config`: loading `Settings` from files and the environment.
//! - `utils`: the crate error type and logging setup.

pub mod codec;
pub mod config;
pub mod persistence;
pub mod session;
pub mod transport;
pub mod utils;

pub use codec::{Message, MessageType, Qos};
pub use persistence::{MemoryStore, ScheduleStore, ScheduledEntry, SledStore};
pub use session::{DeliveryHandler, Session};
pub use transport::CycleDriver;
pub use utils::error::{Error, Result};
