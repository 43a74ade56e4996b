//! The `session` module drives the per-message QoS handshake.
//!
//! qos0 is fire-and-forget, qos1 is a SEND/ACK pair, and qos2 is the
//! four-step SEND/RECEIVED/RELEASE/COMPLETED exchange that delivers a staged
//! payload exactly once. The state table lives in `transition`; `engine`
//! applies it against the scheduling store.

pub mod clock;
pub mod engine;
pub mod transition;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{DeliveryHandler, Session};
pub use transition::{Step, retry_of, transition};
