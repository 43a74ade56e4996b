//! The `codec` module implements the binary wire format shared by both
//! polling endpoints.
//!
//! Every message is a fixed 5-byte header followed by its payload:
//!
//! ```text
//! bit     |  7  6  5  4  |  3  2  |  1  |    0     |
//! byte 0  | message type |  qos   | dup | reserved |
//! byte 1-2        identifier (big-endian u16)
//! byte 3-4        remaining length (big-endian u16)
//! byte 5..        payload
//! ```
//!
//! An HTTP body is the plain concatenation of encoded messages. The identifier
//! field is 16 bits wide and must stay that way for wire compatibility.

pub mod frame;
pub mod message;

pub use frame::{decode, decode_all, encode, encode_all, encode_into};
pub use message::{Message, MessageType, Qos};

use thiserror::Error;

/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 5;

/// Largest payload the 16-bit remaining-length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Framing errors raised while encoding or decoding wire bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated header at offset {offset}: {available} of 5 header bytes present")]
    TruncatedHeader { offset: usize, available: usize },

    #[error("truncated payload at offset {offset}: expected {expected} bytes, {available} present")]
    TruncatedPayload {
        offset: usize,
        expected: usize,
        available: usize,
    },

    #[error("unknown message type {0}")]
    UnknownType(u8),

    #[error("invalid qos level {0}")]
    InvalidQos(u8),

    #[error("payload of {0} bytes exceeds the 65535 byte limit")]
    PayloadTooLarge(usize),
}
