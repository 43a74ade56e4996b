//! Message definitions for the wire protocol
//!
//! `Message` is the unit carried inside an HTTP body. It mirrors the five
//! header fields of the binary frame; scheduling metadata such as retry count
//! and due time lives on `ScheduledEntry` in the persistence layer.
//!
//! Notes on fields:
//! - `kind`: the handshake step this message represents
//! - `qos`: delivery mode. `0` = at-most-once, `1` = at-least-once,
//!   `2` = exactly-once
//! - `dup`: set on every retransmission after the first
//! - `identifier`: per-scope id assigned when the SEND is created and carried
//!   unchanged through every reply of the same handshake
//! - `payload`: application bytes, empty for everything except SEND

use std::fmt;

use super::CodecError;

/// Handshake step carried in the upper nibble of the header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Send = 1,
    Ack = 2,
    Received = 3,
    Release = 4,
    Completed = 5,
}

impl TryFrom<u8> for MessageType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Send),
            2 => Ok(Self::Ack),
            3 => Ok(Self::Received),
            4 => Ok(Self::Release),
            5 => Ok(Self::Completed),
            other => Err(CodecError::UnknownType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Send => "SEND",
            Self::Ack => "ACK",
            Self::Received => "RECEIVED",
            Self::Release => "RELEASE",
            Self::Completed => "COMPLETED",
        };
        f.write_str(name)
    }
}

/// Delivery guarantee requested for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Qos {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl TryFrom<u8> for Qos {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            other => Err(CodecError::InvalidQos(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageType,
    pub qos: Qos,
    pub dup: bool,
    pub identifier: u16,
    pub payload: Vec<u8>,
}

impl Message {
    /// A fresh, not yet transmitted application message.
    pub fn send(identifier: u16, qos: Qos, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: MessageType::Send,
            qos,
            dup: false,
            identifier,
            payload: payload.into(),
        }
    }

    /// A payload-less handshake reply for `identifier`.
    pub fn reply(kind: MessageType, qos: Qos, identifier: u16) -> Self {
        Self {
            kind,
            qos,
            dup: false,
            identifier,
            payload: Vec::new(),
        }
    }

    /// Number of bytes this message occupies on the wire.
    pub fn total_length(&self) -> usize {
        super::HEADER_LEN + self.payload.len()
    }
}
