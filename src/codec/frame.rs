//! Framing: fixed header + payload, many messages per buffer.

use super::{CodecError, HEADER_LEN, MAX_PAYLOAD_LEN, Message, MessageType, Qos};

/// Append the encoded form of `msg` to `out`.
pub fn encode_into(msg: &Message, out: &mut Vec<u8>) -> Result<(), CodecError> {
    let len = msg.payload.len();
    if len > MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge(len));
    }

    let fixed_header = (msg.kind as u8) << 4 | (msg.qos as u8) << 2 | u8::from(msg.dup) << 1;
    out.reserve(HEADER_LEN + len);
    out.push(fixed_header);
    out.extend_from_slice(&msg.identifier.to_be_bytes());
    out.extend_from_slice(&(len as u16).to_be_bytes());
    out.extend_from_slice(&msg.payload);
    Ok(())
}

/// Encode a single message into a new buffer.
pub fn encode(msg: &Message) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(msg.total_length());
    encode_into(msg, &mut out)?;
    Ok(out)
}

/// Encode `msgs` back to back, in order.
pub fn encode_all(msgs: &[Message]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(msgs.iter().map(Message::total_length).sum());
    for msg in msgs {
        encode_into(msg, &mut out)?;
    }
    Ok(out)
}

/// Decode one message from the front of `bytes`. Returns the message and the
/// number of bytes consumed. Bytes past the declared remaining length are
/// left untouched.
pub fn decode(bytes: &[u8]) -> Result<(Message, usize), CodecError> {
    decode_at(bytes, 0)
}

/// Split a whole body into its messages. An empty body yields an empty list.
pub fn decode_all(bytes: &[u8]) -> Result<Vec<Message>, CodecError> {
    let mut messages = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let (msg, consumed) = decode_at(bytes, offset)?;
        offset += consumed;
        messages.push(msg);
    }
    Ok(messages)
}

fn decode_at(bytes: &[u8], offset: usize) -> Result<(Message, usize), CodecError> {
    let rest = &bytes[offset..];
    if rest.len() < HEADER_LEN {
        return Err(CodecError::TruncatedHeader {
            offset,
            available: rest.len(),
        });
    }

    let fixed_header = rest[0];
    let kind = MessageType::try_from(fixed_header >> 4)?;
    let qos = Qos::try_from((fixed_header >> 2) & 0x3)?;
    let dup = (fixed_header >> 1) & 0x1 == 1;
    let identifier = u16::from_be_bytes([rest[1], rest[2]]);
    let remaining = usize::from(u16::from_be_bytes([rest[3], rest[4]]));

    let body = &rest[HEADER_LEN..];
    if body.len() < remaining {
        return Err(CodecError::TruncatedPayload {
            offset,
            expected: remaining,
            available: body.len(),
        });
    }

    let msg = Message {
        kind,
        qos,
        dup,
        identifier,
        payload: body[..remaining].to_vec(),
    };
    Ok((msg, HEADER_LEN + remaining))
}
