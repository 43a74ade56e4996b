//! The QoS state table
//!
//! `transition` maps one received message to the ordered list of steps the
//! engine must carry out. It touches no state, so the whole handshake table
//! can be read (and tested) in one place:
//!
//! | received        | steps                                              |
//! |-----------------|----------------------------------------------------|
//! | SEND qos0       | deliver                                            |
//! | SEND qos1       | schedule ACK (qos0), deliver                       |
//! | SEND qos2       | stage payload, schedule RECEIVED (qos0)            |
//! | ACK             | confirm                                            |
//! | RECEIVED        | confirm, schedule RELEASE (qos1)                   |
//! | RELEASE         | release staged payload, schedule COMPLETED (qos0)  |
//! | COMPLETED       | confirm                                            |

use crate::codec::{Message, MessageType, Qos};
use crate::persistence::ScheduledEntry;

/// One effect of handling a message. Steps of a single message run in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Hand the payload to the application.
    Deliver(Vec<u8>),
    /// Queue a reply, due immediately.
    Schedule(Message),
    /// Drop the scheduled entry for this identifier.
    Confirm(u16),
    /// Hold an exactly-once payload until RELEASE.
    Stage { identifier: u16, payload: Vec<u8> },
    /// Take the staged payload and deliver it if one is still held.
    Release(u16),
}

pub fn transition(msg: Message) -> Vec<Step> {
    let id = msg.identifier;
    match (msg.kind, msg.qos) {
        (MessageType::Send, Qos::AtMostOnce) => vec![Step::Deliver(msg.payload)],
        (MessageType::Send, Qos::AtLeastOnce) => vec![
            Step::Schedule(Message::reply(MessageType::Ack, Qos::AtMostOnce, id)),
            Step::Deliver(msg.payload),
        ],
        (MessageType::Send, Qos::ExactlyOnce) => vec![
            Step::Stage {
                identifier: id,
                payload: msg.payload,
            },
            Step::Schedule(Message::reply(MessageType::Received, Qos::AtMostOnce, id)),
        ],
        (MessageType::Ack, _) | (MessageType::Completed, _) => vec![Step::Confirm(id)],
        (MessageType::Received, _) => vec![
            Step::Confirm(id),
            Step::Schedule(Message::reply(MessageType::Release, Qos::AtLeastOnce, id)),
        ],
        (MessageType::Release, _) => vec![
            Step::Release(id),
            Step::Schedule(Message::reply(MessageType::Completed, Qos::AtMostOnce, id)),
        ],
    }
}

/// The copy to write back when `entry` is popped for transmission, or `None`
/// if it is not retried (qos0). Backoff is linear in the retry count.
pub fn retry_of(entry: &ScheduledEntry, now: u32, interval_secs: u32) -> Option<ScheduledEntry> {
    if entry.message.qos == Qos::AtMostOnce {
        return None;
    }

    let retry_count = entry.retry_count.saturating_add(1);
    let mut message = entry.message.clone();
    message.dup = true;
    Some(ScheduledEntry {
        message,
        retry_count,
        due_at: now.saturating_add(u32::from(retry_count).saturating_mul(interval_secs)),
    })
}
