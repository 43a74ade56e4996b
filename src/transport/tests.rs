use std::sync::Arc;

use tokio::sync::mpsc;

use super::CycleDriver;
use crate::codec::{self, CodecError, Message, MessageType, Qos};
use crate::persistence::{IDENTIFIER_BASE, MemoryStore, ScheduleStore, SledStore};
use crate::session::{ManualClock, Session};
use crate::utils::error::Error;

type Delivered = mpsc::UnboundedReceiver<(String, Vec<u8>)>;

fn driver<S: ScheduleStore>(store: S) -> (CycleDriver<S>, Delivered, Arc<ManualClock>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let clock = Arc::new(ManualClock::new(1_000));
    let session = Session::new(Arc::new(store), move |scope: &str, payload: &[u8]| {
        let _ = tx.send((scope.to_string(), payload.to_vec()));
    })
    .with_clock(clock.clone());
    (CycleDriver::new(session), rx, clock)
}

fn body(msgs: &[Message]) -> Vec<u8> {
    codec::encode_all(msgs).unwrap()
}

fn drain(rx: &mut Delivered) -> Vec<(String, Vec<u8>)> {
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        out.push(item);
    }
    out
}

#[tokio::test]
async fn test_empty_body_short_circuits() {
    let (driver, _rx, _) = driver(MemoryStore::new());
    driver
        .commit("s1", "pending", Qos::AtLeastOnce)
        .await
        .unwrap();

    assert!(driver.process_cycle("s1", &[]).await.unwrap().is_empty());

    // The committed SEND was not flushed by the empty request.
    let left = driver
        .session()
        .store()
        .pop_due("s1", 5, u32::MAX)
        .await
        .unwrap();
    assert_eq!(left.len(), 1);
}

#[tokio::test]
async fn test_qos1_send_yields_ack_and_one_delivery() {
    let (driver, mut rx, _) = driver(MemoryStore::new());

    let inbound = body(&[Message::send(3, Qos::AtLeastOnce, b"hi".to_vec())]);
    let response = driver.process_cycle("s1", &inbound).await.unwrap();

    assert_eq!(
        codec::decode_all(&response).unwrap(),
        vec![Message::reply(MessageType::Ack, Qos::AtMostOnce, 3)]
    );
    assert_eq!(drain(&mut rx), vec![("s1".to_string(), b"hi".to_vec())]);
}

#[tokio::test]
async fn test_malformed_body_delivers_nothing() {
    let (driver, mut rx, _) = driver(MemoryStore::new());
    let mut inbound = body(&[Message::send(3, Qos::AtMostOnce, b"hi".to_vec())]);
    inbound.extend_from_slice(&[0x10, 0x00, 0x01]);

    let err = driver.process_cycle("s1", &inbound).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Codec(CodecError::TruncatedHeader { offset: 7, .. })
    ));
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_do_you_copy_conversation() {
    let (driver, mut rx, _) = driver(SledStore::temporary("e2e").unwrap());
    let scope = "user1";

    // Peer opens an exactly-once exchange.
    let inbound = body(&[Message::send(1, Qos::ExactlyOnce, b"do you copy?".to_vec())]);
    let response = driver.process_cycle(scope, &inbound).await.unwrap();
    assert_eq!(
        codec::decode_all(&response).unwrap(),
        vec![Message::reply(MessageType::Received, Qos::AtMostOnce, 1)]
    );
    assert!(drain(&mut rx).is_empty());

    let inbound = body(&[Message::reply(MessageType::Release, Qos::AtLeastOnce, 1)]);
    let response = driver.process_cycle(scope, &inbound).await.unwrap();
    assert_eq!(
        codec::decode_all(&response).unwrap(),
        vec![Message::reply(MessageType::Completed, Qos::AtMostOnce, 1)]
    );

    for (delivered_scope, payload) in drain(&mut rx) {
        assert_eq!(payload, b"do you copy?");
        for (payload, qos) in [
            ("roger0", Qos::AtMostOnce),
            ("roger1", Qos::AtLeastOnce),
            ("roger2", Qos::ExactlyOnce),
        ] {
            driver.commit(&delivered_scope, payload, qos).await.unwrap();
        }
    }

    // A retried RELEASE is answered again but delivers nothing new; the
    // replies ride along with it.
    let mut release = Message::reply(MessageType::Release, Qos::AtLeastOnce, 1);
    release.dup = true;
    let response = driver.process_cycle(scope, &body(&[release])).await.unwrap();
    let roger = |n: u16| IDENTIFIER_BASE + n;
    assert_eq!(
        codec::decode_all(&response).unwrap(),
        vec![
            Message::reply(MessageType::Completed, Qos::AtMostOnce, 1),
            Message::send(roger(1), Qos::AtMostOnce, b"roger0".to_vec()),
            Message::send(roger(2), Qos::AtLeastOnce, b"roger1".to_vec()),
            Message::send(roger(3), Qos::ExactlyOnce, b"roger2".to_vec()),
        ]
    );
    assert!(drain(&mut rx).is_empty());

    let inbound = body(&[
        Message::reply(MessageType::Ack, Qos::AtMostOnce, roger(2)),
        Message::reply(MessageType::Received, Qos::AtMostOnce, roger(3)),
    ]);
    let response = driver.process_cycle(scope, &inbound).await.unwrap();
    assert_eq!(
        codec::decode_all(&response).unwrap(),
        vec![Message::reply(MessageType::Release, Qos::AtLeastOnce, roger(3))]
    );

    let inbound = body(&[Message::reply(MessageType::Completed, Qos::AtMostOnce, roger(3))]);
    let response = driver.process_cycle(scope, &inbound).await.unwrap();
    assert!(response.is_empty());

    let left = driver
        .session()
        .store()
        .pop_due(scope, 100, u32::MAX)
        .await
        .unwrap();
    assert!(left.is_empty(), "unexpected leftovers: {left:?}");
}

#[tokio::test]
async fn test_unconfirmed_send_rides_later_cycles() {
    let (driver, mut rx, clock) = driver(MemoryStore::new());
    let id = driver
        .commit("s1", "roger1", Qos::AtLeastOnce)
        .await
        .unwrap();
    let ping = body(&[Message::send(1, Qos::AtMostOnce, b"ping".to_vec())]);

    let first = codec::decode_all(&driver.process_cycle("s1", &ping).await.unwrap()).unwrap();
    assert_eq!(
        first,
        vec![Message::send(id, Qos::AtLeastOnce, b"roger1".to_vec())]
    );

    // Nothing due until the backoff elapses.
    assert!(driver.process_cycle("s1", &ping).await.unwrap().is_empty());

    clock.advance(5);
    let resent =
        codec::decode_all(&driver.process_cycle("s1", &ping).await.unwrap()).unwrap();
    assert_eq!(resent.len(), 1);
    assert_eq!(resent[0].identifier, id);
    assert!(resent[0].dup);

    assert_eq!(drain(&mut rx).len(), 3);
}

#[tokio::test]
async fn test_scopes_cycle_independently() {
    let (driver, mut rx, _) = driver(MemoryStore::new());
    driver.commit("a", "for-a", Qos::AtMostOnce).await.unwrap();

    let ping = body(&[Message::send(1, Qos::AtMostOnce, b"ping".to_vec())]);
    let (a, b) = tokio::join!(
        driver.process_cycle("a", &ping),
        driver.process_cycle("b", &ping)
    );

    assert_eq!(codec::decode_all(&a.unwrap()).unwrap().len(), 1);
    assert!(b.unwrap().is_empty());
    assert_eq!(drain(&mut rx).len(), 2);
}

#[tokio::test]
async fn test_repeated_release_in_one_body_delivers_once() {
    let (driver, mut rx, _) = driver(MemoryStore::new());

    let inbound = body(&[Message::send(9, Qos::ExactlyOnce, b"once".to_vec())]);
    driver.process_cycle("s1", &inbound).await.unwrap();
    assert!(drain(&mut rx).is_empty());

    let release = Message::reply(MessageType::Release, Qos::AtLeastOnce, 9);
    let mut again = release.clone();
    again.dup = true;
    let inbound = body(&[release, again.clone(), again]);
    let response = driver.process_cycle("s1", &inbound).await.unwrap();

    // Replies are keyed by identifier, so the three COMPLETEDs collapse into
    // one queued reply.
    assert_eq!(
        codec::decode_all(&response).unwrap(),
        vec![Message::reply(MessageType::Completed, Qos::AtMostOnce, 9)]
    );
    assert_eq!(drain(&mut rx), vec![("s1".to_string(), b"once".to_vec())]);
}
