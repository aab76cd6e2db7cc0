//! Integration tests for HostLineCodec over Tokio streams.
//!
//! These drive the codec through `FramedRead`/`FramedWrite` on an in-memory
//! duplex pipe, the way the host bridge uses it on the serial port.

use doorlock_core::{DoorState, IdentificationEvent};
use doorlock_protocol::{
    HostCommand, HostLineCodec, InboundLine, LedColor, OutboundMessage, RejectReason,
};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::codec::{FramedRead, FramedWrite};

#[tokio::test]
async fn test_host_lines_become_commands() {
    let (mut host, device) = tokio::io::duplex(256);
    let mut lines = FramedRead::new(device, HostLineCodec::new());

    host.write_all(b"{\"cmd\":\"unlock\",\"duration\":3}\n{\"cmd\":\"led\",\"color\":\"blue\"}\n")
        .await
        .unwrap();
    drop(host);

    let first = lines.next().await.unwrap().unwrap();
    let second = lines.next().await.unwrap().unwrap();

    assert_eq!(first, InboundLine::Command(HostCommand::Unlock { duration: 3 }));
    assert_eq!(
        second,
        InboundLine::Command(HostCommand::Led {
            color: LedColor::Blue
        })
    );
    assert!(lines.next().await.is_none());
}

#[tokio::test]
async fn test_line_split_across_writes() {
    let (mut host, device) = tokio::io::duplex(256);
    let mut lines = FramedRead::new(device, HostLineCodec::new());

    let writer = tokio::spawn(async move {
        for chunk in [&b"{\"cmd\":\"enr"[..], b"oll_fingerprint\",", b"\"id\":7}\n"] {
            host.write_all(chunk).await.unwrap();
            tokio::task::yield_now().await;
        }
    });

    assert_eq!(
        lines.next().await.unwrap().unwrap(),
        InboundLine::Command(HostCommand::EnrollFingerprint { id: 7 })
    );
    writer.await.unwrap();
}

#[tokio::test]
async fn test_garbage_then_valid_command() {
    let (mut host, device) = tokio::io::duplex(1024);
    let mut lines = FramedRead::new(device, HostLineCodec::with_max_line_length(32));

    host.write_all(&[b'x'; 100]).await.unwrap();
    host.write_all(b"\n{]\n{\"cmd\":\"lock\"}\n").await.unwrap();
    drop(host);

    let items: Vec<InboundLine> = lines.by_ref().map(|item| item.unwrap()).collect().await;
    assert_eq!(items.len(), 3);
    assert_eq!(
        items[0],
        InboundLine::Rejected(RejectReason::Overflow { limit: 32 })
    );
    assert!(matches!(items[1], InboundLine::Rejected(RejectReason::Malformed(_))));
    assert_eq!(items[2], InboundLine::Command(HostCommand::Lock));
}

#[tokio::test]
async fn test_events_written_one_per_line() {
    let (device, mut host) = tokio::io::duplex(1024);
    let mut sink = FramedWrite::new(device, HostLineCodec::new());

    for event in [
        IdentificationEvent::card_read("0A1B2C3D"),
        IdentificationEvent::enrollment_succeeded(7),
        IdentificationEvent::door_status(DoorState::Locked),
    ] {
        let message = OutboundMessage::from_event(&event).unwrap();
        sink.send(message).await.unwrap();
    }
    drop(sink);

    let mut output = String::new();
    host.read_to_string(&mut output).await.unwrap();

    assert_eq!(
        output,
        concat!(
            "{\"type\":\"rfid\",\"uid\":\"0A1B2C3D\"}\n",
            "{\"type\":\"fingerprint\",\"id\":\"ENROLL_OK:7\"}\n",
            "{\"type\":\"status\",\"door\":\"locked\"}\n",
        )
    );
}
