//! Unit tests for heartbeat encoding and decoding in the STOMP codec.

use bytes::BytesMut;
use stomp_ws::codec::{StompCodec, StompItem, is_heartbeat};
use stomp_ws::{Command, Frame};
use tokio_util::codec::{Decoder, Encoder};

fn next(codec: &mut StompCodec, buf: &mut BytesMut) -> StompItem {
    codec
        .decode(buf)
        .expect("decode failed")
        .expect("no item")
}

#[test]
fn decode_single_lf_as_heartbeat() {
    let mut codec = StompCodec::new();
    let mut buf = BytesMut::from(&b"\n"[..]);
    assert_eq!(next(&mut codec, &mut buf), StompItem::Heartbeat);
    assert!(buf.is_empty(), "buffer should be empty after consuming heartbeat");
}

#[test]
fn decode_crlf_as_one_heartbeat() {
    let mut codec = StompCodec::new();
    let mut buf = BytesMut::from(&b"\r\n\n"[..]);
    assert_eq!(next(&mut codec, &mut buf), StompItem::Heartbeat);
    assert_eq!(buf.len(), 1);
    assert_eq!(next(&mut codec, &mut buf), StompItem::Heartbeat);
    assert!(buf.is_empty());
}

#[test]
fn decode_heartbeat_before_frame() {
    let mut codec = StompCodec::new();
    let mut buf = BytesMut::from(&b"\nMESSAGE\ndestination:prices\n\n{}\0"[..]);

    assert_eq!(next(&mut codec, &mut buf), StompItem::Heartbeat);
    match next(&mut codec, &mut buf) {
        StompItem::Frame(f) => {
            assert_eq!(f.command, Command::Message);
            assert_eq!(f.body, "{}");
        }
        other => panic!("expected frame, got {:?}", other),
    }
}

#[test]
fn decode_heartbeat_after_frame() {
    let mut codec = StompCodec::new();
    // the first LF after NUL is the optional frame trailer, the second a heartbeat
    let mut buf = BytesMut::from(&b"MESSAGE\ndestination:prices\n\n{}\0\n\n"[..]);

    match next(&mut codec, &mut buf) {
        StompItem::Frame(f) => assert_eq!(f.command, Command::Message),
        other => panic!("expected frame, got {:?}", other),
    }
    assert_eq!(next(&mut codec, &mut buf), StompItem::Heartbeat);
    assert!(buf.is_empty());
}

#[test]
fn partial_frame_waits_for_more_bytes() {
    let mut codec = StompCodec::new();
    let mut buf = BytesMut::from(&b"MESSAGE\ndestination:pri"[..]);
    assert!(codec.decode(&mut buf).expect("decode").is_none());
    assert_eq!(buf.len(), 23, "partial input must stay buffered");

    buf.extend_from_slice(b"ces\n\n{}\0");
    match next(&mut codec, &mut buf) {
        StompItem::Frame(f) => assert_eq!(f.destination(), Some("prices")),
        other => panic!("expected frame, got {:?}", other),
    }
}

#[test]
fn encode_frame_then_heartbeat() {
    let mut codec = StompCodec::new();
    let mut dst = BytesMut::new();
    let frame = Frame::new(Command::Send)
        .header("destination", "/app/heartbeat")
        .set_body("hello");

    codec.encode(StompItem::Frame(frame), &mut dst).expect("encode failed");
    codec.encode(StompItem::Heartbeat, &mut dst).expect("encode failed");

    let len = dst.len();
    assert_eq!(dst[len - 2], 0x00);
    assert_eq!(dst[len - 1], 0x0A);
}

#[test]
fn text_heartbeat_detection() {
    assert!(is_heartbeat("\n"));
    assert!(is_heartbeat("\r\n\n"));
    assert!(!is_heartbeat(""));
    assert!(!is_heartbeat("\nMESSAGE\n\n\0"));
}
