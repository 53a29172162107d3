use bytes::BytesMut;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stomp_ws::codec::{StompCodec, StompItem};
use stomp_ws::{Command, Frame};
use tokio_util::codec::{Decoder, Encoder};

fn split_feed(encoded: &[u8], seed: u8, max_chunk: usize) -> Vec<Frame> {
    let mut rng = StdRng::from_seed([seed; 32]);
    let mut dec = StompCodec::new();
    let mut feed = BytesMut::new();
    let mut frames = Vec::new();

    let mut off = 0usize;
    while off < encoded.len() {
        let sz = rng.gen_range(1..max_chunk).min(encoded.len() - off);
        feed.extend_from_slice(&encoded[off..off + sz]);
        off += sz;
        loop {
            match dec.decode(&mut feed) {
                Ok(Some(StompItem::Frame(f))) => frames.push(f),
                Ok(Some(StompItem::Heartbeat)) => {}
                Ok(None) => break,
                Err(e) => panic!("decoder error: {}", e),
            }
        }
    }
    assert!(feed.is_empty(), "leftover bytes: {:02x?}", &feed[..]);
    frames
}

/// Encode several frames and feed them to the decoder split into random
/// chunk sizes. The RNG is seeded so the test is deterministic.
#[test]
fn randomized_splits_multiple_frames() {
    let mut codec = StompCodec::new();
    let frames = vec![
        Frame::new(Command::Message)
            .header("destination", "prices")
            .set_body("{\"value\":42}"),
        Frame::new(Command::Message)
            .header("destination", "a:b")
            .set_body("{\"city\":\"zürich\"}"),
        Frame::new(Command::Error).header("message", "bad"),
    ];

    let mut encoded = BytesMut::new();
    for f in frames.iter().cloned() {
        codec.encode(StompItem::Frame(f), &mut encoded).expect("encode");
    }
    // interleave a heartbeat
    codec.encode(StompItem::Heartbeat, &mut encoded).expect("encode");

    let decoded = split_feed(&encoded, 0x42, 8);
    assert_eq!(decoded.len(), 3, "expected to decode three frames");
    assert_eq!(decoded[0].body, "{\"value\":42}");
    assert_eq!(decoded[1].destination(), Some("a:b"));
    assert_eq!(decoded[1].body, "{\"city\":\"zürich\"}");
    assert_eq!(decoded[2].get_header("message"), Some("bad"));
}

/// Feed a long stream containing many small frames, splitting randomly,
/// to ensure the decoder can sustain streaming workloads.
#[test]
fn streaming_many_small_frames() {
    let mut codec = StompCodec::new();
    let mut encoded = BytesMut::new();
    for i in 0..200 {
        let f = Frame::new(Command::Message)
            .header("destination", "prices")
            .set_body(format!("{{\"value\":{}}}", i));
        codec.encode(StompItem::Frame(f), &mut encoded).expect("encode");
    }

    let decoded = split_feed(&encoded, 0x99, 64);
    assert_eq!(decoded.len(), 200, "expected to decode 200 frames");
    assert_eq!(decoded[199].body, "{\"value\":199}");
}
