//! Property tests for the stream reader and payload codecs.

use proptest::prelude::*;
use serde_json::json;

use pubnub_socket::{Envelope, PayloadCodec, StreamReader};

/// Newline-delimited body with one envelope per `(messages, cursor)`.
fn body(envelopes: &[(Vec<String>, u64)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (messages, cursor) in envelopes {
        let record = json!([messages, cursor.to_string()]);
        out.extend_from_slice(record.to_string().as_bytes());
        out.push(b'\n');
    }
    out
}

fn feed_in_pieces(bytes: &[u8], cuts: &[usize]) -> Vec<Envelope> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
    points.sort_unstable();
    points.dedup();

    let mut reader = StreamReader::new();
    let mut out = Vec::new();
    let mut start = 0;
    for point in points.into_iter().chain(std::iter::once(bytes.len())) {
        out.extend(reader.feed(&bytes[start..point]));
        start = point;
    }
    out
}

fn envelopes_strategy() -> impl Strategy<Value = Vec<(Vec<String>, u64)>> {
    prop::collection::vec(
        (
            prop::collection::vec("[a-zA-Z0-9+/=é\\[\\],\"]{0,24}", 0..4),
            1u64..u64::MAX,
        ),
        1..6,
    )
}

proptest! {
    #[test]
    fn split_chunks_decode_like_one_chunk(
        envelopes in envelopes_strategy(),
        cuts in prop::collection::vec(any::<usize>(), 0..12),
    ) {
        let bytes = body(&envelopes);

        let whole = StreamReader::new().feed(&bytes);
        let pieces = feed_in_pieces(&bytes, &cuts);

        prop_assert_eq!(whole.len(), envelopes.len());
        prop_assert_eq!(&pieces, &whole);
    }

    #[test]
    fn byte_at_a_time_keeps_order(envelopes in envelopes_strategy()) {
        let bytes = body(&envelopes);
        let mut reader = StreamReader::new();
        let mut out = Vec::new();
        for byte in &bytes {
            out.extend(reader.feed(std::slice::from_ref(byte)));
        }

        let cursors: Vec<String> = out.iter().map(|e| e.cursor.as_str().to_string()).collect();
        let expected: Vec<String> = envelopes.iter().map(|(_, c)| c.to_string()).collect();
        prop_assert_eq!(cursors, expected);
        prop_assert_eq!(reader.buffered_len(), 0);
    }

    #[test]
    fn base64_round_trip(data in prop::collection::vec(any::<u8>(), 0..64)) {
        let codec = PayloadCodec::Base64;
        prop_assert_eq!(codec.decode(&codec.encode(&data)).unwrap(), data);
    }

    #[test]
    fn decimal_list_round_trip(data in prop::collection::vec(any::<u8>(), 0..64)) {
        let codec = PayloadCodec::DecimalList;
        prop_assert_eq!(codec.decode(&codec.encode(&data)).unwrap(), data);
    }
}

#[test]
fn round_trip_boundary_lengths() {
    for codec in [PayloadCodec::Base64, PayloadCodec::DecimalList] {
        for len in [0usize, 1, 4096, 10_000] {
            let data: Vec<u8> = (0..len).map(|i| (i * 31 % 256) as u8).collect();
            let encoded = codec.encode(&data);
            assert!(encoded.is_ascii());
            assert_eq!(codec.decode(&encoded).unwrap(), data, "{codec:?} len {len}");
        }
    }
}
