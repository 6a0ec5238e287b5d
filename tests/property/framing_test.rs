// tests/property/framing_test.rs

//! Property-based tests for the framer: the way bytes are split across reads
//! never changes which frames come out.

use bytes::Bytes;
use currencydb::core::protocol::{DELIMITER, InboundBuffer, Message, MessageKind};
use proptest::prelude::*;

/// Payloads that never contain the delimiter themselves.
fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..64).prop_map(|mut bytes| {
        while let Some(pos) = bytes.windows(2).position(|w| w == DELIMITER) {
            bytes.remove(pos);
        }
        bytes
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_chunking_does_not_change_frames(
        payloads in proptest::collection::vec(payload_strategy(), 1..16),
        cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..12),
    ) {
        let mut stream = Vec::new();
        for payload in &payloads {
            stream.extend_from_slice(payload);
            stream.extend_from_slice(DELIMITER);
        }

        let mut boundaries: Vec<usize> = cuts.iter().map(|i| i.index(stream.len() + 1)).collect();
        boundaries.push(0);
        boundaries.push(stream.len());
        boundaries.sort_unstable();
        boundaries.dedup();

        let mut inbound = InboundBuffer::new();
        let mut frames = Vec::new();
        for window in boundaries.windows(2) {
            inbound.extend(&stream[window[0]..window[1]]);
            while let Some(frame) = inbound.next_frame() {
                frames.push(frame);
            }
        }

        let expected: Vec<Bytes> = payloads.into_iter().map(Bytes::from).collect();
        prop_assert_eq!(frames, expected);
        prop_assert_eq!(inbound.pending(), 0);
    }

    #[test]
    fn test_text_messages_survive_encode_and_parse(text in "[^\r\n]{0,200}") {
        let message = Message::text(text.clone());
        let encoded = message.encode_to_vec();
        prop_assert!(encoded.ends_with(DELIMITER));

        let frame = &encoded[..encoded.len() - DELIMITER.len()];
        let parsed = Message::parse(frame).unwrap();
        prop_assert_eq!(parsed.kind(), MessageKind::Text);
        prop_assert_eq!(parsed.payload(), text.as_bytes());
    }

    #[test]
    fn test_unterminated_input_yields_no_frame(payload in payload_strategy()) {
        let mut inbound = InboundBuffer::new();
        inbound.extend(&payload);
        prop_assert!(inbound.next_frame().is_none());
        prop_assert_eq!(inbound.pending(), payload.len());
    }
}
