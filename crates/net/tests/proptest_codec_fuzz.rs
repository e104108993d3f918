//! Fuzz-style property tests for the packet codec.
//!
//! Decoders must survive arbitrary network input, and the packed integer
//! encoding must stay minimal and reversible.

use auproxy_net::{
    decode_packet, encode_packet, Bound, CodecError, Packet, Part, Payload, Reader, Rpc, Writer,
};
use proptest::prelude::*;

fn packed(value: u32) -> Vec<u8> {
    let mut w = Writer::new();
    w.packed(value);
    w.into_inner()
}

fn chat_packet(code: i32, netid: u32, text: String) -> Packet {
    Packet::Reliable {
        nonce: 1,
        payloads: vec![Payload::GameData {
            code,
            parts: vec![Part::Rpc {
                netid,
                rpc: Rpc::SendChat { text },
            }],
        }],
    }
}

proptest! {
    /// Property: packed integers roundtrip
    #[test]
    fn packed_roundtrips(value in any::<u32>()) {
        let bytes = packed(value);
        let mut r = Reader::new(&bytes);
        prop_assert_eq!(r.packed().unwrap(), value);
        prop_assert!(r.is_empty());
    }

    /// Property: packed encoding uses the fewest 7-bit groups
    #[test]
    fn packed_is_minimal(value in any::<u32>()) {
        let bytes = packed(value);
        let bits = 32 - value.leading_zeros() as usize;
        let expected = bits.div_ceil(7).max(1);
        prop_assert_eq!(bytes.len(), expected);
        prop_assert_eq!(bytes.last().map(|b| b & 0x80), Some(0));
    }

    /// Property: arbitrary bytes don't crash the client-bound decoder
    #[test]
    fn arbitrary_bytes_dont_crash_client(
        random_bytes in prop::collection::vec(any::<u8>(), 0..2000),
    ) {
        let _result = decode_packet(&random_bytes, Bound::Client);
    }

    /// Property: arbitrary bytes don't crash the server-bound decoder
    #[test]
    fn arbitrary_bytes_dont_crash_server(
        random_bytes in prop::collection::vec(any::<u8>(), 0..2000),
    ) {
        let _result = decode_packet(&random_bytes, Bound::Server);
    }

    /// Property: arbitrary GameData bodies don't crash part decoding
    #[test]
    fn arbitrary_game_data_doesnt_crash(
        body in prop::collection::vec(any::<u8>(), 0..500),
    ) {
        let mut frame = vec![0x00];
        frame.extend_from_slice(&((body.len() + 4) as u16).to_le_bytes());
        frame.push(0x05);
        frame.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]);
        frame.extend_from_slice(&body);
        let _result = decode_packet(&frame, Bound::Client);
    }

    /// Property: Hello roundtrips
    #[test]
    fn hello_roundtrips(
        nonce in any::<u16>(),
        client_version in any::<i32>(),
        username in "[a-zA-Z0-9 ]{0,24}",
    ) {
        let packet = Packet::Hello {
            nonce,
            hazel_version: 0,
            client_version,
            username,
        };
        let encoded = encode_packet(&packet, Bound::Server).unwrap();
        prop_assert_eq!(decode_packet(&encoded, Bound::Server).unwrap(), packet);
    }

    /// Property: chat RPCs roundtrip, including multi-byte text
    #[test]
    fn chat_roundtrips(
        code in any::<i32>(),
        netid in any::<u32>(),
        text in "\\PC{0,64}",
    ) {
        let packet = chat_packet(code, netid, text);
        let encoded = encode_packet(&packet, Bound::Server).unwrap();
        prop_assert_eq!(decode_packet(&encoded, Bound::Server).unwrap(), packet);
    }

    /// Property: cutting a payload frame short is a decode error, never a panic
    #[test]
    fn truncated_frames_handled(cut in 1usize..12) {
        let packet = chat_packet(-42, 300, "hello there".into());
        let encoded = encode_packet(&packet, Bound::Server).unwrap();
        let keep = encoded.len().saturating_sub(cut).max(4);

        let result = decode_packet(&encoded[..keep], Bound::Server);
        let is_truncated = matches!(result, Err(CodecError::TruncatedBuffer { .. }));
        prop_assert!(is_truncated);
    }

    /// Property: oversized length prefixes are rejected
    #[test]
    fn oversized_length_handled(claimed_length in 16u16..u16::MAX) {
        let mut frame = vec![0x00];
        frame.extend_from_slice(&claimed_length.to_le_bytes());
        frame.push(0x02);
        frame.extend_from_slice(&[0, 1, 2, 3]);

        let result = decode_packet(&frame, Bound::Client);
        prop_assert!(result.is_err());
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn empty_datagram_fails() {
        assert!(decode_packet(&[], Bound::Client).is_err());
        assert!(decode_packet(&[], Bound::Server).is_err());
    }

    #[test]
    fn reliable_without_nonce_fails() {
        assert!(decode_packet(&[0x01, 0x00], Bound::Client).is_err());
    }

    #[test]
    fn overlong_packed_fails() {
        let bytes = [0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        let mut r = Reader::new(&bytes);
        assert!(matches!(r.packed(), Err(CodecError::PackedOverflow { .. })));
    }

    #[test]
    fn packed_boundaries() {
        assert_eq!(packed(0), vec![0x00]);
        assert_eq!(packed(127), vec![0x7f]);
        assert_eq!(packed(128), vec![0x80, 0x01]);
        assert_eq!(packed(u32::MAX), vec![0xff, 0xff, 0xff, 0xff, 0x0f]);
    }
}
