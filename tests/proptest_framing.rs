//! Property tests for the wire-level invariants spec.md §8 calls out by name:
//! encode/decode round-tripping, junk-byte tolerance, single-bit-flip
//! rejection, RS-485 address mismatch rejection, and the two parity
//! formulas.

use proptest::prelude::*;

use smart3::control::{is_valid_rs485_register_address, ACK, LENGTH_OFFSET, RS485_ADDRESS_HIGH, RS485_ADDRESS_LOW};
use smart3::framer::{Fed, Framer, Layer};
use smart3::message::MessageData;
use smart3::packet::{encode_message, sum_parity, xor_parity, Packet};

fn feed_all(framer: &mut Framer, bytes: &[u8]) -> Fed {
    let mut last = Fed::Continue;
    for &b in bytes {
        last = framer.feed_byte(b);
        if matches!(last, Fed::Packet(_) | Fed::Error(_)) {
            return last;
        }
    }
    last
}

/// A field that can appear after the message-type tag: printable ASCII,
/// excluding `:`/`;` (the framing delimiters) and every control byte (all
/// of which fall outside the printable range anyway).
fn field_strategy() -> impl Strategy<Value = String> {
    "[ -9<-~]{0,12}" // printable ASCII minus ':' (0x3A) and ';' (0x3B)
}

fn tag_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("A01"),
        Just("B10"),
        Just("B14"),
        Just("B23"),
        Just("C08"),
        Just("C22"),
        Just("C24"),
        Just("B99"),
    ]
}

fn command_strategy() -> impl Strategy<Value = String> {
    (tag_strategy(), proptest::collection::vec(field_strategy(), 0..4))
        .prop_map(|(tag, fields)| {
            let mut command = tag.to_string();
            for field in fields {
                command.push(';');
                command.push_str(&field);
            }
            command
        })
}

proptest! {
    #[test]
    fn xor_parity_is_always_in_range(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let parity = xor_parity(&bytes);
        prop_assert!(parity >= LENGTH_OFFSET);
        prop_assert!(parity <= LENGTH_OFFSET + 0x7F);
    }

    #[test]
    fn sum_parity_is_always_in_range(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let parity = sum_parity(&bytes);
        prop_assert!(parity >= LENGTH_OFFSET);
        prop_assert!(parity <= LENGTH_OFFSET + 0x7F);
    }

    #[test]
    fn a_valid_message_round_trips_through_the_framer(
        command in command_strategy(),
        raw_sequence in 0u32..500,
        crn in 0u8..100,
    ) {
        let payload = MessageData::from_bytes(command.into_bytes());
        prop_assume!(payload.is_ok());
        let payload = payload.unwrap();
        let frame = encode_message(raw_sequence, crn, &payload, None).unwrap();

        let mut framer = Framer::new(Layer::Rs232);
        match feed_all(&mut framer, &frame) {
            Fed::Packet(Packet::Message(m)) => {
                prop_assert_eq!(m.sequence, (raw_sequence % 96) as u8);
                prop_assert_eq!(m.crn, crn);
                prop_assert_eq!(m.payload, payload);
            }
            Fed::Packet(_) => prop_assert!(false, "expected a message packet, got a different packet kind"),
            Fed::Continue => prop_assert!(false, "frame never completed"),
            Fed::Error(_) => prop_assert!(false, "a validly encoded frame must not fail validation"),
        }
    }

    #[test]
    fn leading_junk_bytes_never_prevent_decoding(
        command in command_strategy(),
        junk in proptest::collection::vec(0x20u8..0x7F, 0..16),
    ) {
        let payload = MessageData::from_bytes(command.into_bytes());
        prop_assume!(payload.is_ok());
        let payload = payload.unwrap();
        let frame = encode_message(0, 0, &payload, None).unwrap();

        let mut bytes = junk;
        bytes.extend_from_slice(&frame);

        let mut framer = Framer::new(Layer::Rs232);
        let fed = feed_all(&mut framer, &bytes);
        match fed {
            Fed::Packet(Packet::Message(m)) => prop_assert_eq!(m.payload, payload),
            _ => prop_assert!(false, "junk bytes should be silently discarded before the preamble"),
        }
    }

    #[test]
    fn flipping_a_bit_of_the_parity_byte_is_always_rejected(
        command in command_strategy(),
        bit in 0u8..8,
    ) {
        let payload = MessageData::from_bytes(command.into_bytes());
        prop_assume!(payload.is_ok());
        let payload = payload.unwrap();
        let mut frame = encode_message(0, 0, &payload, None).unwrap();
        let parity_pos = frame.len() - 2;
        frame[parity_pos] ^= 1 << bit;

        let mut framer = Framer::new(Layer::Rs232);
        let fed = feed_all(&mut framer, &frame);
        prop_assert!(matches!(fed, Fed::Error(_)));
    }

    #[test]
    fn rs485_requires_matching_address_bytes(
        address1 in 0u8..=255,
        address2 in 0u8..=255,
    ) {
        let mut framer = Framer::new(Layer::Rs485);
        let fed = feed_all(&mut framer, &[ACK, address1, address2]);
        if address1 == address2 && is_valid_rs485_register_address(address1) {
            prop_assert!(matches!(fed, Fed::Packet(Packet::Indicator(_))));
        } else {
            prop_assert!(matches!(fed, Fed::Error(_)));
        }
    }

    #[test]
    fn every_valid_rs485_address_round_trips(address in RS485_ADDRESS_LOW..=RS485_ADDRESS_HIGH) {
        let mut framer = Framer::new(Layer::Rs485);
        let fed = feed_all(&mut framer, &[ACK, address, address]);
        match fed {
            Fed::Packet(Packet::Indicator(i)) => {
                prop_assert_eq!(i.control, ACK);
                prop_assert_eq!(i.address, Some(address));
            }
            _ => prop_assert!(false, "every address in the documented range must be accepted"),
        }
    }
}
