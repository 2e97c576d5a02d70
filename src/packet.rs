//! The transport unit: indicator packets, message packets, broadcast
//! packets, and their wire encoding (spec.md §3, §4.2, §6).

use crate::control::{
    is_valid_rs485_register_address, CRN_OFFSET, ETX, LENGTH_OFFSET, RS232_MESSAGE_OVERHEAD,
    RS485_MESSAGE_OVERHEAD, SEQUENCE_MODULUS, SEQUENCE_OFFSET, STX,
};
use crate::error::Smart3Error;
use crate::message::MessageData;

/// Byte overhead of an RS-232/RS-485 broadcast frame excluding payload:
/// `EOT, [address,] length, STX, parity, ETX`.
const BROADCAST_RS232_OVERHEAD: usize = 5;
const BROADCAST_RS485_OVERHEAD: usize = 6;

/// A single control byte, optionally suffixed by a repeated RS-485 address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndicatorPacket {
    pub control: u8,
    pub address: Option<u8>,
}

/// A fully framed and validated message packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessagePacket {
    pub address: Option<u8>,
    /// The raw (pre-modulus) sequence used to build the frame, if known;
    /// decoded packets only ever carry the already-reduced `sequence`.
    pub sequence: u8,
    pub crn: u8,
    pub payload: MessageData,
}

/// An unaddressed frame used only for bulk PLU loading (additive CRC).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BroadcastPacket {
    pub address: Option<u8>,
    pub payload: Vec<u8>,
}

/// The transport unit produced by the framer or consumed by the encoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    Indicator(IndicatorPacket),
    Message(MessagePacket),
    Broadcast(BroadcastPacket),
}

/// `((XOR of bytes) & 0x7F) + 0x28` — the message-packet CRC (spec.md §3, §8).
pub fn xor_parity(bytes: &[u8]) -> u8 {
    let xor = bytes.iter().fold(0u8, |acc, &b| acc ^ b);
    (xor & 0x7F).wrapping_add(LENGTH_OFFSET)
}

/// `((SUM of bytes) & 0x7F) + 0x28` — the broadcast-packet CRC (spec.md §3, §8).
pub fn sum_parity(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    (sum & 0x7F).wrapping_add(LENGTH_OFFSET)
}

/// Encodes an outbound message packet: `EOT, [address,] length+0x28,
/// (seq mod 96)+0x20, crn+0x20, payload, STX, parity, ETX`.
pub fn encode_message(
    raw_sequence: u32,
    crn: u8,
    payload: &MessageData,
    address: Option<u8>,
) -> Result<Vec<u8>, Smart3Error> {
    if crn > 99 {
        return Err(Smart3Error::InvalidArgument(format!(
            "cash register number {} out of range [0, 99]",
            crn
        )));
    }
    if let Some(addr) = address {
        if !is_valid_rs485_register_address(addr) {
            return Err(Smart3Error::InvalidArgument(format!(
                "RS-485 address 0x{:02X} out of range",
                addr
            )));
        }
    }

    let overhead = if address.is_some() {
        RS485_MESSAGE_OVERHEAD
    } else {
        RS232_MESSAGE_OVERHEAD
    };
    let total_len = overhead + payload.as_bytes().len();
    if total_len > 0xFF {
        return Err(Smart3Error::InvalidArgument(
            "frame too long to encode a length byte".into(),
        ));
    }
    let length_byte = (total_len as u8).wrapping_add(LENGTH_OFFSET);
    let sequence_byte = ((raw_sequence % SEQUENCE_MODULUS) as u8).wrapping_add(SEQUENCE_OFFSET);
    let crn_byte = crn.wrapping_add(CRN_OFFSET);

    let mut frame = Vec::with_capacity(total_len + 1);
    frame.push(crate::control::EOT);
    if let Some(addr) = address {
        frame.push(addr);
    }
    frame.push(length_byte);
    frame.push(sequence_byte);
    frame.push(crn_byte);
    frame.extend_from_slice(payload.as_bytes());
    frame.push(STX);

    let parity = xor_parity(&frame);
    frame.push(parity);
    frame.push(ETX);
    Ok(frame)
}

/// Encodes an indicator packet: one control byte on RS-232, or `control,
/// address, address` on RS-485.
pub fn encode_indicator(control: u8, address: Option<u8>) -> Vec<u8> {
    match address {
        Some(addr) => vec![control, addr, addr],
        None => vec![control],
    }
}

/// Encodes an outbound broadcast frame: `EOT, [address,] length+0x28,
/// payload, STX, parity(sum), ETX`.
pub fn encode_broadcast(payload: &[u8], address: Option<u8>) -> Result<Vec<u8>, Smart3Error> {
    let overhead = if address.is_some() {
        BROADCAST_RS485_OVERHEAD
    } else {
        BROADCAST_RS232_OVERHEAD
    };
    let total_len = overhead + payload.len();
    if total_len > 0xFF {
        return Err(Smart3Error::InvalidArgument(
            "broadcast frame too long to encode a length byte".into(),
        ));
    }
    let length_byte = (total_len as u8).wrapping_add(LENGTH_OFFSET);

    let mut frame = Vec::with_capacity(total_len + 1);
    frame.push(crate::control::EOT);
    if let Some(addr) = address {
        frame.push(addr);
    }
    frame.push(length_byte);
    frame.extend_from_slice(payload);
    frame.push(STX);

    let parity = sum_parity(&frame);
    frame.push(parity);
    frame.push(ETX);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_message_round_trips_length_byte() {
        let payload = MessageData::from_command("0;*2").unwrap();
        let frame = encode_message(5, 1, &payload, None).unwrap();
        assert_eq!(frame[0], crate::control::EOT);
        let length = frame[1].wrapping_sub(LENGTH_OFFSET) as usize;
        assert_eq!(length, RS232_MESSAGE_OVERHEAD + payload.as_bytes().len());
    }

    #[test]
    fn sequence_byte_wraps_mod_96() {
        let payload = MessageData::from_command("0").unwrap();
        for raw in [0u32, 95, 96, 255, 1000] {
            let frame = encode_message(raw, 0, &payload, None).unwrap();
            assert_eq!(frame[2], ((raw % 96) as u8) + SEQUENCE_OFFSET);
        }
    }

    #[test]
    fn rejects_crn_out_of_range() {
        let payload = MessageData::from_command("0").unwrap();
        assert!(encode_message(0, 100, &payload, None).is_err());
    }

    #[test]
    fn broadcast_uses_additive_parity() {
        let payload = [1u8, 2, 3, 4];
        let frame = encode_broadcast(&payload, None).unwrap();
        let stx_pos = frame.iter().position(|&b| b == STX).unwrap();
        let parity = frame[stx_pos + 1];
        assert_eq!(parity, sum_parity(&frame[..=stx_pos]));
    }
}
