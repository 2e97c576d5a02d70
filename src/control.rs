//! Wire control bytes shared by every physical layer.
//!
//! See spec.md §6. These values never appear inside a payload (§3
//! invariant "payload bytes never equal any listed control byte").

/// Start of text: terminates the payload, precedes the parity byte.
pub const STX: u8 = 0x02;
/// End of text: the frame terminator.
pub const ETX: u8 = 0x03;
/// End of transmission: the message-packet preamble.
pub const EOT: u8 = 0x04;
/// Enquiry: polls for data (RS-485) or requests a hello.
pub const ENQ: u8 = 0x05;
/// Positive acknowledgement.
pub const ACK: u8 = 0x06;
/// Bell: the register signals "paper out".
pub const BEL: u8 = 0x07;
/// Data link escape: a normal hello request.
pub const DLE: u8 = 0x10;
/// Device control 1: an immediate hello request.
pub const DC1: u8 = 0x11;
/// Negative acknowledgement: ask for a retransmit.
pub const NAK: u8 = 0x15;
/// Synchronous idle: "still working, keep waiting".
pub const SYN: u8 = 0x16;
/// Cancel: the register refuses to carry out the request.
pub const CAN: u8 = 0x18;

/// One-byte indicator preambles recognised on RS-232 (and, with an address
/// suffix, on RS-485).
pub const INDICATOR_PREAMBLES: [u8; 8] = [ENQ, ACK, BEL, DLE, DC1, NAK, SYN, CAN];

pub fn is_indicator_preamble(byte: u8) -> bool {
    INDICATOR_PREAMBLES.contains(&byte)
}

/// Lowest/highest RS-485 cash-register-unit address byte ([0xA0, 0xAF]).
pub const RS485_ADDRESS_LOW: u8 = 0xA0;
pub const RS485_ADDRESS_HIGH: u8 = 0xAF;
/// RS-485 broadcast address.
pub const RS485_BROADCAST_ADDRESS: u8 = 0xC0;

pub fn is_valid_rs485_register_address(byte: u8) -> bool {
    (RS485_ADDRESS_LOW..=RS485_ADDRESS_HIGH).contains(&byte)
}

/// Length-byte and sequence/CRN offsets, per spec.md §3 invariants.
pub const LENGTH_OFFSET: u8 = 0x28;
pub const SEQUENCE_OFFSET: u8 = 0x20;
pub const CRN_OFFSET: u8 = 0x20;
pub const SEQUENCE_MODULUS: u32 = 96;

/// Bytes of frame overhead on top of the payload for an RS-232 message
/// packet: EOT, length, sequence, CRN, STX, parity, ETX.
pub const RS232_MESSAGE_OVERHEAD: usize = 7;
/// RS-485 adds one address byte after the preamble.
pub const RS485_MESSAGE_OVERHEAD: usize = 8;

/// Minimum and maximum values of the length byte (`length + 0x28`), per
/// spec.md §4.1 state `ReadLength`.
pub const MIN_LENGTH: u8 = 7;
pub const MAX_LENGTH: u8 = 215;

static_assertions::const_assert_eq!(RS485_MESSAGE_OVERHEAD, RS232_MESSAGE_OVERHEAD + 1);

/// Maximum payload length (spec.md §3).
pub const MAX_PAYLOAD_LEN: usize = 200;
