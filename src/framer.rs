//! The inbound byte-by-byte state machine (spec.md §4.1).
//!
//! One [`Framer`] decodes a single physical layer's byte stream into
//! [`Packet`]s. The two layers share every transition except where spec.md
//! §4.1 calls out a difference (RS-485's extra address byte on both
//! indicator and message frames); that difference is data (`Layer`), not a
//! second copy of the state machine, per the "explicit data over reflection"
//! design note (spec.md §9) generalized to this layer split as well.

use log::trace;

use crate::control::{
    is_indicator_preamble, is_valid_rs485_register_address, CRN_OFFSET, ETX, LENGTH_OFFSET,
    MAX_LENGTH, MIN_LENGTH, RS232_MESSAGE_OVERHEAD, RS485_MESSAGE_OVERHEAD, SEQUENCE_OFFSET, STX,
};
use crate::error::{FramerCounters, FramerState, PacketValidationError};
use crate::message::MessageData;
use crate::packet::{xor_parity, IndicatorPacket, MessagePacket, Packet};

/// Which physical layer a [`Framer`] is decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layer {
    Rs232,
    Rs485,
}

enum State {
    ReadPreamble,
    IndicatorAddress1 {
        control: u8,
    },
    IndicatorAddress2 {
        control: u8,
        address1: u8,
    },
    ReadAddress,
    ReadLength {
        address: Option<u8>,
    },
    ReadSequence {
        address: Option<u8>,
        length: usize,
        parity: u8,
    },
    ReadCrNumber {
        address: Option<u8>,
        length: usize,
        sequence: u8,
        parity: u8,
    },
    ReadMessage {
        address: Option<u8>,
        sequence: u8,
        crn: u8,
        parity: u8,
        payload: Vec<u8>,
        remaining: usize,
    },
    ReadParity {
        address: Option<u8>,
        sequence: u8,
        crn: u8,
        parity: u8,
        payload: Vec<u8>,
    },
    TerminateReady {
        address: Option<u8>,
        sequence: u8,
        crn: u8,
        payload: Vec<u8>,
    },
    TerminateWait {
        error: PacketValidationError,
    },
}

/// Result of feeding one byte to the framer.
pub enum Fed {
    /// The frame is not yet complete; keep feeding bytes.
    Continue,
    /// A packet was completed.
    Packet(Packet),
    /// The frame failed validation; the framer has resynchronised on the
    /// next terminator and is ready for the next preamble.
    Error(PacketValidationError),
}

/// The inbound state machine. Construct one per physical layer and feed it
/// bytes as they arrive from the [`crate::serial::SerialPortDriver`].
pub struct Framer {
    layer: Layer,
    state: State,
    bytes_expected: Option<usize>,
    bytes_received: usize,
    bytes_discarded: usize,
    current_packet: Option<Packet>,
}

impl Framer {
    pub fn new(layer: Layer) -> Self {
        Self {
            layer,
            state: State::ReadPreamble,
            bytes_expected: None,
            bytes_received: 0,
            bytes_discarded: 0,
            current_packet: None,
        }
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn bytes_expected(&self) -> Option<usize> {
        self.bytes_expected
    }

    pub fn bytes_received(&self) -> usize {
        self.bytes_received
    }

    pub fn bytes_discarded(&self) -> usize {
        self.bytes_discarded
    }

    pub fn current_packet(&self) -> Option<&Packet> {
        self.current_packet.as_ref()
    }

    pub fn counters(&self) -> FramerCounters {
        FramerCounters {
            bytes_expected: self.bytes_expected,
            bytes_received: self.bytes_received,
            bytes_discarded: self.bytes_discarded,
        }
    }

    fn reset_counters(&mut self) {
        self.bytes_expected = None;
        self.bytes_received = 0;
        self.bytes_discarded = 0;
    }

    /// Feeds one byte into the machine, advancing its state and optionally
    /// producing a completed packet or a terminal error.
    pub fn feed_byte(&mut self, byte: u8) -> Fed {
        trace!("framer: feed byte 0x{:02X}", byte);
        self.bytes_received += 1;
        let state = std::mem::replace(&mut self.state, State::ReadPreamble);
        let (next_state, fed) = self.advance(state, byte);
        self.state = next_state;
        if let Fed::Packet(ref packet) = fed {
            self.current_packet = Some(packet.clone());
            self.reset_counters();
        }
        if let Fed::Error(_) = fed {
            self.current_packet = None;
        }
        fed
    }

    fn advance(&mut self, state: State, byte: u8) -> (State, Fed) {
        match state {
            State::ReadPreamble => self.on_read_preamble(byte),
            State::IndicatorAddress1 { control } => {
                (State::IndicatorAddress2 { control, address1: byte }, Fed::Continue)
            }
            State::IndicatorAddress2 { control, address1 } => {
                if address1 == byte && is_valid_rs485_register_address(address1) {
                    (
                        State::ReadPreamble,
                        Fed::Packet(Packet::Indicator(IndicatorPacket {
                            control,
                            address: Some(address1),
                        })),
                    )
                } else {
                    let err = PacketValidationError::new(
                        FramerState::ReadAddress,
                        format!(
                            "RS-485 indicator address mismatch or out of range: 0x{:02X} / 0x{:02X}",
                            address1, byte
                        ),
                    );
                    (State::ReadPreamble, Fed::Error(err))
                }
            }
            State::ReadAddress => {
                if !is_valid_rs485_register_address(byte) {
                    let err = PacketValidationError::new(
                        FramerState::ReadAddress,
                        format!("RS-485 message address 0x{:02X} out of range", byte),
                    );
                    return self.terminate_wait(err);
                }
                (State::ReadLength { address: Some(byte) }, Fed::Continue)
            }
            State::ReadLength { address } => {
                let length = byte.wrapping_sub(LENGTH_OFFSET);
                if byte < LENGTH_OFFSET || !(MIN_LENGTH..=MAX_LENGTH).contains(&length) {
                    let err = PacketValidationError::new(
                        FramerState::ReadLength,
                        format!("invalid length byte 0x{:02X}", byte),
                    );
                    return self.terminate_wait(err);
                }
                let overhead = if address.is_some() {
                    RS485_MESSAGE_OVERHEAD
                } else {
                    RS232_MESSAGE_OVERHEAD
                };
                let payload_len = length as usize - overhead;
                self.bytes_expected = Some(length as usize);
                let mut parity = crate::control::EOT;
                if let Some(addr) = address {
                    parity ^= addr;
                }
                parity ^= byte;
                (
                    State::ReadSequence { address, length: payload_len, parity },
                    Fed::Continue,
                )
            }
            State::ReadSequence { address, length, parity } => {
                if !(SEQUENCE_OFFSET..=0x7F).contains(&byte) {
                    let err = PacketValidationError::new(
                        FramerState::ReadSequence,
                        format!("invalid sequence byte 0x{:02X}", byte),
                    );
                    return self.terminate_wait(err);
                }
                let sequence = byte - SEQUENCE_OFFSET;
                (
                    State::ReadCrNumber {
                        address,
                        length,
                        sequence,
                        parity: parity ^ byte,
                    },
                    Fed::Continue,
                )
            }
            State::ReadCrNumber { address, length, sequence, parity } => {
                if !(CRN_OFFSET..=0x83).contains(&byte) {
                    let err = PacketValidationError::new(
                        FramerState::ReadCrNumber,
                        format!("invalid CRN byte 0x{:02X}", byte),
                    );
                    return self.terminate_wait(err);
                }
                let crn = byte - CRN_OFFSET;
                (
                    State::ReadMessage {
                        address,
                        sequence,
                        crn,
                        parity: parity ^ byte,
                        payload: Vec::with_capacity(length),
                        remaining: length,
                    },
                    Fed::Continue,
                )
            }
            State::ReadMessage { address, sequence, crn, parity, mut payload, remaining } => {
                if remaining > 0 {
                    if is_indicator_preamble(byte) || matches!(byte, STX | ETX | crate::control::EOT) {
                        let err = PacketValidationError::new(
                            FramerState::ReadMessage,
                            format!("control byte 0x{:02X} found in payload", byte),
                        );
                        return self.terminate_wait(err);
                    }
                    payload.push(byte);
                    let parity = parity ^ byte;
                    // Even on the last payload byte, fall back into `ReadMessage`
                    // with `remaining: 0` rather than jumping to `ReadParity`
                    // directly — the mandatory STX terminator (spec.md §4.1
                    // state 5) still has to be read and XORed into the parity
                    // below before the frame is ready for `ReadParity`.
                    (
                        State::ReadMessage { address, sequence, crn, parity, payload, remaining: remaining - 1 },
                        Fed::Continue,
                    )
                } else {
                    if byte != STX {
                        let err = PacketValidationError::new(
                            FramerState::ReadMessage,
                            format!("expected STX, found 0x{:02X}", byte),
                        );
                        return self.terminate_wait(err);
                    }
                    (
                        State::ReadParity { address, sequence, crn, parity: parity ^ byte, payload },
                        Fed::Continue,
                    )
                }
            }
            State::ReadParity { address, sequence, crn, parity, payload } => {
                let expected = (parity & 0x7F).wrapping_add(LENGTH_OFFSET);
                if byte != expected {
                    let err = PacketValidationError::new(
                        FramerState::ReadParity,
                        format!("parity mismatch: expected 0x{:02X}, found 0x{:02X}", expected, byte),
                    );
                    return self.terminate_wait(err);
                }
                (
                    State::TerminateReady { address, sequence, crn, payload },
                    Fed::Continue,
                )
            }
            State::TerminateReady { address, sequence, crn, payload } => {
                if byte != ETX {
                    let err = PacketValidationError::new(
                        FramerState::TerminateReady,
                        format!("expected ETX, found 0x{:02X}", byte),
                    );
                    return self.terminate_wait(err);
                }
                match MessageData::from_bytes(payload) {
                    Ok(message) => (
                        State::ReadPreamble,
                        Fed::Packet(Packet::Message(MessagePacket { address, sequence, crn, payload: message })),
                    ),
                    Err(_) => {
                        let err = PacketValidationError::new(
                            FramerState::TerminateReady,
                            "payload failed message decoding".to_string(),
                        );
                        (State::ReadPreamble, Fed::Error(err))
                    }
                }
            }
            State::TerminateWait { error } => {
                if byte == ETX {
                    (State::ReadPreamble, Fed::Error(error))
                } else {
                    self.bytes_discarded += 1;
                    (State::TerminateWait { error }, Fed::Continue)
                }
            }
        }
    }

    fn on_read_preamble(&mut self, byte: u8) -> (State, Fed) {
        if is_indicator_preamble(byte) {
            return match self.layer {
                Layer::Rs232 => (
                    State::ReadPreamble,
                    Fed::Packet(Packet::Indicator(IndicatorPacket { control: byte, address: None })),
                ),
                Layer::Rs485 => (State::IndicatorAddress1 { control: byte }, Fed::Continue),
            };
        }
        if byte == crate::control::EOT {
            return match self.layer {
                Layer::Rs232 => (State::ReadLength { address: None }, Fed::Continue),
                Layer::Rs485 => (State::ReadAddress, Fed::Continue),
            };
        }
        self.bytes_discarded += 1;
        (State::ReadPreamble, Fed::Continue)
    }

    fn terminate_wait(&mut self, error: PacketValidationError) -> (State, Fed) {
        (State::TerminateWait { error }, Fed::Continue)
    }
}
