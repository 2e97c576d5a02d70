//! [`CashRegisterStatus`] (parsed from `A01`) and
//! [`ConnectabilityProgramming`] (parsed from `C24`) — spec.md §3.
//!
//! The wire format packs the operating mode and every status flag into a
//! handful of decimal byte-valued fields. spec.md names the flags but not
//! their exact bit positions (the original implementation was not available
//! to this port — see DESIGN.md); the layout below is this port's own
//! allocation, three bytes of flags (plus a fourth in the extended variant)
//! with the operating mode in the low bits of the first byte.

use chrono::NaiveDateTime;

use crate::error::{ProtocolError, Smart3Error};
use crate::message::MessageData;

/// The register's current operating mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatingMode {
    Inactive,
    Registering,
    Reading,
    Closing,
    Programming,
}

impl OperatingMode {
    fn from_bits(bits: u8) -> Result<Self, Smart3Error> {
        match bits & 0x07 {
            0 => Ok(OperatingMode::Inactive),
            1 => Ok(OperatingMode::Registering),
            2 => Ok(OperatingMode::Reading),
            3 => Ok(OperatingMode::Closing),
            4 => Ok(OperatingMode::Programming),
            other => Err(Smart3Error::Protocol(ProtocolError::UnparseableField {
                message_type: "A01".into(),
                field: 1,
                value: format!("unknown operating mode bits {other:#05b}"),
            })),
        }
    }
}

/// Every status flag spec.md §3 names. The `remote_mode`,
/// `generic_printer_error` and `generic_error` fields are only ever set by
/// the extended (four-flag-byte) variant of the hello message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusFlags {
    pub ticket_open: bool,
    pub non_fiscal_ticket_open: bool,
    pub key_striking_started: bool,
    pub reconnection: bool,
    pub keyboard_locked_by_host: bool,
    pub retransmission_limit: bool,
    pub sequence_error: bool,
    pub syntax_error: bool,
    pub timeout_error: bool,
    pub command_error: bool,
    pub operating_error: bool,
    pub hardware_fault: bool,
    pub memory_reset: bool,
    pub fiscal_memory_error: bool,
    pub fiscal_memory_full: bool,
    pub fiscal_closing_threshold_attained: bool,
    pub fiscalized: bool,
    pub euro_fiscalized: bool,
    pub remote_mode: bool,
    pub generic_printer_error: bool,
    pub generic_error: bool,
}

fn bit(byte: u8, position: u8) -> bool {
    byte & (1 << position) != 0
}

impl StatusFlags {
    fn from_bytes(byte1: u8, byte2: u8, byte3: u8, extended: Option<u8>) -> Self {
        let mut flags = Self {
            ticket_open: bit(byte1, 3),
            non_fiscal_ticket_open: bit(byte1, 4),
            key_striking_started: bit(byte1, 5),
            reconnection: bit(byte1, 6),
            keyboard_locked_by_host: bit(byte1, 7),
            retransmission_limit: bit(byte2, 0),
            sequence_error: bit(byte2, 1),
            syntax_error: bit(byte2, 2),
            timeout_error: bit(byte2, 3),
            command_error: bit(byte2, 4),
            operating_error: bit(byte3, 0),
            hardware_fault: bit(byte3, 1),
            memory_reset: bit(byte3, 2),
            fiscal_memory_error: bit(byte3, 3),
            fiscal_memory_full: bit(byte3, 4),
            fiscal_closing_threshold_attained: bit(byte3, 5),
            fiscalized: bit(byte3, 6),
            euro_fiscalized: bit(byte3, 7),
            ..Default::default()
        };
        if let Some(ext) = extended {
            flags.remote_mode = bit(ext, 0);
            flags.generic_printer_error = bit(ext, 1);
            flags.generic_error = bit(ext, 2);
        }
        flags
    }
}

/// Parsed from the `A01` hello message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CashRegisterStatus {
    pub mode: OperatingMode,
    pub flags: StatusFlags,
    pub timestamp: NaiveDateTime,
    pub device_name: String,
    pub serial_number: String,
}

fn parse_byte_field(message: &MessageData, index: usize) -> Result<u8, Smart3Error> {
    let value = message.field(index).ok_or_else(|| missing_field("A01", index))?;
    value.trim().parse::<u8>().map_err(|_| unparseable("A01", index, value))
}

fn missing_field(message_type: &'static str, field: usize) -> Smart3Error {
    Smart3Error::Protocol(ProtocolError::UnparseableField {
        message_type: message_type.to_string(),
        field,
        value: "<missing>".to_string(),
    })
}

fn unparseable(message_type: &'static str, field: usize, value: &str) -> Smart3Error {
    Smart3Error::Protocol(ProtocolError::UnparseableField {
        message_type: message_type.to_string(),
        field,
        value: value.to_string(),
    })
}

impl CashRegisterStatus {
    /// Parses an `A01` message. The message carries three flag bytes in the
    /// basic variant, or four in the extended variant — distinguished by
    /// whether the timestamp lands at field 4 or field 5.
    pub fn parse(message: &MessageData) -> Result<Self, Smart3Error> {
        if message.message_type() != "A01" {
            return Err(Smart3Error::Protocol(ProtocolError::Contract {
                message_type: message.message_type().to_string(),
            }));
        }
        let byte1 = parse_byte_field(message, 1)?;
        let byte2 = parse_byte_field(message, 2)?;
        let byte3 = parse_byte_field(message, 3)?;
        let mode = OperatingMode::from_bits(byte1)?;

        let (extended, timestamp_index) = match message.field(4) {
            Some(candidate) if candidate.len() == 10 && candidate.chars().all(|c| c.is_ascii_digit()) => {
                (None, 4)
            }
            _ => (Some(parse_byte_field(message, 4)?), 5),
        };
        let flags = StatusFlags::from_bytes(byte1, byte2, byte3, extended);

        let timestamp_raw = message
            .field(timestamp_index)
            .ok_or_else(|| missing_field("A01", timestamp_index))?;
        let timestamp = parse_timestamp(timestamp_raw)
            .ok_or_else(|| unparseable("A01", timestamp_index, timestamp_raw))?;
        let device_name = message
            .field(timestamp_index + 1)
            .ok_or_else(|| missing_field("A01", timestamp_index + 1))?
            .to_string();
        let serial_number = message
            .field(timestamp_index + 2)
            .ok_or_else(|| missing_field("A01", timestamp_index + 2))?
            .to_string();

        Ok(Self { mode, flags, timestamp, device_name, serial_number })
    }
}

/// Parses a `DDMMYYHHMM` timestamp, windowing the two-digit year at 2000+.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if raw.len() != 10 || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let day: u32 = raw[0..2].parse().ok()?;
    let month: u32 = raw[2..4].parse().ok()?;
    let year: i32 = 2000 + raw[4..6].parse::<i32>().ok()?;
    let hour: u32 = raw[6..8].parse().ok()?;
    let minute: u32 = raw[8..10].parse().ok()?;
    let date = chrono::NaiveDate::from_ymd_opt(year, month, day)?;
    date.and_hms_opt(hour, minute, 0)
}

/// Two of the communication flags assembled from the C24 message's two
/// flag bytes (extended variant).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommunicationFlags {
    pub bits: u16,
}

/// Parsed from the `C24` message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectabilityProgramming {
    pub hello_interval_low: u32,
    pub hello_interval_medium: u32,
    pub hello_interval_high: u32,
    pub ack_timeout_ms: u32,
    pub beep_on_timeout: bool,
    pub retransmission_count: u32,
    pub interactivity_level: u32,
    pub history_level: u32,
    pub cash_register_number: u8,
    pub page_count: u32,
    pub baud_rate: u32,
    pub plu_capacity: u32,
    pub customer_capacity: u32,
    pub rs485_address: Option<u8>,
    pub communication_flags: CommunicationFlags,
    pub timeout_milliseconds: u64,
}

fn field_u32(message: &MessageData, index: usize) -> Result<u32, Smart3Error> {
    let raw = message.field(index).ok_or_else(|| missing_field("C24", index))?;
    raw.trim().parse::<u32>().map_err(|_| unparseable("C24", index, raw))
}

impl ConnectabilityProgramming {
    /// Parses a non-terminal `C24` record (field 3 is not `"*"`).
    pub fn parse(message: &MessageData) -> Result<Self, Smart3Error> {
        if message.message_type() != "C24" {
            return Err(Smart3Error::Protocol(ProtocolError::Contract {
                message_type: message.message_type().to_string(),
            }));
        }
        let hello_interval_low = field_u32(message, 1)?;
        let hello_interval_medium = field_u32(message, 2)?;
        let hello_interval_high = field_u32(message, 3)?;
        let ack_timeout_decaseconds = field_u32(message, 4)?;
        let beep_on_timeout = field_u32(message, 5)? != 0;
        let retransmission_count = field_u32(message, 6)?;
        let interactivity_level = field_u32(message, 7)?;
        let history_level = field_u32(message, 8)?;
        let cash_register_number = field_u32(message, 9)? as u8;
        let page_count = field_u32(message, 10)?;
        let baud_rate = field_u32(message, 11)?;
        let plu_capacity = field_u32(message, 12)?;
        let customer_capacity = field_u32(message, 13)?;
        let rs485_address_raw = field_u32(message, 14)?;
        let rs485_address = if rs485_address_raw == 0 { None } else { Some(rs485_address_raw as u8) };
        let flags_lo = field_u32(message, 15).unwrap_or(0);
        let flags_hi = field_u32(message, 16).unwrap_or(0);
        let communication_flags = CommunicationFlags { bits: (flags_lo as u16) | ((flags_hi as u16) << 8) };

        Ok(Self {
            hello_interval_low,
            hello_interval_medium,
            hello_interval_high,
            ack_timeout_ms: ack_timeout_decaseconds * 100,
            beep_on_timeout,
            retransmission_count,
            interactivity_level,
            history_level,
            cash_register_number,
            page_count,
            baud_rate,
            plu_capacity,
            customer_capacity,
            rs485_address,
            communication_flags,
            timeout_milliseconds: (ack_timeout_decaseconds as u64) * 100,
        })
    }

    /// Whether field 3 of a `C24` record is the `"*"` terminator.
    pub fn is_terminator(message: &MessageData) -> bool {
        message.field(3) == Some("*")
    }
}
