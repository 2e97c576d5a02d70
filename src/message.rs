//! [`MessageData`]: a payload viewed both as raw bytes and as `:`/`;`
//! delimited fields (spec.md §3).

use crate::control::{is_indicator_preamble, MAX_PAYLOAD_LEN};
use crate::error::{ProtocolError, Smart3Error};

/// An immutable message payload: a byte sequence plus the one-based,
/// `:`/`;`-delimited field view over it. Field 0 is always the 3-character
/// message type tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageData {
    bytes: Vec<u8>,
    fields: Vec<String>,
}

fn validate_payload_bytes(bytes: &[u8]) -> Result<(), Smart3Error> {
    if bytes.len() > MAX_PAYLOAD_LEN {
        return Err(Smart3Error::InvalidArgument(format!(
            "payload of {} bytes exceeds the {}-byte maximum",
            bytes.len(),
            MAX_PAYLOAD_LEN
        )));
    }
    for &b in bytes {
        if is_control_byte(b) {
            return Err(Smart3Error::InvalidArgument(format!(
                "payload contains control byte 0x{:02X}",
                b
            )));
        }
    }
    Ok(())
}

impl MessageData {
    /// Builds a `MessageData` from a raw inbound payload, validating length,
    /// the absence of control bytes, and the 3-character `A`/`B`/`C` tag
    /// every inbound message type carries (spec.md §3).
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, Smart3Error> {
        validate_payload_bytes(&bytes)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let fields = split_fields(&text);
        if fields.is_empty() || fields[0].len() != 3 {
            return Err(Smart3Error::Protocol(ProtocolError::UnparseableField {
                message_type: fields.get(0).cloned().unwrap_or_default(),
                field: 0,
                value: text,
            }));
        }
        let tag_head = fields[0].as_bytes()[0];
        if !matches!(tag_head, b'A' | b'B' | b'C') {
            return Err(Smart3Error::Protocol(ProtocolError::UnparseableField {
                message_type: fields[0].clone(),
                field: 0,
                value: text,
            }));
        }
        Ok(Self { bytes, fields })
    }

    /// Builds a `MessageData` from a command string such as
    /// `"0;*2;+4;&m"` — semicolon-separated commands, each becoming a
    /// field after the implicit first field. Host-originated commands
    /// aren't tagged message types (spec.md §3 reserves the 3-character
    /// `A`/`B`/`C` tag for inbound payloads), so field 0 here is just
    /// whatever status/command code the operation is replying with.
    pub fn from_command(command: &str) -> Result<Self, Smart3Error> {
        let bytes = command.as_bytes().to_vec();
        validate_payload_bytes(&bytes)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let fields = split_fields(&text);
        if fields.is_empty() {
            return Err(Smart3Error::InvalidArgument("empty command".into()));
        }
        Ok(Self { bytes, fields })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The 3-character message type tag (field 0).
    pub fn message_type(&self) -> &str {
        &self.fields[0]
    }

    /// One-based field access: `field(1)` is the first field after the tag.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(|s| s.as_str())
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

fn is_control_byte(b: u8) -> bool {
    use crate::control::{ACK, CAN, DC1, DLE, ENQ, EOT, ETX, NAK, STX, SYN};
    is_indicator_preamble(b) || matches!(b, STX | ETX | EOT | ACK | ENQ | DLE | DC1 | NAK | SYN | CAN)
}

/// Splits a message's text on `:` and `;`, preserving order.
fn split_fields(text: &str) -> Vec<String> {
    text.split(|c| c == ':' || c == ';')
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fields_and_type() {
        let msg = MessageData::from_bytes(b"A01:068:128:192".to_vec()).unwrap();
        assert_eq!(msg.message_type(), "A01");
        assert_eq!(msg.field(1), Some("068"));
        assert_eq!(msg.field(3), Some("192"));
        assert_eq!(msg.field(4), None);
    }

    #[test]
    fn semicolon_and_colon_both_delimit() {
        let msg = MessageData::from_command("0;*2;+4;&m").unwrap();
        assert_eq!(msg.field_count(), 5);
        assert_eq!(msg.field(1), Some("*2"));
    }

    #[test]
    fn rejects_control_bytes() {
        let err = MessageData::from_bytes(vec![b'A', b'0', b'1', 0x02]);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_bad_type_tag() {
        let err = MessageData::from_bytes(b"Z01:abc".to_vec());
        assert!(err.is_err());
    }
}
