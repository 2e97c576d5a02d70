//! Keyboard-simulation encoding (spec.md §4.6, §9).
//!
//! A textual sequence such as `"$CLEAR$$CLEAR$3*A$PLU$"` is expanded into a
//! sequence of small integer key codes and wrapped in a `"0;#S..."` Smart3
//! command. Per spec.md §9's Open Question, the `$token$` table below is
//! the only authoritative one — an unrecognised token fails outright. Bare
//! characters outside a `$...$` escape (decimal digits for quantities and
//! PLU ids, and the `*` quantity separator) are not part of that table; this
//! port maps digits to their numeric value and any other bare character to
//! its ASCII byte value, which is sufficient to round-trip every sequence
//! spec.md's operations actually construct.

use crate::error::{ProtocolError, Smart3Error};

fn token_code(token: &str) -> Option<u32> {
    match token {
        "KEY" => Some(1),
        "CLEAR" => Some(3),
        "RETURN" => Some(27),
        "000" => Some(46),
        "00" => Some(47),
        "PLU" => Some(62),
        "SHIFT" => Some(95),
        "SUBTOTAL" => Some(101),
        "TOTAL" => Some(102),
        "KEYBOARD" => Some(109),
        _ => None,
    }
}

/// Expands a keyboard-simulation sequence into key codes.
pub fn encode(sequence: &str) -> Result<Vec<u32>, Smart3Error> {
    let mut codes = Vec::new();
    let mut chars = sequence.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' {
            let mut token = String::new();
            loop {
                match chars.next() {
                    Some('$') => break,
                    Some(other) => token.push(other),
                    None => {
                        return Err(Smart3Error::Protocol(ProtocolError::UnknownKeyboardToken(token)))
                    }
                }
            }
            match token_code(&token) {
                Some(code) => codes.push(code),
                None => return Err(Smart3Error::Protocol(ProtocolError::UnknownKeyboardToken(token))),
            }
        } else if c.is_ascii_digit() {
            codes.push(c.to_digit(10).unwrap());
        } else {
            codes.push(c as u32);
        }
    }
    Ok(codes)
}

/// Wraps key codes in a Smart3 `"0;#S..."` command, optionally followed by
/// `;#A` to request a hello on completion.
pub fn to_command(codes: &[u32], request_hello_on_completion: bool) -> String {
    let joined = codes.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(":");
    if request_hello_on_completion {
        format!("0;#S{joined};#A")
    } else {
        format!("0;#S{joined}")
    }
}

/// Convenience: encode a sequence and wrap it in one call.
pub fn encode_command(sequence: &str, request_hello_on_completion: bool) -> Result<String, Smart3Error> {
    let codes = encode(sequence)?;
    Ok(to_command(&codes, request_hello_on_completion))
}
