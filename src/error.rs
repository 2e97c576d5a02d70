//! The three-layer error taxonomy: transport, protocol, cash-register.
//!
//! Each layer is its own enum so that call sites can match narrowly (e.g. a
//! caller that only cares about retry exhaustion), while [`Smart3Error`]
//! gives every layer a common currency for propagation out of the crate.

use thiserror::Error;

/// Which state the framer was in when a validation error was recorded.
///
/// Carried alongside [`TransportError::PacketValidation`] purely for
/// diagnostics; it has no bearing on control flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramerState {
    ReadPreamble,
    ReadAddress,
    ReadLength,
    ReadSequence,
    ReadCrNumber,
    ReadMessage,
    ReadParity,
    TerminateReady,
    TerminateWait,
}

/// A snapshot of the framer's byte counters at the moment of failure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FramerCounters {
    pub bytes_expected: Option<usize>,
    pub bytes_received: usize,
    pub bytes_discarded: usize,
}

/// Errors raised by the framer while a frame is mid-flight.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("packet validation failed in {state:?}: {reason}")]
pub struct PacketValidationError {
    pub state: FramerState,
    pub reason: String,
}

impl PacketValidationError {
    pub fn new(state: FramerState, reason: impl Into<String>) -> Self {
        Self {
            state,
            reason: reason.into(),
        }
    }
}

/// Transport-layer failures: timeouts, I/O, and unrecovered framing errors.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("receive timed out (expected {counters:?})")]
    Timeout { counters: FramerCounters },
    #[error(transparent)]
    PacketValidation(#[from] PacketValidationError),
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Protocol-layer failures: contract violations and dialogue breakdowns.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("handler does not accept message type {message_type:?}")]
    Contract { message_type: String },
    #[error("{operation}: read retry timeout exceeded")]
    ReadRetryExceeded { operation: &'static str },
    #[error("{operation}: write retry timeout exceeded")]
    WriteRetryExceeded { operation: &'static str },
    #[error("invalid control byte 0x{0:02X}")]
    InvalidControlByte(u8),
    #[error("unparseable field {field} in message {message_type}: {value:?}")]
    UnparseableField {
        message_type: String,
        field: usize,
        value: String,
    },
    #[error("unknown keyboard token {0:?}")]
    UnknownKeyboardToken(String),
}

/// Failures reported by, or about, the cash register itself.
#[derive(Error, Debug)]
pub enum CashRegisterError {
    #[error("cash register reported an operating error")]
    OperatingError,
    #[error("cash register has a ticket open")]
    TicketOpen,
    #[error("cash register has started key striking")]
    KeyStrikingStarted,
    #[error("cash register reported a hardware fault")]
    HardwareFault,
    #[error("cash register reported a fiscal memory error")]
    FiscalMemoryError,
    #[error("cash register reported fiscal memory full")]
    FiscalMemoryFull,
    #[error("cash register refused to carry out the request")]
    Refused,
    #[error("cash register has a fiscal day open")]
    FiscalDayOpen,
    #[error("another transaction is already active")]
    TransactionOpen,
}

/// Top-level error type returned across the crate's public API.
#[derive(Error, Debug)]
pub enum Smart3Error {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    CashRegister(#[from] CashRegisterError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("operation canceled")]
    Canceled,
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl From<PacketValidationError> for Smart3Error {
    fn from(e: PacketValidationError) -> Self {
        Smart3Error::Transport(TransportError::PacketValidation(e))
    }
}

impl From<std::io::Error> for Smart3Error {
    fn from(e: std::io::Error) -> Self {
        Smart3Error::Transport(TransportError::Io(e))
    }
}

impl From<serialport::Error> for Smart3Error {
    fn from(e: serialport::Error) -> Self {
        Smart3Error::Transport(TransportError::Io(e.into()))
    }
}

pub type Result<T> = std::result::Result<T, Smart3Error>;
