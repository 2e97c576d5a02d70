//! Host-side driver for the Smart3 fiscal cash register protocol.
//!
//! This crate implements the protocol engine only: byte framing, the
//! request/acknowledge transceiver, the dialogue console, the catalogue of
//! scripted operations, the serialised operation manager and the
//! multi-phase transaction controller. A host application supplies the
//! [`config::Configuration`], wires up logging, and drives an
//! [`manager::OperationManager`]; everything above that line (the public
//! service façade, CSV import/export, configuration loading from disk) is
//! out of scope for this crate.

pub mod config;
pub mod console;
pub mod control;
pub mod error;
pub mod framer;
pub mod keyboard;
pub mod manager;
pub mod message;
pub mod operations;
pub mod packet;
pub mod plu;
pub mod report;
pub mod serial;
pub mod status;
pub mod transaction;
pub mod transceiver;

pub use config::{BaudRate, Configuration, PhysicalLayer};
pub use error::{CashRegisterError, ProtocolError, Smart3Error, TransportError};
pub use manager::OperationManager;
pub use message::MessageData;
pub use packet::Packet;
pub use plu::PluInfo;
pub use transaction::Transaction;
